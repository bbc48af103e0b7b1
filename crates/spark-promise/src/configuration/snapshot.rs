use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use super::field::Field;
use super::settings::Settings;
use crate::callback::{ExecutionErrorHandler, MultipleCompletionHandler};
use crate::error::ExecutorInitError;
use crate::executor::{PoolSettings, SharedExecutor, ThreadPoolExecutor};
use crate::lazy::LazyCell;

/// 快照中的单个字段：要么已持有具体值，要么指向尚未物化的惰性默认值。
///
/// - `Deferred` 以 `Arc` 共享源头的 [`LazyCell`]，复制快照不会触发初始化，
///   也不会为同一个默认值创建第二个独立的惰性单元。
enum Slot<T, E = Infallible> {
    Ready(T),
    Deferred(Arc<LazyCell<T, E>>),
}

impl<T: Clone, E> Slot<T, E> {
    fn lazy<F>(init: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Slot::Deferred(Arc::new(LazyCell::new(init)))
    }

    fn get(&self) -> Result<T, E> {
        match self {
            Slot::Ready(value) => Ok(value.clone()),
            Slot::Deferred(lazy) => lazy.get(),
        }
    }

    fn is_materialized(&self) -> bool {
        match self {
            Slot::Ready(_) => true,
            Slot::Deferred(lazy) => lazy.is_initialized(),
        }
    }

    fn peek(&self) -> Option<T> {
        match self {
            Slot::Ready(value) => Some(value.clone()),
            Slot::Deferred(lazy) => lazy.peek(),
        }
    }

    /// 复制字段：已物化的值按值复制，未物化的默认值继续延迟。
    fn fork(&self) -> Self {
        match self {
            Slot::Ready(value) => Slot::Ready(value.clone()),
            Slot::Deferred(lazy) => match lazy.peek() {
                Some(value) => Slot::Ready(value),
                None => Slot::Deferred(Arc::clone(lazy)),
            },
        }
    }
}

impl<T: Clone> Slot<T, Infallible> {
    fn force(&self) -> T {
        match self.get() {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

/// 一组完整的配置取值，发布后不可变。
///
/// # 教案式说明
/// - **意图 (Why)**：读者通过一次原子加载拿到整份快照，永远不会观察到“写了一半”的配置；
///   每次成功更新都会产生全新的快照，旧快照在最后一个读者释放后回收。
/// - **契约 (What)**：
///   - 五个字段均可读取：要么持有显式值，要么在首次读取时经由默认初始化函数物化；
///   - `epoch` 从 0 开始，每次成功提交的快照都是其基准快照的 `epoch + 1`；
///   - [`ConfigurationSnapshot::copy`] 不会触发任何默认值的物化。
/// - **默认值 (What)**：
///   - `fallback_on_current_thread`：`true`；
///   - 执行器：按 [`PoolSettings::default`] 启动的线程池，两个执行器字段共享该实例；
///   - `execution_errors`：[`ExecutionErrorHandler::log`]；
///   - `multiple_completion`：[`MultipleCompletionHandler::fail_fast`]。
pub struct ConfigurationSnapshot {
    epoch: u64,
    fallback_on_current_thread: bool,
    // 分发与工作执行器目前共用同一个字段，保持两者的别名关系。
    executor: Slot<SharedExecutor, ExecutorInitError>,
    execution_errors: Slot<ExecutionErrorHandler>,
    multiple_completion: Slot<MultipleCompletionHandler>,
}

impl ConfigurationSnapshot {
    /// 以默认值构造初始快照，所有惰性字段均未物化。
    pub fn with_defaults() -> Self {
        Self::with_executor_factory(start_default_pool)
    }

    /// 以自定义的执行器工厂替代默认线程池构造初始快照。
    ///
    /// - 工厂在首次读取执行器时调用；并发首读时可能被调用多次，但只有一个结果会被安装；
    /// - 其余字段使用默认值。
    pub fn with_executor_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<SharedExecutor, ExecutorInitError> + Send + Sync + 'static,
    {
        Self {
            epoch: 0,
            fallback_on_current_thread: true,
            executor: Slot::lazy(factory),
            execution_errors: Slot::lazy(|| Ok(ExecutionErrorHandler::log())),
            multiple_completion: Slot::lazy(|| Ok(MultipleCompletionHandler::fail_fast())),
        }
    }

    /// 快照纪元，初始快照为 0。
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 字段当前是否持有具体值；查询本身不会触发物化。
    pub fn is_materialized(&self, field: Field) -> bool {
        match field {
            Field::FallbackOnCurrentThread => true,
            Field::DispatchExecutor | Field::WorkExecutor => self.executor.is_materialized(),
            Field::ExecutionErrors => self.execution_errors.is_materialized(),
            Field::MultipleCompletion => self.multiple_completion.is_materialized(),
        }
    }

    /// 结构化复制：已物化的字段复制取值，未物化的字段在副本中仍可惰性解析。
    pub fn copy(&self) -> Self {
        Self {
            epoch: self.epoch,
            fallback_on_current_thread: self.fallback_on_current_thread,
            executor: self.executor.fork(),
            execution_errors: self.execution_errors.fork(),
            multiple_completion: self.multiple_completion.fork(),
        }
    }

    /// 已物化的执行器；尚未物化时返回 `None`，不会触发默认工厂。
    pub fn materialized_executor(&self) -> Option<SharedExecutor> {
        self.executor.peek()
    }

    pub(super) fn advance_epoch(&mut self, base: &ConfigurationSnapshot) {
        self.epoch = base.epoch + 1;
    }

    pub(super) fn assign_fallback_on_current_thread(&mut self, enabled: bool) {
        self.fallback_on_current_thread = enabled;
    }

    pub(super) fn assign_executor(&mut self, executor: SharedExecutor) {
        self.executor = Slot::Ready(executor);
    }

    pub(super) fn assign_execution_errors(&mut self, handler: ExecutionErrorHandler) {
        self.execution_errors = Slot::Ready(handler);
    }

    pub(super) fn assign_multiple_completion(&mut self, handler: MultipleCompletionHandler) {
        self.multiple_completion = Slot::Ready(handler);
    }
}

impl Default for ConfigurationSnapshot {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Settings for ConfigurationSnapshot {
    fn fallback_on_current_thread(&self) -> bool {
        self.fallback_on_current_thread
    }

    fn dispatch_executor(&self) -> Result<SharedExecutor, ExecutorInitError> {
        self.executor.get()
    }

    fn work_executor(&self) -> Result<SharedExecutor, ExecutorInitError> {
        self.executor.get()
    }

    fn execution_errors(&self) -> ExecutionErrorHandler {
        self.execution_errors.force()
    }

    fn multiple_completion(&self) -> MultipleCompletionHandler {
        self.multiple_completion.force()
    }
}

impl fmt::Debug for ConfigurationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = |materialized: bool| if materialized { "ready" } else { "deferred" };
        f.debug_struct("ConfigurationSnapshot")
            .field("epoch", &self.epoch)
            .field("fallback_on_current_thread", &self.fallback_on_current_thread)
            .field("executor", &state(self.executor.is_materialized()))
            .field(
                "execution_errors",
                &state(self.execution_errors.is_materialized()),
            )
            .field(
                "multiple_completion",
                &state(self.multiple_completion.is_materialized()),
            )
            .finish()
    }
}

fn start_default_pool() -> Result<SharedExecutor, ExecutorInitError> {
    let pool = ThreadPoolExecutor::start(PoolSettings::default())?;
    Ok(Arc::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::same_executor;
    use crate::test_stubs::InlineExecutor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_snapshot() -> (ConfigurationSnapshot, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let snapshot = ConfigurationSnapshot::with_executor_factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(InlineExecutor) as SharedExecutor)
        });
        (snapshot, calls)
    }

    #[test]
    fn initial_snapshot_is_fully_deferred() {
        let (snapshot, calls) = counting_snapshot();
        assert_eq!(snapshot.epoch(), 0);
        assert!(snapshot.fallback_on_current_thread());
        for field in [
            Field::DispatchExecutor,
            Field::WorkExecutor,
            Field::ExecutionErrors,
            Field::MultipleCompletion,
        ] {
            assert!(!snapshot.is_materialized(field), "{field} 不应在构造时物化");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn copy_does_not_force_materialization() {
        let (snapshot, calls) = counting_snapshot();
        let copy = snapshot.copy();
        assert!(!copy.is_materialized(Field::DispatchExecutor));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "复制不得触发执行器工厂");
    }

    #[test]
    fn dispatch_and_work_executors_are_aliased() {
        let (snapshot, calls) = counting_snapshot();
        let dispatch = snapshot.dispatch_executor().expect("执行器工厂不会失败");
        let work = snapshot.work_executor().expect("执行器工厂不会失败");
        assert!(same_executor(&dispatch, &work));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(snapshot.is_materialized(Field::WorkExecutor));
    }

    #[test]
    fn copy_shares_origin_so_defaults_materialize_once() {
        let (snapshot, calls) = counting_snapshot();
        let copy = snapshot.copy();
        let from_copy = copy.dispatch_executor().expect("执行器工厂不会失败");
        let from_origin = snapshot.dispatch_executor().expect("执行器工厂不会失败");
        assert!(same_executor(&from_copy, &from_origin));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_reports_materialization_state() {
        let (snapshot, _) = counting_snapshot();
        let _ = snapshot.execution_errors();
        let rendered = format!("{snapshot:?}");
        assert!(rendered.contains("executor: \"deferred\""), "{rendered}");
        assert!(rendered.contains("execution_errors: \"ready\""), "{rendered}");
    }
}
