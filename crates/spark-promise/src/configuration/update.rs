//! 一次配置更新的完整流程：追踪写入 → 复制最新快照 → 合并写入字段 → 比较交换。
//!
//! # 设计背景（Why）
//! - 写时复制可以让读者永远看到完整快照，但若直接复制“闭包看到的全部字段”，
//!   会把读到的旧值写回并吞掉并发更新，还会在配置阶段物化所有惰性默认值；
//! - 因此更新闭包面对的是 [`SettingsUpdate`]：每个字段都是一个 [`TrackedCell`]，
//!   合并阶段只覆盖被显式写入的字段。
//!
//! # 执行逻辑（How）
//! 1. 读取基准快照，为每个字段构造以基准快照为供应源的追踪字段；
//! 2. 执行调用方的闭包；
//! 3. 循环：重新读取最新快照 → 复制 → 覆盖写入字段 → 比较交换，失败则基于新的最新快照重试。
//!
//! # 注意事项（Trade-offs）
//! - 重试没有上限：配置更新不在热路径上，竞争预期短暂且罕见；
//! - 成功提交的快照只保证包含本次写入的字段，其余字段反映提交时刻的最新值，而非闭包开始时的值。

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use super::cell::ConfigurationCell;
use super::field::{Field, FieldSet};
use super::settings::{Settings, SettingsMut};
use super::snapshot::ConfigurationSnapshot;
use crate::callback::{ExecutionErrorHandler, MultipleCompletionHandler};
use crate::error::ExecutorInitError;
use crate::executor::SharedExecutor;
use crate::tracked::TrackedCell;

/// 更新闭包面对的可写视图。
///
/// - 读取未写入的字段返回基准快照中的值（必要时触发其惰性默认值），但不会把字段标记为写入；
/// - 两个执行器字段共享同一个追踪字段，写入任意一个都会让两者同时变化。
pub struct SettingsUpdate {
    base_epoch: u64,
    fallback_on_current_thread: TrackedCell<bool>,
    executor: TrackedCell<SharedExecutor, ExecutorInitError>,
    execution_errors: TrackedCell<ExecutionErrorHandler>,
    multiple_completion: TrackedCell<MultipleCompletionHandler>,
}

impl SettingsUpdate {
    fn over(base: &Arc<ConfigurationSnapshot>) -> Self {
        let fallback_source = Arc::clone(base);
        let executor_source = Arc::clone(base);
        let errors_source = Arc::clone(base);
        let completion_source = Arc::clone(base);
        Self {
            base_epoch: base.epoch(),
            fallback_on_current_thread: TrackedCell::new(move || {
                Ok(fallback_source.fallback_on_current_thread())
            }),
            executor: TrackedCell::new(move || executor_source.dispatch_executor()),
            execution_errors: TrackedCell::new(move || Ok(errors_source.execution_errors())),
            multiple_completion: TrackedCell::new(move || {
                Ok(completion_source.multiple_completion())
            }),
        }
    }

    /// 构造本视图时所依据的快照纪元。
    pub fn base_epoch(&self) -> u64 {
        self.base_epoch
    }

    /// 截至目前被显式写入的字段。
    pub fn written(&self) -> FieldSet {
        let mut written = FieldSet::EMPTY;
        if self.fallback_on_current_thread.was_written() {
            written.insert(Field::FallbackOnCurrentThread);
        }
        if self.executor.was_written() {
            written.insert(Field::DispatchExecutor);
            written.insert(Field::WorkExecutor);
        }
        if self.execution_errors.was_written() {
            written.insert(Field::ExecutionErrors);
        }
        if self.multiple_completion.was_written() {
            written.insert(Field::MultipleCompletion);
        }
        written
    }

    /// 把写入过的字段覆盖到候选快照上，未写入的字段保持候选快照中的值。
    fn apply_to(&self, candidate: &mut ConfigurationSnapshot) {
        if let Some(enabled) = self.fallback_on_current_thread.written() {
            candidate.assign_fallback_on_current_thread(*enabled);
        }
        if let Some(executor) = self.executor.written() {
            candidate.assign_executor(Arc::clone(executor));
        }
        if let Some(handler) = self.execution_errors.written() {
            candidate.assign_execution_errors(handler.clone());
        }
        if let Some(handler) = self.multiple_completion.written() {
            candidate.assign_multiple_completion(handler.clone());
        }
    }
}

impl Settings for SettingsUpdate {
    fn fallback_on_current_thread(&self) -> bool {
        match self.fallback_on_current_thread.get() {
            Ok(enabled) => enabled,
            Err(never) => match never {},
        }
    }

    fn dispatch_executor(&self) -> Result<SharedExecutor, ExecutorInitError> {
        self.executor.get()
    }

    fn work_executor(&self) -> Result<SharedExecutor, ExecutorInitError> {
        self.executor.get()
    }

    fn execution_errors(&self) -> ExecutionErrorHandler {
        match self.execution_errors.get() {
            Ok(handler) => handler,
            Err(never) => match never {},
        }
    }

    fn multiple_completion(&self) -> MultipleCompletionHandler {
        match self.multiple_completion.get() {
            Ok(handler) => handler,
            Err(never) => match never {},
        }
    }
}

impl SettingsMut for SettingsUpdate {
    fn set_fallback_on_current_thread(&mut self, enabled: bool) {
        self.fallback_on_current_thread.set(enabled);
    }

    fn set_dispatch_executor(&mut self, executor: SharedExecutor) {
        self.executor.set(executor);
    }

    fn set_work_executor(&mut self, executor: SharedExecutor) {
        self.executor.set(executor);
    }

    fn set_execution_errors(&mut self, handler: ExecutionErrorHandler) {
        self.execution_errors.set(handler);
    }

    fn set_multiple_completion(&mut self, handler: MultipleCompletionHandler) {
        self.multiple_completion.set(handler);
    }
}

impl fmt::Debug for SettingsUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsUpdate")
            .field("base_epoch", &self.base_epoch)
            .field("written", &self.written())
            .finish_non_exhaustive()
    }
}

/// 一次成功提交的结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    epoch: u64,
    attempts: u32,
    written: FieldSet,
}

impl UpdateOutcome {
    /// 新安装快照的纪元。
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 比较交换的尝试次数，无竞争时为 1。
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 本次更新显式写入的字段。
    pub fn written(&self) -> FieldSet {
        self.written
    }
}

/// 编排单次配置更新。
///
/// # 教案式说明
/// - **意图 (Why)**：把“追踪写入 + 复制合并 + 比较交换重试”的协议集中在一处，
///   [`ConfigurationCell::configure`] 与 crate 级 [`configure`](crate::configure) 都委托至此；
/// - **契约 (What)**：
///   - 写者之间不使用互斥锁，依靠比较交换决出先后；失败者基于新快照重做合并；
///   - 成功返回后，后续读取只会观察到本次或更晚的快照；
///   - 调用一旦开始，只会以成功提交结束，不支持取消或超时；
/// - **风险 (Trade-offs)**：在持续的极端写竞争下循环可能长时间自旋，这是可接受的取舍。
#[derive(Debug)]
pub struct UpdateCoordinator<'a> {
    cell: &'a ConfigurationCell,
}

impl<'a> UpdateCoordinator<'a> {
    pub fn new(cell: &'a ConfigurationCell) -> Self {
        Self { cell }
    }

    /// 执行闭包并提交其显式写入的字段。
    pub fn configure<F>(&self, mutate: F) -> UpdateOutcome
    where
        F: FnOnce(&mut SettingsUpdate),
    {
        let outcome = self.try_configure(|view| {
            mutate(view);
            Ok::<(), Infallible>(())
        });
        match outcome {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        }
    }

    /// 执行可失败的闭包；闭包返回 `Err` 时直接返回该错误，不提交任何修改。
    pub fn try_configure<F, E>(&self, mutate: F) -> Result<UpdateOutcome, E>
    where
        F: FnOnce(&mut SettingsUpdate) -> Result<(), E>,
    {
        let base = self.cell.current();
        let mut view = SettingsUpdate::over(&base);
        drop(base);

        mutate(&mut view)?;
        Ok(self.commit(&view))
    }

    fn commit(&self, view: &SettingsUpdate) -> UpdateOutcome {
        let written = view.written();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let expected = self.cell.current();
            let mut candidate = expected.copy();
            candidate.advance_epoch(&expected);
            view.apply_to(&mut candidate);
            let epoch = candidate.epoch();

            if self.cell.compare_and_swap(&expected, Arc::new(candidate)) {
                tracing::trace!(
                    epoch,
                    attempts,
                    base_epoch = view.base_epoch(),
                    written = ?written,
                    "配置更新已提交"
                );
                return UpdateOutcome {
                    epoch,
                    attempts,
                    written,
                };
            }

            tracing::debug!(
                attempt = attempts,
                expected_epoch = expected.epoch(),
                "配置比较交换失败，基于最新快照重试"
            );
        }
    }
}
