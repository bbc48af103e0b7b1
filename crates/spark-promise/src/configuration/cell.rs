use std::fmt;
use std::sync::{Arc, LazyLock};

use super::snapshot::ConfigurationSnapshot;
use super::update::{SettingsUpdate, UpdateCoordinator, UpdateOutcome};
use crate::error::ExecutorInitError;
use crate::executor::{SharedExecutor, TaskExecutor};
use crate::sync::SwapSlot;

static GLOBAL: LazyLock<ConfigurationCell> = LazyLock::new(ConfigurationCell::new);

/// 持有当前配置快照的原子单元。
///
/// # 设计动机（Why）
/// - 读多写少：读路径是一次 `ArcSwap::load_full`，无锁、不阻塞；
/// - 写路径不持有互斥锁，多个写者之间仅依靠比较交换决出先后，失败者基于新快照重做合并；
/// - 进程级实例通过 [`ConfigurationCell::global`] 在首次使用时创建，无需显式销毁。
///
/// # 核心契约（What）
/// - 任意时刻恰好持有一个完整快照，读者不会观察到中间状态；
/// - [`ConfigurationCell::compare_and_swap`] 以指针身份比较期望快照；
/// - `configure` 返回后，任意线程的后续 [`ConfigurationCell::current`] 都会观察到本次或更晚的快照。
///
/// # 风险提示（Trade-offs & Gotchas）
/// - 快照不可原地修改，每次更新都会分配新快照；更新频率应保持在配置级别而非请求级别。
pub struct ConfigurationCell {
    current: SwapSlot<ConfigurationSnapshot>,
}

impl ConfigurationCell {
    /// 以默认快照构造独立的配置单元。
    pub fn new() -> Self {
        Self::with_snapshot(ConfigurationSnapshot::with_defaults())
    }

    /// 以给定快照作为初始值构造独立的配置单元，`initial` 中未物化的字段保持惰性。
    pub fn with_snapshot(initial: ConfigurationSnapshot) -> Self {
        Self {
            current: SwapSlot::new(initial),
        }
    }

    /// 以自定义执行器工厂构造独立的配置单元，详见 [`ConfigurationSnapshot::with_executor_factory`]。
    pub fn with_executor_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<SharedExecutor, ExecutorInitError> + Send + Sync + 'static,
    {
        Self::with_snapshot(ConfigurationSnapshot::with_executor_factory(factory))
    }

    /// 进程级配置单元。
    pub fn global() -> &'static ConfigurationCell {
        &GLOBAL
    }

    /// 读取当前快照：一次原子加载，仅增加引用计数。
    pub fn current(&self) -> Arc<ConfigurationSnapshot> {
        self.current.load_full()
    }

    /// 仅当当前快照仍是 `expected`（指针身份）时替换为 `new`。
    ///
    /// - **返回值**：替换成功为 `true`；失败时 `new` 被丢弃，当前快照保持不变。
    pub fn compare_and_swap(
        &self,
        expected: &Arc<ConfigurationSnapshot>,
        new: Arc<ConfigurationSnapshot>,
    ) -> bool {
        self.current.compare_and_swap(expected, new)
    }

    /// 应用一次更新，只覆盖闭包中显式写入的字段。
    pub fn configure<F>(&self, mutate: F) -> UpdateOutcome
    where
        F: FnOnce(&mut SettingsUpdate),
    {
        UpdateCoordinator::new(self).configure(mutate)
    }

    /// 可失败的更新：闭包返回 `Err` 时不提交任何修改。
    pub fn try_configure<F, E>(&self, mutate: F) -> Result<UpdateOutcome, E>
    where
        F: FnOnce(&mut SettingsUpdate) -> Result<(), E>,
    {
        UpdateCoordinator::new(self).try_configure(mutate)
    }

    /// 关闭当前快照持有的执行器，等待期限由执行器自身决定（默认线程池为 [`PoolSettings::shutdown_grace`](crate::PoolSettings::shutdown_grace)）。
    ///
    /// # 契约说明（What）
    /// - 执行器尚未物化时不会为此创建线程池，直接返回 `true`；
    /// - 只作用于当前快照中的执行器；已被 `configure` 替换掉的旧执行器由其持有者自行关闭；
    /// - **返回值**：执行器在期限内排空并退出时为 `true`。
    ///
    /// Rust 进程退出时不会运行关闭钩子，需要排空队列的宿主应在退出前显式调用本方法。
    pub fn shutdown_executor(&self) -> bool {
        match self.current().materialized_executor() {
            Some(executor) => {
                let drained = executor.shutdown_gracefully();
                tracing::debug!(drained, "配置中的执行器已关闭");
                drained
            }
            None => true,
        }
    }
}

impl Default for ConfigurationCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigurationCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationCell")
            .field("current", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stubs::InlineExecutor;

    fn inline_cell() -> ConfigurationCell {
        ConfigurationCell::with_executor_factory(|| Ok(Arc::new(InlineExecutor) as SharedExecutor))
    }

    #[test]
    fn compare_and_swap_uses_pointer_identity() {
        let cell = inline_cell();
        let original = cell.current();
        let replacement = Arc::new(original.copy());

        assert!(cell.compare_and_swap(&original, Arc::clone(&replacement)));
        assert!(Arc::ptr_eq(&cell.current(), &replacement));

        // 内容相同但身份不同的期望值不能通过比较。
        let lookalike = Arc::new(replacement.copy());
        assert!(!cell.compare_and_swap(&lookalike, Arc::new(original.copy())));
        assert!(Arc::ptr_eq(&cell.current(), &replacement), "失败的 CAS 不得修改当前快照");
    }

    #[test]
    fn stale_expected_is_rejected() {
        let cell = inline_cell();
        let stale = cell.current();
        assert!(cell.compare_and_swap(&stale, Arc::new(stale.copy())));
        assert!(!cell.compare_and_swap(&stale, Arc::new(stale.copy())));
    }
}
