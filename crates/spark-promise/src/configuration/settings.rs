use crate::callback::{ExecutionErrorHandler, MultipleCompletionHandler};
use crate::error::ExecutorInitError;
use crate::executor::SharedExecutor;

/// 配置字段的只读视图。
///
/// # 设计背景（Why）
/// - 已发布的快照与更新闭包中的可写视图共享同一组字段形状，读取侧通过本 trait 统一访问；
/// - 只读与可写能力拆成两个 trait，而非继承层次中的“可变子类”。
///
/// # 契约说明（What）
/// - 执行器读取可能触发默认线程池的惰性创建，因此返回 `Result`；失败只影响本次调用方；
/// - `dispatch_executor` 与 `work_executor` 目前返回同一个底层资源；
/// - 回调读取不会失败，默认回调在首次读取时物化。
pub trait Settings {
    /// 调度是否允许回退到调用方线程执行。
    fn fallback_on_current_thread(&self) -> bool;

    /// 运行续体与分发工作的执行器。
    fn dispatch_executor(&self) -> Result<SharedExecutor, ExecutorInitError>;

    /// 运行用户工作的执行器。
    fn work_executor(&self) -> Result<SharedExecutor, ExecutorInitError>;

    /// 库内部执行出错时的处理器。
    fn execution_errors(&self) -> ExecutionErrorHandler;

    /// 已完成实体被再次赋值时的处理器。
    fn multiple_completion(&self) -> MultipleCompletionHandler;
}

/// 在只读视图之上追加写能力，仅在一次更新块内可用。
///
/// - 每次 `set_*` 都会把对应字段标记为“显式写入”，合并阶段只会覆盖这些字段；
/// - 由于两个执行器字段共享同一底层资源，设置其中任意一个会同时影响另一个。
pub trait SettingsMut: Settings {
    fn set_fallback_on_current_thread(&mut self, enabled: bool);

    fn set_dispatch_executor(&mut self, executor: SharedExecutor);

    fn set_work_executor(&mut self, executor: SharedExecutor);

    fn set_execution_errors(&mut self, handler: ExecutionErrorHandler);

    fn set_multiple_completion(&mut self, handler: MultipleCompletionHandler);
}
