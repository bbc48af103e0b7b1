#![deny(unsafe_code)]
#![doc = "spark-promise: Promise 调度库的进程级配置单元。"]
#![doc = ""]
#![doc = "== 核心语义 =="]
#![doc = "1. 读取：`current_configuration()` 是一次原子加载，返回完整且不可变的快照。"]
#![doc = "2. 更新：`configure(|view| ...)` 只提交闭包中显式写入的字段，与并发更新之间通过比较交换合并。"]
#![doc = "3. 默认值：执行器与回调在首次读取时才物化，复制快照不会触发物化。"]

//! # 快速上手
//!
//! ```
//! use std::sync::Arc;
//! use spark_promise::test_stubs::InlineExecutor;
//! use spark_promise::{ConfigurationCell, Settings, SettingsMut, SharedExecutor};
//!
//! let cell = ConfigurationCell::with_executor_factory(|| Ok(Arc::new(InlineExecutor) as SharedExecutor));
//! let outcome = cell.configure(|view| view.set_fallback_on_current_thread(false));
//!
//! assert_eq!(outcome.epoch(), 1);
//! assert!(!cell.current().fallback_on_current_thread());
//! ```

pub mod callback;
pub mod configuration;
pub mod error;
pub mod executor;
pub mod lazy;
mod sync;
/// 测试桩命名空间，集中提供同步执行与计数执行的执行器，供单元测试、集成测试与基准复用。
///
/// # 使用方式（How）
/// - 通过 `use spark_promise::test_stubs::{InlineExecutor, RecordingExecutor};` 引入；
/// - 桩对象不创建线程，适合需要比较执行器身份而不关心调度行为的场景。
pub mod test_stubs;
pub mod tracked;

use std::sync::Arc;

pub use callback::{ExecutionError, ExecutionErrorHandler, MultipleCompletionHandler};
pub use configuration::{
    ConfigurationCell, ConfigurationSnapshot, Field, FieldSet, Settings, SettingsMut,
    SettingsUpdate, UpdateCoordinator, UpdateOutcome,
};
pub use error::{ExecutorInitError, JobPanicked, SubmitError};
pub use executor::{
    Job, PoolSettings, SharedExecutor, TaskExecutor, ThreadPoolExecutor, same_executor,
};
pub use lazy::LazyCell;
pub use tracked::TrackedCell;

/// 读取进程级配置的当前快照。
///
/// - **开销**：一次原子加载加一次引用计数递增，不会阻塞；
/// - **一致性**：返回的快照在持有期间不会变化；想观察更新需要重新调用。
pub fn current_configuration() -> Arc<ConfigurationSnapshot> {
    ConfigurationCell::global().current()
}

/// 更新进程级配置，只覆盖闭包中显式写入的字段。
///
/// # 契约说明（What）
/// - 闭包恰好执行一次，可以读取任意字段而不会把它标记为写入；
/// - 返回后，任意线程的后续 [`current_configuration`] 都会观察到本次写入或更晚的值；
/// - 与其他线程的并发更新通过比较交换合并：双方写入的不同字段都会保留，同一字段以后提交者为准。
///
/// # 示例
/// ```no_run
/// use spark_promise::{ExecutionErrorHandler, SettingsMut};
///
/// spark_promise::configure(|view| {
///     view.set_execution_errors(ExecutionErrorHandler::new(|err| eprintln!("{err}")));
/// });
/// ```
pub fn configure<F>(mutate: F) -> UpdateOutcome
where
    F: FnOnce(&mut SettingsUpdate),
{
    ConfigurationCell::global().configure(mutate)
}

/// 可失败版本的 [`configure`]：闭包返回 `Err` 时不提交任何修改，并原样返回该错误。
pub fn try_configure<F, E>(mutate: F) -> Result<UpdateOutcome, E>
where
    F: FnOnce(&mut SettingsUpdate) -> Result<(), E>,
{
    ConfigurationCell::global().try_configure(mutate)
}

/// 关闭进程级配置当前持有的执行器，期限取自执行器自身（默认线程池为 60 秒）。
///
/// 执行器尚未物化时直接返回 `true`，不会为此创建线程池。需要在进程退出前排空队列的宿主应显式调用。
pub fn shutdown_executor() -> bool {
    ConfigurationCell::global().shutdown_executor()
}
