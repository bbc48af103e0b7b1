//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义配置核心对外暴露的错误语义：默认执行器构造失败、任务提交被拒绝、任务执行期 panic；
//! - CAS 竞争不属于错误，由更新循环内部透明重试，因此不在此处建模。
//!
//! ## 设计要求（What）
//! - 所有错误类型均派生 [`thiserror::Error`]，满足 `Send + Sync + 'static`，可直接交给
//!   [`ExecutionErrorHandler`](crate::callback::ExecutionErrorHandler) 或上层 `anyhow` 处理；
//! - 惰性初始化失败只影响本次调用方，单元保持未初始化，后续访问可再次尝试。

use std::io;

use thiserror::Error;

/// 默认执行器（线程池）构造失败。
///
/// # 教案式说明
/// - **意图 (Why)**：线程池在首次读取 `dispatch_executor`/`work_executor` 时才创建，
///   创建过程需要向操作系统申请线程，可能因资源耗尽失败；
/// - **契约 (What)**：错误同步返回给触发初始化的调用方，[`LazyCell`](crate::lazy::LazyCell)
///   保持未初始化，下一次读取会重新尝试；
/// - **风险 (Trade-offs)**：部分工作线程可能已经启动，构造函数会在返回错误前关闭队列让它们退出。
#[derive(Debug, Error)]
pub enum ExecutorInitError {
    /// 第 `index` 个工作线程启动失败。
    #[error("无法启动第 {index} 个工作线程 `{name}`: {source}")]
    SpawnWorker {
        index: usize,
        name: String,
        #[source]
        source: io::Error,
    },
}

/// 任务提交被执行器拒绝。
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// 执行器已进入关闭流程，不再接收新任务。
    #[error("执行器已关闭，拒绝接收新任务")]
    ShutDown,
}

/// 线程池中的任务在执行期间发生 panic。
///
/// - **意图 (Why)**：工作线程捕获 panic 以保持存活，并把现场转交给执行错误处理器；
/// - **契约 (What)**：`thread` 为发生 panic 的线程名，`message` 为 panic 负载中的文本（若可提取）。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("工作线程 `{thread}` 中的任务发生 panic: {message}")]
pub struct JobPanicked {
    pub thread: String,
    pub message: String,
}
