//! # 任务执行资源契约
//!
//! ## 契约声明
//! * **不透明句柄：** 配置核心只保存并交还执行器，从不自行执行任务；具体调度逻辑属于外部的 Promise 完成层。
//! * **最小能力：** 执行器只需支持“提交一个工作单元”，通过 [`TaskExecutor::submit`] 表达。
//! * **共享方式：** 配置快照中以 [`SharedExecutor`]（`Arc<dyn TaskExecutor>`）持有，克隆只增加引用计数。
//!
//! ## 默认实现
//! * [`ThreadPoolExecutor`] 为首次读取默认执行器时惰性创建的固定大小线程池。

mod pool;

use std::sync::Arc;

use crate::error::SubmitError;

pub use pool::{PoolSettings, ThreadPoolExecutor};

/// 类型擦除后的工作单元。
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// 配置快照中共享的执行器句柄。
pub type SharedExecutor = Arc<dyn TaskExecutor>;

/// `TaskExecutor` 定义“接收工作单元并安排执行”的能力。
///
/// # 设计背景（Why）
/// - 分发执行器与工作执行器都只是不透明句柄，配置核心需要一个对象安全的最小接口来存储它们；
/// - 泛型便捷方法 [`TaskExecutor::execute`] 复用对象安全入口，调用方无需手动装箱。
///
/// # 契约说明（What）
/// - **前置条件**：实现者必须 `Send + Sync + 'static`，以便在快照中跨线程共享；
/// - **返回值**：成功入队返回 `Ok(())`；执行器已关闭时返回 [`SubmitError::ShutDown`]，任务被丢弃；
/// - **后置条件**：`submit` 返回 `Ok` 不代表任务已执行完成，只代表执行器接管了它。
pub trait TaskExecutor: Send + Sync + 'static {
    /// 对象安全的提交入口。
    fn submit(&self, job: Job) -> Result<(), SubmitError>;

    /// 停止接收新任务，并在执行器自身的宽限期内等待已接管的任务完成。
    ///
    /// 返回 `true` 表示期限内已排空。不持有后台资源的执行器无需覆盖，默认立即返回 `true`。
    fn shutdown_gracefully(&self) -> bool {
        true
    }

    /// 泛型化的提交入口。
    fn execute<F>(&self, task: F) -> Result<(), SubmitError>
    where
        Self: Sized,
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(task))
    }
}

impl<T: TaskExecutor + ?Sized> TaskExecutor for Arc<T> {
    fn submit(&self, job: Job) -> Result<(), SubmitError> {
        (**self).submit(job)
    }

    fn shutdown_gracefully(&self) -> bool {
        (**self).shutdown_gracefully()
    }
}

/// 判断两个执行器句柄是否指向同一个底层资源。
///
/// 只比较数据指针，忽略 vtable 指针，避免同一对象因代码生成单元不同而比较失败。
pub fn same_executor(left: &SharedExecutor, right: &SharedExecutor) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}
