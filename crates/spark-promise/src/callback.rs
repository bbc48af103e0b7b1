//! 配置中保存的两类回调：执行错误处理器与重复完成处理器。
//!
//! # 设计背景（Why）
//! - 配置核心只负责保存和交还回调，真正调用它们的是外部的 Promise 完成逻辑与默认线程池；
//! - 回调以 `Arc<dyn Fn>` 持有，克隆廉价，并通过 `ptr_eq` 支持身份比较，便于确认某次更新是否生效。
//!
//! # 默认行为（What）
//! - [`ExecutionErrorHandler::log`]：通过 `tracing` 以 `ERROR` 级别记录错误及其 source 链；
//! - [`MultipleCompletionHandler::fail_fast`]：直接 panic，终止试图以新值覆盖已完成值的操作。

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// 执行错误处理器接收的错误类型。
pub type ExecutionError = dyn Error + Send + Sync + 'static;

/// 库内部执行出错时调用的一元回调。
#[derive(Clone)]
pub struct ExecutionErrorHandler {
    inner: Arc<dyn Fn(&ExecutionError) + Send + Sync>,
}

impl ExecutionErrorHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ExecutionError) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }

    /// 默认处理器：记录错误与完整的 source 链。
    pub fn log() -> Self {
        Self::new(|err| {
            let mut chain = String::new();
            let mut source = err.source();
            while let Some(cause) = source {
                chain.push_str(" <- ");
                chain.push_str(&cause.to_string());
                source = cause.source();
            }
            tracing::error!(error = %err, causes = %chain, "Promise 执行过程中发生错误");
        })
    }

    pub fn call(&self, err: &ExecutionError) {
        (self.inner)(err)
    }

    /// 是否与另一个处理器共享同一个回调实例。
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl fmt::Debug for ExecutionErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionErrorHandler")
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

/// 已完成的实体被再次赋予冲突值时调用的二元回调。
///
/// - **参数**：第一个为已持有的值，第二个为试图写入的新值；
/// - **契约**：回调不返回值，默认实现通过 panic 终止冲突操作，而非静默选择胜者。
#[derive(Clone)]
pub struct MultipleCompletionHandler {
    inner: Arc<dyn Fn(&dyn fmt::Debug, &dyn fmt::Debug) + Send + Sync>,
}

impl MultipleCompletionHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&dyn fmt::Debug, &dyn fmt::Debug) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }

    /// 默认处理器：以包含双方取值的消息 panic。
    pub fn fail_fast() -> Self {
        Self::new(|current, new| {
            panic!("值[{current:?}]已设置，无法以新值[{new:?}]覆盖");
        })
    }

    pub fn call(&self, current: &dyn fmt::Debug, new: &dyn fmt::Debug) {
        (self.inner)(current, new)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl fmt::Debug for MultipleCompletionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipleCompletionHandler")
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn clones_share_identity() {
        let handler = ExecutionErrorHandler::log();
        let clone = handler.clone();
        assert!(handler.ptr_eq(&clone));
        assert!(!handler.ptr_eq(&ExecutionErrorHandler::log()));
    }

    #[test]
    fn custom_error_handler_receives_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handler = ExecutionErrorHandler::new(move |err| {
            assert_eq!(err.to_string(), "执行器已关闭，拒绝接收新任务");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handler.call(&crate::error::SubmitError::ShutDown);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fail_fast_panics_with_both_values() {
        let handler = MultipleCompletionHandler::fail_fast();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.call(&1, &2)));
        let payload = outcome.expect_err("默认冲突处理器必须 panic");
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert_eq!(message, "值[1]已设置，无法以新值[2]覆盖");
    }
}
