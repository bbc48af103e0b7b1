//! 执行器相关的测试桩集合。
//!
//! # 设计定位（Why）
//! - 配置单元的测试需要可比较身份的执行器，但真实线程池会引入线程调度与关闭流程，干扰断言；
//! - 单元测试、集成测试与基准共用同一组桩，接口演进时只需在此处同步修改。
//!
//! # 使用方式（How）
//! - 通过 `use spark_promise::test_stubs::{InlineExecutor, RecordingExecutor};` 引入；
//! - 以 `Arc::new(InlineExecutor) as SharedExecutor` 的方式写入配置，或交给
//!   [`ConfigurationCell::with_executor_factory`](crate::ConfigurationCell::with_executor_factory) 作为默认工厂。
//!
//! # 风险与权衡（Trade-offs）
//! - 桩对象同步执行任务，无法暴露真实线程池中的竞态；并发行为应使用 [`ThreadPoolExecutor`](crate::ThreadPoolExecutor) 验证。

pub mod executor {
    //! 同步执行与计数执行的 [`TaskExecutor`] 实现。

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::SubmitError;
    use crate::executor::{Job, TaskExecutor};

    /// 在调用方线程上立即执行任务。
    #[derive(Clone, Copy, Debug, Default)]
    pub struct InlineExecutor;

    impl TaskExecutor for InlineExecutor {
        fn submit(&self, job: Job) -> Result<(), SubmitError> {
            job();
            Ok(())
        }
    }

    /// 同步执行任务并记录提交次数，用于确认调用链确实经过了某个执行器。
    #[derive(Debug, Default)]
    pub struct RecordingExecutor {
        submitted: AtomicUsize,
    }

    impl RecordingExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn submitted(&self) -> usize {
            self.submitted.load(Ordering::Acquire)
        }
    }

    impl TaskExecutor for RecordingExecutor {
        fn submit(&self, job: Job) -> Result<(), SubmitError> {
            self.submitted.fetch_add(1, Ordering::AcqRel);
            job();
            Ok(())
        }
    }
}

pub use executor::{InlineExecutor, RecordingExecutor};
