use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use super::{Job, TaskExecutor};
use crate::callback::ExecutionErrorHandler;
use crate::configuration::Settings;
use crate::error::{ExecutorInitError, JobPanicked, SubmitError};

const DEFAULT_THREAD_NAME_PREFIX: &str = "spark-promise";
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// 默认线程池的构造参数。
///
/// ### 设计目的（Why）
/// - 默认执行器的规模、线程命名与关闭宽限期集中在一处，便于宿主在 `configure` 之前按需替换；
/// - 默认值与历史行为保持一致：线程数等于逻辑 CPU 数，关闭时最多等待 60 秒。
///
/// ### 契约说明（What）
/// - `workers`：工作线程数，至少为 1；
/// - `thread_name_prefix`：线程名前缀，线程名形如 `<prefix>-<n>`，`n` 从 1 开始；
/// - `shutdown_grace`：[`TaskExecutor::shutdown_gracefully`] 的等待上限；默认执行器通过
///   [`ConfigurationCell::shutdown_executor`](crate::ConfigurationCell::shutdown_executor)
///   或 [`crate::shutdown_executor`] 使用该期限；
/// - `panic_handler`：任务 panic 时的上报目标；为空时上报给进程级配置当前的 `execution_errors`。
#[derive(Clone, Debug)]
pub struct PoolSettings {
    workers: usize,
    thread_name_prefix: Cow<'static, str>,
    shutdown_grace: Duration,
    panic_handler: Option<ExecutionErrorHandler>,
}

impl PoolSettings {
    /// 设置工作线程数，小于 1 时按 1 处理。
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// 设置线程名前缀。
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// 设置优雅关闭的等待上限。
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// 指定任务 panic 的上报处理器。
    pub fn with_panic_handler(mut self, handler: ExecutionErrorHandler) -> Self {
        self.panic_handler = Some(handler);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            thread_name_prefix: Cow::Borrowed(DEFAULT_THREAD_NAME_PREFIX),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            panic_handler: None,
        }
    }
}

/// 固定大小的线程池执行器，作为分发/工作执行器的默认值。
///
/// # 教案式说明
/// - **意图 (Why)**：配置核心需要一个开箱即用的执行资源，但只应在首次被读取时创建；
///   该类型由默认快照中的惰性初始化函数构造。
/// - **逻辑 (How)**：
///   - 所有工作线程共享一个无界 `crossbeam` 通道，按到达顺序取任务执行；
///   - 任务在 `catch_unwind` 中运行，panic 被转换为 [`JobPanicked`] 上报，线程继续服务；
///   - 关闭时先收回发送端使队列关闭，工作线程排空剩余任务后自然退出。
/// - **契约 (What)**：
///   - `submit` 在关闭前总是成功，关闭后返回 [`SubmitError::ShutDown`]；
///   - 线程池被 drop 时只关闭队列、不阻塞等待；Rust 线程不会阻止进程退出。
/// - **风险 (Trade-offs)**：队列无界，提交方需要自行控制背压。
pub struct ThreadPoolExecutor {
    sender: RwLock<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    settings: PoolSettings,
}

impl ThreadPoolExecutor {
    /// 按给定参数启动全部工作线程。
    ///
    /// - **错误**：任一线程启动失败时返回 [`ExecutorInitError::SpawnWorker`]，已启动的线程随队列关闭而退出。
    pub fn start(settings: PoolSettings) -> Result<Self, ExecutorInitError> {
        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(settings.workers);

        for index in 1..=settings.workers {
            let name = format!("{}-{index}", settings.thread_name_prefix);
            let receiver = receiver.clone();
            let panic_handler = settings.panic_handler.clone();
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(receiver, panic_handler));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    return Err(ExecutorInitError::SpawnWorker {
                        index,
                        name,
                        source,
                    });
                }
            }
        }

        tracing::info!(
            workers = settings.workers,
            prefix = %settings.thread_name_prefix,
            "线程池已启动"
        );
        Ok(Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            settings,
        })
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// 是否已经进入关闭流程。
    pub fn is_shut_down(&self) -> bool {
        self.sender.read().is_none()
    }

    /// 停止接收新任务，并在 `grace` 内等待工作线程排空队列后退出。
    ///
    /// # 契约说明（What）
    /// - **返回值**：全部工作线程在期限内退出时为 `true`；超时返回 `false`，剩余线程在后台继续排空；
    /// - **幂等性**：重复调用安全，已回收的线程不会被再次等待；
    /// - **注意事项**：在池内任务中调用时不会等待当前线程自身；`grace` 过大以致无法表示截止时刻时视为不设期限。
    pub fn shutdown(&self, grace: Duration) -> bool {
        drop(self.sender.write().take());

        let current = thread::current().id();
        let deadline = Instant::now().checked_add(grace);
        let mut workers = self.workers.lock();
        workers.retain(|handle| handle.thread().id() != current);

        loop {
            if workers.iter().all(JoinHandle::is_finished) {
                for handle in workers.drain(..) {
                    let _ = handle.join();
                }
                return true;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                tracing::warn!(
                    pending_workers = workers.iter().filter(|h| !h.is_finished()).count(),
                    grace_ms = grace.as_millis() as u64,
                    "线程池未能在宽限期内完成关闭"
                );
                return false;
            }
            thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }
    }
}

impl TaskExecutor for ThreadPoolExecutor {
    fn submit(&self, job: Job) -> Result<(), SubmitError> {
        let guard = self.sender.read();
        let sender = guard.as_ref().ok_or(SubmitError::ShutDown)?;
        sender.send(job).map_err(|_| SubmitError::ShutDown)
    }

    /// 以 [`PoolSettings::shutdown_grace`] 为期限执行 [`ThreadPoolExecutor::shutdown`]。
    fn shutdown_gracefully(&self) -> bool {
        self.shutdown(self.settings.shutdown_grace)
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("workers", &self.settings.workers)
            .field("prefix", &self.settings.thread_name_prefix)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

fn worker_loop(receiver: Receiver<Job>, panic_handler: Option<ExecutionErrorHandler>) {
    for job in receiver.iter() {
        let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) else {
            continue;
        };
        let report = JobPanicked {
            thread: thread::current()
                .name()
                .unwrap_or("<unnamed>")
                .to_owned(),
            message: panic_message(payload.as_ref()),
        };
        let handler = panic_handler
            .clone()
            .unwrap_or_else(|| crate::current_configuration().execution_errors());
        // 处理器自身 panic 时同样吞掉，保证工作线程存活。
        let _ = panic::catch_unwind(AssertUnwindSafe(|| handler.call(&report)));
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}
