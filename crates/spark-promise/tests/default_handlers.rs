//! 默认回调与默认线程池的可观测行为。
//!
//! # 教案级导览
//!
//! - **Why**：配置核心只保存回调，但默认回调的行为（记录日志、快速失败）是宿主最先依赖的契约；
//!   默认线程池则是唯一会主动调用 `execution_errors` 的组件；
//! - **How**：日志断言使用 `tracing-test` 捕获当前测试线程的输出；panic 断言使用 `catch_unwind` 取回负载；
//! - **What**：覆盖错误日志含 source 链、冲突处理器的 panic 文本、池内 panic 上报到全局处理器、关闭超时告警。

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel;
use spark_promise::test_stubs::InlineExecutor;
use spark_promise::{
    ConfigurationSnapshot, ExecutionErrorHandler, MultipleCompletionHandler, PoolSettings,
    Settings, SettingsMut, SharedExecutor, TaskExecutor, ThreadPoolExecutor,
};
use thiserror::Error;
use tracing_test::traced_test;

#[derive(Debug, Error)]
#[error("回调链路失败")]
struct CallbackFailed {
    #[source]
    source: io::Error,
}

fn inline_snapshot() -> ConfigurationSnapshot {
    ConfigurationSnapshot::with_executor_factory(|| Ok(Arc::new(InlineExecutor) as SharedExecutor))
}

/// ## 测试一：默认执行错误处理器记录错误与 source 链
///
/// - **契约 (What)**：日志同时包含顶层错误文本与底层 I/O 错误文本。
#[test]
#[traced_test]
fn default_execution_handler_logs_error_chain() {
    let snapshot = inline_snapshot();
    let handler = snapshot.execution_errors();
    let failure = CallbackFailed {
        source: io::Error::other("磁盘已满"),
    };

    handler.call(&failure);

    assert!(logs_contain("回调链路失败"));
    assert!(logs_contain("磁盘已满"));
    assert!(
        handler.ptr_eq(&snapshot.execution_errors()),
        "默认处理器只物化一次"
    );
}

/// ## 测试二：默认冲突处理器以包含双方取值的消息 panic
#[test]
fn default_multiple_completion_fails_fast() {
    let handler = inline_snapshot().multiple_completion();

    let payload = panic::catch_unwind(AssertUnwindSafe(|| handler.call(&"旧值", &42)))
        .expect_err("默认冲突处理器必须 panic");
    let message = payload
        .downcast_ref::<String>()
        .cloned()
        .expect("panic 负载应为格式化字符串");

    assert!(message.contains("\"旧值\""), "{message}");
    assert!(message.contains("42"), "{message}");
}

/// ## 测试三：替换冲突处理器后不再 panic
#[test]
fn replaced_multiple_completion_is_used() {
    let (tx, rx) = channel::unbounded();
    let cell = spark_promise::ConfigurationCell::with_snapshot(inline_snapshot());
    cell.configure(|view| {
        view.set_multiple_completion(MultipleCompletionHandler::new(move |current, new| {
            let _ = tx.send(format!("{current:?} -> {new:?}"));
        }));
    });

    cell.current().multiple_completion().call(&1, &2);
    assert_eq!(rx.try_recv().as_deref(), Ok("1 -> 2"));
}

/// ## 测试四：池内 panic 上报给全局配置当前的执行错误处理器
///
/// - **意图 (Why)**：未为线程池单独指定处理器时，panic 必须流向宿主通过 `configure` 安装的处理器；
/// - **契约 (What)**：报告包含线程名与 panic 文本，工作线程继续服务。本文件中只有此用例触碰全局单元。
#[test]
fn pool_panic_reaches_configured_global_handler() {
    let (tx, rx) = channel::unbounded();
    spark_promise::configure(|view| {
        view.set_execution_errors(ExecutionErrorHandler::new(move |err| {
            let _ = tx.send(err.to_string());
        }));
    });

    let pool = ThreadPoolExecutor::start(
        PoolSettings::default()
            .with_workers(1)
            .with_thread_name_prefix("global-report"),
    )
    .expect("线程池应能启动");
    pool.execute(|| panic!("任务失控")).expect("提交必须成功");

    let report = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("panic 必须被上报到全局处理器");
    assert!(report.contains("global-report-1"), "{report}");
    assert!(report.contains("任务失控"), "{report}");

    let (done_tx, done_rx) = channel::bounded(1);
    pool.execute(move || {
        let _ = done_tx.send(());
    })
    .expect("工作线程必须存活");
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("后续任务应被执行");
    assert!(pool.shutdown(Duration::from_secs(5)));
}

/// ## 测试五：关闭超时产生告警，释放后可完成关闭
#[test]
#[traced_test]
fn shutdown_timeout_is_logged() {
    let pool = ThreadPoolExecutor::start(
        PoolSettings::default()
            .with_workers(1)
            .with_thread_name_prefix("slow-pool")
            .with_shutdown_grace(Duration::from_secs(5)),
    )
    .expect("线程池应能启动");
    assert!(logs_contain("线程池已启动"));

    let (started_tx, started_rx) = channel::bounded(1);
    let (release_tx, release_rx) = channel::bounded::<()>(1);
    pool.execute(move || {
        let _ = started_tx.send(());
        let _ = release_rx.recv();
    })
    .expect("提交必须成功");
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("任务应开始执行");

    assert!(!pool.shutdown(Duration::ZERO), "任务未结束时关闭必须超时");
    assert!(logs_contain("线程池未能在宽限期内完成关闭"));
    assert!(pool.is_shut_down());

    release_tx.send(()).expect("任务仍在等待释放信号");
    assert!(pool.shutdown_gracefully(), "释放后应在宽限期内完成关闭");
}
