use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, FmtSubscriber, Layer, Registry};

use crate::app_config::env::{env_is_true, env_or_default, is_local_env};

/// 日志写入线程的守卫，进程退出前必须持有，否则缓冲中的日志会丢失
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

// 设置日志
pub async fn setup_logging() -> anyhow::Result<LogGuard> {
    let mut guards = Vec::new();

    if is_local_env() {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_ansi(true)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_level(true)
            .with_writer(std::io::stdout)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let log_dir = env_or_default("LOG_DIR", "log_files");
        let info_file = RollingFileAppender::new(Rotation::DAILY, &log_dir, "info.log");
        let error_file = RollingFileAppender::new(Rotation::DAILY, &log_dir, "error.log");

        let (info_non_blocking, info_guard) = tracing_appender::non_blocking(info_file);
        let (error_non_blocking, error_guard) = tracing_appender::non_blocking(error_file);
        guards.push(info_guard);
        guards.push(error_guard);

        let subscriber = Registry::default()
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_level(true)
                    .with_writer(info_non_blocking)
                    .with_filter(EnvFilter::new("info")),
            )
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_level(true)
                    .with_writer(error_non_blocking)
                    .with_filter(EnvFilter::new("error")),
            );

        tracing::subscriber::set_global_default(subscriber)?;
    }

    // rbatis 通过 log crate 输出 sql
    if env_is_true("DB_DEBUG", false) {
        fast_log::init(
            fast_log::Config::new()
                .console()
                .level(::log::LevelFilter::Debug),
        )
        .map_err(|e| anyhow::anyhow!("fast_log init error: {}", e))?;
    }

    Ok(LogGuard { _guards: guards })
}
