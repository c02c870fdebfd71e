use crate::modules::logger::LocalTimer;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

pub static LOG_WORKER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn setup_file_logger(level: Level) -> Result<(), tracing::dispatcher::SetGlobalDefaultError> {
    let with_ansi = SETTINGS.holdmail_ansi_logs;

    let server_nonb = match server_log_writer() {
        Some(writer) => writer,
        None => {
            eprintln!(
                "Failed to initialize rolling file appender in {:?}, falling back to stdout",
                DATA_DIR_MANAGER.log_dir
            );
            return super::setup_stdout_logger(level);
        }
    };

    let server_layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_ansi(with_ansi)
        .with_level(true)
        .with_writer(server_nonb)
        .with_target(true);

    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(server_layer);

    tracing::subscriber::set_global_default(subscriber)
}

fn server_log_writer() -> Option<NonBlocking> {
    std::fs::create_dir_all(&DATA_DIR_MANAGER.log_dir).ok()?;
    let rolling = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("server")
        .max_log_files(SETTINGS.holdmail_max_server_log_files)
        .build(DATA_DIR_MANAGER.log_dir.clone())
        .ok()?;
    let (nb, wg) = tracing_appender::non_blocking(rolling);
    let _ = LOG_WORKER_GUARD.set(wg);
    Some(nb)
}
