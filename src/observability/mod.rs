//! 可观测性：tracing 订阅器（控制台 + 可选日志文件）

use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 日志文件名（维护操作 clear_logs 会保留）
pub const LOG_FILE_NAME: &str = "crewbench.log";

/// 初始化全局订阅器；log_dir 为 Some 时额外追加写入 {log_dir}/crewbench.log
pub fn init(log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = log_dir.and_then(|dir| {
        let opened = std::fs::create_dir_all(dir).and_then(|_| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE_NAME))
        });
        match opened {
            Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            Err(e) => {
                eprintln!("failed to open log file in {}: {}", dir.display(), e);
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();
}
