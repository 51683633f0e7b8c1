//! Crewbench 入口：加载配置、初始化日志、组装状态并启动 HTTP 服务

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use crewbench::config::load_config;
use crewbench::web::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 第一个参数可指定额外的配置文件
    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(explicit).context("Failed to load configuration")?;

    let log_dir = cfg.app.log_to_file.then(|| cfg.app.log_dir.clone());
    crewbench::observability::init(log_dir.as_deref());

    let port = cfg.web.port;
    let state = AppState::build(cfg).context("Failed to initialize application state")?;
    tracing::info!(
        config_dir = %state.config.app.config_dir.display(),
        crews = ?state.catalog.crew_names(),
        "application state ready"
    );

    let app = router(Arc::new(state));
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Crewbench: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
