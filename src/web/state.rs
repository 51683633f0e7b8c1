//! Web 层共享状态

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::ResultCache;
use crate::config::AppConfig;
use crate::core::{AppError, StoreError};
use crate::crew::CrewSettings;
use crate::flow::FlowSettings;
use crate::llm::{create_embedder_from_config, create_llm_from_config, LlmClient};
use crate::managers::Catalog;
use crate::store::ConfigStore;
use crate::tools::build_default_registry;

pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub cache: Arc<ResultCache>,
    pub flow: FlowSettings,
    pub temp_dir: PathBuf,
    pub log_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppState {
    /// 按配置创建 LLM 客户端并组装
    pub fn build(config: AppConfig) -> Result<Self, AppError> {
        let llm = create_llm_from_config(&config);
        Self::with_llm(config, llm)
    }

    /// 打开结果缓存、注册工具、确保配置文件存在
    pub fn with_llm(config: AppConfig, llm: Arc<dyn LlmClient>) -> Result<Self, AppError> {
        let embedder = create_embedder_from_config(&config);
        let cache = Arc::new(ResultCache::open(
            &config.cache.dir,
            embedder,
            config.cache.similarity_threshold,
        )?);
        let tools = Arc::new(build_default_registry(&config.tools, cache.clone()));
        tracing::info!(tools = ?tools.tool_names(), "tools registered");

        let store = Arc::new(ConfigStore::new(config.app.config_dir.clone()));
        store.ensure_files()?;
        let catalog = Arc::new(Catalog::new(
            store,
            tools,
            llm,
            CrewSettings::from_config(&config),
        ));

        for dir in [&config.app.temp_dir, &config.app.log_dir] {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        }

        Ok(Self {
            flow: FlowSettings::from_config(&config),
            temp_dir: config.app.temp_dir.clone(),
            log_dir: config.app.log_dir.clone(),
            cache_dir: config.cache.dir.clone(),
            catalog,
            cache,
            config,
        })
    }
}
