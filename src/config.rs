//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CREWBENCH__*` 覆盖（双下划线表示嵌套，如 `CREWBENCH__RESEARCH__MAX_RETRIES=5`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub embedding: EmbeddingSection,
    pub cache: CacheSection,
    pub tools: ToolsSection,
    pub crew: CrewSection,
    pub research: ResearchSection,
    pub web: WebSection,
}

/// [app] 段：声明式配置目录、临时导出目录、日志目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// agents.yaml / tasks.yaml / crews.yaml / inputs.json / smart_research.yaml 所在目录
    pub config_dir: PathBuf,
    /// 执行结果 JSON 与 Excel 导出目录
    pub temp_dir: PathBuf,
    pub log_dir: PathBuf,
    /// 是否额外写入 {log_dir}/crewbench.log
    pub log_to_file: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            config_dir: PathBuf::from("config"),
            temp_dir: PathBuf::from("temp"),
            log_dir: PathBuf::from("logs"),
            log_to_file: false,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次 completion 请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [embedding] 段：缓存键向量化方式
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    /// openai：调用 embeddings API；hashing：本地 n-gram 哈希向量
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// hashing 向量维度
    pub dimensions: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            dimensions: 256,
        }
    }
}

/// [cache] 段：结果缓存位置与命中阈值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub dir: PathBuf,
    /// 最近邻距离严格小于该值才视为命中
    pub similarity_threshold: f32,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            similarity_threshold: crate::cache::DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// [tools] 段：外部 API 超时与结果截断
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
    pub max_result_chars: usize,
    pub serper_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub exa_api_key: Option<String>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 60,
            http_timeout_secs: 30,
            max_result_chars: 8000,
            serper_api_key: None,
            tavily_api_key: None,
            exa_api_key: None,
        }
    }
}

/// [crew] 段：Crew 运行时参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrewSection {
    /// 单个 Task 内最多工具调用轮数
    pub max_tool_steps: usize,
    /// 单次 Crew 调用总超时（秒）
    pub invoke_timeout_secs: u64,
}

impl Default for CrewSection {
    fn default() -> Self {
        Self {
            max_tool_steps: 5,
            invoke_timeout_secs: 600,
        }
    }
}

/// [research] 段：自评估研究流程
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResearchSection {
    /// 计数器超过该值即终止为失败
    pub max_retries: u32,
    /// 首次研究前是否也先跑一次 Prompt 工程 Crew
    pub engineer_first_attempt: bool,
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            engineer_first_attempt: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

impl ToolsSection {
    /// 配置未给出时回退到环境变量（SERPER_API_KEY / TAVILY_API_KEY / EXA_API_KEY）
    pub fn api_key(&self, name: &str) -> Option<String> {
        let configured = match name {
            "serper" => self.serper_api_key.clone(),
            "tavily" => self.tavily_api_key.clone(),
            "exa" => self.exa_api_key.clone(),
            _ => None,
        };
        configured
            .or_else(|| std::env::var(format!("{}_API_KEY", name.to_uppercase())).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// 从 config 目录加载配置，环境变量 CREWBENCH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CREWBENCH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CREWBENCH")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.research.max_retries, 3);
        assert!(!cfg.research.engineer_first_attempt);
        assert!((cfg.cache.similarity_threshold - 0.05).abs() < f32::EPSILON);
        assert_eq!(cfg.app.config_dir, PathBuf::from("config"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[research]\nmax_retries = 5\nengineer_first_attempt = true\n\n[cache]\nsimilarity_threshold = 0.1\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.research.max_retries, 5);
        assert!(cfg.research.engineer_first_attempt);
        assert!((cfg.cache.similarity_threshold - 0.1).abs() < 1e-6);
        assert_eq!(cfg.crew.max_tool_steps, 5);
    }
}
