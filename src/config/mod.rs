//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=mock`）。
//! 密钥类环境文件（KEY=VALUE）由 secrets 模块在加载配置前注入进程环境。

pub mod secrets;

use std::path::PathBuf;

use serde::Deserialize;

pub use secrets::{expand_vars, load_env_files, parse_env_line};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub team: TeamSection,
    pub memory: MemorySection,
    pub checkpoint: CheckpointSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、工作目录、线程标识输入、密钥文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 沙箱根目录（文件 / shell 工具），未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 项目 ID，未设置时按工作目录哈希生成
    pub project_id: Option<String>,
    pub agent_id: Option<String>,
    /// 显式会话 ID，覆盖内容寻址得到的 thread_id
    pub session_id: Option<String>,
    /// KEY=VALUE 格式的密钥文件，按顺序加载，不覆盖已有环境变量
    #[serde(default)]
    pub secrets_files: Vec<PathBuf>,
}

/// [llm] 段：后端选择、模型与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// openai（OpenAI 兼容端点）/ mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

/// [team] 段：专家内部步数、单轮专家调用上限、整轮重试
#[derive(Debug, Clone, Deserialize)]
pub struct TeamSection {
    /// 单个专家内部推理循环的最大 LLM 调用次数
    #[serde(default = "default_max_agent_steps")]
    pub max_agent_steps: usize,
    /// 单轮内 Supervisor 可调度的专家次数上限
    #[serde(default = "default_max_cycle_steps")]
    pub max_cycle_steps: usize,
    #[serde(default = "default_max_turn_attempts")]
    pub max_turn_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_agent_steps() -> usize {
    8
}

fn default_max_cycle_steps() -> usize {
    100
}

fn default_max_turn_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for TeamSection {
    fn default() -> Self {
        Self {
            max_agent_steps: default_max_agent_steps(),
            max_cycle_steps: default_max_cycle_steps(),
            max_turn_attempts: default_max_turn_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// [memory] 段：语义记忆与图记忆后端、检索条数、反思间隔
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    /// memory / weaviate
    #[serde(default = "default_backend")]
    pub semantic_backend: String,
    #[serde(default = "default_weaviate_url")]
    pub weaviate_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// memory / neo4j
    #[serde(default = "default_backend")]
    pub graph_backend: String,
    #[serde(default = "default_neo4j_url")]
    pub neo4j_url: String,
    #[serde(default = "default_neo4j_user")]
    pub neo4j_user: String,
    pub neo4j_password: Option<String>,
    #[serde(default = "default_neo4j_database")]
    pub neo4j_database: String,
    /// 每次外部存储查询的超时（秒）
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// 每完成多少个人类回合触发一次反思；0 表示关闭
    #[serde(default = "default_reflection_interval")]
    pub reflection_interval: usize,
    /// memory / file
    #[serde(default = "default_backend")]
    pub document_backend: String,
    /// file 后端的 JSON 文件，缺省 .hive/documents.json
    pub document_path: Option<PathBuf>,
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_weaviate_url() -> String {
    "http://localhost:18050".to_string()
}

fn default_collection() -> String {
    "AgentMemory".to_string()
}

fn default_search_limit() -> usize {
    5
}

fn default_neo4j_url() -> String {
    "http://localhost:7474".to_string()
}

fn default_neo4j_user() -> String {
    "neo4j".to_string()
}

fn default_neo4j_database() -> String {
    "neo4j".to_string()
}

fn default_query_timeout_secs() -> u64 {
    10
}

fn default_reflection_interval() -> usize {
    5
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            semantic_backend: default_backend(),
            weaviate_url: default_weaviate_url(),
            collection: default_collection(),
            search_limit: default_search_limit(),
            graph_backend: default_backend(),
            neo4j_url: default_neo4j_url(),
            neo4j_user: default_neo4j_user(),
            neo4j_password: None,
            neo4j_database: default_neo4j_database(),
            query_timeout_secs: default_query_timeout_secs(),
            reflection_interval: default_reflection_interval(),
            document_backend: default_backend(),
            document_path: None,
        }
    }
}

/// [checkpoint] 段：memory / file / sqlite
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointSection {
    #[serde(default = "default_checkpoint_backend")]
    pub backend: String,
    /// file 后端为目录，sqlite 后端为数据库文件
    pub path: Option<PathBuf>,
}

fn default_checkpoint_backend() -> String {
    "file".to_string()
}

impl Default for CheckpointSection {
    fn default() -> Self {
        Self {
            backend: default_checkpoint_backend(),
            path: None,
        }
    }
}

/// [tools] 段：工具超时、Shell 白名单
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub shell: ShellSection,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            shell: ShellSection::default(),
        }
    }
}

/// [tools.shell] 段：允许执行的命令名（仅首词）
#[derive(Debug, Clone, Deserialize)]
pub struct ShellSection {
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
}

fn default_allowed_commands() -> Vec<String> {
    vec![
        "ls".into(),
        "grep".into(),
        "cat".into(),
        "head".into(),
        "tail".into(),
        "wc".into(),
        "find".into(),
        "git".into(),
        "cargo".into(),
        "python3".into(),
    ]
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            allowed_commands: default_allowed_commands(),
        }
    }
}

/// 加载配置
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
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
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置（reload_system 之后由外层循环调用）
pub fn reload_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    load_config(config_path)
}
