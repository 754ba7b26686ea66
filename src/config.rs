//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RUNHIVE__*` 覆盖（双下划线表示嵌套，如 `RUNHIVE__RUNS__POLL_INTERVAL_MS=250`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::llm::BuiltinTool;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub assistant: AssistantSection,
    #[serde(default)]
    pub runs: RunsSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [client] 段：远端服务地址、密钥、请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    /// 未设置时用 https://api.openai.com/v1
    pub base_url: Option<String>,
    /// 未设置时读 OPENAI_API_KEY
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientSection {
    /// 配置中的 api_key 优先，其次环境变量 OPENAI_API_KEY
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// [assistant] 段：要复用的 Assistant / 线程，以及新建 Assistant 时的名称、模型与指令
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSection {
    /// 已有 Assistant 的 id；不存在时按下面的字段新建
    pub id: Option<String>,
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_instructions")]
    pub instructions: String,
    /// 要恢复的线程 id；未设置时新建线程
    pub thread_id: Option<String>,
    /// 启用的内置工具（code_interpreter / file_search）；为空时不改动 Assistant 的工具
    #[serde(default)]
    pub builtin_tools: Vec<BuiltinTool>,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            id: None,
            name: default_assistant_name(),
            model: default_model(),
            instructions: default_instructions(),
            thread_id: None,
            builtin_tools: Vec::new(),
        }
    }
}

fn default_assistant_name() -> String {
    "runhive".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_instructions() -> String {
    "You are a helpful assistant. Use the provided tools when they help answer the user."
        .to_string()
}

/// [runs] 段：轮询间隔、等待预算、工具调用并发与下发
#[derive(Debug, Clone, Deserialize)]
pub struct RunsSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 等待 Run 结束的预算（秒）；未设置表示无限等待
    pub max_wait_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,
    /// 创建 Run 时下发注册表中的工具定义
    #[serde(default = "default_true")]
    pub advertise_tools: bool,
}

impl Default for RunsSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: None,
            parallel_tool_calls: true,
            advertise_tools: true,
        }
    }
}

impl RunsSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// 从 config 目录加载配置，环境变量 RUNHIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RUNHIVE__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("RUNHIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
