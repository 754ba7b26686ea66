//! LLM 层：远端 Assistant 服务的客户端抽象、数据模型与实现（OpenAI HTTP / Scripted Mock）

pub mod mock;
pub mod openai;
pub mod traits;
pub mod types;

pub use mock::{ClientCall, ScriptedClient};
pub use openai::OpenAiAssistantClient;
pub use traits::{AssistantClient, ClientError, ClientErrorKind};
pub use types::{
    Assistant, BuiltinTool, ListOrder, Message, RequiredAction, Role, Run, RunFailure, RunStatus,
    Thread, ToolCall, ToolDefinition, ToolOutput,
};
