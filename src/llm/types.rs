//! 远端 Assistant 服务的数据模型
//!
//! 所有类型都是不可变快照：每次调用客户端都返回新对象，本地从不原地修改 Run / Message。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Run 状态；未知字符串原样保存在 Other 中，由编排器判定为协议违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
    Expired,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Other(s) => s,
        }
    }

    /// 终态：completed / failed / cancelled / expired
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }
}

impl From<&str> for RunStatus {
    fn from(s: &str) -> Self {
        match s {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelling" => RunStatus::Cancelling,
            "cancelled" => RunStatus::Cancelled,
            "expired" => RunStatus::Expired,
            other => RunStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        RunStatus::from(s.as_str())
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 远端报告的 Run 失败详情（last_error）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// 远端请求的一次工具调用；arguments 为原始文本，可能是被截断的 JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// requires_action 状态下携带的待办动作：一批有序的工具调用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredAction {
    pub tool_calls: Vec<ToolCall>,
}

/// 提交回远端的单条工具输出，按 tool_call_id 关联
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Run 快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub assistant_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunFailure>,
}

impl Run {
    /// 构造一个最小快照（Mock 客户端与测试脚本使用）
    pub fn snapshot(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            assistant_id: String::new(),
            status,
            required_action: None,
            last_error: None,
        }
    }

    /// 转为 requires_action 并附带工具调用
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.status = RunStatus::RequiresAction;
        self.required_action = Some(RequiredAction { tool_calls });
        self
    }

    /// 转为 failed 并附带远端错误
    pub fn with_failure(mut self, failure: RunFailure) -> Self {
        self.status = RunStatus::Failed;
        self.last_error = Some(failure);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 本轮需要回答的工具调用；非 requires_action 时为空
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.required_action
            .as_ref()
            .map(|a| a.tool_calls.as_slice())
            .unwrap_or(&[])
    }
}

/// 消息作者角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// 会话中的一条消息（文本内容已拼接）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: Role,
    pub text: String,
    /// Unix 秒
    pub created_at: i64,
}

impl Message {
    pub fn created_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.created_at, 0)
    }
}

/// 列消息时的排序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    Asc,
    Desc,
}

impl ListOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListOrder::Asc => "asc",
            ListOrder::Desc => "desc",
        }
    }
}

/// 远端线程（Conversation 的服务端容器）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub created_at: i64,
}

/// 远端 Assistant 定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Assistant 级内置工具，由远端执行，不会出现在 requires_action 中
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    CodeInterpreter,
    FileSearch,
}

impl BuiltinTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinTool::CodeInterpreter => "code_interpreter",
            BuiltinTool::FileSearch => "file_search",
        }
    }
}

/// 随 Run 下发的函数工具定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tool_wire_names() {
        let tools: Vec<BuiltinTool> =
            serde_json::from_str(r#"["code_interpreter", "file_search"]"#).unwrap();
        assert_eq!(tools, vec![BuiltinTool::CodeInterpreter, BuiltinTool::FileSearch]);
        assert_eq!(BuiltinTool::FileSearch.as_str(), "file_search");
    }

    #[test]
    fn test_status_round_trips_known_values() {
        for s in [
            "queued",
            "in_progress",
            "requires_action",
            "completed",
            "failed",
            "cancelling",
            "cancelled",
            "expired",
        ] {
            let status = RunStatus::from(s);
            assert!(!matches!(status, RunStatus::Other(_)), "{s} should be known");
            assert_eq!(status.as_str(), s);
        }
    }

    #[test]
    fn test_status_keeps_unknown_value() {
        let status: RunStatus = serde_json::from_str("\"weird\"").unwrap();
        assert_eq!(status, RunStatus::Other("weird".to_string()));
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::Expired.is_terminal());
        assert!(!RunStatus::Cancelling.is_terminal());
        assert!(!RunStatus::RequiresAction.is_terminal());
    }

    #[test]
    fn test_tool_calls_empty_outside_action() {
        let run = Run::snapshot("run_1", "thread_1", RunStatus::InProgress);
        assert!(run.tool_calls().is_empty());

        let run = run.with_tool_calls(vec![ToolCall::new("call_1", "echo", "{}")]);
        assert_eq!(run.status, RunStatus::RequiresAction);
        assert_eq!(run.tool_calls().len(), 1);
    }

    #[test]
    fn test_message_timestamp() {
        let msg = Message {
            id: "msg_1".into(),
            thread_id: "thread_1".into(),
            role: Role::Assistant,
            text: "hi".into(),
            created_at: 1_700_000_000,
        };
        assert_eq!(msg.created_at_utc().map(|t| t.timestamp()), Some(1_700_000_000));
    }
}
