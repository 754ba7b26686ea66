//! 远端 Assistant 客户端抽象
//!
//! 所有后端（OpenAI HTTP / Scripted Mock）实现 AssistantClient。
//! 传输错误统一为 ClientError，编排核心不做重试，是否重试由调用方根据 is_retryable 决定。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::types::{
    Assistant, BuiltinTool, ListOrder, Message, Role, Run, Thread, ToolDefinition, ToolOutput,
};

/// 错误分类，供调用方决定重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// 连接失败、请求超时
    Network,
    /// 429
    RateLimit,
    /// 5xx
    ServerError,
    /// 401 / 403
    Auth,
    /// 404
    NotFound,
    /// 其它 4xx
    InvalidRequest,
    /// 响应体无法解析
    Decode,
}

/// 客户端调用失败
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub message: String,
    /// HTTP 状态码（若有）
    pub status: Option<u16>,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Network, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::NotFound, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::InvalidRequest, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Decode, message)
    }

    /// 按 HTTP 状态码归类
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ClientErrorKind::Auth,
            404 => ClientErrorKind::NotFound,
            429 => ClientErrorKind::RateLimit,
            500..=599 => ClientErrorKind::ServerError,
            _ => ClientErrorKind::InvalidRequest,
        };
        Self::new(kind, message).with_status(status)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ClientErrorKind::Network | ClientErrorKind::RateLimit | ClientErrorKind::ServerError
        )
    }
}

/// 远端 Assistant 服务边界：Assistant / Thread / Message / Run 的增删查
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn create_assistant(
        &self,
        name: &str,
        model: &str,
        instructions: &str,
    ) -> Result<Assistant, ClientError>;

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ClientError>;

    async fn update_assistant_instructions(
        &self,
        assistant_id: &str,
        instructions: &str,
    ) -> Result<Assistant, ClientError>;

    /// 把 Assistant 级工具替换为给定的内置工具（会覆盖 Assistant 上原有的工具列表）
    async fn update_assistant_tools(
        &self,
        assistant_id: &str,
        tools: &[BuiltinTool],
    ) -> Result<Assistant, ClientError>;

    /// 列出现有 Assistant（仅首页）
    async fn list_assistants(&self) -> Result<Vec<Assistant>, ClientError>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), ClientError>;

    async fn create_thread(&self) -> Result<Thread, ClientError>;

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ClientError>;

    async fn delete_thread(&self, thread_id: &str) -> Result<(), ClientError>;

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Message, ClientError>;

    async fn list_messages(
        &self,
        thread_id: &str,
        order: ListOrder,
    ) -> Result<Vec<Message>, ClientError>;

    /// tools 为 None 时沿用 Assistant 自身的工具配置
    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Run, ClientError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ClientError>;

    /// 一次性提交本轮全部工具输出，返回新的 Run 快照
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ClientError>;
}

#[async_trait]
impl<T: AssistantClient + ?Sized> AssistantClient for Arc<T> {
    async fn create_assistant(
        &self,
        name: &str,
        model: &str,
        instructions: &str,
    ) -> Result<Assistant, ClientError> {
        (**self).create_assistant(name, model, instructions).await
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ClientError> {
        (**self).retrieve_assistant(assistant_id).await
    }

    async fn update_assistant_instructions(
        &self,
        assistant_id: &str,
        instructions: &str,
    ) -> Result<Assistant, ClientError> {
        (**self)
            .update_assistant_instructions(assistant_id, instructions)
            .await
    }

    async fn update_assistant_tools(
        &self,
        assistant_id: &str,
        tools: &[BuiltinTool],
    ) -> Result<Assistant, ClientError> {
        (**self).update_assistant_tools(assistant_id, tools).await
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, ClientError> {
        (**self).list_assistants().await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), ClientError> {
        (**self).delete_assistant(assistant_id).await
    }

    async fn create_thread(&self) -> Result<Thread, ClientError> {
        (**self).create_thread().await
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ClientError> {
        (**self).retrieve_thread(thread_id).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), ClientError> {
        (**self).delete_thread(thread_id).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Message, ClientError> {
        (**self).create_message(thread_id, role, text).await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        order: ListOrder,
    ) -> Result<Vec<Message>, ClientError> {
        (**self).list_messages(thread_id, order).await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Run, ClientError> {
        (**self).create_run(thread_id, assistant_id, tools).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ClientError> {
        (**self).retrieve_run(thread_id, run_id).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ClientError> {
        (**self).submit_tool_outputs(thread_id, run_id, outputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ClientError::from_status(401, "x").kind, ClientErrorKind::Auth);
        assert_eq!(ClientError::from_status(404, "x").kind, ClientErrorKind::NotFound);
        assert_eq!(ClientError::from_status(429, "x").kind, ClientErrorKind::RateLimit);
        assert_eq!(ClientError::from_status(503, "x").kind, ClientErrorKind::ServerError);
        assert_eq!(ClientError::from_status(400, "x").kind, ClientErrorKind::InvalidRequest);
        assert_eq!(ClientError::from_status(503, "x").status, Some(503));
    }

    #[test]
    fn test_retryable() {
        assert!(ClientError::network("reset").is_retryable());
        assert!(ClientError::from_status(429, "slow down").is_retryable());
        assert!(!ClientError::from_status(401, "bad key").is_retryable());
        assert!(!ClientError::decode("garbage").is_retryable());
    }
}
