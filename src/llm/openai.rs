//! OpenAI Assistants v2 HTTP 客户端
//!
//! 通过 reqwest 直接调用 /assistants、/threads、/threads/{id}/runs 等端点（可配置 base_url）；
//! 线上 JSON 结构只在本文件内出现，对外一律转换为 llm::types 中的快照类型。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::types::{
    Assistant, BuiltinTool, ListOrder, Message, RequiredAction, Role, Run, RunFailure, RunStatus,
    Thread, ToolCall, ToolDefinition, ToolOutput,
};
use crate::llm::{AssistantClient, ClientError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// 单页消息条数上限
const MESSAGE_PAGE_LIMIT: usize = 100;
/// 错误信息中响应体预览的最大字符数
const BODY_PREVIEW_CHARS: usize = 300;

/// OpenAI 兼容 Assistants 客户端：持有 reqwest Client、base_url 与 API Key
pub struct OpenAiAssistantClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiAssistantClient {
    /// api_key 为 None 时读取 OPENAI_API_KEY；timeout 作用于每个 HTTP 请求
    pub fn new(
        base_url: Option<&str>,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .map_err(|e| ClientError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::from_status(status.as_u16(), error_message(&body)));
        }

        serde_json::from_str(&body)
            .map_err(|e| ClientError::decode(format!("{e}; body: {}", preview(&body))))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.http.get(self.url(path))).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ClientError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let _: Value = self.send(self.http.delete(self.url(path))).await?;
        Ok(())
    }
}

#[async_trait]
impl AssistantClient for OpenAiAssistantClient {
    async fn create_assistant(
        &self,
        name: &str,
        model: &str,
        instructions: &str,
    ) -> Result<Assistant, ClientError> {
        let body = json!({ "name": name, "model": model, "instructions": instructions });
        self.post("assistants", &body).await
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ClientError> {
        self.get(&format!("assistants/{assistant_id}")).await
    }

    async fn update_assistant_instructions(
        &self,
        assistant_id: &str,
        instructions: &str,
    ) -> Result<Assistant, ClientError> {
        let body = json!({ "instructions": instructions });
        self.post(&format!("assistants/{assistant_id}"), &body).await
    }

    async fn update_assistant_tools(
        &self,
        assistant_id: &str,
        tools: &[BuiltinTool],
    ) -> Result<Assistant, ClientError> {
        let body = assistant_tools_body(tools);
        self.post(&format!("assistants/{assistant_id}"), &body).await
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, ClientError> {
        let page: WireList<Assistant> = self.get("assistants").await?;
        Ok(page.data)
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), ClientError> {
        self.delete(&format!("assistants/{assistant_id}")).await
    }

    async fn create_thread(&self) -> Result<Thread, ClientError> {
        self.post("threads", &json!({})).await
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ClientError> {
        self.get(&format!("threads/{thread_id}")).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), ClientError> {
        self.delete(&format!("threads/{thread_id}")).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Message, ClientError> {
        let body = json!({ "role": role.as_str(), "content": text });
        let message: WireMessage = self
            .post(&format!("threads/{thread_id}/messages"), &body)
            .await?;
        Ok(message.into())
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        order: ListOrder,
    ) -> Result<Vec<Message>, ClientError> {
        let path = format!(
            "threads/{thread_id}/messages?order={}&limit={MESSAGE_PAGE_LIMIT}",
            order.as_str()
        );
        let page: WireList<WireMessage> = self.get(&path).await?;
        Ok(page.data.into_iter().map(Message::from).collect())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Run, ClientError> {
        let body = create_run_body(assistant_id, tools);
        let run: WireRun = self.post(&format!("threads/{thread_id}/runs"), &body).await?;
        Ok(run.into())
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ClientError> {
        let run: WireRun = self.get(&format!("threads/{thread_id}/runs/{run_id}")).await?;
        Ok(run.into())
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ClientError> {
        let body = json!({ "tool_outputs": outputs });
        let run: WireRun = self
            .post(
                &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
                &body,
            )
            .await?;
        Ok(run.into())
    }
}

fn create_run_body(assistant_id: &str, tools: Option<&[ToolDefinition]>) -> Value {
    let mut body = json!({ "assistant_id": assistant_id });
    if let Some(tools) = tools {
        body["tools"] = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
    }
    body
}

fn assistant_tools_body(tools: &[BuiltinTool]) -> Value {
    let tools: Vec<Value> = tools.iter().map(|t| json!({ "type": t.as_str() })).collect();
    json!({ "tools": tools })
}

/// 优先取 {"error": {"message": ...}}，否则回退为响应体预览
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| preview(body))
}

fn preview(body: &str) -> String {
    if body.chars().count() > BODY_PREVIEW_CHARS {
        format!("{}...", body.chars().take(BODY_PREVIEW_CHARS).collect::<String>())
    } else {
        body.to_string()
    }
}

#[derive(Deserialize)]
struct WireList<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct WireRun {
    id: String,
    thread_id: String,
    #[serde(default)]
    assistant_id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<WireRequiredAction>,
    #[serde(default)]
    last_error: Option<RunFailure>,
}

#[derive(Deserialize)]
struct WireRequiredAction {
    #[serde(default)]
    submit_tool_outputs: Option<WireSubmitToolOutputs>,
}

#[derive(Deserialize)]
struct WireSubmitToolOutputs {
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(default)]
    function: WireFunction,
}

#[derive(Deserialize, Default)]
struct WireFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

impl From<WireRun> for Run {
    fn from(wire: WireRun) -> Self {
        // required_action 存在但没有 tool_calls 时保留为空批次，由编排器判为协议违规
        let required_action = wire.required_action.map(|action| RequiredAction {
            tool_calls: action
                .submit_tool_outputs
                .map(|s| s.tool_calls)
                .unwrap_or_default()
                .into_iter()
                .map(|c| ToolCall::new(c.id, c.function.name, c.function.arguments))
                .collect(),
        });
        Run {
            id: wire.id,
            thread_id: wire.thread_id,
            assistant_id: wire.assistant_id,
            status: wire.status,
            required_action,
            last_error: wire.last_error,
        }
    }
}

#[derive(Deserialize)]
struct WireMessage {
    id: String,
    thread_id: String,
    role: Role,
    #[serde(default)]
    content: Vec<WireContent>,
    #[serde(default)]
    created_at: i64,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireContent {
    #[serde(rename = "text")]
    Text { text: WireText },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireText {
    value: String,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        let text = wire
            .content
            .into_iter()
            .filter_map(|c| match c {
                WireContent::Text { text } => Some(text.value),
                WireContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Message {
            id: wire.id,
            thread_id: wire.thread_id,
            role: wire.role,
            text,
            created_at: wire.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_run_with_tool_calls() {
        let body = r#"{
            "id": "run_abc",
            "object": "thread.run",
            "thread_id": "thread_1",
            "assistant_id": "asst_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "word_count", "arguments": "{\"text\": \"a b\"}"}}
                    ]
                }
            },
            "last_error": null
        }"#;
        let run: Run = serde_json::from_str::<WireRun>(body).unwrap().into();
        assert_eq!(run.status, RunStatus::RequiresAction);
        assert_eq!(run.tool_calls().len(), 1);
        assert_eq!(run.tool_calls()[0].name, "word_count");
        assert_eq!(run.tool_calls()[0].arguments, "{\"text\": \"a b\"}");
    }

    #[test]
    fn test_wire_run_failed_with_error() {
        let body = r#"{"id": "run_1", "thread_id": "t", "status": "failed",
            "last_error": {"code": "server_error", "message": "overloaded"}}"#;
        let run: Run = serde_json::from_str::<WireRun>(body).unwrap().into();
        assert_eq!(run.status, RunStatus::Failed);
        let err = run.last_error.unwrap();
        assert_eq!(err.message, "overloaded");
        assert_eq!(err.code.as_deref(), Some("server_error"));
    }

    #[test]
    fn test_wire_message_joins_text_parts() {
        let body = r#"{"id": "msg_1", "thread_id": "t", "role": "assistant", "created_at": 5,
            "content": [
                {"type": "text", "text": {"value": "first", "annotations": []}},
                {"type": "image_file", "image_file": {"file_id": "f"}},
                {"type": "text", "text": {"value": "second", "annotations": []}}
            ]}"#;
        let msg: Message = serde_json::from_str::<WireMessage>(body).unwrap().into();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text, "first\nsecond");
    }

    #[test]
    fn test_create_run_body_tools() {
        let tools = vec![ToolDefinition {
            name: "echo".into(),
            description: "Echo text".into(),
            parameters: json!({"type": "object"}),
        }];
        let body = create_run_body("asst_1", Some(&tools));
        assert_eq!(body["assistant_id"], "asst_1");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "echo");

        let body = create_run_body("asst_1", None);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_assistant_tools_body() {
        let body =
            assistant_tools_body(&[BuiltinTool::CodeInterpreter, BuiltinTool::FileSearch]);
        assert_eq!(
            body,
            json!({"tools": [{"type": "code_interpreter"}, {"type": "file_search"}]})
        );
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"message": "No thread found", "type": "invalid_request_error"}}"#;
        assert_eq!(error_message(body), "No thread found");
        assert_eq!(error_message("upstream connect error"), "upstream connect error");
    }

    #[test]
    fn test_url_join() {
        let client = OpenAiAssistantClient::new(
            Some("http://localhost:8080/v1/"),
            Some("k"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.url("/threads"), "http://localhost:8080/v1/threads");
    }
}
