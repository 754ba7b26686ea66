//! Headless Agent 运行时
//!
//! 从 AppConfig 构建远端客户端、工具注册表与 RunOrchestrator：
//! ensure_assistant 复用或新建 Assistant（并按配置启用内置工具），open_conversation 恢复或新建线程，
//! process_message 对单条用户输入跑完整的 Run 回合并返回回复文本。
//! delete_all_assistants 清理账号下的全部 Assistant。

use std::sync::Arc;

use crate::config::{AppConfig, AssistantSection};
use crate::core::{Conversation, RunError, RunOrchestrator, TranscriptRecorder};
use crate::llm::{
    Assistant, AssistantClient, ClientError, ClientErrorKind, OpenAiAssistantClient,
};
use crate::tools::{EchoTool, ToolExecutor, ToolRegistry, WordCountTool};

/// 预构建的 Agent 组件，可多会话共享（RunOrchestrator 为 Clone）
pub struct AgentComponents {
    pub client: Arc<dyn AssistantClient>,
    pub orchestrator: RunOrchestrator,
}

/// 内置工具：echo、word_count
pub fn default_registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    tools.register(WordCountTool);
    tools
}

/// 按 [runs] / [tools] 配置组装编排器
pub fn build_orchestrator(
    cfg: &AppConfig,
    client: Arc<dyn AssistantClient>,
    tools: ToolRegistry,
) -> RunOrchestrator {
    let executor = Arc::new(ToolExecutor::new(tools, cfg.tools.tool_timeout_secs));
    RunOrchestrator::new(client, executor)
        .with_poll_interval(cfg.runs.poll_interval())
        .with_max_wait(cfg.runs.max_wait())
        .with_parallel_tool_calls(cfg.runs.parallel_tool_calls)
        .with_advertise_tools(cfg.runs.advertise_tools)
}

/// 创建 Agent 组件：HTTP 客户端 + 内置工具
///
/// recorder 为 None 时使用 tracing 记录事件
pub fn create_agent_components(
    cfg: &AppConfig,
    recorder: Option<Arc<dyn TranscriptRecorder>>,
) -> Result<AgentComponents, ClientError> {
    let api_key = cfg.client.resolved_api_key();
    if api_key.is_none() {
        tracing::warn!(
            "No API key configured and OPENAI_API_KEY not set; requests will be rejected"
        );
    }
    let client: Arc<dyn AssistantClient> = Arc::new(OpenAiAssistantClient::new(
        cfg.client.base_url.as_deref(),
        api_key.as_deref(),
        cfg.client.request_timeout(),
    )?);

    let mut orchestrator = build_orchestrator(cfg, client.clone(), default_registry());
    if let Some(recorder) = recorder {
        orchestrator = orchestrator.with_recorder(recorder);
    }
    Ok(AgentComponents {
        client,
        orchestrator,
    })
}

/// 复用配置中的 Assistant（指令与配置不同时同步更新）；未配置或远端已不存在时新建
///
/// 配置了 builtin_tools 时再把 Assistant 级工具替换为这些内置工具
pub async fn ensure_assistant(
    client: &dyn AssistantClient,
    section: &AssistantSection,
) -> Result<Assistant, ClientError> {
    let assistant = resolve_assistant(client, section).await?;
    if section.builtin_tools.is_empty() {
        return Ok(assistant);
    }
    let names: Vec<&str> = section.builtin_tools.iter().map(|t| t.as_str()).collect();
    tracing::info!(assistant_id = %assistant.id, tools = ?names, "enabling builtin tools");
    client
        .update_assistant_tools(&assistant.id, &section.builtin_tools)
        .await
}

async fn resolve_assistant(
    client: &dyn AssistantClient,
    section: &AssistantSection,
) -> Result<Assistant, ClientError> {
    if let Some(id) = section.id.as_deref() {
        match client.retrieve_assistant(id).await {
            Ok(assistant) => {
                if assistant.instructions.as_deref() == Some(section.instructions.as_str()) {
                    tracing::info!(assistant_id = %assistant.id, "reusing assistant");
                    return Ok(assistant);
                }
                tracing::info!(assistant_id = %assistant.id, "updating assistant instructions");
                return client
                    .update_assistant_instructions(&assistant.id, &section.instructions)
                    .await;
            }
            Err(e) if e.kind == ClientErrorKind::NotFound => {
                tracing::warn!(
                    assistant_id = id,
                    "configured assistant not found, creating a new one"
                );
            }
            Err(e) => return Err(e),
        }
    }

    let assistant = client
        .create_assistant(&section.name, &section.model, &section.instructions)
        .await?;
    tracing::info!(assistant_id = %assistant.id, model = %assistant.model, "assistant created");
    Ok(assistant)
}

/// 恢复配置中的线程，未配置时新建
pub async fn open_conversation(
    client: &dyn AssistantClient,
    section: &AssistantSection,
    assistant_id: &str,
) -> Result<Conversation, ClientError> {
    match section.thread_id.as_deref() {
        Some(thread_id) => Conversation::resume(client, thread_id, assistant_id).await,
        None => Conversation::create(client, assistant_id).await,
    }
}

/// 删除 list_assistants 返回的全部 Assistant，返回删除数量；遇到第一个错误即停止
pub async fn delete_all_assistants(client: &dyn AssistantClient) -> Result<usize, ClientError> {
    let assistants = client.list_assistants().await?;
    for assistant in &assistants {
        client.delete_assistant(&assistant.id).await?;
        tracing::info!(assistant_id = %assistant.id, "assistant deleted");
    }
    Ok(assistants.len())
}

/// 处理单条用户消息：提交、等待 Run 结束
///
/// 返回最新 assistant 回复，没有回复时为空串
pub async fn process_message(
    components: &AgentComponents,
    conversation: &Conversation,
    user_input: &str,
) -> Result<String, RunError> {
    let outcome = components
        .orchestrator
        .converse(conversation, user_input)
        .await?;
    Ok(outcome.reply.map(|m| m.text).unwrap_or_default())
}
