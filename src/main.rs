//! runhive - 单次对话入口
//!
//! 加载配置、初始化日志，复用或新建 Assistant 与线程，把命令行参数作为一条用户消息提交并打印回复。
//! `runhive --delete-all-assistants` 删除账号下的全部 Assistant 后退出。

use anyhow::Context;
use runhive::agent::{
    create_agent_components, delete_all_assistants, ensure_assistant, open_conversation,
    process_message,
};
use runhive::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    runhive::observability::init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        anyhow::bail!("usage: runhive <message> | runhive --delete-all-assistants");
    }

    let cfg = load_config(None).context("Failed to load configuration")?;
    let components =
        create_agent_components(&cfg, None).context("Failed to create assistant client")?;

    if prompt == "--delete-all-assistants" {
        let deleted = delete_all_assistants(components.client.as_ref())
            .await
            .context("Failed to delete assistants")?;
        println!("deleted {deleted} assistants");
        return Ok(());
    }

    let assistant = ensure_assistant(components.client.as_ref(), &cfg.assistant)
        .await
        .context("Failed to prepare assistant")?;
    let conversation = open_conversation(components.client.as_ref(), &cfg.assistant, &assistant.id)
        .await
        .context("Failed to open conversation")?;
    tracing::info!(thread_id = conversation.thread_id(), "conversation ready");

    let reply = process_message(&components, &conversation, &prompt)
        .await
        .context("Run did not complete")?;
    println!("{reply}");

    Ok(())
}
