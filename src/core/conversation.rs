//! 会话句柄：远端线程 + 负责应答的 Assistant
//!
//! 不实现 Clone：一个逻辑会话只持有一个句柄；关闭会话需要按值交出句柄。

use crate::llm::{AssistantClient, ClientError};

#[derive(Debug, PartialEq, Eq)]
pub struct Conversation {
    thread_id: String,
    assistant_id: String,
}

impl Conversation {
    /// 新建远端线程
    pub async fn create(
        client: &dyn AssistantClient,
        assistant_id: &str,
    ) -> Result<Self, ClientError> {
        let thread = client.create_thread().await?;
        tracing::info!(thread_id = %thread.id, assistant_id, "conversation created");
        Ok(Self {
            thread_id: thread.id,
            assistant_id: assistant_id.to_string(),
        })
    }

    /// 恢复已有线程；先向远端确认线程存在
    pub async fn resume(
        client: &dyn AssistantClient,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<Self, ClientError> {
        let thread = client.retrieve_thread(thread_id).await?;
        tracing::info!(thread_id = %thread.id, assistant_id, "conversation resumed");
        Ok(Self {
            thread_id: thread.id,
            assistant_id: assistant_id.to_string(),
        })
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// 删除远端线程并交出句柄
    pub async fn close(self, client: &dyn AssistantClient) -> Result<(), ClientError> {
        client.delete_thread(&self.thread_id).await?;
        tracing::info!(thread_id = %self.thread_id, "conversation closed");
        Ok(())
    }
}
