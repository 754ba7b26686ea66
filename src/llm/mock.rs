//! Scripted 客户端（用于测试，无需 API）
//!
//! Run 相关调用（create_run / retrieve_run / submit_tool_outputs）按顺序消费预设的快照脚本；
//! 脚本只剩最后一个时重复返回它。快照的 thread_id 改写为请求中的线程，run id 保持脚本原值。
//! 每次调用都写入调用日志，测试据此断言调用次数与顺序。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::types::{
    Assistant, BuiltinTool, ListOrder, Message, Role, Run, Thread, ToolDefinition, ToolOutput,
};
use crate::llm::{AssistantClient, ClientError};

/// 调用日志中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    CreateAssistant,
    RetrieveAssistant(String),
    UpdateAssistant(String),
    UpdateAssistantTools {
        assistant_id: String,
        tools: Vec<BuiltinTool>,
    },
    ListAssistants,
    DeleteAssistant(String),
    CreateThread,
    RetrieveThread(String),
    DeleteThread(String),
    CreateMessage { thread_id: String, role: Role },
    ListMessages { thread_id: String, order: ListOrder },
    CreateRun { thread_id: String, with_tools: bool },
    RetrieveRun { thread_id: String, run_id: String },
    SubmitToolOutputs { thread_id: String, run_id: String },
}

#[derive(Default)]
struct ScriptState {
    runs: VecDeque<Run>,
    calls: Vec<ClientCall>,
    submissions: Vec<Vec<ToolOutput>>,
    messages: HashMap<String, Vec<Message>>,
    assistants: HashMap<String, Assistant>,
    threads: HashMap<String, Thread>,
    /// 下次 retrieve_run 时注入的传输错误
    fail_next_retrieve: Option<ClientError>,
    /// 每次 retrieve_run 返回前的延迟（模拟慢速远端）
    retrieve_delay: Option<Duration>,
}

/// Mock 客户端：Run 快照按脚本返回，Assistant / Thread / Message 保存在内存中
#[derive(Default)]
pub struct ScriptedClient {
    state: Mutex<ScriptState>,
    clock: AtomicI64,
}

impl ScriptedClient {
    pub fn new(runs: impl IntoIterator<Item = Run>) -> Self {
        let client = Self::default();
        client.lock().runs = runs.into_iter().collect();
        client
    }

    /// 之后每次 retrieve_run 都先等待 delay 再返回
    pub fn delay_retrieves(&self, delay: Duration) {
        self.lock().retrieve_delay = Some(delay);
    }

    /// 以 assistant 身份写入一条消息（模拟远端在 Run 中生成的回复）
    pub fn push_assistant_message(&self, thread_id: &str, text: &str) -> Message {
        self.insert_message(thread_id, Role::Assistant, text)
    }

    /// 注册一个已存在的线程（用于 resume 场景）
    pub fn insert_thread(&self, thread_id: &str) {
        self.lock().threads.insert(
            thread_id.to_string(),
            Thread {
                id: thread_id.to_string(),
                created_at: 0,
            },
        );
    }

    /// 让下一次 retrieve_run 返回传输错误
    pub fn fail_next_retrieve(&self, err: ClientError) {
        self.lock().fail_next_retrieve = Some(err);
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// 每次 submit_tool_outputs 提交的批次
    pub fn submissions(&self) -> Vec<Vec<ToolOutput>> {
        self.lock().submissions.clone()
    }

    pub fn count(&self, pred: impl Fn(&ClientCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn insert_message(&self, thread_id: &str, role: Role, text: &str) -> Message {
        let message = Message {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            thread_id: thread_id.to_string(),
            role,
            text: text.to_string(),
            created_at: self.tick(),
        };
        self.lock()
            .messages
            .entry(thread_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }

    fn next_run(&self, thread_id: &str) -> Result<Run, ClientError> {
        let mut state = self.lock();
        let run = if state.runs.len() > 1 {
            state.runs.pop_front()
        } else {
            state.runs.front().cloned()
        };
        let mut run = run.ok_or_else(|| ClientError::invalid_request("run script is empty"))?;
        run.thread_id = thread_id.to_string();
        Ok(run)
    }
}

fn assistant_not_found(assistant_id: &str) -> ClientError {
    ClientError::not_found(format!("No assistant found with id '{assistant_id}'"))
}

#[async_trait]
impl AssistantClient for ScriptedClient {
    async fn create_assistant(
        &self,
        name: &str,
        model: &str,
        instructions: &str,
    ) -> Result<Assistant, ClientError> {
        let assistant = Assistant {
            id: format!("asst_{}", uuid::Uuid::new_v4().simple()),
            name: Some(name.to_string()),
            model: model.to_string(),
            instructions: Some(instructions.to_string()),
        };
        let mut state = self.lock();
        state.calls.push(ClientCall::CreateAssistant);
        state.assistants.insert(assistant.id.clone(), assistant.clone());
        Ok(assistant)
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::RetrieveAssistant(assistant_id.to_string()));
        state
            .assistants
            .get(assistant_id)
            .cloned()
            .ok_or_else(|| assistant_not_found(assistant_id))
    }

    async fn update_assistant_instructions(
        &self,
        assistant_id: &str,
        instructions: &str,
    ) -> Result<Assistant, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::UpdateAssistant(assistant_id.to_string()));
        let assistant = state
            .assistants
            .get_mut(assistant_id)
            .ok_or_else(|| assistant_not_found(assistant_id))?;
        assistant.instructions = Some(instructions.to_string());
        Ok(assistant.clone())
    }

    async fn update_assistant_tools(
        &self,
        assistant_id: &str,
        tools: &[BuiltinTool],
    ) -> Result<Assistant, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::UpdateAssistantTools {
            assistant_id: assistant_id.to_string(),
            tools: tools.to_vec(),
        });
        state
            .assistants
            .get(assistant_id)
            .cloned()
            .ok_or_else(|| assistant_not_found(assistant_id))
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::ListAssistants);
        Ok(state.assistants.values().cloned().collect())
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::DeleteAssistant(assistant_id.to_string()));
        state
            .assistants
            .remove(assistant_id)
            .map(|_| ())
            .ok_or_else(|| assistant_not_found(assistant_id))
    }

    async fn create_thread(&self) -> Result<Thread, ClientError> {
        let thread = Thread {
            id: format!("thread_{}", uuid::Uuid::new_v4().simple()),
            created_at: self.tick(),
        };
        let mut state = self.lock();
        state.calls.push(ClientCall::CreateThread);
        state.threads.insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::RetrieveThread(thread_id.to_string()));
        state
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("No thread found with id '{thread_id}'")))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::DeleteThread(thread_id.to_string()));
        state.messages.remove(thread_id);
        state
            .threads
            .remove(thread_id)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(format!("No thread found with id '{thread_id}'")))
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Message, ClientError> {
        self.lock().calls.push(ClientCall::CreateMessage {
            thread_id: thread_id.to_string(),
            role,
        });
        Ok(self.insert_message(thread_id, role, text))
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        order: ListOrder,
    ) -> Result<Vec<Message>, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::ListMessages {
            thread_id: thread_id.to_string(),
            order,
        });
        let mut messages = state.messages.get(thread_id).cloned().unwrap_or_default();
        if order == ListOrder::Desc {
            messages.reverse();
        }
        Ok(messages)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        _assistant_id: &str,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Run, ClientError> {
        self.lock().calls.push(ClientCall::CreateRun {
            thread_id: thread_id.to_string(),
            with_tools: tools.is_some(),
        });
        self.next_run(thread_id)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ClientError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(ClientCall::RetrieveRun {
                thread_id: thread_id.to_string(),
                run_id: run_id.to_string(),
            });
            if let Some(err) = state.fail_next_retrieve.take() {
                return Err(err);
            }
            state.retrieve_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_run(thread_id)
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ClientError> {
        {
            let mut state = self.lock();
            state.calls.push(ClientCall::SubmitToolOutputs {
                thread_id: thread_id.to_string(),
                run_id: run_id.to_string(),
            });
            state.submissions.push(outputs.to_vec());
        }
        self.next_run(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::RunStatus;

    #[tokio::test]
    async fn test_script_is_consumed_in_order_and_tail_repeats() {
        let client = ScriptedClient::new([
            Run::snapshot("run_1", "", RunStatus::Queued),
            Run::snapshot("run_1", "", RunStatus::Completed),
        ]);
        let first = client.create_run("thread_1", "asst_1", None).await.unwrap();
        assert_eq!(first.status, RunStatus::Queued);
        assert_eq!(first.thread_id, "thread_1");

        for _ in 0..2 {
            let run = client.retrieve_run("thread_1", "run_1").await.unwrap();
            assert_eq!(run.status, RunStatus::Completed);
        }
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_messages_listed_by_order() {
        let client = ScriptedClient::default();
        let thread = client.create_thread().await.unwrap();
        client.create_message(&thread.id, Role::User, "hello").await.unwrap();
        client.push_assistant_message(&thread.id, "hi there");

        let desc = client.list_messages(&thread.id, ListOrder::Desc).await.unwrap();
        assert_eq!(desc[0].role, Role::Assistant);
        let asc = client.list_messages(&thread.id, ListOrder::Asc).await.unwrap();
        assert_eq!(asc[0].text, "hello");
    }

    #[tokio::test]
    async fn test_scripted_run_id_is_kept() {
        let client = ScriptedClient::new([Run::snapshot("run_other", "", RunStatus::InProgress)]);
        let run = client.retrieve_run("thread_1", "run_1").await.unwrap();
        assert_eq!(run.id, "run_other");
        assert_eq!(run.thread_id, "thread_1");
    }

    #[tokio::test]
    async fn test_deleted_assistant_is_not_found() {
        let client = ScriptedClient::default();
        let created = client
            .create_assistant("runhive", "gpt-4o-mini", "be brief")
            .await
            .unwrap();
        assert_eq!(client.list_assistants().await.unwrap().len(), 1);

        client.delete_assistant(&created.id).await.unwrap();
        let err = client.retrieve_assistant(&created.id).await.unwrap_err();
        assert_eq!(err.kind, crate::llm::ClientErrorKind::NotFound);
        assert!(client.list_assistants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_retrieve_failure() {
        let client = ScriptedClient::new([Run::snapshot("run_1", "", RunStatus::InProgress)]);
        client.fail_next_retrieve(ClientError::network("connection reset"));
        assert!(client.retrieve_run("t", "run_1").await.is_err());
        assert!(client.retrieve_run("t", "run_1").await.is_ok());
    }
}
