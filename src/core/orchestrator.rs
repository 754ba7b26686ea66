//! Run 编排器：提交用户消息、轮询 Run、处理工具调用回合、返回终态
//!
//! 每一步动作由 state::next_step 决定，本模块只负责执行：等待、重新拉取、派发工具、上报事件。
//! 编排器本身无可变状态（只持有 Arc），Clone 后可在多个任务中并发驱动不同会话；
//! 同一个 Run 的轮询严格串行。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::conversation::Conversation;
use crate::core::dispatch::Dispatcher;
use crate::core::events::{EventReporter, RunEvent, TranscriptRecorder};
use crate::core::state::{next_step, PollStep};
use crate::core::{Phase, RunError};
use crate::llm::{AssistantClient, ListOrder, Message, Role, Run, RunStatus};
use crate::tools::ToolExecutor;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 一轮对话的结果：终态 Run 与最新的 assistant 回复
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub run: Run,
    pub reply: Option<Message>,
}

#[derive(Clone)]
pub struct RunOrchestrator {
    client: Arc<dyn AssistantClient>,
    executor: Arc<ToolExecutor>,
    reporter: EventReporter,
    poll_interval: Duration,
    max_wait: Option<Duration>,
    parallel_tool_calls: bool,
    advertise_tools: bool,
}

impl RunOrchestrator {
    pub fn new(client: Arc<dyn AssistantClient>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            client,
            executor,
            reporter: EventReporter::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
            parallel_tool_calls: true,
            advertise_tools: true,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn TranscriptRecorder>) -> Self {
        self.reporter = EventReporter::new(recorder);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// 默认等待预算；None 表示无限等待
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    /// 创建 Run 时是否随请求下发工具定义
    pub fn with_advertise_tools(mut self, advertise: bool) -> Self {
        self.advertise_tools = advertise;
        self
    }

    /// 写入一条用户消息并创建 Run（恰好一次 create_message 与一次 create_run）
    pub async fn submit(
        &self,
        conversation: &Conversation,
        user_text: &str,
    ) -> Result<Run, RunError> {
        self.add_user_turn(conversation, user_text).await?;

        let tools = if self.advertise_tools && self.executor.has_tools() {
            Some(self.executor.tool_definitions())
        } else {
            None
        };
        let run = self
            .client
            .create_run(
                conversation.thread_id(),
                conversation.assistant_id(),
                tools.as_deref(),
            )
            .await
            .map_err(|e| {
                tracing::warn!(
                    thread_id = conversation.thread_id(),
                    error = %e,
                    "run creation failed"
                );
                RunError::transport(Phase::Create, e)
            })?;

        tracing::info!(
            run_id = %run.id,
            thread_id = %run.thread_id,
            status = %run.status,
            "run created"
        );
        self.reporter.emit(RunEvent::RunCreated {
            run_id: run.id.clone(),
            thread_id: run.thread_id.clone(),
            status: run.status.to_string(),
        });
        Ok(run)
    }

    /// 驱动 Run 直到终态；对已终止的 Run 不发起任何网络调用
    pub async fn await_completion(&self, run: Run) -> Result<Run, RunError> {
        self.drive(run, self.max_wait).await
    }

    /// 带等待预算的 await_completion；预算只计算 queued / in_progress / cancelling 中的等待时间，
    /// 包括慢速的重新拉取
    pub async fn await_completion_within(
        &self,
        run: Run,
        budget: Duration,
    ) -> Result<Run, RunError> {
        self.drive(run, Some(budget)).await
    }

    /// submit + await_completion + 取最新 assistant 回复
    pub async fn converse(
        &self,
        conversation: &Conversation,
        user_text: &str,
    ) -> Result<TurnOutcome, RunError> {
        let run = self.submit(conversation, user_text).await?;
        let run = self.await_completion(run).await?;
        let reply = self.most_recent_assistant_turn(conversation).await?;
        Ok(TurnOutcome { run, reply })
    }

    pub async fn add_user_turn(
        &self,
        conversation: &Conversation,
        text: &str,
    ) -> Result<Message, RunError> {
        self.client
            .create_message(conversation.thread_id(), Role::User, text)
            .await
            .map_err(|e| RunError::transport(Phase::Create, e))
    }

    /// 按时间倒序列出消息，返回第一条 assistant 消息
    pub async fn most_recent_assistant_turn(
        &self,
        conversation: &Conversation,
    ) -> Result<Option<Message>, RunError> {
        let messages = self
            .client
            .list_messages(conversation.thread_id(), ListOrder::Desc)
            .await
            .map_err(|e| RunError::transport(Phase::Poll, e))?;
        Ok(messages.into_iter().find(|m| m.role == Role::Assistant))
    }

    /// 全部历史，按时间正序
    pub async fn transcript(&self, conversation: &Conversation) -> Result<Vec<Message>, RunError> {
        self.client
            .list_messages(conversation.thread_id(), ListOrder::Asc)
            .await
            .map_err(|e| RunError::transport(Phase::Poll, e))
    }

    async fn drive(&self, mut run: Run, budget: Option<Duration>) -> Result<Run, RunError> {
        let mut waited = Duration::ZERO;
        let mut last_status: Option<RunStatus> = None;
        // 本 Run 已回答过的调用 id，用于识别过期的 requires_action 快照
        let mut answered: HashSet<String> = HashSet::new();

        loop {
            if last_status.as_ref() != Some(&run.status) {
                tracing::debug!(run_id = %run.id, status = %run.status, "run status observed");
                self.reporter.emit(RunEvent::StatusChanged {
                    run_id: run.id.clone(),
                    from: last_status.as_ref().map(|s| s.to_string()),
                    to: run.status.to_string(),
                });
                last_status = Some(run.status.clone());
            }

            match next_step(&run) {
                PollStep::Complete => {
                    tracing::info!(run_id = %run.id, "run completed");
                    self.reporter.emit(RunEvent::RunCompleted {
                        run_id: run.id.clone(),
                    });
                    return Ok(run);
                }
                PollStep::Fail(err) => return Err(self.fail(&run.id, err)),
                PollStep::Act => {
                    let calls = run.tool_calls();
                    if !calls.is_empty() && calls.iter().all(|c| answered.contains(&c.id)) {
                        tracing::debug!(
                            run_id = %run.id,
                            "stale requires_action snapshot, polling again"
                        );
                        run = self.wait_and_fetch(&run, budget, &mut waited).await?;
                        continue;
                    }
                    let call_ids: Vec<String> = calls.iter().map(|c| c.id.clone()).collect();
                    tracing::info!(run_id = %run.id, calls = call_ids.len(), "run requires action");

                    let dispatcher = Dispatcher {
                        client: self.client.as_ref(),
                        executor: self.executor.as_ref(),
                        reporter: &self.reporter,
                        parallel: self.parallel_tool_calls,
                    };
                    match dispatcher.answer(&run).await {
                        Ok(next) => {
                            answered.extend(call_ids);
                            run = next;
                        }
                        Err(err) => return Err(self.fail(&run.id, err)),
                    }
                }
                PollStep::WaitCancelling => {
                    tracing::info!(run_id = %run.id, "run is being cancelled remotely");
                    run = self.wait_and_fetch(&run, budget, &mut waited).await?;
                }
                PollStep::Wait => {
                    run = self.wait_and_fetch(&run, budget, &mut waited).await?;
                }
            }
        }
    }

    /// 等待一个轮询间隔后重新拉取；睡眠与拉取共用剩余预算，超出时返回 Timeout（不触碰远端 Run）
    async fn wait_and_fetch(
        &self,
        run: &Run,
        budget: Option<Duration>,
        waited: &mut Duration,
    ) -> Result<Run, RunError> {
        let remaining = match budget {
            Some(budget) if *waited >= budget => return Err(self.timed_out(run, budget)),
            Some(budget) => Some((budget, budget - *waited)),
            None => None,
        };
        let pause = remaining.map_or(self.poll_interval, |(_, r)| self.poll_interval.min(r));

        let start = Instant::now();
        let poll = async {
            tokio::time::sleep(pause).await;
            tracing::trace!(run_id = %run.id, "polling run");
            self.client.retrieve_run(&run.thread_id, &run.id).await
        };
        let fetched = match remaining {
            Some((budget, remaining)) => tokio::time::timeout(remaining, poll)
                .await
                .map_err(|_| self.timed_out(run, budget))?,
            None => poll.await,
        };
        *waited += start.elapsed();

        let next = fetched.map_err(|e| self.fail(&run.id, RunError::transport(Phase::Poll, e)))?;
        RunError::ensure_same_run(&run.id, &next.id, Phase::Poll)
            .map_err(|err| self.fail(&run.id, err))?;
        Ok(next)
    }

    fn timed_out(&self, run: &Run, budget: Duration) -> RunError {
        self.fail(
            &run.id,
            RunError::Timeout {
                run_id: run.id.clone(),
                budget,
            },
        )
    }

    fn fail(&self, run_id: &str, err: RunError) -> RunError {
        tracing::warn!(run_id, phase = %err.phase(), error = %err, "run terminated with error");
        self.reporter.emit(RunEvent::RunErrored {
            run_id: run_id.to_string(),
            phase: err.phase().to_string(),
            error_kind: err.kind().to_string(),
            message: err.to_string(),
        });
        err
    }
}
