//! 工具调用派发：一轮 requires_action 的完整处理
//!
//! 先对全部调用做参数解析（含截断修复）与工具名解析，任何一项失败则整轮中止、不调用任何工具；
//! 然后并行（或顺序）执行，结果按调用顺序组装成一批输出，只提交一次。

use std::collections::HashMap;

use futures_util::future::join_all;
use serde_json::Value;

use crate::core::events::{preview, EventReporter, RunEvent};
use crate::core::repair::parse_arguments;
use crate::core::{Phase, RunError, ToolInvocationError};
use crate::llm::{AssistantClient, Run, ToolCall, ToolOutput};
use crate::tools::ToolExecutor;

/// 单个工具调用的结果；失败被捕获在 outcome 中
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool: String,
    pub outcome: Result<Value, ToolInvocationError>,
}

impl ToolResult {
    /// 输出文本：成功为 JSON 序列化结果，失败为 `{"error": "<reason>"}`
    pub fn output_text(&self) -> String {
        match &self.outcome {
            Ok(value) => value.to_string(),
            Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
        }
    }
}

/// 参数已解析、工具已确认存在的调用
#[derive(Debug)]
struct PreparedCall<'a> {
    call: &'a ToolCall,
    args: Value,
}

/// 处理一轮 requires_action 所需的依赖（均为借用，每轮构造一次）
pub struct Dispatcher<'a> {
    pub client: &'a dyn AssistantClient,
    pub executor: &'a ToolExecutor,
    pub reporter: &'a EventReporter,
    pub parallel: bool,
}

impl Dispatcher<'_> {
    /// 回答 Run 当前请求的全部工具调用，返回提交后远端给出的新快照
    pub async fn answer(&self, run: &Run) -> Result<Run, RunError> {
        let calls = run.tool_calls();
        if calls.is_empty() {
            return Err(RunError::ProtocolViolation {
                run_id: run.id.clone(),
                phase: Phase::Dispatch,
                reason: "requires_action without tool calls".to_string(),
            });
        }

        let prepared = self.prepare(calls)?;
        for p in &prepared {
            self.reporter.emit(RunEvent::ToolCallDispatched {
                run_id: run.id.clone(),
                call_id: p.call.id.clone(),
                tool: p.call.name.clone(),
                arguments: p.args.clone(),
            });
        }

        let results = self.invoke(prepared).await;
        for r in &results {
            self.reporter.emit(RunEvent::ToolResultProduced {
                run_id: run.id.clone(),
                call_id: r.call_id.clone(),
                tool: r.tool.clone(),
                ok: r.outcome.is_ok(),
                preview: preview(&r.output_text()),
            });
        }

        let batch = build_batch(&run.id, calls, &results)?;
        tracing::info!(run_id = %run.id, outputs = batch.len(), "submitting tool outputs");
        let next = self
            .client
            .submit_tool_outputs(&run.thread_id, &run.id, &batch)
            .await
            .map_err(|e| RunError::transport(Phase::Submit, e))?;
        RunError::ensure_same_run(&run.id, &next.id, Phase::Submit)?;

        self.reporter.emit(RunEvent::OutputsSubmitted {
            run_id: run.id.clone(),
            count: batch.len(),
            status: next.status.to_string(),
        });
        Ok(next)
    }

    /// 解析参数并确认工具存在；遇到第一个失败即中止
    fn prepare<'c>(&self, calls: &'c [ToolCall]) -> Result<Vec<PreparedCall<'c>>, RunError> {
        calls
            .iter()
            .map(|call| -> Result<PreparedCall<'c>, RunError> {
                let args = parse_arguments(&call.arguments).map_err(|reason| {
                    RunError::ArgumentParse {
                        call_id: call.id.clone(),
                        tool: call.name.clone(),
                        reason,
                    }
                })?;
                if !self.executor.contains(&call.name) {
                    return Err(RunError::UnknownTool {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                    });
                }
                Ok(PreparedCall { call, args })
            })
            .collect()
    }

    async fn invoke(&self, prepared: Vec<PreparedCall<'_>>) -> Vec<ToolResult> {
        if self.parallel {
            join_all(prepared.into_iter().map(|p| self.invoke_one(p))).await
        } else {
            let mut results = Vec::with_capacity(prepared.len());
            for p in prepared {
                results.push(self.invoke_one(p).await);
            }
            results
        }
    }

    async fn invoke_one(&self, prepared: PreparedCall<'_>) -> ToolResult {
        let PreparedCall { call, args } = prepared;
        tracing::debug!(call_id = %call.id, tool = %call.name, "invoking tool");
        let outcome = self.executor.execute(&call.name, args).await;
        if let Err(e) = &outcome {
            tracing::warn!(call_id = %call.id, tool = %call.name, error = %e, "tool call failed");
        }
        ToolResult {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            outcome,
        }
    }
}

/// 按调用顺序组装输出批次，每个调用 id 恰好出现一次
pub fn build_batch(
    run_id: &str,
    calls: &[ToolCall],
    results: &[ToolResult],
) -> Result<Vec<ToolOutput>, RunError> {
    let by_id: HashMap<&str, &ToolResult> =
        results.iter().map(|r| (r.call_id.as_str(), r)).collect();
    calls
        .iter()
        .map(|call| -> Result<ToolOutput, RunError> {
            let result = by_id.get(call.id.as_str()).ok_or_else(|| RunError::ProtocolViolation {
                run_id: run_id.to_string(),
                phase: Phase::Submit,
                reason: format!("no result produced for tool call {}", call.id),
            })?;
            Ok(ToolOutput {
                tool_call_id: call.id.clone(),
                output: result.output_text(),
            })
        })
        .collect()
}
