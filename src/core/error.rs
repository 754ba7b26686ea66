//! Run 编排错误类型
//!
//! RunError 是调用方可见的终止性失败，按阶段（Create / Poll / Dispatch / Submit）归类，
//! 取消、过期、协议违规各有独立变体，调用方无需匹配字符串。
//! ToolInvocationError 只描述单个工具调用的失败，会写进该调用的输出，不会中断本轮。

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::llm::{ClientError, RunFailure};

/// 失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 写入用户消息、创建 Run
    Create,
    /// 轮询 Run 状态
    Poll,
    /// 解析参数、解析工具名
    Dispatch,
    /// 提交工具输出
    Submit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Create => "create",
            Phase::Poll => "poll",
            Phase::Dispatch => "dispatch",
            Phase::Submit => "submit",
        })
    }
}

/// Run 编排过程中的终止性错误
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Run {run_id} failed: {failure}")]
    RunFailed { run_id: String, failure: RunFailure },

    #[error("Run {run_id} was cancelled")]
    Cancelled { run_id: String },

    #[error("Run {run_id} expired")]
    Expired { run_id: String },

    #[error("Protocol violation in run {run_id} during {phase}: {reason}")]
    ProtocolViolation {
        run_id: String,
        phase: Phase,
        reason: String,
    },

    #[error("Unparseable arguments for tool call {call_id} ({tool}): {reason}")]
    ArgumentParse {
        call_id: String,
        tool: String,
        reason: String,
    },

    #[error("Unknown tool: {name} (call {call_id})")]
    UnknownTool { call_id: String, name: String },

    #[error("Run {run_id} did not settle within {budget:?}")]
    Timeout { run_id: String, budget: Duration },

    #[error("Transport error during {phase}: {source}")]
    Transport {
        phase: Phase,
        #[source]
        source: ClientError,
    },
}

impl RunError {
    pub fn transport(phase: Phase, source: ClientError) -> Self {
        RunError::Transport { phase, source }
    }

    /// 远端返回的快照必须属于同一个 Run
    pub fn ensure_same_run(expected: &str, actual: &str, phase: Phase) -> Result<(), RunError> {
        if expected == actual {
            return Ok(());
        }
        Err(RunError::ProtocolViolation {
            run_id: expected.to_string(),
            phase,
            reason: format!("run id changed from {expected} to {actual}"),
        })
    }

    /// 失败所在阶段
    pub fn phase(&self) -> Phase {
        match self {
            RunError::RunFailed { .. }
            | RunError::Cancelled { .. }
            | RunError::Expired { .. }
            | RunError::Timeout { .. } => Phase::Poll,
            RunError::ProtocolViolation { phase, .. } | RunError::Transport { phase, .. } => *phase,
            RunError::ArgumentParse { .. } | RunError::UnknownTool { .. } => Phase::Dispatch,
        }
    }

    /// 事件日志中使用的短名
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::RunFailed { .. } => "run_failed",
            RunError::Cancelled { .. } => "cancelled",
            RunError::Expired { .. } => "expired",
            RunError::ProtocolViolation { .. } => "protocol_violation",
            RunError::ArgumentParse { .. } => "argument_parse_error",
            RunError::UnknownTool { .. } => "unknown_tool",
            RunError::Timeout { .. } => "timeout",
            RunError::Transport { .. } => "transport",
        }
    }
}

/// 单个工具调用的失败（被捕获进 ToolResult，不会中断本轮）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocationError {
    #[error("{0}")]
    Failed(String),

    #[error("tool timed out after {0:?}")]
    TimedOut(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_of_each_variant() {
        let failure = RunFailure {
            code: None,
            message: "overloaded".into(),
        };
        assert_eq!(
            RunError::RunFailed {
                run_id: "r".into(),
                failure
            }
            .phase(),
            Phase::Poll
        );
        assert_eq!(
            RunError::UnknownTool {
                call_id: "c".into(),
                name: "x".into()
            }
            .phase(),
            Phase::Dispatch
        );
        assert_eq!(
            RunError::transport(Phase::Submit, ClientError::network("reset")).phase(),
            Phase::Submit
        );
        assert_eq!(
            RunError::ProtocolViolation {
                run_id: "r".into(),
                phase: Phase::Dispatch,
                reason: "empty".into()
            }
            .phase(),
            Phase::Dispatch
        );
    }

    #[test]
    fn test_run_id_change_is_a_protocol_violation() {
        assert!(RunError::ensure_same_run("run_1", "run_1", Phase::Poll).is_ok());
        let err = RunError::ensure_same_run("run_1", "run_2", Phase::Submit).unwrap_err();
        assert_eq!(err.phase(), Phase::Submit);
        assert_eq!(err.kind(), "protocol_violation");
        assert!(err.to_string().contains("run_2"));
    }

    #[test]
    fn test_display_carries_remote_detail() {
        let err = RunError::RunFailed {
            run_id: "run_1".into(),
            failure: RunFailure {
                code: Some("server_error".into()),
                message: "overloaded".into(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("overloaded"));
        assert!(text.contains("server_error"));
    }
}
