//! Run 状态机：轮询到的状态 → 下一步动作
//!
//! next_step 是纯函数，不做任何 I/O；orchestrator 负责执行它给出的动作（等待、派发、返回、失败）。

use crate::core::{Phase, RunError};
use crate::llm::{Run, RunFailure, RunStatus};

/// 对一次轮询结果应采取的动作
#[derive(Debug)]
pub enum PollStep {
    /// queued / in_progress：等待一个轮询间隔后重新拉取
    Wait,
    /// cancelling：同样等待，但需记录（仅提示性）
    WaitCancelling,
    /// requires_action：执行一轮工具调用并提交输出
    Act,
    /// completed：返回 Run
    Complete,
    /// failed / cancelled / expired / 未知状态：终止并返回错误
    Fail(RunError),
}

/// 根据 Run 当前状态给出下一步动作
pub fn next_step(run: &Run) -> PollStep {
    match &run.status {
        RunStatus::Queued | RunStatus::InProgress => PollStep::Wait,
        RunStatus::Cancelling => PollStep::WaitCancelling,
        RunStatus::RequiresAction => PollStep::Act,
        RunStatus::Completed => PollStep::Complete,
        RunStatus::Failed => PollStep::Fail(RunError::RunFailed {
            run_id: run.id.clone(),
            failure: run.last_error.clone().unwrap_or_else(|| RunFailure {
                code: None,
                message: "run failed without error detail".to_string(),
            }),
        }),
        RunStatus::Cancelled => PollStep::Fail(RunError::Cancelled {
            run_id: run.id.clone(),
        }),
        RunStatus::Expired => PollStep::Fail(RunError::Expired {
            run_id: run.id.clone(),
        }),
        RunStatus::Other(status) => PollStep::Fail(RunError::ProtocolViolation {
            run_id: run.id.clone(),
            phase: Phase::Poll,
            reason: format!("unexpected run status '{status}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: RunStatus) -> Run {
        Run::snapshot("run_1", "thread_1", status)
    }

    #[test]
    fn test_waiting_states() {
        assert!(matches!(next_step(&run(RunStatus::Queued)), PollStep::Wait));
        assert!(matches!(next_step(&run(RunStatus::InProgress)), PollStep::Wait));
        assert!(matches!(
            next_step(&run(RunStatus::Cancelling)),
            PollStep::WaitCancelling
        ));
    }

    #[test]
    fn test_action_and_completion() {
        assert!(matches!(next_step(&run(RunStatus::RequiresAction)), PollStep::Act));
        assert!(matches!(next_step(&run(RunStatus::Completed)), PollStep::Complete));
    }

    #[test]
    fn test_failed_carries_remote_error() {
        let failed = run(RunStatus::InProgress).with_failure(RunFailure {
            code: None,
            message: "overloaded".into(),
        });
        match next_step(&failed) {
            PollStep::Fail(RunError::RunFailed { failure, .. }) => {
                assert_eq!(failure.message, "overloaded");
            }
            other => panic!("Expected RunFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_without_detail() {
        match next_step(&run(RunStatus::Failed)) {
            PollStep::Fail(RunError::RunFailed { failure, .. }) => {
                assert!(!failure.message.is_empty());
            }
            other => panic!("Expected RunFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_and_expired_are_distinct() {
        assert!(matches!(
            next_step(&run(RunStatus::Cancelled)),
            PollStep::Fail(RunError::Cancelled { .. })
        ));
        assert!(matches!(
            next_step(&run(RunStatus::Expired)),
            PollStep::Fail(RunError::Expired { .. })
        ));
    }

    #[test]
    fn test_unknown_status_is_protocol_violation() {
        match next_step(&run(RunStatus::Other("weird".into()))) {
            PollStep::Fail(RunError::ProtocolViolation { phase, reason, .. }) => {
                assert_eq!(phase, Phase::Poll);
                assert!(reason.contains("weird"));
            }
            other => panic!("Expected ProtocolViolation, got {other:?}"),
        }
    }
}
