//! Run 生命周期事件与 Transcript Recorder
//!
//! 编排器在每次状态变化、工具调用派发、工具结果产出、输出提交与终止失败时发出 RunEvent。
//! Recorder 只做记录，返回的错误由编排器打 warn 日志后丢弃，永远不影响控制流。

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// 工具结果预览最大字符数
const OUTPUT_PREVIEW_CHARS: usize = 200;

/// 单条生命周期事件（序列化后 `kind` 字段为事件类型）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    /// 用户消息已写入、Run 已创建
    RunCreated {
        run_id: String,
        thread_id: String,
        status: String,
    },
    /// 轮询观察到状态变化（from 为 None 表示第一次观察）
    StatusChanged {
        run_id: String,
        from: Option<String>,
        to: String,
    },
    /// 派发一个工具调用
    ToolCallDispatched {
        run_id: String,
        call_id: String,
        tool: String,
        arguments: Value,
    },
    /// 工具返回（预览，避免过长）
    ToolResultProduced {
        run_id: String,
        call_id: String,
        tool: String,
        ok: bool,
        preview: String,
    },
    /// 整批工具输出已提交
    OutputsSubmitted {
        run_id: String,
        count: usize,
        status: String,
    },
    /// Run 到达 completed
    RunCompleted { run_id: String },
    /// 终止性失败
    RunErrored {
        run_id: String,
        phase: String,
        error_kind: String,
        message: String,
    },
}

impl RunEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::RunCreated { .. } => "run_created",
            RunEvent::StatusChanged { .. } => "status_changed",
            RunEvent::ToolCallDispatched { .. } => "tool_call_dispatched",
            RunEvent::ToolResultProduced { .. } => "tool_result_produced",
            RunEvent::OutputsSubmitted { .. } => "outputs_submitted",
            RunEvent::RunCompleted { .. } => "run_completed",
            RunEvent::RunErrored { .. } => "run_errored",
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            RunEvent::RunCreated { run_id, .. }
            | RunEvent::StatusChanged { run_id, .. }
            | RunEvent::ToolCallDispatched { run_id, .. }
            | RunEvent::ToolResultProduced { run_id, .. }
            | RunEvent::OutputsSubmitted { run_id, .. }
            | RunEvent::RunCompleted { run_id }
            | RunEvent::RunErrored { run_id, .. } => run_id,
        }
    }
}

/// 截断过长的输出用于预览
pub fn preview(text: &str) -> String {
    if text.chars().count() > OUTPUT_PREVIEW_CHARS {
        format!("{}...", text.chars().take(OUTPUT_PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Recorder unavailable: {0}")]
    Unavailable(String),

    #[error("Event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Transcript Recorder 边界：接收生命周期事件，fire-and-forget
pub trait TranscriptRecorder: Send + Sync {
    fn record(&self, event: &RunEvent) -> Result<(), RecorderError>;
}

/// 编排器持有的事件出口：Recorder 出错时打 warn 日志并丢弃
#[derive(Clone)]
pub struct EventReporter {
    recorder: Arc<dyn TranscriptRecorder>,
}

impl EventReporter {
    pub fn new(recorder: Arc<dyn TranscriptRecorder>) -> Self {
        Self { recorder }
    }

    pub fn emit(&self, event: RunEvent) {
        if let Err(e) = self.recorder.record(&event) {
            tracing::warn!(
                kind = event.kind(),
                run_id = event.run_id(),
                error = %e,
                "transcript recorder failed, event dropped"
            );
        }
    }
}

impl Default for EventReporter {
    fn default() -> Self {
        Self::new(Arc::new(TracingRecorder))
    }
}

/// 默认 Recorder：每个事件输出一条结构化 tracing 日志（JSON）
#[derive(Debug, Default)]
pub struct TracingRecorder;

impl TranscriptRecorder for TracingRecorder {
    fn record(&self, event: &RunEvent) -> Result<(), RecorderError> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(
            target: "runhive::transcript",
            kind = event.kind(),
            run_id = event.run_id(),
            event = %payload,
            "run event"
        );
        Ok(())
    }
}

/// 推送到 mpsc 通道的 Recorder（供 UI / SSE 等前端消费）；接收端关闭后记录失败
pub struct ChannelRecorder {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelRecorder {
    pub fn new(tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self { tx }
    }

    /// 创建 Recorder 与对应的接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl TranscriptRecorder for ChannelRecorder {
    fn record(&self, event: &RunEvent) -> Result<(), RecorderError> {
        self.tx
            .send(event.clone())
            .map_err(|_| RecorderError::Unavailable("event receiver dropped".to_string()))
    }
}

/// 内存 Recorder：保存全部事件（测试与调试用）
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<RunEvent>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(RunEvent::kind).collect()
    }
}

impl TranscriptRecorder for MemoryRecorder {
    fn record(&self, event: &RunEvent) -> Result<(), RecorderError> {
        self.events
            .lock()
            .map_err(|_| RecorderError::Unavailable("event buffer poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = RunEvent::StatusChanged {
            run_id: "run_1".into(),
            from: Some("queued".into()),
            to: "in_progress".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "status_changed");
        assert_eq!(json["to"], "in_progress");
        assert_eq!(event.kind(), "status_changed");
    }

    #[test]
    fn test_channel_recorder_reports_dropped_receiver() {
        let (recorder, rx) = ChannelRecorder::channel();
        let event = RunEvent::RunCompleted {
            run_id: "run_1".into(),
        };
        assert!(recorder.record(&event).is_ok());
        drop(rx);
        assert!(matches!(
            recorder.record(&event),
            Err(RecorderError::Unavailable(_))
        ));
    }

    #[test]
    fn test_memory_recorder_keeps_order() {
        let recorder = MemoryRecorder::new();
        recorder
            .record(&RunEvent::RunCompleted { run_id: "a".into() })
            .unwrap();
        recorder
            .record(&RunEvent::OutputsSubmitted {
                run_id: "a".into(),
                count: 2,
                status: "queued".into(),
            })
            .unwrap();
        assert_eq!(recorder.kinds(), vec!["run_completed", "outputs_submitted"]);
    }

    #[test]
    fn test_reporter_swallows_recorder_errors() {
        let (recorder, rx) = ChannelRecorder::channel();
        drop(rx);
        let reporter = EventReporter::new(Arc::new(recorder));
        reporter.emit(RunEvent::RunCompleted {
            run_id: "run_1".into(),
        });
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert!(preview(&long).ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
