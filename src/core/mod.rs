//! 核心编排层：错误类型、状态机、参数修复、工具派发、事件上报、会话句柄与 Run 编排器

pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod repair;
pub mod state;

pub use conversation::Conversation;
pub use dispatch::{build_batch, Dispatcher, ToolResult};
pub use error::{Phase, RunError, ToolInvocationError};
pub use events::{
    ChannelRecorder, EventReporter, MemoryRecorder, RecorderError, RunEvent, TracingRecorder,
    TranscriptRecorder,
};
pub use orchestrator::{RunOrchestrator, TurnOutcome, DEFAULT_POLL_INTERVAL};
pub use repair::{parse_arguments, repair_truncated};
pub use state::{next_step, PollStep};
