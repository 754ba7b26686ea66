//! runhive - 远端 Assistant 服务的 Run 编排
//!
//! 模块划分：
//! - **agent**: 无头运行时（从配置构建客户端与编排器，复用/新建 Assistant 与线程）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: Run 状态机、工具调用派发、参数修复、事件上报、会话句柄
//! - **llm**: 远端 Assistant 客户端抽象与实现（OpenAI HTTP / Scripted Mock）
//! - **observability**: tracing 订阅器
//! - **tools**: 工具注册表、执行器与内置工具（echo、word_count）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod tools;
