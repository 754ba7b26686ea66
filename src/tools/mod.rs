//! 工具箱：Tool trait 与注册表、带超时的执行器、参数 schema 生成，以及内置的 echo / word_count

pub mod echo;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod word_count;

pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use schema::{parameters_schema, parse_args};
pub use word_count::WordCountTool;
