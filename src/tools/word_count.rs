//! word_count 工具：统计文本中的单词数（连续的字母、数字或下划线算一个词）

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::{parameters_schema, parse_args};
use crate::tools::Tool;

#[derive(Deserialize, JsonSchema)]
struct WordCountArgs {
    /// 需要统计的文本
    text: String,
}

pub struct WordCountTool;

/// 与 `\w+` 分词一致
pub fn word_count(text: &str) -> usize {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .count()
}

#[async_trait]
impl Tool for WordCountTool {
    fn name(&self) -> &str {
        "word_count"
    }

    fn description(&self) -> &str {
        "Count the number of words in a text."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<WordCountArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: WordCountArgs = parse_args(args)?;
        Ok(Value::from(word_count(&args.text)))
    }
}
