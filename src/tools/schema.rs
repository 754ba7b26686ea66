//! 工具参数 JSON Schema 生成（schemars 从参数结构体自动生成）
//!
//! 每个工具用一个 `#[derive(Deserialize, JsonSchema)]` 的参数结构体描述入参，
//! 同一结构体既用于生成下发给远端的 schema，也用于解析远端传回的参数。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 返回参数结构体的 JSON Schema（去掉 $schema / title 等远端不需要的顶层字段）
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// 将 JSON 参数解析为工具的参数结构体，失败信息可直接作为工具错误输出
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Debug, Deserialize, JsonSchema)]
    struct PackageArgs {
        /// 要查询的包名
        package_names: Vec<String>,
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = parameters_schema::<PackageArgs>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["package_names"]["type"], "array");
        assert_eq!(schema["required"][0], "package_names");
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn test_parse_args_error_message() {
        let err = parse_args::<PackageArgs>(serde_json::json!({"names": []})).unwrap_err();
        assert!(err.contains("package_names"));
    }
}
