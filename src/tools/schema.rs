//! 工具参数：schemars 生成 JSON Schema（供清单展示），按参数类型反序列化做校验

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ToolError;

/// 由参数类型生成 JSON Schema
pub fn parameters_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Bool(true))
}

/// 参数能否反序列化为 `T`；Err 为违例描述
pub fn check_params<T: DeserializeOwned>(params: &Value) -> Result<(), String> {
    T::deserialize(params).map(|_| ()).map_err(|e| e.to_string())
}

/// 反序列化为 `T`，失败映射为 InvalidParams
pub fn parse_params<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParams {
        tool: tool.to_string(),
        detail: e.to_string(),
    })
}
