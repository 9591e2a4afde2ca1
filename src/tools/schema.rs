//! 工具调用格式的 JSON Schema（schemars 生成），拼入专家的 system prompt

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 合法的工具调用：`{"tool": "...", "args": {...}}`（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，必须是当前专家可用的工具之一
    pub tool: String,
    /// 工具参数对象，字段依工具而定
    pub args: serde_json::Map<String, Value>,
}

pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
