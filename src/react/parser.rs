//! 模型输出解析：区分工具调用与最终回复
//!
//! 工具调用格式为 `{"tool": "cat", "args": {"path": "..."}}`，可以包在 ```json 围栏里。
//! 只有候选 JSON 中出现 "tool" 键时才视为工具调用尝试；代码片段里的花括号不会被误判。

use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::memory::ToolCall;

#[derive(Debug, Deserialize)]
struct RawToolCall {
    tool: String,
    #[serde(default)]
    args: Value,
}

/// 单次模型输出的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    /// 最终回复（不含工具调用）
    Final,
    ToolCall(ToolCall),
}

/// 取出候选 JSON：优先 ```json 围栏，其次首个 '{' 到最后一个 '}'
fn json_candidate(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        return Some(rest.find("```").map_or(rest, |end| &rest[..end]).trim());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 解析模型输出；像工具调用但 JSON 不合法时返回 JsonParseError
pub fn parse_llm_output(output: &str) -> Result<AgentOutput, AgentError> {
    let trimmed = output.trim();
    let Some(candidate) = json_candidate(trimmed) else {
        return Ok(AgentOutput::Final);
    };
    if !candidate.contains("\"tool\"") {
        return Ok(AgentOutput::Final);
    }

    let parsed: RawToolCall = serde_json::from_str(candidate)
        .map_err(|e| AgentError::JsonParseError(format!("{e}: {candidate}")))?;
    let name = parsed.tool.trim();
    if name.is_empty() {
        return Ok(AgentOutput::Final);
    }
    let args = if parsed.args.is_null() {
        Value::Object(Default::default())
    } else {
        parsed.args
    };
    Ok(AgentOutput::ToolCall(ToolCall {
        name: name.to_string(),
        args,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_reply_is_final() {
        assert_eq!(
            parse_llm_output("Here is the plan: step 1").unwrap(),
            AgentOutput::Final
        );
        // 代码里的花括号不是工具调用
        assert_eq!(
            parse_llm_output("I have implemented the code:\nfn main() { println!(\"hi\"); }")
                .unwrap(),
            AgentOutput::Final
        );
    }

    #[test]
    fn test_tool_call_bare_and_fenced() {
        let bare = parse_llm_output(r#"{"tool": "cat", "args": {"path": "src/lib.rs"}}"#).unwrap();
        assert_eq!(
            bare,
            AgentOutput::ToolCall(ToolCall {
                name: "cat".into(),
                args: json!({"path": "src/lib.rs"})
            })
        );

        let fenced = parse_llm_output(
            "Let me look first.\n```json\n{\"tool\": \"ls\"}\n```",
        )
        .unwrap();
        assert!(matches!(fenced, AgentOutput::ToolCall(ref c) if c.name == "ls" && c.args == json!({})));
    }

    #[test]
    fn test_malformed_tool_call_is_error() {
        let err = parse_llm_output(r#"{"tool": "cat", "args": {"path": }"#).unwrap_err();
        assert!(matches!(err, AgentError::JsonParseError(_)));
    }

    #[test]
    fn test_empty_tool_name_is_final() {
        assert_eq!(
            parse_llm_output(r#"{"tool": "", "args": {}}"#).unwrap(),
            AgentOutput::Final
        );
    }
}
