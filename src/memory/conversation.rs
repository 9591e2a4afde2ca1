//! 消息模型：角色、内容块与工具调用
//!
//! 内容既可能是纯文本，也可能是有序的内容块序列（text / thinking / tool_use）；
//! 展示与路由只看 text 块，thinking 块一律丢弃。

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Agent,
    System,
}

/// 单个内容块（与 Anthropic 风格的 content blocks 对齐）
///
/// text / thinking / tool_use 按 `type` 标签解析；其它类型原样保存在 `Other` 中，
/// 序列化时写回同一份 JSON，检查点往返不丢结构。
#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// 推理过程，不参与展示与路由
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: Option<String>,
        name: String,
        input: Value,
    },
    /// 未识别的块（如 image），渲染时忽略
    Other(Value),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownBlockRef<'a> {
    Text {
        text: &'a str,
    },
    Thinking {
        thinking: &'a str,
    },
    ToolUse {
        id: &'a Option<String>,
        name: &'a str,
        input: &'a Value,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: Value,
    },
}

impl From<KnownBlock> for ContentBlock {
    fn from(block: KnownBlock) -> Self {
        match block {
            KnownBlock::Text { text } => ContentBlock::Text { text },
            KnownBlock::Thinking { thinking } => ContentBlock::Thinking { thinking },
            KnownBlock::ToolUse { id, name, input } => ContentBlock::ToolUse { id, name, input },
        }
    }
}

impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentBlock::Text { text } => KnownBlockRef::Text { text }.serialize(serializer),
            ContentBlock::Thinking { thinking } => {
                KnownBlockRef::Thinking { thinking }.serialize(serializer)
            }
            ContentBlock::ToolUse { id, name, input } => {
                KnownBlockRef::ToolUse { id, name, input }.serialize(serializer)
            }
            ContentBlock::Other(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if !raw.is_object() {
            return Err(de::Error::custom("content block must be a JSON object"));
        }
        match raw.get("type").and_then(Value::as_str) {
            Some("text" | "thinking" | "tool_use") => KnownBlock::deserialize(raw)
                .map(ContentBlock::from)
                .map_err(de::Error::custom),
            _ => Ok(ContentBlock::Other(raw)),
        }
    }
}

/// 消息内容：纯文本、内容块序列，或无法识别的其它 JSON（渲染为空串）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Other(Value),
}

impl Content {
    /// 渲染为纯文本：按顺序拼接所有 text 块，其余块丢弃
    pub fn render(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            Content::Other(_) => String::new(),
        }
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

/// 工具调用：名称 + 参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// 发出该消息的智能体名（Planner / Coder / Reviewer）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            name: None,
        }
    }

    pub fn human(content: impl Into<Content>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn agent(content: impl Into<Content>) -> Self {
        Self::new(Role::Agent, content)
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// 展示/路由用文本（thinking 等非 text 块已丢弃）
    pub fn text(&self) -> String {
        self.content.render()
    }

    pub fn is_human(&self) -> bool {
        self.role == Role::Human
    }
}
