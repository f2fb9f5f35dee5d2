//! Cursor bubble records and the two composer schemas that carry them

use serde_json::Value;

use crate::aggregate::RawMessage;
use crate::model::Role;
use crate::reader::{parse_timestamp, MIN_VALID_TIMESTAMP_MS};
use crate::text::coerce_text;
use crate::text::paths::normalize_path;

/// A code block attached to a bubble
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub file_path: String,
    pub content: String,
    pub language_id: String,
    pub codeblock_id: String,
}

/// One message, converged from either schema
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bubble {
    pub id: String,
    /// 1 = user, 2 = assistant, anything else is ignored
    pub kind: i64,
    pub text: String,
    pub thinking: String,
    pub thinking_ms: Option<i64>,
    pub tool_name: Option<String>,
    pub model_name: Option<String>,
    pub timestamp_ms: Option<i64>,
    pub code_blocks: Vec<CodeBlock>,
}

impl Bubble {
    pub fn parse(id: &str, data: &Value) -> Self {
        let tool_name = data
            .pointer("/toolFormerData/name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from);
        let model_name = data
            .pointer("/modelInfo/modelName")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from);
        let code_blocks = data
            .get("codeBlocks")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter(|b| b.is_object())
            .map(parse_code_block)
            .collect();

        Bubble {
            id: id.to_string(),
            kind: data.get("type").and_then(|v| v.as_i64()).unwrap_or(0),
            text: data.get("text").map(coerce_text).unwrap_or_default().trim().to_string(),
            thinking: data.get("thinking").map(coerce_text).unwrap_or_default().trim().to_string(),
            thinking_ms: data
                .get("thinkingDurationMs")
                .and_then(|v| v.as_i64())
                .filter(|ms| *ms > 0),
            tool_name,
            model_name,
            timestamp_ms: bubble_timestamp(data),
            code_blocks,
        }
    }

    /// Placeholder for a header whose bubble row is missing
    pub fn from_header(id: &str, header: &Value) -> Self {
        Bubble {
            id: id.to_string(),
            kind: header.get("type").and_then(|v| v.as_i64()).unwrap_or(0),
            ..Default::default()
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self.kind {
            1 => Some(Role::User),
            2 => Some(Role::Assistant),
            _ => None,
        }
    }

    /// Aggregator input. The bubble id doubles as the request id.
    pub fn to_message(&self) -> Option<RawMessage> {
        let role = self.role()?;
        let mut msg = RawMessage::new(role);
        msg.text = self.text.clone();
        msg.thinking = self.thinking.clone();
        msg.thinking_ms = self.thinking_ms;
        msg.tools = self.tool_name.iter().cloned().collect();
        msg.timestamp_ms = self.timestamp_ms;
        msg.request_id = Some(self.id.clone());
        if role == Role::Assistant {
            msg.model_id = self.model_name.clone();
        }
        Some(msg)
    }
}

fn parse_code_block(block: &Value) -> CodeBlock {
    let str_field = |v: &Value, key: &str| v.get(key).and_then(|s| s.as_str()).unwrap_or("").to_string();
    let path = block
        .get("uri")
        .and_then(|uri| {
            ["fsPath", "path", "_fsPath"]
                .iter()
                .find_map(|k| uri.get(*k).and_then(|v| v.as_str()).filter(|s| !s.is_empty()))
        })
        .map(normalize_path)
        .unwrap_or_default();
    CodeBlock {
        file_path: path,
        content: str_field(block, "content"),
        language_id: str_field(block, "languageId"),
        codeblock_id: str_field(block, "codeblockId"),
    }
}

/// `createdAt`, then the client send and end times. Pre-2020 values are rejected.
fn bubble_timestamp(data: &Value) -> Option<i64> {
    ["/createdAt", "/timingInfo/clientRpcSendTime", "/timingInfo/clientEndTime"]
        .iter()
        .filter_map(|p| data.pointer(p))
        .filter_map(parse_timestamp)
        .find(|ms| *ms >= MIN_VALID_TIMESTAMP_MS)
}

/// Where a composer keeps its bubbles
#[derive(Debug, Clone, PartialEq)]
pub enum Conversation<'a> {
    /// `fullConversationHeadersOnly`: bubble rows are fetched by key
    Headers(&'a [Value]),
    /// `conversation`: bubbles are stored inline
    Inline(&'a [Value]),
}

impl<'a> Conversation<'a> {
    /// Headers win when both are present and non-empty
    pub fn detect(composer: &'a Value) -> Option<Self> {
        let non_empty = |key: &str| {
            composer
                .get(key)
                .and_then(|v| v.as_array())
                .filter(|a| !a.is_empty())
                .map(|a| a.as_slice())
        };
        non_empty("fullConversationHeadersOnly")
            .map(Conversation::Headers)
            .or_else(|| non_empty("conversation").map(Conversation::Inline))
    }

    /// Resolve every entry into a bubble. `fetch` loads a bubble row by id.
    pub fn bubbles(&self, fetch: impl Fn(&str) -> Option<Value>) -> Vec<Bubble> {
        let bubble_id = |v: &Value| {
            v.get("bubbleId")
                .and_then(|id| id.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        match self {
            Conversation::Headers(headers) => headers
                .iter()
                .filter_map(|h| {
                    let id = bubble_id(h)?;
                    Some(match fetch(&id) {
                        Some(data) => Bubble::parse(&id, &data),
                        None => Bubble::from_header(&id, h),
                    })
                })
                .collect(),
            Conversation::Inline(items) => items
                .iter()
                .filter_map(|item| bubble_id(item).map(|id| Bubble::parse(&id, item)))
                .collect(),
        }
    }
}

/// Carry timestamps forward to bubbles without one, and the last seen (or
/// composer default) model forward to assistant bubbles without one
pub fn propagate(bubbles: &mut [Bubble], default_model: Option<&str>) {
    let mut last_ts = None;
    let mut last_model: Option<String> = None;
    for bubble in bubbles.iter_mut() {
        match bubble.timestamp_ms {
            Some(ts) => last_ts = Some(ts),
            None => bubble.timestamp_ms = last_ts,
        }
        if bubble.kind != 2 {
            continue;
        }
        match &bubble.model_name {
            Some(m) => last_model = Some(m.clone()),
            None => {
                bubble.model_name = last_model
                    .clone()
                    .or_else(|| default_model.map(String::from));
            }
        }
    }
}

/// Single model in `usageData`, else `modelConfig.modelName`
pub fn default_model(composer: &Value) -> Option<String> {
    match composer.get("usageData").and_then(|v| v.as_object()) {
        Some(usage) if usage.len() == 1 => usage.keys().next().cloned(),
        Some(usage) if !usage.is_empty() => None,
        _ => composer
            .pointer("/modelConfig/modelName")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from),
    }
}
