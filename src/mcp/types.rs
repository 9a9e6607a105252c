use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Caller-supplied argument bag.
pub type Args = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: ResourceContents,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    #[cfg(test)]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// The uniform result envelope every invocation resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![Content::text(text)], is_error: false }
    }

    pub fn error_text(text: impl Into<String>) -> Self {
        Self { content: vec![Content::text(text)], is_error: true }
    }

    pub fn with(mut self, block: Content) -> Self {
        self.content.push(block);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Parameter name to declared type and required flag. Not checked at
/// registration; the dispatcher validates arguments against it per call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

impl InputSchema {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn param(mut self, name: &str, kind: ParamType, required: bool) -> Self {
        self.params.push(ParamSpec { name: name.to_string(), kind, required, description: None });
        self
    }

    #[cfg(test)]
    pub fn described(mut self, name: &str, kind: ParamType, required: bool, description: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            required,
            description: Some(description.to_string()),
        });
        self
    }

    pub fn from_params(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn required(&self) -> Vec<&str> {
        self.params.iter().filter(|p| p.required).map(|p| p.name.as_str()).collect()
    }

    pub fn types(&self) -> impl Iterator<Item = (&str, ParamType)> {
        self.params.iter().map(|p| (p.name.as_str(), p.kind))
    }

    /// JSON Schema rendering used in listings.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut prop = json!({ "type": p.kind.as_str() });
            if let Some(d) = &p.description {
                prop["description"] = Value::String(d.clone());
            }
            properties.insert(p.name.clone(), prop);
        }
        json!({ "type": "object", "properties": properties, "required": self.required() })
    }
}

impl Serialize for InputSchema {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(s)
    }
}

/// Listing shape of a tool; the handler is never exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContents {
    pub uri: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

impl RenderedPrompt {
    pub fn user(description: Option<String>, text: impl Into<String>) -> Self {
        Self {
            description,
            messages: vec![PromptMessage { role: "user".into(), content: Content::text(text) }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub healthy: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_defaults_is_error_false() {
        let r: ToolResult = serde_json::from_value(json!({"content":[{"type":"text","text":"hi"}]})).unwrap();
        assert!(!r.is_error);
        assert_eq!(r.content[0].as_text(), Some("hi"));
    }

    #[test]
    fn image_block_uses_mime_type_key() {
        let block = Content::Image { data: "AAAA".into(), mime_type: "image/png".into() };
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(v, json!({"type":"image","data":"AAAA","mimeType":"image/png"}));
    }

    #[test]
    fn schema_renders_required_list() {
        let schema = InputSchema::new()
            .param("path", ParamType::String, true)
            .described("fix", ParamType::Boolean, false, "auto-fix");
        let v = schema.to_json();
        assert_eq!(v["required"], json!(["path"]));
        assert_eq!(v["properties"]["fix"]["description"], "auto-fix");
        assert_eq!(v["properties"]["path"]["type"], "string");
    }
}
