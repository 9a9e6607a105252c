use axum::{http::StatusCode, Json};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

use crate::mcp::types::ToolResult;

/// Machine-readable error taxonomy. Capability authors may add their own codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    Execution,
    ResourceNotFound,
    Custom(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Execution => "EXECUTION_ERROR",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::Custom(code) => code,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "ValidationError",
            ErrorCode::Execution => "ExecutionError",
            ErrorCode::ResourceNotFound => "ResourceNotFoundError",
            ErrorCode::Custom(_) => "McpError",
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(s: &str) -> Self {
        match s {
            "VALIDATION_ERROR" => ErrorCode::Validation,
            "EXECUTION_ERROR" => ErrorCode::Execution,
            "RESOURCE_NOT_FOUND" => ErrorCode::ResourceNotFound,
            other => ErrorCode::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(ErrorCode::from(raw.as_str()))
    }
}

/// A structured domain failure. Always convertible to an `isError` envelope.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ErrorRecord {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Execution, message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(ErrorCode::ResourceNotFound, format!("Resource not found: {what}"))
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ErrorCode::ResourceNotFound, format!("Unknown tool: {name}"))
    }

    pub fn unknown_prompt(name: &str) -> Self {
        Self::new(ErrorCode::ResourceNotFound, format!("Prompt not found: {name}"))
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.get_or_insert_with(Map::new).insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> &'static str {
        self.code.kind()
    }

    /// `{error, code, message, details}`; `details` only when present.
    pub fn to_json(&self) -> Value {
        let mut obj = json!({
            "error": self.kind(),
            "code": self.code,
            "message": self.message,
        });
        if let Some(details) = &self.details {
            obj["details"] = Value::Object(details.clone());
        }
        obj
    }

    pub fn into_result(self) -> ToolResult {
        let text = serde_json::to_string_pretty(&self.to_json())
            .unwrap_or_else(|_| format!("{{\"code\":\"{}\",\"message\":{:?}}}", self.code, self.message));
        ToolResult::error_text(text)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Record(#[from] ErrorRecord),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
    #[error("unauthorized")]
    Unauthorized,
    #[error("origin denied")]
    OriginDenied,
    #[error("request too large")]
    RequestTooLarge,
    #[error("rate limited")]
    RateLimited,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn code(&self) -> &str {
        match self {
            AppError::Record(r) => r.code.as_str(),
            AppError::Unexpected(_) => ErrorCode::Execution.as_str(),
            AppError::Unauthorized => "Unauthorized",
            AppError::OriginDenied => "OriginDenied",
            AppError::RequestTooLarge => "RequestTooLarge",
            AppError::RateLimited => "RateLimited",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::OriginDenied => StatusCode::FORBIDDEN,
            AppError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Record(r) => match r.code {
                ErrorCode::Validation => StatusCode::BAD_REQUEST,
                ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Collapse into a record. Unstructured failures are prefixed with `context`
    /// and keep their debug chain under `details.originalError`.
    pub fn into_record(self, context: &str) -> ErrorRecord {
        match self {
            AppError::Record(r) => r,
            AppError::Unexpected(e) => ErrorRecord::execution(format!("{context}: {e}"))
                .with_detail("originalError", format!("{e:?}")),
            other => ErrorRecord::new(ErrorCode::Custom(other.code().to_string()), other.to_string()),
        }
    }
}

pub fn into_response(err: AppError) -> (StatusCode, Json<ErrorBody>) {
    let status = err.status();
    let body = ErrorBody { code: err.code().to_string(), message: err.to_string() };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_json_roundtrips_code_message_details() {
        let rec = ErrorRecord::validation("bad input").with_detail("missing", json!(["b", "c"]));
        let parsed: ErrorRecord = serde_json::from_value(rec.to_json()).unwrap();
        assert_eq!(parsed, rec);
        assert_eq!(rec.to_json()["error"], "ValidationError");
    }

    #[test]
    fn custom_codes_survive_parsing() {
        let rec = ErrorRecord::new(ErrorCode::Custom("GIT_DIRTY".into()), "uncommitted changes");
        let parsed: ErrorRecord = serde_json::from_value(rec.to_json()).unwrap();
        assert_eq!(parsed.code, ErrorCode::Custom("GIT_DIRTY".into()));
        assert_eq!(rec.kind(), "McpError");
        assert!(rec.to_json().get("details").is_none());
    }

    #[test]
    fn unexpected_errors_get_context_and_original() {
        let err = AppError::from(anyhow::anyhow!("disk full"));
        let rec = err.into_record("Tool execution: fmt");
        assert_eq!(rec.code, ErrorCode::Execution);
        assert_eq!(rec.message, "Tool execution: fmt: disk full");
        assert!(rec.details.unwrap().contains_key("originalError"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(ErrorRecord::not_found("x")).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::RateLimited.code(), "RateLimited");
    }
}
