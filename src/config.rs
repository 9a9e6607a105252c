use crate::mcp::types::{ParamType, ServerInfo};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub auth: Option<Auth>,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub root: Root,
    #[serde(default)]
    pub tools: Vec<CommandSpec>,
    #[serde(default)]
    pub resources: Vec<FileResourceSpec>,
    #[serde(default)]
    pub prompts: Vec<PromptSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Server {
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

impl std::str::FromStr for TransportKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(TransportKind::Stdio),
            "http" => Ok(TransportKind::Http),
            other => anyhow::bail!("unknown transport: {other}"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Transport {
    #[serde(default)]
    pub kind: TransportKind,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
}
fn default_bind_addr() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 7400 }
fn default_base_path() -> String { "/mcp".to_string() }

impl Default for Transport {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            bind_addr: default_bind_addr(),
            port: default_port(),
            base_path: default_base_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Auth {
    pub bearer_token: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Limits {
    #[serde(default = "default_exec_timeout_s")]
    pub exec_timeout_s: u64,
    #[serde(default = "default_max_output_kb")]
    pub max_output_kb: usize,
    #[serde(default = "default_max_request_kb")]
    pub max_request_kb: usize,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}
fn default_exec_timeout_s() -> u64 { 60 }
fn default_max_output_kb() -> usize { 1024 }
fn default_max_request_kb() -> usize { 256 }
fn default_rps() -> u32 { 20 }
fn default_burst() -> u32 { 40 }

impl Default for Limits {
    fn default() -> Self {
        Self {
            exec_timeout_s: default_exec_timeout_s(),
            max_output_kb: default_max_output_kb(),
            max_request_kb: default_max_request_kb(),
            requests_per_second: default_rps(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Root {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
}
fn default_root_dir() -> PathBuf { PathBuf::from(".") }

impl Default for Root {
    fn default() -> Self {
        Self { root_dir: default_root_dir() }
    }
}

/// An external program exposed as a tool.
#[derive(Debug, Deserialize, Clone)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub params: Vec<CommandParam>,
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<i32>,
    #[serde(default)]
    pub timeout_s: Option<u64>,
}
fn default_success_codes() -> Vec<i32> { vec![0] }

#[derive(Debug, Deserialize, Clone)]
pub struct CommandParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub flag: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileResourceSpec {
    pub uri: String,
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub template: String,
    #[serde(default)]
    pub arguments: Vec<PromptArgSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptArgSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw, path.extension().map(|e| e == "json").unwrap_or(false))
    }

    pub fn parse(raw: &str, json: bool) -> anyhow::Result<Self> {
        if json {
            Ok(serde_json::from_str(raw)?)
        } else {
            Ok(toml::from_str(raw)?)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.name.trim().is_empty() { anyhow::bail!("server.name must not be empty"); }
        if self.server.version.trim().is_empty() { anyhow::bail!("server.version must not be empty"); }
        if !self.root.root_dir.is_dir() {
            anyhow::bail!("root_dir does not exist or is not a directory: {}", self.root.root_dir.display());
        }
        if let Some(auth) = &self.auth {
            if auth.bearer_token.trim().is_empty() { anyhow::bail!("bearer_token must not be empty"); }
            if auth.allowed_origins.is_empty() { anyhow::bail!("allowed_origins must not be empty"); }
        }
        if self.limits.exec_timeout_s == 0 { anyhow::bail!("exec_timeout_s must be > 0"); }
        if self.limits.max_request_kb == 0 { anyhow::bail!("max_request_kb must be > 0"); }
        if self.limits.max_output_kb == 0 { anyhow::bail!("max_output_kb must be > 0"); }
        if self.limits.requests_per_second == 0 { anyhow::bail!("requests_per_second must be > 0"); }
        if self.limits.burst == 0 { anyhow::bail!("burst must be > 0"); }
        for t in &self.tools {
            if t.name.trim().is_empty() { anyhow::bail!("tool name must not be empty"); }
            if t.program.trim().is_empty() { anyhow::bail!("tool {} has an empty program", t.name); }
        }
        if self.resources.iter().any(|r| r.uri.trim().is_empty()) { anyhow::bail!("resource uri must not be empty"); }
        if self.prompts.iter().any(|p| p.name.trim().is_empty()) { anyhow::bail!("prompt name must not be empty"); }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        name = "code-quality"
        version = "1.0.0"
    "#;

    #[test]
    fn defaults_fill_optional_sections() {
        let cfg = Config::parse(MINIMAL, false).unwrap();
        assert_eq!(cfg.transport.kind, TransportKind::Stdio);
        assert_eq!(cfg.transport.base_path, "/mcp");
        assert_eq!(cfg.limits.exec_timeout_s, 60);
        assert!(cfg.auth.is_none());
        assert!(cfg.tools.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn tool_declarations_parse() {
        let raw = format!(
            "{MINIMAL}\n{}",
            r#"
            [[tools]]
            name = "lint_code"
            description = "Run ESLint"
            program = "npx"
            args = ["eslint", "{{path}}"]
            success_codes = [0, 1]
            [[tools.params]]
            name = "path"
            type = "string"
            required = true
            [[tools.params]]
            name = "fix"
            type = "boolean"
            flag = "--fix"
            "#
        );
        let cfg = Config::parse(&raw, false).unwrap();
        let tool = &cfg.tools[0];
        assert_eq!(tool.success_codes, vec![0, 1]);
        assert_eq!(tool.params[1].kind, ParamType::Boolean);
        assert_eq!(tool.params[1].flag.as_deref(), Some("--fix"));
    }

    #[test]
    fn json_configs_are_accepted() {
        let raw = r#"{"server":{"name":"doc-generator","version":"1.0.0"},"transport":{"kind":"http","port":9000}}"#;
        let cfg = Config::parse(raw, true).unwrap();
        assert_eq!(cfg.transport.kind, TransportKind::Http);
        assert_eq!(cfg.transport.port, 9000);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = Config::parse(MINIMAL, false).unwrap();
        cfg.limits.exec_timeout_s = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::parse(MINIMAL, false).unwrap();
        cfg.auth = Some(Auth { bearer_token: " ".into(), allowed_origins: vec!["https://a".into()] });
        assert!(cfg.validate().is_err());

        let mut cfg = Config::parse(MINIMAL, false).unwrap();
        cfg.root.root_dir = PathBuf::from("/definitely/not/here");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn demo_configs_parse() {
        for raw in [
            include_str!("../demos/code-quality.toml"),
            include_str!("../demos/git-workflow.toml"),
            include_str!("../demos/doc-generator.toml"),
        ] {
            let cfg = Config::parse(raw, false).unwrap();
            assert!(!cfg.tools.is_empty());
        }
    }

    #[test]
    fn transport_kind_from_flag() {
        assert_eq!("http".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert!("grpc".parse::<TransportKind>().is_err());
    }
}
