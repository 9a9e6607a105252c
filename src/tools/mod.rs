pub mod command;
pub mod file;
pub mod template;

use crate::{
    config::Config,
    mcp::{host::CapabilitySet, registry::Registry},
};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub fn ensure_within_root(root: &Path, input: &Path) -> anyhow::Result<PathBuf> {
    // allow relative or absolute inputs; join then canonicalize
    let joined = if input.is_absolute() { input.to_path_buf() } else { root.join(input) };
    let canon_root = dunce::canonicalize(root)?;
    let canon_path = dunce::canonicalize(&joined)?;
    if canon_path.starts_with(&canon_root) { Ok(canon_path) } else { anyhow::bail!("path escapes root") }
}

/// Resolves `.` and `..` without touching the filesystem, so paths that do
/// not exist yet can still be checked against the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

pub fn lexically_within(root: &Path, input: &Path) -> bool {
    let joined = normalize_lexically(&root.join(input));
    let canon_root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    joined.starts_with(normalize_lexically(root)) || joined.starts_with(canon_root)
}

/// Replaces `{{name}}` placeholders. Returns `None` as soon as `lookup`
/// cannot resolve one. An unterminated `{{` is kept literally.
pub fn substitute(text: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else { break };
        out.push_str(&rest[..start]);
        let name = rest[start + 2..start + 2 + len].trim();
        out.push_str(&lookup(name)?);
        rest = &rest[start + 2 + len + 2..];
    }
    out.push_str(rest);
    Some(out)
}

/// Every tool, resource and prompt declared in a config file.
pub struct Configured {
    cfg: Arc<Config>,
}

impl Configured {
    pub fn new(cfg: Arc<Config>) -> Self {
        Self { cfg }
    }
}

impl CapabilitySet for Configured {
    fn register_all(&self, registry: &mut Registry) -> anyhow::Result<()> {
        let root = dunce::canonicalize(&self.cfg.root.root_dir)?;
        for spec in &self.cfg.tools {
            registry.register(Arc::new(command::CommandTool::new(spec.clone(), &root, &self.cfg.limits)));
        }
        for spec in &self.cfg.resources {
            registry.register_resource(Arc::new(file::FileResource::new(spec.clone(), &root)));
        }
        for spec in &self.cfg.prompts {
            registry.register_prompt(Arc::new(template::TemplatePrompt::new(spec.clone())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_every_placeholder() {
        let out = substitute("git branch {{ name }} {{base}}", |k| Some(k.to_uppercase())).unwrap();
        assert_eq!(out, "git branch NAME BASE");
    }

    #[test]
    fn unresolved_placeholder_yields_none() {
        assert!(substitute("--since={{tag}}", |_| None).is_none());
        assert_eq!(substitute("plain", |_| None).as_deref(), Some("plain"));
    }

    #[test]
    fn unterminated_braces_stay_literal() {
        assert_eq!(substitute("a {{b", |_| None).as_deref(), Some("a {{b"));
    }

    #[test]
    fn path_within_root_allows() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let f = root.join("a.txt");
        std::fs::write(&f, b"hi").unwrap();
        let full = ensure_within_root(root, &PathBuf::from("a.txt")).unwrap();
        assert_eq!(full, dunce::canonicalize(f).unwrap());
    }

    #[test]
    fn path_outside_root_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ensure_within_root(tmp.path(), &PathBuf::from("/etc/hosts")).err().unwrap();
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn lexical_check_handles_missing_paths() {
        let root = Path::new("/srv/project");
        assert!(lexically_within(root, Path::new("docs/./missing.md")));
        assert!(lexically_within(root, Path::new("docs/../README.md")));
        assert!(!lexically_within(root, Path::new("../../etc/shadow-nope")));
        assert!(!lexically_within(root, Path::new("/etc/passwd")));
        assert_eq!(normalize_lexically(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }
}
