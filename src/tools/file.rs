use crate::{
    config::FileResourceSpec,
    errors::{AppError, ErrorRecord},
    mcp::{
        registry::ResourceSource,
        types::{ResourceContents, ResourceDescriptor},
    },
    tools::{ensure_within_root, lexically_within},
};
use async_trait::async_trait;
use base64::Engine;
use std::path::{Path, PathBuf};

/// A file under the configured root, read fresh on every request.
pub struct FileResource {
    spec: FileResourceSpec,
    root: PathBuf,
}

impl FileResource {
    pub fn new(spec: FileResourceSpec, root: &Path) -> Self {
        Self { spec, root: root.to_path_buf() }
    }

    fn escapes_root(&self) -> ErrorRecord {
        ErrorRecord::validation(format!("Path must be within {}", self.root.display()))
            .with_detail("provided", self.spec.path.display().to_string())
    }
}

#[async_trait]
impl ResourceSource for FileResource {
    fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            uri: self.spec.uri.clone(),
            name: self.spec.name.clone(),
            description: self.spec.description.clone(),
            mime_type: self.spec.mime_type.clone(),
        }
    }

    async fn read(&self) -> Result<ResourceContents, AppError> {
        if !lexically_within(&self.root, &self.spec.path) {
            return Err(self.escapes_root().into());
        }
        if !self.root.join(&self.spec.path).exists() {
            return Err(ErrorRecord::not_found(&self.spec.uri)
                .with_detail("path", self.spec.path.display().to_string())
                .into());
        }
        // symlinks can still point outside once resolved
        let full = ensure_within_root(&self.root, &self.spec.path).map_err(|_| self.escapes_root())?;
        let data = tokio::fs::read(&full).await.map_err(anyhow::Error::from)?;
        let (text, blob) = match String::from_utf8(data) {
            Ok(text) => (Some(text), None),
            Err(e) => (None, Some(base64::engine::general_purpose::STANDARD.encode(e.into_bytes()))),
        };
        Ok(ResourceContents { uri: self.spec.uri.clone(), mime_type: self.spec.mime_type.clone(), text, blob })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn spec(path: &str) -> FileResourceSpec {
        FileResourceSpec {
            uri: "docs://readme".into(),
            name: "README".into(),
            path: PathBuf::from(path),
            description: None,
            mime_type: Some("text/markdown".into()),
        }
    }

    #[tokio::test]
    async fn reads_text_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("README.md"), "# devflow").unwrap();
        let res = FileResource::new(spec("README.md"), tmp.path());
        let contents = res.read().await.unwrap();
        assert_eq!(contents.text.as_deref(), Some("# devflow"));
        assert!(contents.blob.is_none());
    }

    #[tokio::test]
    async fn binary_files_become_blobs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("logo.png"), [0x89u8, 0x50, 0xff, 0xfe]).unwrap();
        let res = FileResource::new(spec("logo.png"), tmp.path());
        let contents = res.read().await.unwrap();
        assert_eq!(contents.blob.as_deref(), Some("iVD//g=="));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let res = FileResource::new(spec("NOPE.md"), tmp.path());
        let err = res.read().await.unwrap_err().into_record("ctx");
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
    }

    #[tokio::test]
    async fn escaping_root_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let inner = tmp.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(tmp.path().join("secret.txt"), "x").unwrap();
        let res = FileResource::new(spec("../secret.txt"), &inner);
        let err = res.read().await.unwrap_err().into_record("ctx");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn escaping_root_missing_file_is_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let inner = tmp.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        let res = FileResource::new(spec("../../etc/shadow-nope"), &inner);
        let err = res.read().await.unwrap_err().into_record("ctx");
        assert_eq!(err.code, ErrorCode::Validation);
        let details = err.details.unwrap();
        assert_eq!(details["provided"], "../../etc/shadow-nope");
        assert!(details.get("path").is_none());
    }

    #[tokio::test]
    async fn missing_file_reports_configured_path() {
        let tmp = tempfile::tempdir().unwrap();
        let res = FileResource::new(spec("docs/NOPE.md"), tmp.path());
        let err = res.read().await.unwrap_err().into_record("ctx");
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        assert_eq!(err.details.unwrap()["path"], "docs/NOPE.md");
    }
}
