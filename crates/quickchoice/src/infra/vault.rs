//! Document store adapters: a directory on disk or an in-memory map.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ignore::WalkBuilder;
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::errors::ChoiceError;

/// Vault-relative file path using `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(path: impl AsRef<str>) -> Self {
        let normalized = path.as_ref().replace('\\', "/");
        let trimmed = normalized.trim_start_matches("./").trim_start_matches('/');
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path component, extension included.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.').filter(|dot| *dot > 0).map(|dot| &name[dot + 1..])
    }

    /// Whether the file sits anywhere below `folder` (the vault root matches everything).
    pub fn is_under(&self, folder: &str) -> bool {
        let folder = FileRef::new(folder);
        let folder = folder.as_str().trim_end_matches('/');
        folder.is_empty()
            || self
                .0
                .strip_prefix(folder)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host document store. Paths are always vault-relative.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_files(&self) -> Result<Vec<FileRef>>;

    async fn read_file(&self, file: &FileRef) -> Result<String>;

    async fn write_file(&self, file: &FileRef, content: &str) -> Result<()>;

    async fn exists(&self, file: &FileRef) -> Result<bool>;

    async fn files_under_folder(&self, folder: &str) -> Result<Vec<FileRef>> {
        let files = self.list_files().await?;
        Ok(files.into_iter().filter(|file| file.is_under(folder)).collect())
    }
}

/// Document store backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, file: &FileRef) -> Result<PathBuf> {
        let relative = Path::new(file.as_str());
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if escapes || file.as_str().is_empty() {
            return Err(ChoiceError::invalid(format!("path '{file}' leaves the vault")).into());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStore for FsVault {
    async fn list_files(&self) -> Result<Vec<FileRef>> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in WalkBuilder::new(&root).hidden(true).git_ignore(true).build() {
                match entry {
                    Ok(entry) if entry.file_type().is_some_and(|kind| kind.is_file()) => {
                        let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                        files.push(FileRef::new(relative.to_string_lossy()));
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "vault walk error"),
                }
            }
            files.sort();
            files
        })
        .await
        .context("vault walk task failed")?;
        Ok(files)
    }

    async fn read_file(&self, file: &FileRef) -> Result<String> {
        let path = self.resolve(file)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| io_failure(file, "read", err))
    }

    async fn write_file(&self, file: &FileRef, content: &str) -> Result<()> {
        let path = self.resolve(file)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| io_failure(file, "create folder for", err))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|err| io_failure(file, "write", err))
    }

    async fn exists(&self, file: &FileRef) -> Result<bool> {
        let path = self.resolve(file)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|err| io_failure(file, "inspect", err))
    }
}

fn io_failure(file: &FileRef, action: &str, err: io::Error) -> anyhow::Error {
    if err.kind() == io::ErrorKind::NotFound {
        ChoiceError::not_found("file", file.as_str()).into()
    } else {
        ChoiceError::ExternalRequest(format!("failed to {action} {file}: {err}")).into()
    }
}

/// Document store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryVault {
    files: Mutex<BTreeMap<FileRef, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(path, content)| (FileRef::new(path), content.into()))
            .collect();
        Self {
            files: Mutex::new(files),
        }
    }

    /// Current contents of `path`, if present.
    pub fn contents(&self, path: &str) -> Option<String> {
        self.files.lock().get(&FileRef::new(path)).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryVault {
    async fn list_files(&self) -> Result<Vec<FileRef>> {
        Ok(self.files.lock().keys().cloned().collect())
    }

    async fn read_file(&self, file: &FileRef) -> Result<String> {
        self.files
            .lock()
            .get(file)
            .cloned()
            .ok_or_else(|| ChoiceError::not_found("file", file.as_str()).into())
    }

    async fn write_file(&self, file: &FileRef, content: &str) -> Result<()> {
        self.files.lock().insert(file.clone(), content.to_string());
        Ok(())
    }

    async fn exists(&self, file: &FileRef) -> Result<bool> {
        Ok(self.files.lock().contains_key(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_refs_normalize_separators() {
        let file = FileRef::new("./notes\\daily/2024-01-01.md");
        assert_eq!(file.as_str(), "notes/daily/2024-01-01.md");
        assert_eq!(file.file_name(), "2024-01-01.md");
        assert_eq!(file.stem(), "2024-01-01");
        assert_eq!(file.extension(), Some("md"));
        assert!(file.is_under("notes"));
        assert!(file.is_under("notes/daily/"));
        assert!(!file.is_under("note"));
        assert!(file.is_under(""));
    }

    #[tokio::test]
    async fn memory_vault_filters_by_folder() -> Result<()> {
        let vault = MemoryVault::with_files([
            ("prompts/summary.md", "Summarize"),
            ("prompts/nested/tone.md", "Tone"),
            ("inbox.md", ""),
        ]);
        let prompts = vault.files_under_folder("prompts").await?;
        let names: Vec<_> = prompts.iter().map(FileRef::as_str).collect();
        assert_eq!(names, ["prompts/nested/tone.md", "prompts/summary.md"]);

        let err = vault.read_file(&FileRef::new("missing.md")).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChoiceError>(),
            Some(&ChoiceError::not_found("file", "missing.md"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn fs_vault_round_trips_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let vault = FsVault::new(temp.path());
        let file = FileRef::new("journal/today.md");

        assert!(!vault.exists(&file).await?);
        vault.write_file(&file, "# Today\n").await?;
        assert!(vault.exists(&file).await?);
        assert_eq!(vault.read_file(&file).await?, "# Today\n");
        assert_eq!(vault.list_files().await?, vec![file.clone()]);
        assert_eq!(vault.files_under_folder("journal").await?, vec![file]);
        Ok(())
    }

    #[tokio::test]
    async fn fs_vault_rejects_escaping_paths() {
        let temp = tempfile::tempdir().unwrap();
        let vault = FsVault::new(temp.path());
        let err = vault.read_file(&FileRef::new("../secret.md")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChoiceError>(),
            Some(ChoiceError::InvalidArgument(_))
        ));
    }
}
