//! Target resolution for documents created from templates.

use anyhow::Result;

use crate::domain::errors::ChoiceError;
use crate::domain::model::FileExistsBehavior;
use crate::infra::vault::{DocumentStore, FileRef};

const MARKDOWN_EXTENSION: &str = "md";

/// How the rendered template lands in the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Overwrite,
    Append,
}

/// Vault path for a new document called `file_name` inside `folder`.
pub fn target_file(folder: Option<&str>, file_name: &str) -> Result<FileRef, ChoiceError> {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return Err(ChoiceError::invalid("template produced an empty file name"));
    }

    let with_extension = if FileRef::new(file_name).extension() == Some(MARKDOWN_EXTENSION) {
        file_name.to_string()
    } else {
        format!("{file_name}.{MARKDOWN_EXTENSION}")
    };

    Ok(match folder.map(|folder| folder.trim().trim_matches('/')) {
        Some(folder) if !folder.is_empty() => FileRef::new(format!("{folder}/{with_extension}")),
        _ => FileRef::new(with_extension),
    })
}

/// `Note.md` numbered `n` becomes `Note n.md`.
fn numbered(target: &FileRef, n: usize) -> FileRef {
    let path = target.as_str();
    let parent = &path[..path.len() - target.file_name().len()];
    match target.extension() {
        Some(extension) => FileRef::new(format!("{parent}{} {n}.{extension}", target.stem())),
        None => FileRef::new(format!("{path} {n}")),
    }
}

/// Decide which file to write and how, honouring `on_exists` when `target` is taken.
pub async fn plan_write(
    documents: &dyn DocumentStore,
    target: FileRef,
    on_exists: FileExistsBehavior,
) -> Result<(FileRef, WriteMode)> {
    if !documents.exists(&target).await? {
        return Ok((target, WriteMode::Create));
    }

    match on_exists {
        FileExistsBehavior::Overwrite => Ok((target, WriteMode::Overwrite)),
        FileExistsBehavior::Append => Ok((target, WriteMode::Append)),
        FileExistsBehavior::Fail => {
            Err(ChoiceError::invalid(format!("file already exists: {target}")).into())
        }
        FileExistsBehavior::Increment => {
            let mut n = 1;
            loop {
                let candidate = numbered(&target, n);
                if !documents.exists(&candidate).await? {
                    tracing::debug!(file = %candidate, "target taken, using numbered name");
                    return Ok((candidate, WriteMode::Create));
                }
                n += 1;
            }
        }
    }
}
