//! Dictionary file mutations backing the admin add/remove endpoints.
//!
//! These touch only the on-disk word list; the caller is responsible for
//! triggering an index rebuild afterwards.

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::index::normalize;
use crate::DictError;

/// Appends a word to the dictionary file, inserting a newline first if
/// the file does not already end with one.
pub async fn append_word(path: impl AsRef<Path>, word: &str) -> Result<(), DictError> {
    let path = path.as_ref();
    let word = normalize(word);
    if word.is_empty() {
        return Err(DictError::EmptyWord);
    }

    let existing = fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DictError::NotFound(path.to_path_buf())
        } else {
            DictError::Io(e)
        }
    })?;

    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(DictError::Io)?;
    if !existing.is_empty() && !existing.ends_with(b"\n") {
        file.write_all(b"\n").await.map_err(DictError::Io)?;
    }
    file.write_all(word.as_bytes()).await.map_err(DictError::Io)?;
    file.write_all(b"\n").await.map_err(DictError::Io)?;
    file.flush().await.map_err(DictError::Io)?;

    tracing::info!(%word, path = %path.display(), "word appended to dictionary");
    Ok(())
}

/// Rewrites the dictionary file without the given word (case-insensitive).
///
/// Returns `true` if at least one line was removed.
pub async fn remove_word(path: impl AsRef<Path>, word: &str) -> Result<bool, DictError> {
    let path = path.as_ref();
    let target = normalize(word);
    if target.is_empty() {
        return Err(DictError::EmptyWord);
    }

    let contents = fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DictError::NotFound(path.to_path_buf())
        } else {
            DictError::Io(e)
        }
    })?;

    let mut removed = false;
    let mut kept = String::with_capacity(contents.len());
    for line in contents.lines() {
        if normalize(line) == target {
            removed = true;
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }

    if removed {
        fs::write(path, kept).await.map_err(DictError::Io)?;
        tracing::info!(word = %target, path = %path.display(), "word removed from dictionary");
    }
    Ok(removed)
}
