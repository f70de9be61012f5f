//! Atomic single-file persistence, grounded on
//! `crates/tools/src/file_ops.rs::file_write`'s tmp-sibling + sync + rename
//! pattern (spec §4.6).

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use sa_domain::error::{Error, Result};

pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(Error::Io)?;
    }

    let tmp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4().as_simple()
    );
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path).await.map_err(Error::Io)?;
    file.write_all(bytes).await.map_err(Error::Io)?;
    file.flush().await.map_err(Error::Io)?;
    file.sync_data().await.map_err(Error::Io)?;

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let cleanup = tmp_path.clone();
        tokio::spawn(async move {
            let _ = fs::remove_file(&cleanup).await;
        });
        return Err(Error::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_and_overwrites_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        write_atomic(&path, b"{\"a\":1}").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{\"a\":1}");

        write_atomic(&path, b"{\"a\":2}").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{\"a\":2}");
    }

    #[tokio::test]
    async fn no_tmp_sibling_left_behind_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"{}").await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["state.json".to_string()]);
    }
}
