use crate::config::Config;
use crate::core::model::{ChannelData, Checkpoint};
use crate::error::{Error, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Durable files of one run: the input document, the checkpoint and the final artifacts.
#[derive(Debug, Clone)]
pub struct StorageService {
    checkpoint_path: PathBuf,
}

impl StorageService {
    pub fn new(config: &Config) -> Self {
        Self {
            checkpoint_path: config.checkpoint_path(),
        }
    }

    pub async fn load_channel_data(path: &Path) -> Result<ChannelData> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::custom(format!("Failed to read data file {}: {e}", path.display()))
        })?;
        let data: ChannelData = serde_json::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            channel = %data.channel.name,
            videos = data.videos.len(),
            "loaded channel data"
        );
        Ok(data)
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Reads the checkpoint if one exists. Unreadable or malformed files count as absent.
    pub async fn load_checkpoint(&self) -> Option<Checkpoint> {
        let content = match fs::read_to_string(&self.checkpoint_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.checkpoint_path.display(), "no checkpoint found");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.checkpoint_path.display(), error = %e, "checkpoint unreadable");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                tracing::warn!(path = %self.checkpoint_path.display(), error = %e, "ignoring malformed checkpoint");
                None
            }
        }
    }

    pub async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        write_json(&self.checkpoint_path, checkpoint).await?;
        tracing::debug!(
            step = %checkpoint.analysis_step,
            analysed = checkpoint.video_analyses.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    pub async fn remove_checkpoint(&self) -> Result<()> {
        match fs::remove_file(&self.checkpoint_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Pretty-printed, UTF-8 JSON written through [`write_text`].
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    write_text(path, &body).await
}

/// Writes to a sibling temp file, then renames it over `path`; readers never observe a partial file.
pub async fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, content).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Creates `path` and restricts it to the current user; cached prompts may hold private data.
pub async fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = fs::metadata(path).await?.permissions();
        if permissions.mode() & 0o777 != 0o700 {
            permissions.set_mode(0o700);
            fs::set_permissions(path, permissions).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use crate::core::model::{AnalysisRecord, STEP_VIDEO_ANALYSIS};

    fn config_in(dir: &Path) -> Config {
        Config {
            output_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn checkpoint_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(&config_in(dir.path()));

        assert!(storage.load_checkpoint().await.is_none());

        let checkpoint = Checkpoint {
            channel_name: "Chan".into(),
            channel_subscribers: serde_json::json!("42"),
            video_analyses: vec![AnalysisRecord {
                video_id: "v1".into(),
                title: "One".into(),
                views: Some(10.0),
                analysis: "blob".into(),
            }],
            analysis_step: STEP_VIDEO_ANALYSIS.into(),
            top_videos: Vec::new(),
        };
        storage.save_checkpoint(&checkpoint).await.unwrap();

        assert_eq!(storage.load_checkpoint().await, Some(checkpoint));
        assert!(!temp_path(storage.checkpoint_path()).exists());

        storage.remove_checkpoint().await.unwrap();
        assert!(storage.load_checkpoint().await.is_none());
        storage.remove_checkpoint().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_checkpoint_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(&config_in(dir.path()));
        std_fs::write(storage.checkpoint_path(), "{ not json").unwrap();

        assert!(storage.load_checkpoint().await.is_none());
    }

    #[tokio::test]
    async fn missing_data_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = StorageService::load_channel_data(&dir.path().join("absent.json")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("entry.txt");

        write_text(&path, "first").await.unwrap();
        write_text(&path, "second").await.unwrap();

        assert_eq!(std_fs::read_to_string(&path).unwrap(), "second");
        assert!(!temp_path(&path).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn private_directory_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        ensure_directory(&path).await.unwrap();

        let mode = std_fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
