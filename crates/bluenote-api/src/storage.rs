use std::path::PathBuf;

use anyhow::{Result, bail};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Flat on-disk store for uploaded media.
///
/// Each upload lives at `{dir}/{file_name}` and is served back under
/// `/uploads/{file_name}`.
pub struct MediaStorage {
    dir: PathBuf,
}

impl MediaStorage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Path to a stored file. Names must be a single path segment.
    pub fn file_path(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name.starts_with('.')
        {
            bail!("invalid media file name '{}'", file_name);
        }
        Ok(self.dir.join(file_name))
    }

    pub async fn save(&self, file_name: &str, data: &[u8]) -> Result<()> {
        let path = self.file_path(file_name)?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn delete(&self, file_name: &str) -> Result<()> {
        let path = self.file_path(file_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted media file {}", file_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media file {} already gone", file_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
