use crate::error::DeskError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Plaintext file holding the port the backend listens on.
#[derive(Debug, Clone)]
pub struct PortFile {
    path: PathBuf,
}

impl PortFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write through a temp file and rename, so readers never see a
    /// partially written port.
    pub async fn publish(&self, port: u16) -> Result<(), DeskError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension(format!("tmp-{}", std::process::id()));
        fs::write(&tmp, port.to_string()).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %self.path.display(), port, "port file published");
        Ok(())
    }

    /// `None` when the file is missing or does not hold a valid port.
    pub async fn read(&self) -> Option<u16> {
        let raw = fs::read_to_string(&self.path).await.ok()?;
        match raw.trim().parse::<u16>() {
            Ok(0) | Err(_) => {
                warn!(path = %self.path.display(), "ignoring malformed port file");
                None
            }
            Ok(port) => Some(port),
        }
    }

    pub async fn remove(&self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "port file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove port file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let file = PortFile::new(dir.path().join(".runtime/backend-port"));
        assert_eq!(file.read().await, None);

        file.publish(48123).await.unwrap();
        assert_eq!(file.read().await, Some(48123));
        assert_eq!(
            std::fs::read_to_string(file.path()).unwrap(),
            "48123"
        );

        file.remove().await;
        assert_eq!(file.read().await, None);
        file.remove().await;
    }

    #[tokio::test]
    async fn garbage_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = PortFile::new(dir.path().join("backend-port"));
        std::fs::write(file.path(), "not a port").unwrap();
        assert_eq!(file.read().await, None);
    }
}
