//! Scratch space for one ingestion.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{Error, Result};

const INPUT_NAME: &str = "upload.bin";
const OUTPUT_DIR: &str = "out";

/// Temporary directory holding the staged upload and the encoder output.
///
/// Artifacts are written under [`Workspace::output_dir`] and moved into
/// place with [`Workspace::finalize`], so a half-written track directory is
/// never visible. Dropping the workspace removes everything left in it.
///
/// # Example
///
/// ```no_run
/// use trackwave_av::Workspace;
///
/// # async fn example() -> trackwave_av::Result<()> {
/// let workspace = Workspace::new_in("/var/lib/trackwave/tmp")?;
/// let input = workspace.stage(b"raw upload bytes").await?;
/// // encode `input` into workspace.output_dir() ...
/// workspace.finalize("/var/lib/trackwave/media/alice/7")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    output_dir: PathBuf,
}

impl Workspace {
    /// Create a workspace under `parent`.
    ///
    /// Use a parent on the same filesystem as the final destination so that
    /// [`finalize`](Self::finalize) is a rename.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Workspace(format!("cannot create {}: {e}", parent.display()))
        })?;
        let temp_dir = TempDir::new_in(parent).map_err(|e| Error::Workspace(e.to_string()))?;
        Self::from_temp_dir(temp_dir)
    }

    fn from_temp_dir(temp_dir: TempDir) -> Result<Self> {
        let output_dir = temp_dir.path().join(OUTPUT_DIR);
        std::fs::create_dir(&output_dir).map_err(|e| Error::Workspace(e.to_string()))?;
        Ok(Self {
            temp_dir,
            output_dir,
        })
    }

    /// Write the uploaded bytes to a file in the workspace.
    pub async fn stage(&self, data: &[u8]) -> Result<PathBuf> {
        let path = self.input_path();
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Where [`stage`](Self::stage) writes the upload.
    pub fn input_path(&self) -> PathBuf {
        self.temp_dir.path().join(INPUT_NAME)
    }

    /// Directory collecting the artifacts.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of an artifact inside the output directory.
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Move the output directory to `dest`.
    ///
    /// Fails if `dest` already exists. Parents of `dest` are created.
    pub fn finalize(self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = dest.as_ref();
        if dest.exists() {
            return Err(Error::Workspace(format!(
                "destination already exists: {}",
                dest.display()
            )));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&self.output_dir, dest).map_err(|e| {
            Error::Workspace(format!(
                "failed to move output to {}: {e}",
                dest.display()
            ))
        })?;
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_and_finalize() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::new_in(root.path().join("tmp")).unwrap();

        let input = workspace.stage(b"abc").await.unwrap();
        assert!(input.starts_with(workspace.temp_dir()));
        assert_eq!(std::fs::read(&input).unwrap(), b"abc");

        std::fs::write(workspace.output_file("track.aac"), b"frames").unwrap();
        let dest = root.path().join("media/alice/1");
        let temp = workspace.temp_dir().to_path_buf();
        let final_dir = workspace.finalize(&dest).unwrap();

        assert_eq!(final_dir, dest);
        assert_eq!(std::fs::read(dest.join("track.aac")).unwrap(), b"frames");
        assert!(!temp.exists(), "workspace should be removed on drop");
    }

    #[test]
    fn test_finalize_refuses_existing_destination() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("taken");
        std::fs::create_dir(&dest).unwrap();

        let workspace = Workspace::new_in(root.path()).unwrap();
        assert!(matches!(
            workspace.finalize(&dest),
            Err(Error::Workspace(_))
        ));
    }

    #[test]
    fn test_drop_cleans_up() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::new_in(root.path()).unwrap();
        let path = workspace.temp_dir().to_path_buf();
        assert!(workspace.output_dir().is_dir());
        drop(workspace);
        assert!(!path.exists());
    }
}
