//! Per-worker isolated working directories for brute-force attempts.
//!
//! The decoders write their output next to the input file under a fixed
//! name, so concurrent attempts must never share a directory. Each executor
//! owns one `w_<slot>` directory holding its own copy of the cover (and the
//! lookup tables, when the toolkit needs them) for the whole run.

use std::path::{Path, PathBuf};

use stegstream_core::toolkit::TABLES_DIR_NAME;

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Failed to create sandbox {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {what} into sandbox {path}: {source}")]
    Copy {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What every sandbox is seeded with.
#[derive(Debug, Clone)]
pub struct SandboxAssets {
    /// The uploaded cover file.
    pub cover: PathBuf,
    /// Name the cover gets inside a sandbox: `file<ext>`.
    pub cover_name: String,
    /// Lookup-table directory to replicate, if any.
    pub tables: Option<PathBuf>,
}

impl SandboxAssets {
    pub fn new(cover: impl Into<PathBuf>, tables: Option<PathBuf>) -> Self {
        let cover = cover.into();
        let ext = cover
            .file_name()
            .map(|name| fsutil::dotted_extension(&name.to_string_lossy()))
            .unwrap_or_default();
        Self {
            cover,
            cover_name: format!("file{ext}"),
            tables,
        }
    }
}

/// An acquired worker directory. Removed on [`release`](Sandbox::release)
/// or, failing that, on drop.
#[derive(Debug)]
pub struct Sandbox {
    path: PathBuf,
    cover_name: String,
    released: bool,
}

impl Sandbox {
    /// Create `root/w_<slot>` and seed it. Any partially created directory is
    /// removed again if seeding fails.
    pub async fn acquire(
        root: &Path,
        slot: usize,
        assets: &SandboxAssets,
    ) -> Result<Self, SandboxError> {
        let path = root.join(format!("w_{slot}"));
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| SandboxError::Create {
                path: path.clone(),
                source,
            })?;

        // From here on, Drop cleans up.
        let sandbox = Self {
            path,
            cover_name: assets.cover_name.clone(),
            released: false,
        };

        tokio::fs::copy(&assets.cover, sandbox.cover_path())
            .await
            .map_err(|source| SandboxError::Copy {
                what: "cover",
                path: sandbox.path.clone(),
                source,
            })?;

        if let Some(tables) = &assets.tables {
            if tokio::fs::try_exists(tables).await.unwrap_or(false) {
                fsutil::copy_dir_all(tables, &sandbox.path.join(TABLES_DIR_NAME))
                    .await
                    .map_err(|source| SandboxError::Copy {
                        what: "lookup tables",
                        path: sandbox.path.clone(),
                        source,
                    })?;
            }
        }

        tracing::debug!(sandbox = %sandbox.path.display(), "Sandbox acquired");
        Ok(sandbox)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the cover inside the sandbox, relative to [`path`](Self::path).
    pub fn cover_name(&self) -> &str {
        &self.cover_name
    }

    pub fn cover_path(&self) -> PathBuf {
        self.path.join(&self.cover_name)
    }

    /// Remove the directory and everything in it.
    pub async fn release(mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            tracing::warn!(sandbox = %self.path.display(), error = %e, "Failed to remove sandbox");
        }
        self.released = true;
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}
