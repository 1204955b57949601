//! Per-run work directory.
//!
//! Layout: `<input dir>/video_work_<stem>/{images,audio,clips}`. Rendered
//! images and per-frame clips are rebuilt on every run; synthesized audio is
//! kept so unchanged segments are not re-synthesized.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Scratch directories for one input deck.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
    images: PathBuf,
    audio: PathBuf,
    clips: PathBuf,
}

impl WorkDir {
    /// Work directory next to the input file.
    pub fn for_input(input: &Path) -> Self {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("deck");
        let parent = input.parent().unwrap_or_else(|| Path::new("."));
        Self::at(parent.join(format!("video_work_{}", stem)))
    }

    /// Work directory at an explicit location.
    pub fn at(root: PathBuf) -> Self {
        Self {
            images: root.join("images"),
            audio: root.join("audio"),
            clips: root.join("clips"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images(&self) -> &Path {
        &self.images
    }

    pub fn audio(&self) -> &Path {
        &self.audio
    }

    pub fn clips(&self) -> &Path {
        &self.clips
    }

    /// Create the directories, clearing images and clips. Audio is cleared
    /// only when `fresh` is set.
    pub fn prepare(&self, fresh: bool) -> Result<()> {
        clear_dir(&self.images)?;
        clear_dir(&self.clips)?;
        if fresh {
            log::info!("Discarding cached audio in {}", self.audio.display());
            clear_dir(&self.audio)?;
        }

        for dir in [&self.images, &self.audio, &self.clips] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create work directory: {}", dir.display()))?;
        }

        Ok(())
    }

    /// Remove the whole work directory unless `keep` is set.
    pub fn cleanup(&self, keep: bool) -> Result<()> {
        if keep {
            log::info!("Work files kept at {}", self.root.display());
            return Ok(());
        }
        if self.root.exists() {
            log::debug!("Removing {}", self.root.display());
            fs::remove_dir_all(&self.root)
                .with_context(|| format!("Failed to remove {}", self.root.display()))?;
        }
        Ok(())
    }

    /// Run `build` against this directory, then clean up whether or not it
    /// succeeded. A build error takes precedence over a cleanup error.
    pub fn run_then_cleanup<T>(&self, keep: bool, build: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let result = build(self);
        let cleaned = self.cleanup(keep);

        match (result, cleaned) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), cleaned) => {
                if let Err(cleanup_err) = cleaned {
                    log::warn!("{:#}", cleanup_err);
                }
                Err(e)
            }
        }
    }
}

fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to clear {}", dir.display()))?;
    }
    Ok(())
}
