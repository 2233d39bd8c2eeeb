use crate::config::CollisionPolicy;
use crate::error::ArchiveError;
use crate::util::now_compact;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Moved under its own name.
    Moved { to: PathBuf },
    /// Name was taken; moved under a suffixed name.
    Renamed { to: PathBuf, taken: PathBuf },
    /// Name was taken; source left in place.
    Skipped { taken: PathBuf },
}

impl ArchiveOutcome {
    pub fn collided(&self) -> bool {
        !matches!(self, ArchiveOutcome::Moved { .. })
    }
}

pub struct Archiver {
    done_dir: PathBuf,
    policy: CollisionPolicy,
}

impl Archiver {
    pub fn new(done_dir: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self {
            done_dir: done_dir.into(),
            policy,
        }
    }

    /// Under [`CollisionPolicy::Skip`], the archive entry that would keep
    /// `source` from ever being archived. Checked before any work is done.
    pub fn blocked(&self, source: &Path) -> Option<PathBuf> {
        if self.policy != CollisionPolicy::Skip {
            return None;
        }
        let target = self.done_dir.join(source.file_name()?);
        target.exists().then_some(target)
    }

    pub fn archive(&self, source: &Path) -> Result<ArchiveOutcome, ArchiveError> {
        std::fs::create_dir_all(&self.done_dir).map_err(|source| ArchiveError::Prepare {
            path: self.done_dir.clone(),
            source,
        })?;

        let file_name = source.file_name().unwrap_or_default();
        let target = self.done_dir.join(file_name);
        if !target.exists() {
            move_file(source, &target)?;
            info!("archived {} -> {}", source.display(), target.display());
            return Ok(ArchiveOutcome::Moved { to: target });
        }

        match self.policy {
            CollisionPolicy::Skip => {
                warn!(
                    "archive entry {} already exists; leaving {} in place",
                    target.display(),
                    source.display()
                );
                Ok(ArchiveOutcome::Skipped { taken: target })
            }
            CollisionPolicy::Suffix => {
                let renamed = self.free_suffixed_name(source);
                move_file(source, &renamed)?;
                warn!(
                    "archive entry {} already exists; archived as {}",
                    target.display(),
                    renamed.display()
                );
                Ok(ArchiveOutcome::Renamed {
                    to: renamed,
                    taken: target,
                })
            }
        }
    }

    fn free_suffixed_name(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let stamp = now_compact();

        let mut candidate = self.done_dir.join(format!("{stem}-{stamp}{ext}"));
        let mut n = 2u32;
        while candidate.exists() {
            candidate = self.done_dir.join(format!("{stem}-{stamp}-{n}{ext}"));
            n += 1;
        }
        candidate
    }
}

fn move_file(from: &Path, to: &Path) -> Result<(), ArchiveError> {
    let err = |source| ArchiveError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems; fall back to copy + remove.
    std::fs::copy(from, to).map_err(err)?;
    if let Err(e) = std::fs::remove_file(from) {
        let _ = std::fs::remove_file(to);
        return Err(err(e));
    }
    Ok(())
}
