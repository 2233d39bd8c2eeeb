use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lists the PDFs directly inside `dir`, sorted by file name.
///
/// A missing directory is created and yields an empty list.
pub fn scan_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        info!("intake directory {} missing; creating it", dir.display());
        crate::util::ensure_dir(dir)?;
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read_dir entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if is_pdf(&path) {
            out.push(path);
        } else {
            debug!("skipping non-PDF {}", path.display());
        }
    }
    out.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(out)
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
