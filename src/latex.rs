use crate::config::Config;
use crate::convert::Converter;
use crate::error::ConvertError;
use crate::materialize::StagedArtifacts;
use crate::util::replace_dir_with_copy;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct LatexOutput {
    pub dir: PathBuf,
    pub tex_path: PathBuf,
    pub images_dir: PathBuf,
}

/// Runs the converter on a staged document, then gives the `.tex` its own
/// copy of the images it references.
pub fn render<C: Converter>(
    cfg: &Config,
    converter: &C,
    staged: &StagedArtifacts,
    output_dir: &Path,
    base_name: &str,
) -> Result<LatexOutput, ConvertError> {
    std::fs::create_dir_all(output_dir).map_err(|source| ConvertError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let tex_path = output_dir.join(format!("{base_name}.tex"));
    remove_stale(&tex_path)?;
    converter.convert(&staged.markdown_path, &tex_path, &cfg.converter.extra_args)?;

    let images_dir = output_dir.join(&cfg.output.images_dirname);
    replace_dir_with_copy(&staged.images_dir, &images_dir).map_err(|source| ConvertError::Io {
        path: images_dir.clone(),
        source,
    })?;

    info!(
        "latex {} ({} images copied)",
        tex_path.display(),
        staged.images.len()
    );

    Ok(LatexOutput {
        dir: output_dir.to_path_buf(),
        tex_path,
        images_dir,
    })
}

fn remove_stale(path: &Path) -> Result<(), ConvertError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ConvertError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
