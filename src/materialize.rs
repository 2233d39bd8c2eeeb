//! Turns an OCR result into the on-disk staging set for one document:
//! `images/*`, the assembled Markdown and the raw response.
//!
//! Everything is written into a hidden temporary sibling of the staging
//! directory and renamed into place at the end, so a directory at the final
//! path is always complete.

use crate::config::Config;
use crate::error::MaterializeError;
use crate::ocr::{OcrImage, OcrResult};
use crate::util::sha256_hex;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

const MAX_VERBATIM_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct StagedImage {
    pub id: String,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct StagedArtifacts {
    pub dir: PathBuf,
    pub markdown_path: PathBuf,
    pub response_path: PathBuf,
    pub images_dir: PathBuf,
    pub images: Vec<StagedImage>,
}

pub fn materialize(
    cfg: &Config,
    result: &OcrResult,
    staging_dir: &Path,
) -> Result<StagedArtifacts, MaterializeError> {
    let out = &cfg.output;
    let parent = staging_dir.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| MaterializeError::io(parent, e))?;

    let name = staging_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}.partial-"))
        .tempdir_in(parent)
        .map_err(|e| MaterializeError::io(parent, e))?;

    let tmp_images = tmp.path().join(&out.images_dirname);
    std::fs::create_dir_all(&tmp_images).map_err(|e| MaterializeError::io(&tmp_images, e))?;

    let names = assign_filenames(result)?;
    let mut images = Vec::new();
    for image in result.pages.iter().flat_map(|p| p.images.iter()) {
        let filename = &names[&image.id];
        let bytes = decode_image(image)?;
        let path = tmp_images.join(filename);
        std::fs::write(&path, &bytes).map_err(|e| MaterializeError::io(&path, e))?;
        debug!("image {} -> {} ({} bytes)", image.id, filename, bytes.len());
        if !images.iter().any(|s: &StagedImage| s.id == image.id) {
            images.push(StagedImage {
                id: image.id.clone(),
                filename: filename.clone(),
            });
        }
    }

    let pages = result
        .pages
        .iter()
        .map(|p| rewrite_image_refs(&p.markdown, &names, &out.images_dirname))
        .collect::<Vec<_>>();
    let markdown = pages.join("\n\n");
    check_references(&markdown, &out.images_dirname, &tmp_images)?;

    let md_tmp = tmp.path().join(&out.markdown_filename);
    std::fs::write(&md_tmp, &markdown).map_err(|e| MaterializeError::io(&md_tmp, e))?;

    let json_tmp = tmp.path().join(&out.response_filename);
    std::fs::write(&json_tmp, to_pretty_json(&result.raw)?)
        .map_err(|e| MaterializeError::io(&json_tmp, e))?;

    if staging_dir.exists() {
        std::fs::remove_dir_all(staging_dir).map_err(|e| MaterializeError::io(staging_dir, e))?;
    }
    std::fs::rename(tmp.path(), staging_dir).map_err(|e| MaterializeError::io(staging_dir, e))?;

    info!(
        "staged {} ({} images, {} bytes markdown)",
        staging_dir.display(),
        images.len(),
        markdown.len()
    );

    Ok(StagedArtifacts {
        dir: staging_dir.to_path_buf(),
        markdown_path: staging_dir.join(&out.markdown_filename),
        response_path: staging_dir.join(&out.response_filename),
        images_dir: staging_dir.join(&out.images_dirname),
        images,
    })
}

/// Maps every provider id to a distinct file name.
pub fn assign_filenames(result: &OcrResult) -> Result<HashMap<String, String>, MaterializeError> {
    let mut by_id: HashMap<String, String> = HashMap::new();
    let mut by_name: HashMap<String, String> = HashMap::new();
    for image in result.pages.iter().flat_map(|p| p.images.iter()) {
        if by_id.contains_key(&image.id) {
            continue;
        }
        let filename = image_filename(&image.id, image.content_type());
        if let Some(first) = by_name.get(&filename) {
            return Err(MaterializeError::FilenameCollision {
                first: first.clone(),
                second: image.id.clone(),
                filename,
            });
        }
        by_name.insert(filename.clone(), image.id.clone());
        by_id.insert(image.id.clone(), filename);
    }
    Ok(by_id)
}

/// File name for a provider image id.
///
/// Safe ids are kept verbatim, gaining an extension from the content type
/// when they have none. Anything else is sanitized and tagged with a digest
/// of the original id.
pub fn image_filename(id: &str, content_type: Option<&str>) -> String {
    let fallback_ext = extension_for(content_type);
    if is_safe_component(id) {
        return if has_extension(id) {
            id.to_string()
        } else {
            format!("{id}.{fallback_ext}")
        };
    }

    let (stem, ext) = match id.rsplit_once('.') {
        Some((s, e)) if !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()) => {
            (s, e.to_ascii_lowercase())
        }
        _ => (id, fallback_ext.to_string()),
    };
    let mut clean: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if clean.trim_matches('_').is_empty() {
        clean = "image".to_string();
    }
    let digest = sha256_hex(id.as_bytes());
    format!("{clean}-{}.{ext}", &digest[..12])
}

fn is_safe_component(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_VERBATIM_LEN
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn has_extension(id: &str) -> bool {
    Path::new(id)
        .extension()
        .is_some_and(|e| !e.is_empty())
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type.map(|c| c.to_ascii_lowercase()).as_deref() {
        Some("image/jpeg") | Some("image/jpg") => "jpeg",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        Some("image/tiff") => "tiff",
        Some("image/bmp") => "bmp",
        Some("image/svg+xml") => "svg",
        _ => "png",
    }
}

fn decode_image(image: &OcrImage) -> Result<Vec<u8>, MaterializeError> {
    let body = image
        .base64_body()
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| MaterializeError::MissingPayload {
            id: image.id.clone(),
        })?;
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|source| MaterializeError::Decode {
            id: image.id.clone(),
            source,
        })
}

/// Points every `![alt](<id>)` whose target is exactly a known id at
/// `<images_dir>/<filename>`. Other links are left alone.
pub fn rewrite_image_refs(
    markdown: &str,
    names: &HashMap<String, String>,
    images_dir: &str,
) -> String {
    RE_IMAGE
        .replace_all(markdown, |caps: &regex::Captures<'_>| {
            let alt = &caps[1];
            let target = caps[2].trim();
            match names.get(target) {
                Some(filename) => format!("![{alt}]({images_dir}/{filename})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Fails on any relative image link that does not resolve under `images_root`.
fn check_references(
    markdown: &str,
    images_dirname: &str,
    images_root: &Path,
) -> Result<(), MaterializeError> {
    let prefix = format!("{images_dirname}/");
    for caps in RE_IMAGE.captures_iter(markdown) {
        let target = caps[2].trim();
        if is_external(target) {
            continue;
        }
        let resolved = target
            .strip_prefix(&prefix)
            .map(|f| images_root.join(f))
            .filter(|p| p.is_file());
        if resolved.is_none() {
            return Err(MaterializeError::DanglingReference {
                target: target.to_string(),
            });
        }
    }
    Ok(())
}

fn is_external(target: &str) -> bool {
    target.is_empty()
        || target.contains("://")
        || target.starts_with("data:")
        || target.starts_with('#')
        || target.starts_with('/')
}

/// Four-space indented JSON, non-ASCII kept as-is.
fn to_pretty_json(value: &serde_json::Value) -> Result<Vec<u8>, MaterializeError> {
    let mut buf = Vec::new();
    let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
    value.serialize(&mut ser)?;
    Ok(buf)
}
