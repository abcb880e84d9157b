//! Uploaded profile photos: validation, storage under the media root, and
//! reference → URL resolution.
//!
//! References are paths relative to the media root, e.g.
//! `fotos_perfil/new_photo.png`. Stored files are never overwritten; a name
//! clash gets a random `_xxxxxxx` suffix before the extension.

use std::fs::{self, OpenOptions};
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{ImageFormat, ImageReader, Rgb, RgbImage};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::UploadSettings;
use crate::profiles::DEFAULT_FOTO;

/// Longest accepted upload file name.
pub const MAX_FILENAME_LENGTH: usize = 100;

/// Extensions accepted for the `foto` field.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "bmp", "gif", "ico", "jpeg", "jpg", "png", "tif", "tiff", "webp",
];

const COLLISION_ATTEMPTS: usize = 16;

/// Largest accepted width or height, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 10_000;

pub const NO_FILE: &str = "No file was submitted. Check the encoding type on the form.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";
pub const INVALID_FILE_NAME: &str = "The submitted file name is not valid.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A file part of a submission. `bytes` may hold only a prefix of the
/// upload when the reader stopped early; `size` is always the full length.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub size: usize,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            file_name: file_name.into(),
            size: bytes.len(),
            bytes,
        }
    }
}

/// An upload whose header reads as an image within the configured limits.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub upload: UploadedFile,
    /// Sanitized base name the file is stored under.
    pub file_name: String,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Checks an upload against the `foto` field rules; errors are user-facing.
pub fn validate_image(upload: UploadedFile, max_bytes: usize) -> Result<ValidatedImage, Vec<String>> {
    if upload.file_name.is_empty() {
        return Err(vec![NO_FILE.to_string()]);
    }
    if upload.size == 0 {
        return Err(vec![EMPTY_FILE.to_string()]);
    }

    let mut errors = Vec::new();
    let name_len = upload.file_name.chars().count();
    if name_len > MAX_FILENAME_LENGTH {
        errors.push(format!(
            "Ensure this filename has at most {MAX_FILENAME_LENGTH} characters (it has {name_len})."
        ));
    }
    if upload.size > max_bytes {
        errors.push(format!(
            "The file is too large ({} bytes). The maximum size is {max_bytes} bytes.",
            upload.size
        ));
    }
    let file_name = valid_file_name(&upload.file_name);
    match file_name.as_deref().map(extension_of) {
        None => errors.push(INVALID_FILE_NAME.to_string()),
        Some(extension) if !IMAGE_EXTENSIONS.contains(&extension.as_str()) => {
            errors.push(format!(
                "File extension “{extension}” is not allowed. Allowed extensions are: {}.",
                IMAGE_EXTENSIONS.join(", ")
            ));
        }
        Some(_) => {}
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    let Some(file_name) = file_name else {
        return Err(vec![INVALID_FILE_NAME.to_string()]);
    };

    let Some((format, width, height)) = read_header(&upload.bytes) else {
        return Err(vec![INVALID_IMAGE.to_string()]);
    };
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(vec![format!(
            "Ensure the image is at most {MAX_IMAGE_DIMENSION}×{MAX_IMAGE_DIMENSION} pixels (it is {width}×{height})."
        )]);
    }
    Ok(ValidatedImage {
        upload,
        file_name,
        format,
        width,
        height,
    })
}

/// Format and dimensions from the image header; pixel data is not decoded.
fn read_header(bytes: &[u8]) -> Option<(ImageFormat, u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let format = reader.format()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some((format, width, height))
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Reduces an uploaded name to a safe base name: spaces become underscores
/// and anything other than letters, digits, `-`, `_` and `.` is dropped.
pub fn valid_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let cleaned: String = base
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

/// Result of [`MediaStorage::save`].
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub reference: String,
    pub path: PathBuf,
    pub sha256: String,
}

/// File storage rooted at the media directory.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    upload_to: String,
    media_url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, settings: &UploadSettings) -> Self {
        Self {
            root: root.into(),
            upload_to: settings.upload_to.trim_matches('/').to_string(),
            media_url: settings.media_url.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }

    /// Public URL for a stored reference.
    pub fn url(&self, reference: &str) -> String {
        format!(
            "{}/{}",
            self.media_url.trim_end_matches('/'),
            reference.trim_start_matches('/')
        )
    }

    /// Writes the image under `upload_to`, never replacing an existing file.
    pub fn save(&self, image: &ValidatedImage) -> Result<StoredMedia> {
        let name = image.file_name.clone();
        let dir = self.root.join(&self.upload_to);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed creating upload directory {:?}", dir))?;

        let mut candidate = name.clone();
        for _ in 0..COLLISION_ATTEMPTS {
            let path = dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&image.upload.bytes)
                        .with_context(|| format!("Failed writing upload {:?}", path))?;
                    let reference = format!("{}/{}", self.upload_to, candidate);
                    let sha256 = compute_hash(&image.upload.bytes);
                    info!(%reference, bytes = image.upload.bytes.len(), %sha256, "Stored upload");
                    return Ok(StoredMedia {
                        reference,
                        path,
                        sha256,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_random_suffix(&name);
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Failed opening upload {:?}", path))
                }
            }
        }
        bail!("Could not find a free file name for {name:?}")
    }

    /// Seeds the placeholder photo every new profile points at.
    pub fn ensure_placeholder(&self) -> Result<()> {
        let path = self.path_of(DEFAULT_FOTO);
        if path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed creating media root {:?}", self.root))?;
        RgbImage::from_pixel(64, 64, Rgb([205, 205, 205]))
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("Failed writing placeholder {:?}", path))?;
        Ok(())
    }
}

fn with_random_suffix(name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{name}_{suffix}"),
    }
}

/// Computes a lowercase hex SHA-256 hash of the provided bytes.
pub fn compute_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{:x}", digest)
}
