use crate::media::{validate_image, UploadedFile, ValidatedImage};

use super::FormErrors;

/// Multipart field carrying the new profile photo.
pub const FOTO_FIELD: &str = "foto";

/// Profile photo submission. `foto` is `None` when no file was chosen, in
/// which case the current photo is kept.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateForm {
    pub foto: Option<UploadedFile>,
}

impl ProfileUpdateForm {
    pub fn with_foto(upload: UploadedFile) -> Self {
        Self { foto: Some(upload) }
    }

    pub fn validate(self, max_image_bytes: usize) -> Result<Option<ValidatedImage>, FormErrors> {
        let Some(upload) = self.foto else {
            return Ok(None);
        };
        validate_image(upload, max_image_bytes).map(Some).map_err(|messages| {
            let mut errors = FormErrors::new();
            errors.extend(FOTO_FIELD, messages);
            errors
        })
    }
}
