use crate::error::{MediaError, MediaResult};
use crate::models::ImageUpload;
use base64::Engine;

/// Upload limit for photos and tiles (5 MB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Rejects non-image files and images over the limit. Runs before any upload
/// is attempted.
pub fn validate_image(upload: &ImageUpload) -> MediaResult<()> {
    if !upload.content_type.starts_with("image/") {
        return Err(MediaError::NotAnImage(upload.content_type.clone()));
    }

    if upload.size() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge {
            size: upload.size(),
            limit: MAX_IMAGE_BYTES,
        });
    }

    Ok(())
}

/// Encodes the image as a `data:` URL, the form photos take in the local store
pub fn to_data_url(upload: &ImageUpload) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(&upload.bytes);
    format!("data:{};base64,{}", upload.content_type, b64)
}
