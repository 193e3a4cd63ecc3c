//! # Kiln Media
//!
//! Image handling for Coastal Kiln: piece photos, glaze test tiles and avatars.
//!
//! This crate provides:
//! - Validation of picked images (MIME type and the 5 MB size limit)
//! - Content sniffing for files read from disk
//! - Data URLs for photos kept in the local store
//! - An object-storage client for the hosted backend's buckets
//!
//! ## Separation of Concerns
//!
//! This crate only moves bytes. It does **not**:
//! - Insert photo metadata rows (handled by the application's gateway)
//! - Resolve the signed-in user (the caller passes the owner id)
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use kiln_media::{Bucket, ImageUpload, StorageClient};
//!
//! let upload = ImageUpload::from_path("bowl.jpg".as_ref())?;
//! let storage = StorageClient::new("https://xyz.supabase.co", "public-anon-key")?;
//! let stored = storage
//!     .store_for(Bucket::ProjectPhotos, &user_id, &project_id, &upload)
//!     .await?;
//! println!("uploaded to {}", stored.public_url);
//! ```

pub mod error;
pub mod models;
pub mod storage;
pub mod validate;

pub use error::{MediaError, MediaResult};
pub use models::{Bucket, ImageUpload, StoredObject};
pub use storage::{avatar_path, object_path, StorageClient};
pub use validate::{to_data_url, validate_image, MAX_IMAGE_BYTES};
