//! # Kiln Auth
//!
//! Email/password authentication against the hosted backend's auth endpoints.
//!
//! This crate provides:
//! - Sign-up, sign-in, sign-out, password reset and password update
//! - Session restore with refresh of expired access tokens
//! - An auth-state notification channel that always holds the latest event
//!
//! ## Separation of Concerns
//!
//! This crate focuses solely on authentication. It does **not**:
//! - Persist sessions between runs (handled by the application)
//! - Fetch profiles or any table data (handled by the application's gateway)
//! - Retry aborted requests (the application applies its own retry policy)
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use kiln_auth::AuthService;
//!
//! let auth = AuthService::new("https://xyz.supabase.co", "public-anon-key")?;
//! let mut events = auth.subscribe();
//! auth.restore_session(None).await?;
//!
//! let session = auth.sign_in("potter@example.com", "secret").await?;
//! events.changed().await?;
//! ```

pub mod models;
pub mod service;

pub use models::{AuthEvent, AuthEventKind, AuthUser, Session, TokenResponse};
pub use service::{AuthError, AuthService};
