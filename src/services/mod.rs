pub mod persistence;
pub mod retry;
pub mod session;
pub mod studio;
pub mod sync;

pub use persistence::{LocalBackend, Persistence, PhotoTarget, RemoteBackend};
pub use retry::RetryPolicy;
pub use session::{AuthPhase, IdentityContext};
pub use studio::Studio;
pub use sync::{LoadSource, Loaded, SyncMode, Synchronizer};
