use crate::error::AppError;
use crate::services::retry::RetryPolicy;
use crate::storage::{LocalStore, StoreKey};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// Where collections come from, derived from the identity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Backend configured but nobody signed in
    SignedOut,
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    /// Remote load failed; last known local copy used instead
    LocalFallback,
    Local,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub source: LoadSource,
}

/// Loads entity collections from the backend or the local store
#[derive(Debug, Clone)]
pub struct Synchronizer {
    policy: RetryPolicy,
    startup_delay: Duration,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), Duration::from_millis(100))
    }
}

impl Synchronizer {
    pub fn new(policy: RetryPolicy, startup_delay: Duration) -> Self {
        Self {
            policy,
            startup_delay,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Loads the collection stored under `key`.
    ///
    /// Online loads wait for the startup delay, then run `fetch` under the
    /// retry policy. When that fails the local copy is used. Nothing is
    /// written to the local store here.
    pub async fn load<T, F, Fut>(
        &self,
        mode: SyncMode,
        fallback: &LocalStore,
        key: StoreKey,
        fetch: F,
    ) -> Loaded<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<T>, AppError>>,
    {
        match mode {
            SyncMode::SignedOut => Loaded {
                items: Vec::new(),
                source: LoadSource::Empty,
            },
            SyncMode::Offline => Loaded {
                items: fallback.get(key, Vec::new()),
                source: LoadSource::Local,
            },
            SyncMode::Online => {
                if !self.startup_delay.is_zero() {
                    tokio::time::sleep(self.startup_delay).await;
                }

                match self.policy.run(key.as_str(), fetch).await {
                    Ok(items) => {
                        log::debug!("Loaded {} {} from backend", items.len(), key.as_str());
                        Loaded {
                            items,
                            source: LoadSource::Remote,
                        }
                    }
                    Err(e) => {
                        log::error!(
                            "Loading {} failed, using local copy: {}",
                            key.as_str(),
                            e
                        );
                        Loaded {
                            items: fallback.get(key, Vec::new()),
                            source: LoadSource::LocalFallback,
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sync() -> Synchronizer {
        Synchronizer::new(RetryPolicy::new(3, Duration::from_millis(1)), Duration::ZERO)
    }

    fn store_with(values: &[&str]) -> LocalStore {
        let store = LocalStore::in_memory().unwrap();
        store.set(StoreKey::Projects, &values.to_vec());
        store
    }

    #[tokio::test]
    async fn test_abort_abort_success_uses_remote_data() {
        let store = store_with(&["stale"]);
        let calls = Cell::new(0);

        let loaded: Loaded<String> = sync()
            .load(SyncMode::Online, &store, StoreKey::Projects, || {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt < 3 {
                        Err(AppError::Aborted("signal aborted".into()))
                    } else {
                        Ok(vec!["fresh".to_string()])
                    }
                }
            })
            .await;

        assert_eq!(calls.get(), 3);
        assert_eq!(loaded.items, vec!["fresh".to_string()]);
        assert_eq!(loaded.source, LoadSource::Remote);
        // remote loads never write the local copy
        let local: Vec<String> = store.get(StoreKey::Projects, Vec::new());
        assert_eq!(local, vec!["stale".to_string()]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back_to_local() {
        let store = store_with(&["stale"]);
        let loaded: Loaded<String> = sync()
            .load(SyncMode::Online, &store, StoreKey::Projects, || async {
                Err(AppError::Aborted("signal aborted".into()))
            })
            .await;

        assert_eq!(loaded.items, vec!["stale".to_string()]);
        assert_eq!(loaded.source, LoadSource::LocalFallback);
    }

    #[tokio::test]
    async fn test_other_failure_falls_back_immediately() {
        let store = store_with(&["stale"]);
        let calls = Cell::new(0);
        let loaded: Loaded<String> = sync()
            .load(SyncMode::Online, &store, StoreKey::Projects, || {
                calls.set(calls.get() + 1);
                async { Err(AppError::Remote { status: 500, message: "boom".into() }) }
            })
            .await;

        assert_eq!(calls.get(), 1);
        assert_eq!(loaded.source, LoadSource::LocalFallback);
    }

    #[tokio::test]
    async fn test_signed_out_is_empty_and_offline_is_local() {
        let store = store_with(&["kept"]);
        let never = || async { Ok::<Vec<String>, AppError>(vec!["remote".into()]) };

        let loaded = sync()
            .load(SyncMode::SignedOut, &store, StoreKey::Projects, never)
            .await;
        assert!(loaded.items.is_empty());
        assert_eq!(loaded.source, LoadSource::Empty);

        let loaded = sync()
            .load(SyncMode::Offline, &store, StoreKey::Projects, never)
            .await;
        assert_eq!(loaded.items, vec!["kept".to_string()]);
        assert_eq!(loaded.source, LoadSource::Local);
    }
}
