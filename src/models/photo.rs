use serde::{Deserialize, Serialize};

/// Image attached to a piece or a glaze test tile.
///
/// `url` is either a public storage URL (remote) or a data URL (local).
/// `storage_path` is only set for objects that live in remote storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl Photo {
    /// Photo held inline, e.g. a data URL in offline mode
    pub fn inline(url: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            storage_path: None,
        }
    }

    pub fn stored(id: String, url: String, storage_path: String) -> Self {
        Self {
            id,
            url,
            storage_path: Some(storage_path),
        }
    }
}
