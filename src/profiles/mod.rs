//! Profiles: the one-to-one extension of an account holding its photo.

pub mod provision;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use provision::{ensure_profile, ProfileLookup};

/// Image reference given to every new profile until a photo is uploaded.
pub const DEFAULT_FOTO: &str = "default.jpg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Path of the photo relative to the media root.
    pub foto: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(account_id: Uuid, foto: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            foto: foto.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_default_foto(&self) -> bool {
        self.foto == DEFAULT_FOTO
    }

    pub fn set_foto(&mut self, reference: impl Into<String>) {
        self.foto = reference.into();
        self.updated_at = Utc::now();
    }
}

pub fn default_profile(account_id: Uuid) -> Profile {
    Profile::new(account_id, DEFAULT_FOTO)
}
