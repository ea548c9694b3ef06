//! Provider/user directory port

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::errors::BookingResult;

/// Minimal identity record shared by providers and users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    /// Push target for the notification dispatcher, when registered
    pub push_target: Option<String>,
}

/// Partial update to an identity record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityPatch {
    pub display_name: Option<String>,
    pub push_target: Option<String>,
}

/// Directory of providers and users, owned by a sibling service.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn get_by_id(&self, id: &str) -> BookingResult<Option<Identity>>;

    async fn update(&self, id: &str, patch: IdentityPatch) -> BookingResult<()>;
}
