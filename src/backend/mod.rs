// Access to the hosted backend: table reads/writes and the identity service

use async_trait::async_trait;

use crate::models::{
    AuthSession, AuthUser, Brand, Dealership, Feature, Profile, SignUpOutcome, TestDriveBooking,
    VehiclePage, VehicleRecord,
};
use crate::query::VehicleQuery;

mod supabase;

#[cfg(test)]
pub mod memory;

pub use supabase::SupabaseClient;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    // Raw message reported by the backend; shown to users on form errors
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("unexpected backend response: {0}")]
    Decode(String),

    #[error("sign up did not return a user")]
    MissingUser,
}

impl BackendError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Api { status: 401 | 403, .. })
    }
}

/// Operations the marketplace needs from its backend. Write calls take the
/// caller's access token so row-level policies see the right user; `None`
/// falls back to the public key.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn select_vehicles(&self, query: &VehicleQuery) -> Result<VehiclePage, BackendError>;
    async fn get_vehicle(&self, id: &str) -> Result<Option<VehicleRecord>, BackendError>;
    async fn list_brands(&self) -> Result<Vec<Brand>, BackendError>;
    async fn list_features(&self) -> Result<Vec<Feature>, BackendError>;
    async fn list_models(&self, brand_id: &str) -> Result<Vec<String>, BackendError>;

    async fn get_profile(&self, user_id: &str, access_token: &str) -> Result<Option<Profile>, BackendError>;
    async fn insert_profile(&self, profile: &Profile, access_token: Option<&str>) -> Result<(), BackendError>;
    async fn update_profile_name(&self, user_id: &str, full_name: &str, access_token: &str) -> Result<(), BackendError>;
    async fn insert_dealership(&self, dealership: &Dealership, access_token: Option<&str>) -> Result<(), BackendError>;
    async fn insert_booking(&self, booking: &TestDriveBooking, access_token: &str) -> Result<(), BackendError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
    /// `Ok(None)` when the token is no longer accepted.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, BackendError>;
}
