// Records exchanged with the marketplace backend

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// A listed vehicle, flattened from the backend row shape
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VehicleRecord {
    pub id: String,
    pub brand_id: String,
    pub brand: String, // Related brand name
    pub model: String,
    pub variant: Option<String>,
    pub year: i32,
    pub price: f64,
    pub mileage: f64,
    pub battery_capacity: f64, // kWh
    pub range_wltp: f64,       // km
    pub charging_power: Option<f64>, // kW
    pub acceleration: Option<f64>,   // 0-100 km/h in seconds
    pub top_speed: Option<f64>,      // km/h
    pub power_output: Option<f64>,   // kW
    pub color: Option<String>,
    pub condition: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub features: Vec<String>, // Related feature names
    #[serde(default)]
    pub feature_ids: Vec<String>, // From the vehicle_features join rows
}

impl VehicleRecord {
    pub fn title(&self) -> String {
        match self.variant.as_deref().filter(|v| !v.is_empty()) {
            Some(variant) => format!("{} {} {}", self.brand, self.model, variant),
            None => format!("{} {}", self.brand, self.model),
        }
    }
}

// One page of vehicles plus the exact number of matches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehiclePage {
    pub vehicles: Vec<VehicleRecord>,
    pub total_count: u64,
}

// Outcome of applying a filter state; superseded by the next query
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub vehicles: Vec<VehicleRecord>,
    pub total_count: u64,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn failed(message: impl Into<String>) -> Self {
        QueryResult {
            vehicles: Vec::new(),
            total_count: 0,
            error: Some(message.into()),
        }
    }
}

impl From<VehiclePage> for QueryResult {
    fn from(page: VehiclePage) -> Self {
        QueryResult {
            vehicles: page.vehicles,
            total_count: page.total_count,
            error: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Brand {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Feature {
    pub id: String,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Dealer,
    Private,
}

impl UserType {
    pub fn label(self) -> &'static str {
        match self {
            UserType::Admin => "Administrator",
            UserType::Dealer => "Dealer",
            UserType::Private => "Private seller",
        }
    }
}

// Row of the `profiles` table; also used as the insert payload
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub user_type: UserType,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eircode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<BTreeMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_consent: Option<bool>,
}

impl Profile {
    pub fn basic(id: impl Into<String>, user_type: UserType, full_name: impl Into<String>) -> Self {
        Profile {
            id: id.into(),
            user_type,
            full_name: full_name.into(),
            contact_phone: None,
            address: None,
            city: None,
            county: None,
            eircode: None,
            preferred_contact: None,
            notification_preferences: None,
            marketing_consent: None,
        }
    }
}

// Insert payload for the `dealerships` table
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Dealership {
    pub profile_id: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub eircode: String,
    pub website: String,
    pub contact_name: String,
    pub contact_role: String,
    pub phone: String,
    pub dealership_type: String,
    pub registration_number: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
}

// Insert payload for the `test_drive_bookings` table
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TestDriveBooking {
    pub vehicle_id: String,
    pub user_id: String,
    pub preferred_date: DateTime<Utc>,
    pub alternate_date: Option<DateTime<Utc>>,
    pub notes: String,
    pub status: BookingStatus,
}

// Identity record returned by the auth service
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

// Result of a sign-up: the session is absent when e-mail confirmation is pending
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

// Signed-in user together with their profile row
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: String,
    pub email: Option<String>,
    pub profile: Option<Profile>,
}

impl CurrentUser {
    pub fn display_name(&self) -> String {
        self.profile
            .as_ref()
            .map(|p| p.full_name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "Account".to_string())
    }
}

// Struct to capture the sign-in form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_includes_variant_when_present() {
        let mut vehicle = crate::backend::memory::vehicle("v1", "tesla", "Tesla", 2023, 45000.0);
        assert_eq!(vehicle.title(), "Tesla Model Y");
        vehicle.variant = Some("Long Range".to_string());
        assert_eq!(vehicle.title(), "Tesla Model Y Long Range");
    }

    #[test]
    fn profile_insert_omits_unset_fields() {
        let profile = Profile::basic("u1", UserType::Dealer, "Aoife Byrne");
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["user_type"], "dealer");
        assert!(json.get("contact_phone").is_none());
        assert!(json.get("marketing_consent").is_none());
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let user = CurrentUser {
            id: "u1".into(),
            email: Some("sam@example.ie".into()),
            profile: None,
        };
        assert_eq!(user.display_name(), "sam@example.ie");
    }
}
