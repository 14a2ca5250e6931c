// Dealer and private-seller sign-up: only the last step writes to the backend

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::{Backend, BackendError};
use crate::models::{Dealership, Profile, SignUpOutcome, UserType};

pub const IRISH_COUNTIES: [&str; 32] = [
    "Antrim", "Armagh", "Carlow", "Cavan", "Clare", "Cork", "Derry",
    "Donegal", "Down", "Dublin", "Fermanagh", "Galway", "Kerry",
    "Kildare", "Kilkenny", "Laois", "Leitrim", "Limerick", "Longford",
    "Louth", "Mayo", "Meath", "Monaghan", "Offaly", "Roscommon",
    "Sligo", "Tipperary", "Tyrone", "Waterford", "Westmeath",
    "Wexford", "Wicklow",
];

pub const DEALERSHIP_TYPES: [&str; 6] = [
    "New Cars Only",
    "Used Cars Only",
    "EVs Only",
    "Multi-Brand",
    "Premium Brands",
    "Import Specialist",
];

pub const AVERAGE_LISTINGS: [&str; 4] = ["1-10", "10-50", "50-100", "100+"];

pub struct SubscriptionPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const SUBSCRIPTION_PLANS: [SubscriptionPlan; 4] = [
    SubscriptionPlan { id: "free", name: "Free", description: "Up to 5 listings" },
    SubscriptionPlan { id: "premium", name: "Premium", description: "Up to 50 listings, featured spots" },
    SubscriptionPlan { id: "pro", name: "Pro", description: "Unlimited listings, priority support" },
    SubscriptionPlan { id: "enterprise", name: "Enterprise", description: "Custom solutions for large dealers" },
];

pub struct NotificationPreference {
    pub id: &'static str,
    pub label: &'static str,
    pub default_checked: bool,
}

pub const NOTIFICATION_PREFERENCES: [NotificationPreference; 4] = [
    NotificationPreference { id: "messages", label: "New messages from buyers", default_checked: true },
    NotificationPreference { id: "offers", label: "Offers on your listings", default_checked: true },
    NotificationPreference { id: "updates", label: "Platform updates and news", default_checked: false },
    NotificationPreference { id: "tips", label: "Selling tips and market insights", default_checked: true },
];

pub const DEALER_STEPS: u8 = 4;
pub const SELLER_STEPS: u8 = 3;

// Checkboxes post "on" when ticked and nothing otherwise, so a missing
// checkbox field deserializes to None rather than the form default
fn checked(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty() && v != "false")
}

fn on(flag: bool) -> Option<String> {
    flag.then(|| "on".to_string())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DealerForm {
    #[serde(skip_serializing)]
    pub step: String,
    #[serde(skip_serializing)]
    pub action: String,
    pub dealership_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub registration_number: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub eircode: String,
    pub website: String,
    pub contact_name: String,
    pub contact_role: String,
    pub dealership_type: String,
    pub average_listings: String,
    #[serde(default)]
    pub photos: Option<String>,
    #[serde(default)]
    pub videos: Option<String>,
    #[serde(default)]
    pub three_sixty: Option<String>,
    pub subscription_plan: String,
    #[serde(default)]
    pub use_same_address: Option<String>,
    pub billing_address: String,
}

impl Default for DealerForm {
    fn default() -> Self {
        DealerForm {
            step: "1".to_string(),
            action: String::new(),
            dealership_name: String::new(),
            email: String::new(),
            password: String::new(),
            phone: String::new(),
            registration_number: String::new(),
            address: String::new(),
            city: String::new(),
            county: String::new(),
            eircode: String::new(),
            website: String::new(),
            contact_name: String::new(),
            contact_role: String::new(),
            dealership_type: String::new(),
            average_listings: "10-50".to_string(),
            photos: on(true),
            videos: None,
            three_sixty: None,
            subscription_plan: "free".to_string(),
            use_same_address: on(true),
            billing_address: String::new(),
        }
    }
}

/// Step on which each dealer field is shown.
pub const DEALER_FIELD_STEPS: [(&str, u8); 20] = [
    ("dealership_name", 1),
    ("email", 1),
    ("password", 1),
    ("phone", 1),
    ("registration_number", 1),
    ("address", 2),
    ("city", 2),
    ("county", 2),
    ("eircode", 2),
    ("website", 2),
    ("contact_name", 3),
    ("contact_role", 3),
    ("dealership_type", 3),
    ("average_listings", 3),
    ("photos", 3),
    ("videos", 3),
    ("three_sixty", 3),
    ("subscription_plan", 4),
    ("use_same_address", 4),
    ("billing_address", 4),
];

impl DealerForm {
    pub fn is_checked(&self, field: &str) -> bool {
        match field {
            "photos" => checked(&self.photos),
            "videos" => checked(&self.videos),
            "three_sixty" => checked(&self.three_sixty),
            "use_same_address" => checked(&self.use_same_address),
            _ => false,
        }
    }

    fn dealership(&self, profile_id: &str) -> Dealership {
        Dealership {
            profile_id: profile_id.to_string(),
            name: self.dealership_name.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            county: self.county.clone(),
            eircode: self.eircode.clone(),
            website: self.website.clone(),
            contact_name: self.contact_name.clone(),
            contact_role: self.contact_role.clone(),
            phone: self.phone.clone(),
            dealership_type: self.dealership_type.clone(),
            registration_number: self.registration_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SellerForm {
    #[serde(skip_serializing)]
    pub step: String,
    #[serde(skip_serializing)]
    pub action: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub eircode: String,
    pub preferred_contact: String,
    #[serde(default)]
    pub notify_messages: Option<String>,
    #[serde(default)]
    pub notify_offers: Option<String>,
    #[serde(default)]
    pub notify_updates: Option<String>,
    #[serde(default)]
    pub notify_tips: Option<String>,
    #[serde(default)]
    pub marketing_consent: Option<String>,
    #[serde(default)]
    pub accept_terms: Option<String>,
}

impl Default for SellerForm {
    fn default() -> Self {
        let default_for = |id: &str| {
            NOTIFICATION_PREFERENCES
                .iter()
                .find(|p| p.id == id)
                .and_then(|p| on(p.default_checked))
        };
        SellerForm {
            step: "1".to_string(),
            action: String::new(),
            full_name: String::new(),
            email: String::new(),
            password: String::new(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            county: String::new(),
            eircode: String::new(),
            preferred_contact: "email".to_string(),
            notify_messages: default_for("messages"),
            notify_offers: default_for("offers"),
            notify_updates: default_for("updates"),
            notify_tips: default_for("tips"),
            marketing_consent: None,
            accept_terms: None,
        }
    }
}

pub const SELLER_FIELD_STEPS: [(&str, u8); 15] = [
    ("full_name", 1),
    ("email", 1),
    ("password", 1),
    ("phone", 1),
    ("address", 2),
    ("city", 2),
    ("county", 2),
    ("eircode", 2),
    ("preferred_contact", 2),
    ("notify_messages", 3),
    ("notify_offers", 3),
    ("notify_updates", 3),
    ("notify_tips", 3),
    ("marketing_consent", 3),
    ("accept_terms", 3),
];

impl SellerForm {
    pub fn is_checked(&self, field: &str) -> bool {
        match field {
            "messages" | "notify_messages" => checked(&self.notify_messages),
            "offers" | "notify_offers" => checked(&self.notify_offers),
            "updates" | "notify_updates" => checked(&self.notify_updates),
            "tips" | "notify_tips" => checked(&self.notify_tips),
            "marketing_consent" => checked(&self.marketing_consent),
            "accept_terms" => checked(&self.accept_terms),
            _ => false,
        }
    }

    pub fn notification_preferences(&self) -> BTreeMap<String, bool> {
        NOTIFICATION_PREFERENCES
            .iter()
            .map(|pref| (pref.id.to_string(), self.is_checked(pref.id)))
            .collect()
    }

    fn profile(&self, user_id: &str) -> Profile {
        Profile {
            contact_phone: non_empty(&self.phone),
            address: non_empty(&self.address),
            city: non_empty(&self.city),
            county: non_empty(&self.county),
            eircode: non_empty(&self.eircode),
            preferred_contact: non_empty(&self.preferred_contact),
            notification_preferences: Some(self.notification_preferences()),
            marketing_consent: Some(self.is_checked("marketing_consent")),
            ..Profile::basic(user_id, UserType::Private, self.full_name.trim())
        }
    }
}

/// Creates an identity and its `profiles` row.
pub async fn sign_up(
    backend: &dyn Backend,
    email: &str,
    password: &str,
    user_type: UserType,
    full_name: &str,
) -> Result<SignUpOutcome, BackendError> {
    let outcome = backend.sign_up(email.trim(), password).await?;
    let token = outcome.session.as_ref().map(|s| s.access_token.as_str());
    backend
        .insert_profile(&Profile::basic(&outcome.user.id, user_type, full_name.trim()), token)
        .await?;
    tracing::info!("Registered {:?} user {}", user_type, outcome.user.id);
    Ok(outcome)
}

pub async fn register_dealer(backend: &dyn Backend, form: &DealerForm) -> Result<SignUpOutcome, BackendError> {
    let outcome = sign_up(backend, &form.email, &form.password, UserType::Dealer, &form.contact_name).await?;
    let token = outcome.session.as_ref().map(|s| s.access_token.as_str());
    backend
        .insert_dealership(&form.dealership(&outcome.user.id), token)
        .await?;
    tracing::info!(
        plan = %form.subscription_plan,
        "Dealership '{}' registered for user {}",
        form.dealership_name,
        outcome.user.id
    );
    Ok(outcome)
}

pub async fn register_seller(backend: &dyn Backend, form: &SellerForm) -> Result<SignUpOutcome, BackendError> {
    let outcome = backend.sign_up(form.email.trim(), &form.password).await?;
    let token = outcome.session.as_ref().map(|s| s.access_token.as_str());
    backend
        .insert_profile(&form.profile(&outcome.user.id), token)
        .await?;
    tracing::info!("Private seller registered: {}", outcome.user.id);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::wizard::hidden_fields;

    fn dealer_form() -> DealerForm {
        DealerForm {
            dealership_name: "Liffey EV Centre".into(),
            email: "sales@liffeyev.ie".into(),
            password: "s3cret-pass".into(),
            phone: "+353 1 555 0101".into(),
            registration_number: "IE123456".into(),
            address: "1 Quay Street".into(),
            city: "Dublin".into(),
            county: "Dublin".into(),
            eircode: "D01 X2Y3".into(),
            website: "https://liffeyev.ie".into(),
            contact_name: "Orla Kinsella".into(),
            contact_role: "Sales Manager".into(),
            dealership_type: "EVs Only".into(),
            ..DealerForm::default()
        }
    }

    #[tokio::test]
    async fn dealer_registration_writes_profile_and_dealership() {
        let backend = MemoryBackend::new();
        let outcome = register_dealer(&backend, &dealer_form()).await.unwrap();
        assert!(outcome.session.is_some());

        let profiles = backend.profiles.lock().unwrap();
        let profile = profiles.get(&outcome.user.id).unwrap();
        assert_eq!(profile.user_type, UserType::Dealer);
        assert_eq!(profile.full_name, "Orla Kinsella");

        let dealerships = backend.dealerships.lock().unwrap();
        assert_eq!(dealerships.len(), 1);
        assert_eq!(dealerships[0].profile_id, outcome.user.id);
        assert_eq!(dealerships[0].name, "Liffey EV Centre");
    }

    #[tokio::test]
    async fn duplicate_email_surfaces_backend_message() {
        let backend = MemoryBackend::new();
        register_dealer(&backend, &dealer_form()).await.unwrap();

        let err = register_dealer(&backend, &dealer_form()).await.unwrap_err();
        assert_eq!(err.to_string(), "User already registered");
    }

    #[tokio::test]
    async fn profile_failure_stops_before_dealership_insert() {
        let backend = MemoryBackend::new();
        backend.fail_profile_inserts(true);

        let err = register_dealer(&backend, &dealer_form()).await.unwrap_err();
        assert!(err.to_string().contains("profiles_pkey"));
        assert!(backend.dealerships.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn seller_registration_stores_contact_and_preferences() {
        let backend = MemoryBackend::new();
        let form = SellerForm {
            full_name: "Declan Moore".into(),
            email: "declan@example.ie".into(),
            password: "pw123456".into(),
            phone: "087 123 4567".into(),
            county: "Cork".into(),
            notify_updates: Some("on".into()),
            notify_tips: None,
            marketing_consent: Some("on".into()),
            accept_terms: Some("on".into()),
            ..SellerForm::default()
        };

        let outcome = register_seller(&backend, &form).await.unwrap();
        let profiles = backend.profiles.lock().unwrap();
        let profile = profiles.get(&outcome.user.id).unwrap();
        assert_eq!(profile.user_type, UserType::Private);
        assert_eq!(profile.contact_phone.as_deref(), Some("087 123 4567"));
        assert_eq!(profile.county.as_deref(), Some("Cork"));
        assert!(profile.address.is_none());
        assert_eq!(profile.marketing_consent, Some(true));

        let prefs = profile.notification_preferences.as_ref().unwrap();
        assert_eq!(prefs["messages"], true);
        assert_eq!(prefs["updates"], true);
        assert_eq!(prefs["tips"], false);
    }

    #[tokio::test]
    async fn generic_sign_up_creates_profile() {
        let backend = MemoryBackend::new();
        let outcome = sign_up(&backend, " admin@example.ie ", "pw", UserType::Admin, "Site Admin")
            .await
            .unwrap();
        assert_eq!(outcome.user.email.as_deref(), Some("admin@example.ie"));
        assert_eq!(
            backend.profiles.lock().unwrap()[&outcome.user.id].user_type,
            UserType::Admin
        );
    }

    #[test]
    fn seller_defaults_follow_preference_list() {
        let form = SellerForm::default();
        let prefs = form.notification_preferences();
        for pref in NOTIFICATION_PREFERENCES.iter() {
            assert_eq!(prefs[pref.id], pref.default_checked);
        }
        assert_eq!(form.preferred_contact, "email");
    }

    #[test]
    fn missing_checkbox_means_unticked() {
        let posted: DealerForm = serde_json::from_value(serde_json::json!({
            "step": "3",
            "dealership_name": "Shannon Motors"
        }))
        .unwrap();
        assert!(!posted.is_checked("photos"));
        assert_eq!(posted.subscription_plan, "free");
        assert!(DealerForm::default().is_checked("photos"));
    }

    #[test]
    fn dealer_hidden_fields_carry_other_steps() {
        let form = dealer_form();
        let hidden = hidden_fields(&form, &DEALER_FIELD_STEPS, 2);
        let names: Vec<&str> = hidden.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"dealership_name"));
        assert!(names.contains(&"photos"));
        assert!(!names.contains(&"city"));
        assert!(!names.contains(&"videos"));
    }
}
