// REST client for the hosted backend: PostgREST under /rest/v1, GoTrue under /auth/v1

use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Backend, BackendError};
use crate::config::Settings;
use crate::models::{
    AuthSession, AuthUser, Brand, Dealership, Feature, Profile, SignUpOutcome, TestDriveBooking,
    VehiclePage, VehicleRecord,
};
use crate::query::{VEHICLE_SELECT, VehicleQuery};

pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

// --- Row Shapes ---

#[derive(Deserialize, Debug)]
struct NameRef {
    name: String,
}

#[derive(Deserialize, Debug)]
struct FeatureLink {
    feature_id: Option<String>,
    feature: Option<NameRef>,
}

// Vehicle row as returned with the embedded brand and feature relations
#[derive(Deserialize, Debug)]
struct VehicleRow {
    id: String,
    brand_id: String,
    brand: Option<NameRef>,
    model: String,
    variant: Option<String>,
    year: i32,
    price: f64,
    mileage: f64,
    battery_capacity: f64,
    range_wltp: f64,
    charging_power: Option<f64>,
    acceleration: Option<f64>,
    top_speed: Option<f64>,
    power_output: Option<f64>,
    color: Option<String>,
    condition: String,
    #[serde(default)]
    images: Option<Vec<String>>,
    #[serde(default)]
    available: Option<bool>,
    #[serde(default)]
    features: Vec<FeatureLink>,
}

impl From<VehicleRow> for VehicleRecord {
    fn from(row: VehicleRow) -> Self {
        VehicleRecord {
            id: row.id,
            brand_id: row.brand_id,
            brand: row.brand.map(|b| b.name).unwrap_or_default(),
            model: row.model,
            variant: row.variant,
            year: row.year,
            price: row.price,
            mileage: row.mileage,
            battery_capacity: row.battery_capacity,
            range_wltp: row.range_wltp,
            charging_power: row.charging_power,
            acceleration: row.acceleration,
            top_speed: row.top_speed,
            power_output: row.power_output,
            color: row.color,
            condition: row.condition,
            images: row.images.unwrap_or_default(),
            available: row.available.unwrap_or(true),
            feature_ids: row.features.iter().filter_map(|link| link.feature_id.clone()).collect(),
            features: row
                .features
                .into_iter()
                .filter_map(|link| link.feature.map(|f| f.name))
                .collect(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ModelRow {
    model: String,
}

// --- Response Helpers ---

// "0-24/3573" or "*/0" -> total after the slash
fn parse_total(content_range: Option<&HeaderValue>) -> Option<u64> {
    content_range?
        .to_str()
        .ok()?
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}

// PostgREST reports `message`, GoTrue uses `msg` or `error_description`
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key)?.as_str().map(str::to_string))
        .filter(|m| !m.is_empty())
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Backend request failed")
            .to_string()
    });
    tracing::warn!(status = status.as_u16(), "Backend rejected request: {}", message);
    Err(BackendError::Api { status: status.as_u16(), message })
}

// Sign-up answers with a bare user when e-mail confirmation is required,
// and with a full session otherwise
fn parse_sign_up(value: Value) -> Result<SignUpOutcome, BackendError> {
    if value.get("access_token").is_some() {
        let session: AuthSession = serde_json::from_value(value)
            .map_err(|e| BackendError::Decode(format!("sign up session: {}", e)))?;
        return Ok(SignUpOutcome { user: session.user.clone(), session: Some(session) });
    }
    let user_value = value.get("user").cloned().unwrap_or(value);
    if user_value.get("id").is_none() {
        return Err(BackendError::MissingUser);
    }
    let user: AuthUser = serde_json::from_value(user_value)
        .map_err(|e| BackendError::Decode(format!("sign up user: {}", e)))?;
    Ok(SignUpOutcome { user, session: None })
}

fn distinct_sorted(models: Vec<ModelRow>) -> Vec<String> {
    models
        .into_iter()
        .map(|row| row.model)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl SupabaseClient {
    pub fn new(http: Client, settings: &Settings) -> Self {
        SupabaseClient {
            http,
            base_url: settings.supabase_url.trim_end_matches('/').to_string(),
            anon_key: settings.supabase_anon_key.clone(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: String, access_token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }

    async fn insert<T: serde::Serialize + ?Sized>(
        &self,
        table: &str,
        rows: &T,
        access_token: Option<&str>,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, self.rest_url(table), access_token)
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        check(response).await?;
        tracing::info!("Inserted row into '{}'", table);
        Ok(())
    }

    async fn fetch_rows<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        params: &[(&str, &str)],
        access_token: Option<&str>,
    ) -> Result<Vec<T>, BackendError> {
        let response = self
            .request(Method::GET, self.rest_url(table), access_token)
            .query(params)
            .send()
            .await?;
        let rows = check(response)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| BackendError::Decode(format!("{} rows: {}", table, e)))?;
        Ok(rows)
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn select_vehicles(&self, query: &VehicleQuery) -> Result<VehiclePage, BackendError> {
        let mut request = self
            .request(Method::GET, self.rest_url("vehicles"), None)
            .query(&query.to_query_pairs());
        if query.exact_count {
            request = request.header("Prefer", "count=exact");
        }

        let response = check(request.send().await?).await?;
        let total = parse_total(response.headers().get(CONTENT_RANGE));
        let rows: Vec<VehicleRow> = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("vehicle rows: {}", e)))?;

        let vehicles: Vec<VehicleRecord> = rows.into_iter().map(VehicleRecord::from).collect();
        let total_count = total.unwrap_or(vehicles.len() as u64);
        Ok(VehiclePage { vehicles, total_count })
    }

    async fn get_vehicle(&self, id: &str) -> Result<Option<VehicleRecord>, BackendError> {
        let filter = format!("eq.{}", id);
        let rows: Vec<VehicleRow> = self
            .fetch_rows("vehicles", &[("select", VEHICLE_SELECT), ("id", filter.as_str())], None)
            .await?;
        Ok(rows.into_iter().next().map(VehicleRecord::from))
    }

    async fn list_brands(&self) -> Result<Vec<Brand>, BackendError> {
        self.fetch_rows("brands", &[("select", "id,name"), ("order", "name")], None)
            .await
    }

    async fn list_features(&self) -> Result<Vec<Feature>, BackendError> {
        self.fetch_rows(
            "features",
            &[("select", "id,name,category"), ("order", "category,name")],
            None,
        )
        .await
    }

    async fn list_models(&self, brand_id: &str) -> Result<Vec<String>, BackendError> {
        let filter = format!("eq.{}", brand_id);
        let rows: Vec<ModelRow> = self
            .fetch_rows("vehicles", &[("select", "model"), ("brand_id", filter.as_str())], None)
            .await?;
        Ok(distinct_sorted(rows))
    }

    async fn get_profile(&self, user_id: &str, access_token: &str) -> Result<Option<Profile>, BackendError> {
        let filter = format!("eq.{}", user_id);
        let rows: Vec<Profile> = self
            .fetch_rows("profiles", &[("select", "*"), ("id", filter.as_str())], Some(access_token))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &Profile, access_token: Option<&str>) -> Result<(), BackendError> {
        self.insert("profiles", std::slice::from_ref(profile), access_token).await
    }

    async fn update_profile_name(&self, user_id: &str, full_name: &str, access_token: &str) -> Result<(), BackendError> {
        let filter = format!("eq.{}", user_id);
        let response = self
            .request(Method::PATCH, self.rest_url("profiles"), Some(access_token))
            .query(&[("id", filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(&json!({ "full_name": full_name }))
            .send()
            .await?;
        check(response).await?;
        tracing::info!("Updated profile name for user {}", user_id);
        Ok(())
    }

    async fn insert_dealership(&self, dealership: &Dealership, access_token: Option<&str>) -> Result<(), BackendError> {
        self.insert("dealerships", std::slice::from_ref(dealership), access_token).await
    }

    async fn insert_booking(&self, booking: &TestDriveBooking, access_token: &str) -> Result<(), BackendError> {
        self.insert("test_drive_bookings", std::slice::from_ref(booking), Some(access_token))
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        let response = self
            .request(Method::POST, self.auth_url("signup"), None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let value: Value = check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("sign up response: {}", e)))?;
        parse_sign_up(value)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let response = self
            .request(Method::POST, self.auth_url("token"), None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("sign in response: {}", e)))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, self.auth_url("logout"), Some(access_token))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, BackendError> {
        let response = self
            .request(Method::GET, self.auth_url("user"), Some(access_token))
            .send()
            .await?;
        match check(response).await {
            Ok(response) => response
                .json()
                .await
                .map(Some)
                .map_err(|e| BackendError::Decode(format!("user response: {}", e))),
            Err(e) if e.is_unauthorized() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
