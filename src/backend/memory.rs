// In-memory backend used by the test suites

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::{Backend, BackendError};
use crate::models::{
    AuthSession, AuthUser, Brand, Dealership, Feature, Profile, SignUpOutcome, TestDriveBooking,
    VehiclePage, VehicleRecord,
};
use crate::query::VehicleQuery;

pub fn vehicle(id: &str, brand_id: &str, brand: &str, year: i32, price: f64) -> VehicleRecord {
    VehicleRecord {
        id: id.to_string(),
        brand_id: brand_id.to_string(),
        brand: brand.to_string(),
        model: "Model Y".to_string(),
        variant: None,
        year,
        price,
        mileage: 10000.0,
        battery_capacity: 75.0,
        range_wltp: 533.0,
        charging_power: Some(250.0),
        acceleration: Some(5.0),
        top_speed: Some(217.0),
        power_output: Some(378.0),
        color: Some("Midnight Silver".to_string()),
        condition: "used".to_string(),
        images: vec![
            format!("https://img.example/{}/1.jpg", id),
            format!("https://img.example/{}/2.jpg", id),
        ],
        available: true,
        features: Vec::new(),
        feature_ids: Vec::new(),
    }
}

struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
pub struct MemoryBackend {
    vehicles: RwLock<Vec<VehicleRecord>>,
    brands: RwLock<Vec<Brand>>,
    features: RwLock<Vec<Feature>>,
    pub profiles: Mutex<HashMap<String, Profile>>,
    pub dealerships: Mutex<Vec<Dealership>>,
    pub bookings: Mutex<Vec<TestDriveBooking>>,
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<String, AuthUser>>,
    query_delays: Mutex<Vec<Duration>>,
    fail: AtomicBool,
    fail_profile_insert: AtomicBool,
    vehicle_queries: AtomicUsize,
    user_lookups: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicles(vehicles: Vec<VehicleRecord>) -> Self {
        let backend = Self::new();
        *backend.vehicles.write().unwrap() = vehicles;
        backend
    }

    pub fn set_brands(&self, brands: Vec<Brand>) {
        *self.brands.write().unwrap() = brands;
    }

    pub fn set_features(&self, features: Vec<Feature>) {
        *self.features.write().unwrap() = features;
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profile_inserts(&self, fail: bool) {
        self.fail_profile_insert.store(fail, Ordering::SeqCst);
    }

    /// Delays applied to successive vehicle queries, in call order.
    pub fn delay_queries(&self, delays: Vec<Duration>) {
        *self.query_delays.lock().unwrap() = delays;
    }

    pub fn vehicle_queries(&self) -> usize {
        self.vehicle_queries.load(Ordering::SeqCst)
    }

    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    /// Registers an account and returns a valid access token for it.
    pub fn add_account(&self, id: &str, email: &str, password: &str) -> String {
        let user = AuthUser { id: id.to_string(), email: Some(email.to_string()) };
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account { user: user.clone(), password: password.to_string() },
        );
        let token = format!("token-{}", id);
        self.tokens.lock().unwrap().insert(token.clone(), user);
        token
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Api { status: 503, message: "simulated network error".into() });
        }
        Ok(())
    }

    fn user_for(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        self.tokens
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or(BackendError::Api { status: 401, message: "JWT expired".into() })
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select_vehicles(&self, query: &VehicleQuery) -> Result<VehiclePage, BackendError> {
        let call = self.vehicle_queries.fetch_add(1, Ordering::SeqCst);
        let delay = self.query_delays.lock().unwrap().get(call).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        let vehicles: Vec<VehicleRecord> = self
            .vehicles
            .read()
            .unwrap()
            .iter()
            .filter(|v| query.matches(v))
            .cloned()
            .collect();
        let total_count = vehicles.len() as u64;
        Ok(VehiclePage { vehicles, total_count })
    }

    async fn get_vehicle(&self, id: &str) -> Result<Option<VehicleRecord>, BackendError> {
        self.check_available()?;
        Ok(self.vehicles.read().unwrap().iter().find(|v| v.id == id).cloned())
    }

    async fn list_brands(&self) -> Result<Vec<Brand>, BackendError> {
        self.check_available()?;
        let mut brands = self.brands.read().unwrap().clone();
        brands.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(brands)
    }

    async fn list_features(&self) -> Result<Vec<Feature>, BackendError> {
        self.check_available()?;
        let mut features = self.features.read().unwrap().clone();
        features.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(features)
    }

    async fn list_models(&self, brand_id: &str) -> Result<Vec<String>, BackendError> {
        self.check_available()?;
        let mut models: Vec<String> = self
            .vehicles
            .read()
            .unwrap()
            .iter()
            .filter(|v| v.brand_id == brand_id)
            .map(|v| v.model.clone())
            .collect();
        models.sort();
        models.dedup();
        Ok(models)
    }

    async fn get_profile(&self, user_id: &str, access_token: &str) -> Result<Option<Profile>, BackendError> {
        self.check_available()?;
        self.user_for(access_token)?;
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile, _access_token: Option<&str>) -> Result<(), BackendError> {
        self.check_available()?;
        if self.fail_profile_insert.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint \"profiles_pkey\"".into(),
            });
        }
        self.profiles.lock().unwrap().insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile_name(&self, user_id: &str, full_name: &str, access_token: &str) -> Result<(), BackendError> {
        self.check_available()?;
        self.user_for(access_token)?;
        if let Some(profile) = self.profiles.lock().unwrap().get_mut(user_id) {
            profile.full_name = full_name.to_string();
        }
        Ok(())
    }

    async fn insert_dealership(&self, dealership: &Dealership, _access_token: Option<&str>) -> Result<(), BackendError> {
        self.check_available()?;
        self.dealerships.lock().unwrap().push(dealership.clone());
        Ok(())
    }

    async fn insert_booking(&self, booking: &TestDriveBooking, access_token: &str) -> Result<(), BackendError> {
        self.check_available()?;
        self.user_for(access_token)?;
        self.bookings.lock().unwrap().push(booking.clone());
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        self.check_available()?;
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(BackendError::Api { status: 422, message: "User already registered".into() });
        }
        let id = format!("user-{}", self.accounts.lock().unwrap().len() + 1);
        let token = self.add_account(&id, email, password);
        let user = self.user_for(&token)?;
        Ok(SignUpOutcome {
            user: user.clone(),
            session: Some(AuthSession {
                access_token: token,
                refresh_token: None,
                expires_in: Some(3600),
                user,
            }),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        self.check_available()?;
        let user = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(email) {
                Some(account) if account.password == password => account.user.clone(),
                _ => {
                    return Err(BackendError::Api {
                        status: 400,
                        message: "Invalid login credentials".into(),
                    });
                }
            }
        };
        let token = format!("token-{}", user.id);
        self.tokens.lock().unwrap().insert(token.clone(), user.clone());
        Ok(AuthSession { access_token: token, refresh_token: None, expires_in: Some(3600), user })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.check_available()?;
        self.tokens.lock().unwrap().remove(access_token);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, BackendError> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.tokens.lock().unwrap().get(access_token).cloned())
    }
}
