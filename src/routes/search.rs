// Search form submit and the results page with its filter panel

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
    Form,
};
use axum_extra::extract::{cookie::Cookie, CookieJar, Form as MultiForm};
use serde::Deserialize;
use uuid::Uuid;

use super::{render, thousands, Nav, SelectOption};
use crate::{
    auth_middleware::AuthenticatedUser,
    error::AppError,
    filters::{FilterFieldForm, FilterState, RangeFilter},
    models::VehicleRecord,
    search::SearchSession,
    AppState,
};

pub const SEARCH_COOKIE: &str = "evm_search";

/// Coarse criteria from the home page form.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SearchForm {
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    pub location: String,
    pub radius: String,
}

impl SearchForm {
    /// Only brand and new/used narrow the results; "all" leaves condition open.
    pub fn to_filters(&self) -> FilterState {
        let choice = |raw: &str| Some(raw.trim().to_string()).filter(|s| !s.is_empty());
        FilterState {
            brand: choice(&self.brand),
            condition: choice(&self.vehicle_type).filter(|t| t != "all"),
            ..FilterState::default()
        }
    }
}

fn search_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SEARCH_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

fn search_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build((SEARCH_COOKIE, id.to_string())).path("/").http_only(true).build()
}

async fn search_session(app_state: &AppState, jar: CookieJar) -> (CookieJar, Arc<SearchSession>) {
    let known = search_id(&jar);
    let (id, session) = app_state.searches.get_or_create(known).await;
    if known == Some(id) {
        return (jar, session);
    }
    (jar.add(search_cookie(id)), session)
}

pub async fn start_search(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SearchForm>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        model = %form.model,
        location = %form.location,
        radius = %form.radius,
        "[HANDLER] POST /search - type: '{}', brand: '{}'",
        form.vehicle_type,
        form.brand
    );
    // A submitted search opens a new results view
    let previous = search_id(&jar);
    let (id, _) = app_state.searches.start(previous, form.to_filters()).await;
    Ok((jar.add(search_cookie(id)), Redirect::to("/search")))
}

pub async fn set_filter(
    State(app_state): State<AppState>,
    jar: CookieJar,
    MultiForm(form): MultiForm<FilterFieldForm>,
) -> Result<impl IntoResponse, AppError> {
    let update = form.into_update()?;
    tracing::info!("[HANDLER] POST /search/filters - {:?}", update);
    let (jar, session) = search_session(&app_state, jar).await;
    if !session.set_field(update) {
        tracing::debug!("Filter unchanged; keeping current results");
    }
    Ok((jar, Redirect::to("/search")))
}

pub async fn clear_filters(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] POST /search/clear");
    let (jar, session) = search_session(&app_state, jar).await;
    session.clear();
    Ok((jar, Redirect::to("/search")))
}

pub struct RangeInput {
    pub field: &'static str,
    pub label: &'static str,
    pub min: String,
    pub max: String,
}

impl RangeInput {
    fn new(field: &'static str, label: &'static str, range: &RangeFilter) -> Self {
        let bound = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        RangeInput { field, label, min: bound(range.min), max: bound(range.max) }
    }
}

pub struct FeatureOption {
    pub id: String,
    pub name: String,
    pub category: String,
    pub checked: bool,
}

pub struct VehicleCard {
    pub id: String,
    pub title: String,
    pub year: i32,
    pub price: String,
    pub mileage: String,
    pub range: String,
    pub battery: String,
    pub condition: String,
    pub image: String,
}

impl From<VehicleRecord> for VehicleCard {
    fn from(vehicle: VehicleRecord) -> Self {
        VehicleCard {
            title: vehicle.title(),
            price: thousands(vehicle.price),
            mileage: thousands(vehicle.mileage),
            range: thousands(vehicle.range_wltp),
            battery: vehicle.battery_capacity.to_string(),
            image: vehicle.images.first().cloned().unwrap_or_default(),
            id: vehicle.id,
            year: vehicle.year,
            condition: vehicle.condition,
        }
    }
}

#[derive(Template)]
#[template(path = "results.html")]
struct ResultsTemplate {
    nav: Nav,
    ranges: Vec<RangeInput>,
    brands: Vec<SelectOption>,
    conditions: Vec<SelectOption>,
    features: Vec<FeatureOption>,
    vehicles: Vec<VehicleCard>,
    total_count: u64,
    error: String,
    filtered: bool,
}

pub async fn results(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let (jar, session) = search_session(&app_state, jar).await;
    let backend = app_state.backend.as_ref();

    let (snapshot, lookups) = futures::join!(
        session.snapshot(),
        futures::future::try_join(backend.list_brands(), backend.list_features())
    );
    let (filters, result) = snapshot;
    let (brands, features) = lookups.unwrap_or_else(|e| {
        tracing::warn!("Failed to load filter panel options: {}", e);
        (Vec::new(), Vec::new())
    });
    tracing::info!(
        "[HANDLER] GET /search - {} of {} vehicles shown",
        result.vehicles.len(),
        result.total_count
    );

    let selected_brand = filters.brand.clone().unwrap_or_default();
    let selected_condition = filters.condition.clone().unwrap_or_default();
    let template = ResultsTemplate {
        nav: Nav::for_user(&user),
        ranges: vec![
            RangeInput::new("price", "Price (€)", &filters.price),
            RangeInput::new("year", "Year", &filters.year),
            RangeInput::new("mileage", "Mileage (km)", &filters.mileage),
            RangeInput::new("range", "Range WLTP (km)", &filters.range),
            RangeInput::new("batteryCapacity", "Battery (kWh)", &filters.battery_capacity),
        ],
        brands: brands
            .into_iter()
            .map(|b| {
                let is_selected = b.id == selected_brand;
                SelectOption::new(b.id, b.name, is_selected)
            })
            .collect(),
        conditions: vec![
            SelectOption::new("new", "New", selected_condition == "new"),
            SelectOption::new("used", "Used", selected_condition == "used"),
        ],
        features: features
            .into_iter()
            .map(|f| FeatureOption {
                checked: filters.features.contains(&f.id),
                id: f.id,
                name: f.name,
                category: f.category,
            })
            .collect(),
        vehicles: result.vehicles.into_iter().map(VehicleCard::from).collect(),
        total_count: result.total_count,
        error: result.error.unwrap_or_default(),
        filtered: !filters.is_empty(),
    };
    Ok((jar, render(&template)?))
}
