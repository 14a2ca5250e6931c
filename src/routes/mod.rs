// Route definitions and helpers shared by the page handlers

use askama::Template;
use axum::{
    response::Html,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::Cookie;
use tower_http::trace::TraceLayer;

use crate::{auth_middleware::{AuthenticatedUser, SESSION_COOKIE}, error::AppError, AppState};

mod api;
mod auth;
mod forms;
mod pages;
mod search;

pub fn create_router(app_state: AppState) -> Router {
    // JSON endpoints for script clients
    let api_router = Router::new()
        .route("/vehicles", get(api::list_vehicles))
        .route("/vehicles/:id", get(api::get_vehicle))
        .route("/brands", get(api::list_brands))
        .route("/brands/:id/models", get(api::list_models))
        .route("/features", get(api::list_features))
        .route("/me", get(api::current_user))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(pages::home))
        .route("/vehicles/:id", get(pages::vehicle_detail))
        .route("/vehicles/:id/test-drive", get(forms::test_drive_page).post(forms::submit_test_drive))
        .route("/search", get(search::results).post(search::start_search))
        .route("/search/filters", post(search::set_filter))
        .route("/search/clear", post(search::clear_filters))
        .route("/register", get(pages::register_chooser))
        .route("/register/dealer", get(forms::dealer_page).post(forms::submit_dealer))
        .route("/register/seller", get(forms::seller_page).post(forms::submit_seller))
        .route("/login", get(auth::login_page).post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .route("/profile", get(forms::profile_page).post(forms::update_profile))
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub(crate) fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

/// Header state shown on every page.
#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub signed_in: bool,
    pub user_name: String,
}

impl Nav {
    pub fn for_user(user: &Option<AuthenticatedUser>) -> Self {
        match user {
            Some(auth) => Nav { signed_in: true, user_name: auth.user.display_name() },
            None => Nav::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>, selected: bool) -> Self {
        SelectOption { value: value.into(), label: label.into(), selected }
    }
}

// Options whose value doubles as the label
pub(crate) fn plain_options(values: &[&str], selected: &str) -> Vec<SelectOption> {
    values
        .iter()
        .map(|v| SelectOption::new(*v, *v, *v == selected))
        .collect()
}

pub(crate) fn session_cookie(access_token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, access_token))
        .path("/")
        .http_only(true)
        .build()
}

// "48000" -> "48,000"
pub(crate) fn thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 && digits != "0" {
        grouped.insert(0, '-');
    }
    grouped
}
