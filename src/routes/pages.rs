// Read-only pages: home with the search form, vehicle detail, registration chooser

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::{plain_options, render, thousands, Nav, SelectOption};
use crate::{
    auth_middleware::AuthenticatedUser,
    backend::BackendError,
    error::AppError,
    models::VehicleRecord,
    registration::IRISH_COUNTIES,
    AppState,
};

pub const SEARCH_RADII: [&str; 5] = ["10", "25", "50", "100", "200"];

#[derive(Debug, Deserialize, Default)]
pub struct HomeQuery {
    pub brand: Option<String>,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    nav: Nav,
    brands: Vec<SelectOption>,
    models: Vec<SelectOption>,
    counties: Vec<SelectOption>,
    radii: Vec<SelectOption>,
    lookup_error: bool,
}

pub async fn home(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Query(query): Query<HomeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let selected = query.brand.unwrap_or_default();
    tracing::info!("[HANDLER] / - brand: '{}'", selected);

    let backend = app_state.backend.as_ref();
    let lookups = async {
        if selected.is_empty() {
            Ok::<_, BackendError>((backend.list_brands().await?, Vec::new()))
        } else {
            futures::try_join!(backend.list_brands(), backend.list_models(&selected))
        }
    };

    // The form still works without the lookups, so failures only degrade it
    let (brands, models, lookup_error) = match lookups.await {
        Ok((brands, models)) => (brands, models, false),
        Err(e) => {
            tracing::warn!("Failed to load search form options: {}", e);
            (Vec::new(), Vec::new(), true)
        }
    };

    let template = HomeTemplate {
        nav: Nav::for_user(&user),
        brands: brands
            .into_iter()
            .map(|b| {
                let is_selected = b.id == selected;
                SelectOption::new(b.id, b.name, is_selected)
            })
            .collect(),
        models: models.into_iter().map(|m| SelectOption::new(m.clone(), m, false)).collect(),
        counties: plain_options(&IRISH_COUNTIES, ""),
        radii: plain_options(&SEARCH_RADII, "25"),
        lookup_error,
    };
    render(&template)
}

#[derive(Debug, Deserialize, Default)]
pub struct DetailQuery {
    pub image: Option<i64>,
}

pub struct SpecRow {
    pub label: &'static str,
    pub value: String,
}

/// Carousel position: any index wraps around the image list.
#[derive(Debug, Clone, PartialEq)]
pub struct Carousel {
    pub current: String,
    pub index: usize,
    pub prev: usize,
    pub next: usize,
    pub count: usize,
}

impl Carousel {
    pub fn at(images: &[String], requested: i64) -> Option<Self> {
        let count = images.len();
        if count == 0 {
            return None;
        }
        let index = requested.rem_euclid(count as i64) as usize;
        Some(Carousel {
            current: images[index].clone(),
            index,
            prev: (index + count - 1) % count,
            next: (index + 1) % count,
            count,
        })
    }

    pub fn position(&self) -> usize {
        self.index + 1
    }
}

fn spec_rows(vehicle: &VehicleRecord) -> Vec<SpecRow> {
    let optional = |value: Option<f64>, unit: &str| value.map(|v| format!("{} {}", v, unit));
    let mut rows = vec![
        SpecRow { label: "Year", value: vehicle.year.to_string() },
        SpecRow { label: "Mileage", value: format!("{} km", thousands(vehicle.mileage)) },
        SpecRow { label: "Battery", value: format!("{} kWh", vehicle.battery_capacity) },
        SpecRow { label: "Range (WLTP)", value: format!("{} km", thousands(vehicle.range_wltp)) },
        SpecRow { label: "Condition", value: vehicle.condition.clone() },
    ];
    let extra = [
        ("Charging power", optional(vehicle.charging_power, "kW")),
        ("0-100 km/h", optional(vehicle.acceleration, "s")),
        ("Top speed", optional(vehicle.top_speed, "km/h")),
        ("Power", optional(vehicle.power_output, "kW")),
        ("Colour", vehicle.color.clone()),
    ];
    rows.extend(
        extra
            .into_iter()
            .filter_map(|(label, value)| value.map(|value| SpecRow { label, value })),
    );
    rows
}

#[derive(Template)]
#[template(path = "vehicle.html")]
struct VehicleTemplate {
    nav: Nav,
    id: String,
    title: String,
    price: String,
    available: bool,
    carousel: Option<Carousel>,
    specs: Vec<SpecRow>,
    features: Vec<String>,
}

pub async fn vehicle_detail(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Path(id): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /vehicles/{} - Request received", id);

    let vehicle = app_state
        .backend
        .get_vehicle(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", id)))?;

    let template = VehicleTemplate {
        nav: Nav::for_user(&user),
        id: vehicle.id.clone(),
        title: vehicle.title(),
        price: thousands(vehicle.price),
        available: vehicle.available,
        carousel: Carousel::at(&vehicle.images, query.image.unwrap_or(0)),
        specs: spec_rows(&vehicle),
        features: vehicle.features.clone(),
    };
    render(&template)
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    nav: Nav,
}

pub async fn register_chooser(user: Option<AuthenticatedUser>) -> Result<impl IntoResponse, AppError> {
    render(&RegisterTemplate { nav: Nav::for_user(&user) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::tests::{app, body_text, fleet, get};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn images(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}.jpg", i)).collect()
    }

    #[test]
    fn carousel_wraps_both_ways() {
        let three = images(3);
        let first = Carousel::at(&three, 0).unwrap();
        assert_eq!((first.prev, first.next), (2, 1));

        let last = Carousel::at(&three, 2).unwrap();
        assert_eq!(last.next, 0);

        assert_eq!(Carousel::at(&three, -1).unwrap().current, "3.jpg");
        assert_eq!(Carousel::at(&three, 7).unwrap().position(), 2);
        assert!(Carousel::at(&[], 0).is_none());
    }

    #[test]
    fn optional_specs_are_skipped() {
        let mut vehicle = crate::backend::memory::vehicle("v1", "b", "Tesla", 2023, 1.0);
        vehicle.top_speed = None;
        vehicle.color = None;
        let labels: Vec<&str> = spec_rows(&vehicle).iter().map(|r| r.label).collect();
        assert!(labels.contains(&"Charging power"));
        assert!(!labels.contains(&"Top speed"));
        assert!(!labels.contains(&"Colour"));
    }

    #[tokio::test]
    async fn detail_page_shows_vehicle() {
        let response = app(fleet()).oneshot(get("/vehicles/t23?image=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Tesla Model Y"));
        assert!(html.contains("48,000"));
        assert!(html.contains("2.jpg"));
    }

    #[tokio::test]
    async fn missing_vehicle_is_not_found() {
        let response = app(fleet()).oneshot(get("/vehicles/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chooser_links_both_flows() {
        let html = body_text(app(fleet()).oneshot(get("/register")).await.unwrap()).await;
        assert!(html.contains("/register/dealer"));
        assert!(html.contains("/register/seller"));
    }
}
