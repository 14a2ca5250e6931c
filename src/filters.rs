// Search constraints for the results view. Range bounds are independently
// optional and never checked against each other, so an inverted range matches nothing

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeFilter {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        RangeFilter { min, max }
    }

    #[cfg(test)]
    pub fn at_least(min: f64) -> Self {
        RangeFilter { min: Some(min), max: None }
    }

    #[cfg(test)]
    pub fn is_unset(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Inclusive on both ends; a missing bound imposes nothing.
    #[cfg(test)]
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterState {
    pub price: RangeFilter,
    pub brand: Option<String>,
    pub year: RangeFilter,
    pub mileage: RangeFilter,
    pub range: RangeFilter,
    pub battery_capacity: RangeFilter,
    pub features: BTreeSet<String>,
    pub condition: Option<String>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        *self == FilterState::default()
    }

    /// Replaces one field. Returns whether the state changed.
    pub fn apply(&mut self, update: FilterUpdate) -> bool {
        let before = self.clone();
        match update {
            FilterUpdate::Price(range) => self.price = range,
            FilterUpdate::Brand(brand) => self.brand = brand,
            FilterUpdate::Year(range) => self.year = range,
            FilterUpdate::Mileage(range) => self.mileage = range,
            FilterUpdate::Range(range) => self.range = range,
            FilterUpdate::BatteryCapacity(range) => self.battery_capacity = range,
            FilterUpdate::Features(features) => self.features = features,
            FilterUpdate::Condition(condition) => self.condition = condition,
        }
        *self != before
    }
}

/// A single-field replacement of a [`FilterState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum FilterUpdate {
    Price(RangeFilter),
    Brand(Option<String>),
    Year(RangeFilter),
    Mileage(RangeFilter),
    Range(RangeFilter),
    BatteryCapacity(RangeFilter),
    Features(BTreeSet<String>),
    Condition(Option<String>),
}

// Number inputs post empty strings when cleared; those mean "no bound"
fn parse_bound(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_choice(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Body of one filter-panel section submit.
#[derive(Debug, Deserialize, Default)]
pub struct FilterFieldForm {
    pub field: String,
    pub min: Option<String>,
    pub max: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub feature: Vec<String>,
}

impl FilterFieldForm {
    pub fn into_update(self) -> Result<FilterUpdate, AppError> {
        let range = RangeFilter::new(parse_bound(self.min.as_deref()), parse_bound(self.max.as_deref()));
        let update = match self.field.as_str() {
            "price" => FilterUpdate::Price(range),
            "brand" => FilterUpdate::Brand(parse_choice(self.value.as_deref())),
            "year" => FilterUpdate::Year(range),
            "mileage" => FilterUpdate::Mileage(range),
            "range" => FilterUpdate::Range(range),
            "batteryCapacity" | "battery_capacity" => FilterUpdate::BatteryCapacity(range),
            "features" => FilterUpdate::Features(
                self.feature
                    .iter()
                    .filter_map(|id| parse_choice(Some(id)))
                    .collect(),
            ),
            "condition" => FilterUpdate::Condition(parse_choice(self.value.as_deref())),
            other => return Err(AppError::BadRequest(format!("Unknown filter field '{}'", other))),
        };
        Ok(update)
    }
}

/// Flat query-string form of a [`FilterState`], e.g.
/// `?price_min=30000&brand=<id>&feature=<id>&feature=<id>`.
#[derive(Debug, Deserialize, Default)]
pub struct FilterParams {
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub brand: Option<String>,
    pub year_min: Option<String>,
    pub year_max: Option<String>,
    pub mileage_min: Option<String>,
    pub mileage_max: Option<String>,
    pub range_min: Option<String>,
    pub range_max: Option<String>,
    pub battery_min: Option<String>,
    pub battery_max: Option<String>,
    #[serde(default)]
    pub feature: Vec<String>,
    pub condition: Option<String>,
}

impl From<FilterParams> for FilterState {
    fn from(params: FilterParams) -> Self {
        let range = |min: &Option<String>, max: &Option<String>| {
            RangeFilter::new(parse_bound(min.as_deref()), parse_bound(max.as_deref()))
        };
        FilterState {
            price: range(&params.price_min, &params.price_max),
            brand: parse_choice(params.brand.as_deref()),
            year: range(&params.year_min, &params.year_max),
            mileage: range(&params.mileage_min, &params.mileage_max),
            range: range(&params.range_min, &params.range_max),
            battery_capacity: range(&params.battery_min, &params.battery_max),
            features: params
                .feature
                .iter()
                .filter_map(|id| parse_choice(Some(id)))
                .collect(),
            condition: parse_choice(params.condition.as_deref()),
        }
    }
}

/// Live filter state of one results view.
pub struct FilterManager {
    state: watch::Sender<FilterState>,
}

impl FilterManager {
    pub fn new() -> Self {
        Self::with_state(FilterState::default())
    }

    pub fn with_state(state: FilterState) -> Self {
        let (tx, _rx) = watch::channel(state);
        FilterManager { state: tx }
    }

    pub fn current(&self) -> FilterState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterState> {
        self.state.subscribe()
    }

    /// Replaces one field and notifies subscribers if anything changed.
    pub fn set_field(&self, update: FilterUpdate) -> bool {
        self.state.send_if_modified(|state| state.apply(update))
    }

    /// Swaps in a whole state, e.g. when the search form seeds a new search.
    pub fn replace(&self, next: FilterState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    /// Resets every field to its default.
    pub fn clear(&self) -> bool {
        self.replace(FilterState::default())
    }
}

impl Default for FilterManager {
    fn default() -> Self {
        Self::new()
    }
}
