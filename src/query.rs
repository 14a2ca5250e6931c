// Filter state to vehicle query: one predicate per set field, all ANDed

use crate::backend::Backend;
use crate::filters::{FilterState, RangeFilter};
use crate::models::QueryResult;
#[cfg(test)]
use crate::models::VehicleRecord;

/// Record shape requested for every vehicle: all columns plus the related
/// brand name and the linked feature ids and names.
pub const VEHICLE_SELECT: &str =
    "*,brand:brand_id(name),features:vehicle_features(feature_id,feature:feature_id(name))";

// Join table linking vehicles to features
const FEATURE_LINKS: &str = "vehicle_features";

pub const QUERY_FAILED_MESSAGE: &str = "An error occurred while loading vehicles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Price,
    BrandId,
    Year,
    Mileage,
    RangeWltp,
    BatteryCapacity,
    Condition,
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::Price => "price",
            Column::BrandId => "brand_id",
            Column::Year => "year",
            Column::Mileage => "mileage",
            Column::RangeWltp => "range_wltp",
            Column::BatteryCapacity => "battery_capacity",
            Column::Condition => "condition",
        }
    }

    #[cfg(test)]
    fn number(self, vehicle: &VehicleRecord) -> Option<f64> {
        match self {
            Column::Price => Some(vehicle.price),
            Column::Year => Some(f64::from(vehicle.year)),
            Column::Mileage => Some(vehicle.mileage),
            Column::RangeWltp => Some(vehicle.range_wltp),
            Column::BatteryCapacity => Some(vehicle.battery_capacity),
            Column::BrandId | Column::Condition => None,
        }
    }

    #[cfg(test)]
    fn text(self, vehicle: &VehicleRecord) -> Option<&str> {
        match self {
            Column::BrandId => Some(&vehicle.brand_id),
            Column::Condition => Some(&vehicle.condition),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    AtLeast { column: Column, value: f64 },
    AtMost { column: Column, value: f64 },
    Equals { column: Column, value: String },
    /// The vehicle must be linked to every listed feature id.
    HasFeatures { ids: Vec<String> },
}

// Alias of the inner join that pins one required feature
fn feature_alias(index: usize) -> String {
    format!("has_feature_{}", index)
}

impl Predicate {
    /// Inner-joined embeds this predicate adds to the select clause.
    pub fn embeds(&self) -> Vec<String> {
        match self {
            Predicate::HasFeatures { ids } => (0..ids.len())
                .map(|i| format!("{}:{}!inner(feature_id)", feature_alias(i), FEATURE_LINKS))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// PostgREST filters, e.g. `("price", "gte.30000")`. Each required feature
    /// filters its own inner join, so a vehicle survives only if it has all.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        match self {
            Predicate::AtLeast { column, value } => vec![(column.name().to_string(), format!("gte.{}", value))],
            Predicate::AtMost { column, value } => vec![(column.name().to_string(), format!("lte.{}", value))],
            Predicate::Equals { column, value } => vec![(column.name().to_string(), format!("eq.{}", value))],
            Predicate::HasFeatures { ids } => ids
                .iter()
                .enumerate()
                .map(|(i, id)| (format!("{}.feature_id", feature_alias(i)), format!("eq.{}", id)))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn matches(&self, vehicle: &VehicleRecord) -> bool {
        match self {
            Predicate::AtLeast { column, value } => column.number(vehicle).is_some_and(|v| v >= *value),
            Predicate::AtMost { column, value } => column.number(vehicle).is_some_and(|v| v <= *value),
            Predicate::Equals { column, value } => column.text(vehicle) == Some(value.as_str()),
            Predicate::HasFeatures { ids } => ids
                .iter()
                .all(|id| vehicle.feature_ids.iter().any(|owned| owned == id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleQuery {
    pub select: &'static str,
    pub predicates: Vec<Predicate>,
    pub exact_count: bool,
}

impl VehicleQuery {
    /// Builds the query for a filter state. Unset fields contribute nothing.
    pub fn from_filters(filters: &FilterState) -> Self {
        let mut predicates = Vec::new();

        push_range(&mut predicates, Column::Price, &filters.price);
        if let Some(brand) = &filters.brand {
            predicates.push(Predicate::Equals { column: Column::BrandId, value: brand.clone() });
        }
        push_range(&mut predicates, Column::Year, &filters.year);
        push_range(&mut predicates, Column::Mileage, &filters.mileage);
        push_range(&mut predicates, Column::RangeWltp, &filters.range);
        push_range(&mut predicates, Column::BatteryCapacity, &filters.battery_capacity);
        if let Some(condition) = &filters.condition {
            predicates.push(Predicate::Equals { column: Column::Condition, value: condition.clone() });
        }
        if !filters.features.is_empty() {
            predicates.push(Predicate::HasFeatures { ids: filters.features.iter().cloned().collect() });
        }

        VehicleQuery { select: VEHICLE_SELECT, predicates, exact_count: true }
    }

    /// Record shape plus any inner joins the predicates need.
    pub fn select_clause(&self) -> String {
        std::iter::once(self.select.to_string())
            .chain(self.predicates.iter().flat_map(Predicate::embeds))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Query pairs for the `vehicles` endpoint; `select` always comes first.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        std::iter::once(("select".to_string(), self.select_clause()))
            .chain(self.predicates.iter().flat_map(Predicate::to_pairs))
            .collect()
    }

    #[cfg(test)]
    pub fn matches(&self, vehicle: &VehicleRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(vehicle))
    }
}

fn push_range(predicates: &mut Vec<Predicate>, column: Column, range: &RangeFilter) {
    if let Some(min) = range.min {
        predicates.push(Predicate::AtLeast { column, value: min });
    }
    if let Some(max) = range.max {
        predicates.push(Predicate::AtMost { column, value: max });
    }
}

/// Runs the translated query. Any backend failure yields an error result
/// with no vehicles; nothing is retried.
pub async fn execute(backend: &dyn Backend, filters: &FilterState) -> QueryResult {
    let query = VehicleQuery::from_filters(filters);
    tracing::debug!(predicates = query.predicates.len(), "Querying vehicles");

    match backend.select_vehicles(&query).await {
        Ok(page) => {
            tracing::info!(
                returned = page.vehicles.len(),
                total = page.total_count,
                "Vehicle query complete"
            );
            QueryResult::from(page)
        }
        Err(e) => {
            tracing::error!("Vehicle query failed: {}", e);
            QueryResult::failed(QUERY_FAILED_MESSAGE)
        }
    }
}
