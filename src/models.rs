//! Data models for activity data, scenario adjustments and emissions reports

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Emission categories in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionCategory {
    Cars,
    Trucks,
    Buses,
    Forklifts,
    CargoPlanes,
    OfficeLighting,
    Heating,
    Cooling,
    Computing,
    Subcontractors,
}

impl EmissionCategory {
    pub const ALL: [EmissionCategory; 10] = [
        EmissionCategory::Cars,
        EmissionCategory::Trucks,
        EmissionCategory::Buses,
        EmissionCategory::Forklifts,
        EmissionCategory::CargoPlanes,
        EmissionCategory::OfficeLighting,
        EmissionCategory::Heating,
        EmissionCategory::Cooling,
        EmissionCategory::Computing,
        EmissionCategory::Subcontractors,
    ];

    /// Display name used in tables
    pub fn label(self) -> &'static str {
        match self {
            EmissionCategory::Cars => "Cars",
            EmissionCategory::Trucks => "Trucks",
            EmissionCategory::Buses => "Buses",
            EmissionCategory::Forklifts => "Forklifts",
            EmissionCategory::CargoPlanes => "Cargo Planes",
            EmissionCategory::OfficeLighting => "Office Lighting",
            EmissionCategory::Heating => "Heating",
            EmissionCategory::Cooling => "Cooling",
            EmissionCategory::Computing => "Computing",
            EmissionCategory::Subcontractors => "Subcontractors",
        }
    }

    /// Stable key used in the ledger and JSON output
    pub fn key(self) -> &'static str {
        match self {
            EmissionCategory::Cars => "cars",
            EmissionCategory::Trucks => "trucks",
            EmissionCategory::Buses => "buses",
            EmissionCategory::Forklifts => "forklifts",
            EmissionCategory::CargoPlanes => "cargo_planes",
            EmissionCategory::OfficeLighting => "office_lighting",
            EmissionCategory::Heating => "heating",
            EmissionCategory::Cooling => "cooling",
            EmissionCategory::Computing => "computing",
            EmissionCategory::Subcontractors => "subcontractors",
        }
    }

    pub fn unit(self) -> ActivityUnit {
        match self {
            EmissionCategory::Cars | EmissionCategory::Trucks | EmissionCategory::Buses => {
                ActivityUnit::Kilometres
            }
            EmissionCategory::Forklifts | EmissionCategory::CargoPlanes => ActivityUnit::Hours,
            EmissionCategory::OfficeLighting
            | EmissionCategory::Cooling
            | EmissionCategory::Computing => ActivityUnit::KilowattHours,
            EmissionCategory::Heating => ActivityUnit::KilowattHoursThermal,
            EmissionCategory::Subcontractors => ActivityUnit::TonsCo2e,
        }
    }
}

impl fmt::Display for EmissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EmissionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        EmissionCategory::ALL
            .into_iter()
            .find(|c| c.key() == needle || c.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("unknown emission category '{}'", s))
    }
}

/// Unit of the activity figure a category is measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityUnit {
    Kilometres,
    Hours,
    KilowattHours,
    KilowattHoursThermal,
    TonsCo2e,
}

impl ActivityUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            ActivityUnit::Kilometres => "km",
            ActivityUnit::Hours => "h",
            ActivityUnit::KilowattHours => "kWh",
            ActivityUnit::KilowattHoursThermal => "kWh-th",
            ActivityUnit::TonsCo2e => "tCO2e",
        }
    }
}

/// Yearly activity figures for one reporting period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityData {
    pub cars_km: f64,
    pub trucks_km: f64,
    pub buses_km: f64,
    pub forklift_hours: f64,
    pub plane_hours: f64,
    pub lighting_kwh: f64,
    pub heating_kwh_thermal: f64,
    pub cooling_kwh: f64,
    pub computing_kwh: f64,
    /// Third-party emissions, already in tons CO2e
    #[serde(default)]
    pub subcontractor_emissions: Vec<f64>,
}

impl ActivityData {
    /// Reference activity used by `sample` and the documentation
    pub fn sample() -> Self {
        ActivityData {
            cars_km: 250_000.0,
            trucks_km: 150_000.0,
            buses_km: 80_000.0,
            forklift_hours: 2_000.0,
            plane_hours: 400.0,
            lighting_kwh: 120_000.0,
            heating_kwh_thermal: 50_000.0,
            cooling_kwh: 300_000.0,
            computing_kwh: 90_000.0,
            subcontractor_emissions: vec![120.0, 45.0, 20.0],
        }
    }

    pub fn subcontractor_total(&self) -> f64 {
        self.subcontractor_emissions.iter().sum()
    }

    /// Raw activity figure reported alongside a category's emissions
    pub fn input_value(&self, category: EmissionCategory) -> f64 {
        match category {
            EmissionCategory::Cars => self.cars_km,
            EmissionCategory::Trucks => self.trucks_km,
            EmissionCategory::Buses => self.buses_km,
            EmissionCategory::Forklifts => self.forklift_hours,
            EmissionCategory::CargoPlanes => self.plane_hours,
            EmissionCategory::OfficeLighting => self.lighting_kwh,
            EmissionCategory::Heating => self.heating_kwh_thermal,
            EmissionCategory::Cooling => self.cooling_kwh,
            EmissionCategory::Computing => self.computing_kwh,
            EmissionCategory::Subcontractors => self.subcontractor_total(),
        }
    }

    /// Reject negative or non-finite figures before they reach the calculator
    pub fn validate(&self) -> Result<(), ValidationError> {
        let scalars = [
            ("cars_km", self.cars_km),
            ("trucks_km", self.trucks_km),
            ("buses_km", self.buses_km),
            ("forklift_hours", self.forklift_hours),
            ("plane_hours", self.plane_hours),
            ("lighting_kwh", self.lighting_kwh),
            ("heating_kwh_thermal", self.heating_kwh_thermal),
            ("cooling_kwh", self.cooling_kwh),
            ("computing_kwh", self.computing_kwh),
        ];
        for (field, value) in scalars {
            check_non_negative(field.to_string(), value)?;
        }
        for (i, value) in self.subcontractor_emissions.iter().enumerate() {
            check_non_negative(format!("subcontractor_emissions[{}]", i), *value)?;
        }
        Ok(())
    }
}

fn check_non_negative(field: String, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field, value });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

/// Scenario adjustments, all in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdjustmentParameters {
    pub ev_share_percent: f64,
    pub km_reduction_percent: f64,
    pub load_factor_percent: f64,
}

impl Default for AdjustmentParameters {
    fn default() -> Self {
        AdjustmentParameters {
            ev_share_percent: 0.0,
            km_reduction_percent: 0.0,
            load_factor_percent: 100.0,
        }
    }
}

impl AdjustmentParameters {
    /// Neutral adjustments: no EV share, no distance reduction, full load factor
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Adjustments loaded alongside the sample activity
    pub fn sample_optimized() -> Self {
        AdjustmentParameters {
            ev_share_percent: 30.0,
            km_reduction_percent: 10.0,
            load_factor_percent: 80.0,
        }
    }

    /// Fill unset fields with their neutral values
    pub fn from_partial(
        ev_share_percent: Option<f64>,
        km_reduction_percent: Option<f64>,
        load_factor_percent: Option<f64>,
    ) -> Self {
        let neutral = Self::default();
        AdjustmentParameters {
            ev_share_percent: ev_share_percent.unwrap_or(neutral.ev_share_percent),
            km_reduction_percent: km_reduction_percent.unwrap_or(neutral.km_reduction_percent),
            load_factor_percent: load_factor_percent.unwrap_or(neutral.load_factor_percent),
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_percent("ev_share_percent", self.ev_share_percent)?;
        check_percent("km_reduction_percent", self.km_reduction_percent)?;
        check_percent("load_factor_percent", self.load_factor_percent)?;
        Ok(())
    }
}

fn check_percent(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
            value,
        });
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

/// One category line of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReportRow {
    pub category: EmissionCategory,
    pub activity_value: f64,
    pub emissions_tons: f64,
}

/// Per-category emissions plus the grand total, in fixed category order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionsReport {
    pub rows: Vec<CategoryReportRow>,
    pub total_tons_co2e: f64,
}

impl EmissionsReport {
    pub fn row(&self, category: EmissionCategory) -> Option<&CategoryReportRow> {
        self.rows.iter().find(|r| r.category == category)
    }

    pub fn emissions(&self, category: EmissionCategory) -> f64 {
        self.row(category).map_or(0.0, |r| r.emissions_tons)
    }

    /// Percentage of the total per category, skipping negligible rows
    pub fn shares(&self) -> Vec<CategoryShare> {
        if self.total_tons_co2e <= 0.0 {
            return Vec::new();
        }
        self.rows
            .iter()
            .filter(|r| r.emissions_tons > SHARE_THRESHOLD_TONS)
            .map(|r| CategoryShare {
                category: r.category,
                emissions_tons: r.emissions_tons,
                percent: r.emissions_tons / self.total_tons_co2e * 100.0,
            })
            .collect()
    }
}

/// Rows at or below this many tons are left out of share breakdowns
pub const SHARE_THRESHOLD_TONS: f64 = 0.001;

/// A category's percentage of a report total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: EmissionCategory,
    pub emissions_tons: f64,
    pub percent: f64,
}

/// Baseline and optimized reports computed over the same activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub adjustments: AdjustmentParameters,
    pub baseline: EmissionsReport,
    pub optimized: EmissionsReport,
}

impl ScenarioComparison {
    pub fn reduction_tons(&self) -> f64 {
        self.baseline.total_tons_co2e - self.optimized.total_tons_co2e
    }

    pub fn reduction_percent(&self) -> f64 {
        if self.baseline.total_tons_co2e > 0.0 {
            self.reduction_tons() / self.baseline.total_tons_co2e * 100.0
        } else {
            0.0
        }
    }
}
