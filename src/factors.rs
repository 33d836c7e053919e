//! Emission factor table (kg CO2e per unit of activity)

use crate::models::{ActivityUnit, EmissionCategory};

/// Share of car emissions removed by a fully electric fleet; the rest is grid electricity
pub const EV_MITIGATION: f64 = 0.7;

pub const KG_PER_TON: f64 = 1000.0;

/// Factor for a category, `None` for categories reported directly in tons
pub const fn factor(category: EmissionCategory) -> Option<f64> {
    match category {
        EmissionCategory::Cars => Some(0.18),
        EmissionCategory::Trucks => Some(0.90),
        EmissionCategory::Buses => Some(1.10),
        EmissionCategory::Forklifts => Some(4.0),
        EmissionCategory::CargoPlanes => Some(9000.0),
        EmissionCategory::OfficeLighting => Some(0.42),
        EmissionCategory::Heating => Some(0.20),
        EmissionCategory::Cooling => Some(0.42),
        EmissionCategory::Computing => Some(0.42),
        EmissionCategory::Subcontractors => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorEntry {
    pub category: EmissionCategory,
    pub kg_per_unit: f64,
    pub unit: ActivityUnit,
}

/// All categories that carry a factor, in report order
pub fn factor_table() -> Vec<FactorEntry> {
    EmissionCategory::ALL
        .into_iter()
        .filter_map(|category| {
            factor(category).map(|kg_per_unit| FactorEntry {
                category,
                kg_per_unit,
                unit: category.unit(),
            })
        })
        .collect()
}
