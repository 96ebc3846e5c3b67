//! Feature rows for forward-looking months

use crate::data::TaxpayerProfile;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Number of feature rows produced per taxpayer and target year
pub const MONTHS_PER_YEAR: u32 = 12;

/// Calendar season of a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Fixed month-to-season mapping (December opens winter)
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model input for one taxpayer-month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub taxpayer_id: i64,
    pub year: i32,
    pub month: u32,
    pub season: Season,
    pub tax_type: String,
    pub taxpayer_type: String,
    pub activity_type: String,
    pub registration_district: String,
    pub has_employees: bool,
    pub employees_count: Option<u32>,
}

/// Build the 12 monthly feature rows of `profile` for `target_year`.
///
/// Classification fields are copied unchanged into every row. Fails with
/// [`ForecastError::MissingProfileField`] when one of them is absent.
pub fn build_future_rows(profile: &TaxpayerProfile, target_year: i32) -> Result<Vec<FeatureRow>> {
    let missing = |field: &'static str| ForecastError::MissingProfileField {
        taxpayer_id: profile.taxpayer_id,
        field,
    };

    let taxpayer_type = profile
        .taxpayer_type
        .clone()
        .ok_or_else(|| missing("taxpayer_type"))?;
    let activity_type = profile
        .activity_type
        .clone()
        .ok_or_else(|| missing("activity_type"))?;
    let registration_district = profile
        .registration_district
        .clone()
        .ok_or_else(|| missing("registration_district"))?;
    let has_employees = profile
        .has_employees
        .ok_or_else(|| missing("has_employees"))?;
    let tax_type = profile
        .tax_type
        .clone()
        .unwrap_or_else(|| taxpayer_type.clone());

    let rows = (1..=MONTHS_PER_YEAR)
        .map(|month| FeatureRow {
            taxpayer_id: profile.taxpayer_id,
            year: target_year,
            month,
            season: Season::from_month(month),
            tax_type: tax_type.clone(),
            taxpayer_type: taxpayer_type.clone(),
            activity_type: activity_type.clone(),
            registration_district: registration_district.clone(),
            has_employees,
            employees_count: profile.employees_count,
        })
        .collect();

    Ok(rows)
}

/// Feature rows for a whole population, plus the profiles that were skipped
#[derive(Debug, Clone, Default)]
pub struct PopulationRows {
    /// 12 rows per accepted taxpayer, grouped by taxpayer in input order
    pub rows: Vec<FeatureRow>,
    /// Taxpayer ids rejected for missing classification fields
    pub skipped: Vec<i64>,
}

/// Build feature rows for every profile.
///
/// A malformed profile is logged and skipped; it never aborts the batch.
pub fn build_population_rows(profiles: &[TaxpayerProfile], target_year: i32) -> PopulationRows {
    let mut population = PopulationRows {
        rows: Vec::with_capacity(profiles.len() * MONTHS_PER_YEAR as usize),
        skipped: Vec::new(),
    };

    for profile in profiles {
        match build_future_rows(profile, target_year) {
            Ok(rows) => population.rows.extend(rows),
            Err(err) => {
                warn!("Skipping taxpayer {}: {}", profile.taxpayer_id, err);
                population.skipped.push(profile.taxpayer_id);
            }
        }
    }

    population
}
