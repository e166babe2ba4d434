//! Versioned feature-normalization scheme.
//!
//! Turns raw parcel attributes into the fixed-length vector the similarity
//! index is built over. Every weight and bound is part of the scheme: change
//! any of them and you get a new scheme version plus a full recomputation
//! pass, because vectors from different versions must never share an index.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parcel::Parcel;
use crate::vector::FeatureVector;

/// Number of feature dimensions produced by every scheme version so far.
pub const FEATURE_DIM: usize = 4;

/// The scheme version new vectors should be produced under.
pub const CURRENT_SCHEME_VERSION: u32 = 1;

/// A versioned set of normalization bounds and per-dimension weights.
///
/// Dimensions, in order:
/// 0. building area, clamped to `[0, area_max]`, weighted
/// 1. year built, clamped to `[year_min, year_max]`, weighted
/// 2. building grade, mapped through the grade table
/// 3. land area, clamped to `[0, land_max]`, weighted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScheme {
    pub version: u32,
    pub area_max: f32,
    pub year_min: f32,
    pub year_max: f32,
    pub land_max: f32,
    pub weight_area: f32,
    pub weight_year: f32,
    pub weight_land: f32,
}

impl FeatureScheme {
    /// Scheme v1: the production weights.
    ///
    /// Area dominates (2x), age matters (1.5x), lot size is a light signal
    /// (0.5x). `land_max` is five acres.
    #[must_use]
    pub fn v1() -> Self {
        Self {
            version: 1,
            area_max: 10_000.0,
            year_min: 1900.0,
            year_max: 2025.0,
            land_max: 43_560.0 * 5.0,
            weight_area: 2.0,
            weight_year: 1.5,
            weight_land: 0.5,
        }
    }

    /// Min-max scaler bounded to [0, 1].
    fn scale(value: f32, min: f32, max: f32) -> f32 {
        let clamped = value.clamp(min, max);
        (clamped - min) / (max - min)
    }

    /// Normalize a parcel snapshot into a feature vector.
    ///
    /// Building area and year built are required; a parcel missing either is
    /// excluded from the index rather than indexed with fabricated values.
    /// Grade falls back to `C` and land area to zero.
    pub fn normalize(&self, parcel: &Parcel) -> Result<FeatureVector> {
        let area = parcel
            .building_area
            .filter(|a| *a > 0.0)
            .ok_or(Error::IncompleteInput {
                field: "building_area",
            })?;
        let year = parcel.year_built.ok_or(Error::IncompleteInput {
            field: "year_built",
        })?;
        let grade = parcel.building_grade.as_deref().unwrap_or("C");
        let land = parcel.land_area.unwrap_or(0.0);

        let components = vec![
            Self::scale(area as f32, 0.0, self.area_max) * self.weight_area,
            Self::scale(f32::from(year), self.year_min, self.year_max) * self.weight_year,
            grade_score(grade),
            Self::scale(land as f32, 0.0, self.land_max) * self.weight_land,
        ];
        Ok(FeatureVector::new(components, self.version))
    }
}

impl Default for FeatureScheme {
    fn default() -> Self {
        Self::v1()
    }
}

/// District letter grades mapped onto [0.05, 1.0].
///
/// Unknown or malformed grades score as a `C` (0.35), the district's modal
/// grade.
#[must_use]
pub fn grade_score(grade: &str) -> f32 {
    match grade.trim().to_ascii_uppercase().as_str() {
        "X+" => 1.0,
        "X" => 0.95,
        "X-" => 0.9,
        "E+" => 0.85,
        "E" => 0.8,
        "E-" => 0.75,
        "A+" => 0.7,
        "A" => 0.65,
        "A-" => 0.6,
        "B+" => 0.55,
        "B" => 0.5,
        "B-" => 0.45,
        "C+" => 0.4,
        "C" => 0.35,
        "C-" => 0.3,
        "D+" => 0.25,
        "D" => 0.2,
        "D-" => 0.15,
        "F" => 0.05,
        _ => 0.35,
    }
}
