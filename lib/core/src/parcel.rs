use serde::{Deserialize, Serialize};

/// Appraisal-district account number identifying one parcel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParcelId(String);

impl ParcelId {
    #[inline]
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self(account.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParcelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParcelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParcelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Comparable scope: district plus neighborhood code, matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub district: String,
    pub neighborhood_code: String,
}

/// WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Haversine distance to another point, in miles.
    pub fn miles_to(&self, other: &Coordinates) -> f64 {
        const EARTH_RADIUS_MI: f64 = 3958.8;
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
        EARTH_RADIUS_MI * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// One year of the parcel's valuation history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationRecord {
    pub year: u16,
    pub appraised: f64,
    pub market: f64,
}

/// A real-estate parcel as delivered by the ingestion pipeline.
///
/// Read-only to this engine: vectors are recomputed from fresh snapshots,
/// never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub id: ParcelId,
    pub district: String,
    pub address: String,
    pub neighborhood_code: String,
    /// Building area in square feet. Required for normalization.
    pub building_area: Option<f64>,
    /// Year built. Required for normalization.
    pub year_built: Option<u16>,
    /// District grade code such as "B+"; unknown grades fall back to "C".
    pub building_grade: Option<String>,
    /// Lot size in square feet.
    pub land_area: Option<f64>,
    pub appraised_value: f64,
    pub market_value: f64,
    #[serde(default)]
    pub valuation_history: Vec<ValuationRecord>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Parcel {
    #[inline]
    #[must_use]
    pub fn scope(&self) -> Scope {
        Scope {
            district: self.district.clone(),
            neighborhood_code: self.neighborhood_code.clone(),
        }
    }

    /// Appraised value per square foot of building area, when area is known
    /// and positive.
    #[must_use]
    pub fn value_per_sqft(&self) -> Option<f64> {
        match self.building_area {
            Some(area) if area > 0.0 && self.appraised_value > 0.0 => {
                Some(self.appraised_value / area)
            }
            _ => None,
        }
    }
}
