//! Equity floor selection.
//!
//! Ranks scoped, similarity-qualified candidates by appraised value and
//! keeps the lowest-valued fraction: the argument is the minimum defensible
//! value among true peers, not the neighborhood mean. A thin result set is
//! flagged `Insufficient` instead of being silently under-supported; the
//! caller decides whether to relax the similarity bar and retry.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::ComparableCandidate;
use crate::parcel::{Parcel, ParcelId};

/// How the comparable set was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionRule {
    /// Lowest-valued fraction of qualifying peers.
    Floor,
    /// Most similar qualifying peers, value ignored.
    Nearest,
}

/// Whether the set carries enough comparables to argue from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStatus {
    Qualified,
    Insufficient { found: usize, required: usize },
}

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Candidates below this similarity never qualify.
    pub min_similarity: f32,
    /// Fraction of qualifying peers kept for the floor (by value, ascending).
    pub floor_fraction: f64,
    /// Fewer qualifying comparables than this flags the set `Insufficient`.
    pub min_count: usize,
    /// Upper bound on returned comparables.
    pub max_comps: usize,
    /// When set, comps whose year-built gap from the subject exceeds this
    /// many years sort after age-compatible comps. They are demoted, never
    /// dropped: review panels dismiss cross-era comps but sparse
    /// neighborhoods still need the fallback.
    pub max_year_gap: Option<u16>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.8,
            floor_fraction: 0.25,
            min_count: 3,
            max_comps: 10,
            max_year_gap: None,
        }
    }
}

/// One selected comparable with its presentation attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityComparable {
    pub candidate: ComparableCandidate,
    /// Appraised value per square foot, when building area is known.
    pub value_per_sqft: Option<f64>,
    /// Deed transfer within the recency window; filled in by the engine
    /// from the deed history, false until then.
    #[serde(default)]
    pub recently_sold: bool,
}

impl EquityComparable {
    fn new(candidate: ComparableCandidate) -> Self {
        let value_per_sqft = match candidate.building_area {
            Some(area) if area > 0.0 && candidate.appraised_value > 0.0 => {
                Some(candidate.appraised_value / area)
            }
            _ => None,
        };
        Self {
            candidate,
            value_per_sqft,
            recently_sold: false,
        }
    }
}

/// The selected comparable set for one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityComparableSet {
    pub subject: ParcelId,
    pub rule: SelectionRule,
    pub status: SelectionStatus,
    pub comparables: Vec<EquityComparable>,
    /// Median appraised value of the selected members: the justified value
    /// floor the report assembler cites. Absent when nothing qualified.
    pub floor_value: Option<f64>,
}

impl EquityComparableSet {
    #[inline]
    #[must_use]
    pub fn is_sufficient(&self) -> bool {
        matches!(self.status, SelectionStatus::Qualified)
    }

    /// Borrow the set, or surface `Insufficient` for callers that treat a
    /// thin set as an error rather than a signal to relax and retry.
    pub fn require_sufficient(&self) -> Result<&Self> {
        match self.status {
            SelectionStatus::Qualified => Ok(self),
            SelectionStatus::Insufficient { found, required } => {
                Err(Error::Insufficient { found, required })
            }
        }
    }
}

/// Candidates that pass the similarity bar and the subject's exact scope.
fn qualify<'a>(
    subject: &Parcel,
    candidates: &'a [ComparableCandidate],
    config: &SelectorConfig,
) -> Vec<&'a ComparableCandidate> {
    let scope = subject.scope();
    candidates
        .iter()
        .filter(|c| c.similarity >= config.min_similarity && c.scope == scope)
        .collect()
}

/// Age-gap demotion key: 0 for age-compatible comps, 1 for cross-era ones.
fn age_band(subject: &Parcel, candidate: &ComparableCandidate, max_gap: Option<u16>) -> u8 {
    match (max_gap, subject.year_built, candidate.year_built) {
        (Some(gap), Some(subject_year), Some(comp_year)) => {
            if subject_year.abs_diff(comp_year) > gap {
                1
            } else {
                0
            }
        }
        _ => 0,
    }
}

/// Deterministic tiebreak below the primary key: higher similarity first,
/// then geographically nearer, then account number.
fn tiebreak(subject: &Parcel, a: &ComparableCandidate, b: &ComparableCandidate) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            let miles = |c: &ComparableCandidate| {
                match (subject.coordinates, c.coordinates) {
                    (Some(s), Some(p)) => s.miles_to(&p),
                    _ => f64::INFINITY,
                }
            };
            miles(a).partial_cmp(&miles(b)).unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
}

fn median(sorted_values: &[f64]) -> Option<f64> {
    if sorted_values.is_empty() {
        return None;
    }
    Some(sorted_values[sorted_values.len() / 2])
}

/// Select the equity floor: the lowest-appraised fraction of qualifying
/// peers, ordered value-ascending.
#[must_use]
pub fn select_floor(
    subject: &Parcel,
    candidates: &[ComparableCandidate],
    config: &SelectorConfig,
) -> EquityComparableSet {
    let mut qualifying = qualify(subject, candidates, config);
    let found = qualifying.len();

    qualifying.sort_by(|a, b| {
        age_band(subject, a, config.max_year_gap)
            .cmp(&age_band(subject, b, config.max_year_gap))
            .then_with(|| {
                a.appraised_value
                    .partial_cmp(&b.appraised_value)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| tiebreak(subject, a, b))
    });

    let status = if found < config.min_count {
        SelectionStatus::Insufficient {
            found,
            required: config.min_count,
        }
    } else {
        SelectionStatus::Qualified
    };

    let keep = ((found as f64 * config.floor_fraction).ceil() as usize)
        .max(config.min_count.min(found))
        .min(config.max_comps);

    let comparables: Vec<EquityComparable> = qualifying
        .into_iter()
        .take(keep)
        .map(|c| EquityComparable::new(c.clone()))
        .collect();

    let mut values: Vec<f64> = comparables
        .iter()
        .map(|c| c.candidate.appraised_value)
        .filter(|v| *v > 0.0)
        .collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    EquityComparableSet {
        subject: subject.id.clone(),
        rule: SelectionRule::Floor,
        status,
        floor_value: median(&values),
        comparables,
    }
}

/// Select the most similar qualifying peers, ignoring value.
#[must_use]
pub fn select_nearest(
    subject: &Parcel,
    candidates: &[ComparableCandidate],
    config: &SelectorConfig,
) -> EquityComparableSet {
    let mut qualifying = qualify(subject, candidates, config);
    let found = qualifying.len();

    qualifying.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.as_str().cmp(b.id.as_str()))
    });

    let status = if found < config.min_count {
        SelectionStatus::Insufficient {
            found,
            required: config.min_count,
        }
    } else {
        SelectionStatus::Qualified
    };

    let comparables: Vec<EquityComparable> = qualifying
        .into_iter()
        .take(config.max_comps)
        .map(|c| EquityComparable::new(c.clone()))
        .collect();

    let mut values: Vec<f64> = comparables
        .iter()
        .map(|c| c.candidate.appraised_value)
        .filter(|v| *v > 0.0)
        .collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    EquityComparableSet {
        subject: subject.id.clone(),
        rule: SelectionRule::Nearest,
        status,
        floor_value: median(&values),
        comparables,
    }
}
