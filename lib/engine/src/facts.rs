//! Auxiliary fact tables, consumed read-only.
//!
//! Deed history feeds the sale-recency signal on comparables; the watch
//! registry supplies baseline/latest valuations for the subject. Alert
//! triggering on watch thresholds belongs to the monitoring service, not
//! this engine.

use ahash::AHashMap;
use chrono::{Duration, NaiveDate, Utc};
use equitx_core::ParcelId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One recorded deed transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeedRecord {
    pub account: ParcelId,
    /// ISO date of sale, e.g. "2024-06-18".
    pub date_of_sale: String,
    pub clerk_year: Option<u16>,
    pub clerk_id: Option<String>,
    pub deed_id: Option<String>,
}

/// Read-only deed/transfer history keyed by parcel.
pub trait DeedHistory: Send + Sync {
    /// All deeds for an account, most recent first.
    fn deeds_for(&self, id: &ParcelId) -> Vec<DeedRecord>;

    /// Most recent sale date, if any.
    fn last_sale_date(&self, id: &ParcelId) -> Option<String> {
        self.deeds_for(id).first().map(|d| d.date_of_sale.clone())
    }
}

/// In-memory deed table for embedding and tests.
#[derive(Default)]
pub struct InMemoryDeeds {
    deeds: RwLock<AHashMap<ParcelId, Vec<DeedRecord>>>,
}

impl InMemoryDeeds {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: DeedRecord) {
        let mut map = self.deeds.write();
        let records = map.entry(record.account.clone()).or_default();
        records.push(record);
        // Most recent first; ISO dates order lexicographically.
        records.sort_by(|a, b| b.date_of_sale.cmp(&a.date_of_sale));
    }
}

impl DeedHistory for InMemoryDeeds {
    fn deeds_for(&self, id: &ParcelId) -> Vec<DeedRecord> {
        self.deeds.read().get(id).cloned().unwrap_or_default()
    }
}

/// Whether a sale date falls within the recency window ending today.
#[must_use]
pub fn recently_sold(sale_date: &str, window_days: i64) -> bool {
    let Ok(date) = NaiveDate::parse_from_str(sale_date, "%Y-%m-%d") else {
        return false;
    };
    let cutoff = Utc::now().date_naive() - Duration::days(window_days);
    date >= cutoff
}

/// One watched parcel's registry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRecord {
    pub account: ParcelId,
    pub district: String,
    pub baseline_appraised: f64,
    pub baseline_year: u16,
    pub latest_appraised: f64,
    pub latest_year: u16,
    pub alert_threshold_pct: f64,
}

impl WatchRecord {
    /// Percent change from baseline to latest appraised value.
    #[must_use]
    pub fn change_pct(&self) -> Option<f64> {
        if self.baseline_appraised <= 0.0 {
            return None;
        }
        Some((self.latest_appraised - self.baseline_appraised) / self.baseline_appraised * 100.0)
    }
}

/// Read-only watch/monitor registry keyed by (parcel, district).
pub trait WatchRegistry: Send + Sync {
    fn watch_for(&self, id: &ParcelId, district: &str) -> Option<WatchRecord>;
}

/// In-memory watch registry for embedding and tests.
#[derive(Default)]
pub struct InMemoryWatches {
    watches: RwLock<AHashMap<(ParcelId, String), WatchRecord>>,
}

impl InMemoryWatches {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: WatchRecord) {
        self.watches
            .write()
            .insert((record.account.clone(), record.district.clone()), record);
    }
}

impl WatchRegistry for InMemoryWatches {
    fn watch_for(&self, id: &ParcelId, district: &str) -> Option<WatchRecord> {
        self.watches
            .read()
            .get(&(id.clone(), district.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deeds_most_recent_first() {
        let deeds = InMemoryDeeds::new();
        let account = ParcelId::new("acct-1");
        for date in ["2019-01-05", "2024-06-18", "2021-11-30"] {
            deeds.insert(DeedRecord {
                account: account.clone(),
                date_of_sale: date.to_string(),
                clerk_year: None,
                clerk_id: None,
                deed_id: None,
            });
        }
        assert_eq!(deeds.last_sale_date(&account).as_deref(), Some("2024-06-18"));
    }

    #[test]
    fn test_recently_sold_window() {
        let yesterday = (Utc::now().date_naive() - Duration::days(1)).to_string();
        let long_ago = "2015-03-01";
        assert!(recently_sold(&yesterday, 730));
        assert!(!recently_sold(long_ago, 730));
        assert!(!recently_sold("not-a-date", 730));
    }

    #[test]
    fn test_watch_change_pct() {
        let record = WatchRecord {
            account: ParcelId::new("acct-1"),
            district: "HCAD".to_string(),
            baseline_appraised: 400_000.0,
            baseline_year: 2024,
            latest_appraised: 460_000.0,
            latest_year: 2025,
            alert_threshold_pct: 5.0,
        };
        let pct = record.change_pct().unwrap();
        assert!((pct - 15.0).abs() < 1e-9);

        let zero_base = WatchRecord { baseline_appraised: 0.0, ..record };
        assert_eq!(zero_base.change_pct(), None);
    }

    #[test]
    fn test_registry_keyed_by_account_and_district() {
        let watches = InMemoryWatches::new();
        watches.insert(WatchRecord {
            account: ParcelId::new("acct-1"),
            district: "HCAD".to_string(),
            baseline_appraised: 100.0,
            baseline_year: 2024,
            latest_appraised: 110.0,
            latest_year: 2025,
            alert_threshold_pct: 5.0,
        });
        assert!(watches.watch_for(&ParcelId::new("acct-1"), "HCAD").is_some());
        assert!(watches.watch_for(&ParcelId::new("acct-1"), "TAD").is_none());
    }
}
