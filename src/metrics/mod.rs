//! Error metrics collection.
//!
//! Process-lifetime counters per error category. Counts only grow; the
//! only way to lower them is an explicit [`ErrorMetricsStore::reset`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;

/// Counters for one error category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    /// Terminal failures recorded for the category
    pub count: u64,
    /// When the category last failed
    pub last_occurrence: Option<DateTime<Utc>>,
    /// Operations that succeeded after retrying past this category
    pub retry_success_count: u64,
    /// Failures a recovery strategy resolved with a usable value
    pub recovery_success_count: u64,
}

/// Thread-safe metrics store shared by every handler clone.
#[derive(Debug, Clone, Default)]
pub struct ErrorMetricsStore {
    inner: Arc<RwLock<HashMap<ErrorCategory, ErrorMetrics>>>,
}

impl ErrorMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a counter half-written,
    // so poisoned guards are safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ErrorCategory, ErrorMetrics>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ErrorCategory, ErrorMetrics>> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records one occurrence of `category` and returns its new count.
    pub fn record_error(&self, category: ErrorCategory) -> u64 {
        let mut metrics = self.write();
        let entry = metrics.entry(category).or_default();
        entry.count += 1;
        entry.last_occurrence = Some(Utc::now());
        entry.count
    }

    pub fn record_retry_success(&self, category: ErrorCategory) {
        self.write().entry(category).or_default().retry_success_count += 1;
    }

    pub fn record_recovery_success(&self, category: ErrorCategory) {
        self.write().entry(category).or_default().recovery_success_count += 1;
    }

    /// Metrics for `category`, if it has ever been recorded.
    pub fn get(&self, category: ErrorCategory) -> Option<ErrorMetrics> {
        self.read().get(&category).cloned()
    }

    /// Failure count for `category`; zero if never recorded.
    pub fn count(&self, category: ErrorCategory) -> u64 {
        self.read().get(&category).map_or(0, |m| m.count)
    }

    /// Copy of all metrics, ordered by category.
    pub fn snapshot(&self) -> BTreeMap<ErrorCategory, ErrorMetrics> {
        self.read()
            .iter()
            .map(|(category, metrics)| (*category, metrics.clone()))
            .collect()
    }

    pub fn total_errors(&self) -> u64 {
        self.read().values().map(|m| m.count).sum()
    }

    /// Clears every counter.
    pub fn reset(&self) {
        self.write().clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

/// Format metrics for display.
pub fn format_metrics(snapshot: &BTreeMap<ErrorCategory, ErrorMetrics>) -> String {
    let mut output = String::from("## Error Metrics\n\n");

    if snapshot.is_empty() {
        output.push_str("No errors recorded.\n");
        return output;
    }

    let total: u64 = snapshot.values().map(|m| m.count).sum();
    output.push_str(&format!("- **Total Errors**: {}\n\n", total));

    let mut rows: Vec<_> = snapshot.iter().collect();
    rows.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(b.0)));
    for (category, metrics) in rows {
        let last_seen = metrics
            .last_occurrence
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        output.push_str(&format!(
            "- **{}**: {} occurrences, {} retry successes, {} recovery successes (last {})\n",
            category.as_str(),
            metrics.count,
            metrics.retry_success_count,
            metrics.recovery_success_count,
            last_seen
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_counts_and_timestamps() {
        let store = ErrorMetricsStore::new();
        assert!(store.get(ErrorCategory::Network).is_none());

        assert_eq!(store.record_error(ErrorCategory::Network), 1);
        assert_eq!(store.record_error(ErrorCategory::Network), 2);

        let metrics = store.get(ErrorCategory::Network).unwrap();
        assert_eq!(metrics.count, 2);
        assert!(metrics.last_occurrence.is_some());
        assert_eq!(store.count(ErrorCategory::Parse), 0);
    }

    #[test]
    fn test_last_occurrence_advances() {
        let store = ErrorMetricsStore::new();
        store.record_error(ErrorCategory::Unknown);
        let first = store.get(ErrorCategory::Unknown).unwrap().last_occurrence;
        store.record_error(ErrorCategory::Unknown);
        let second = store.get(ErrorCategory::Unknown).unwrap().last_occurrence;
        assert!(second >= first);
    }

    #[test]
    fn test_success_counters_are_independent() {
        let store = ErrorMetricsStore::new();
        store.record_retry_success(ErrorCategory::Network);
        store.record_recovery_success(ErrorCategory::LlmApi);

        let network = store.get(ErrorCategory::Network).unwrap();
        assert_eq!(network.count, 0);
        assert_eq!(network.retry_success_count, 1);
        assert!(network.last_occurrence.is_none());

        let llm = store.get(ErrorCategory::LlmApi).unwrap();
        assert_eq!(llm.recovery_success_count, 1);
    }

    #[test]
    fn test_clones_share_state_and_reset_clears() {
        let store = ErrorMetricsStore::new();
        let clone = store.clone();
        clone.record_error(ErrorCategory::Parse);
        clone.record_error(ErrorCategory::Permission);

        assert_eq!(store.total_errors(), 2);
        store.reset();
        assert_eq!(clone.total_errors(), 0);
        assert!(clone.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = ErrorMetricsStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        store.record_error(ErrorCategory::ExternalTool);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.count(ErrorCategory::ExternalTool), 2000);
    }

    #[test]
    fn test_to_json_uses_category_names() {
        let store = ErrorMetricsStore::new();
        store.record_error(ErrorCategory::StateCorruption);

        let json: serde_json::Value = serde_json::from_str(&store.to_json().unwrap()).unwrap();
        assert_eq!(json["state_corruption"]["count"], 1);
        assert_eq!(json["state_corruption"]["retry_success_count"], 0);
    }

    #[test]
    fn test_format_metrics() {
        let store = ErrorMetricsStore::new();
        assert!(format_metrics(&store.snapshot()).contains("No errors recorded."));

        store.record_error(ErrorCategory::Network);
        store.record_error(ErrorCategory::Network);
        store.record_error(ErrorCategory::Parse);
        let output = format_metrics(&store.snapshot());

        assert!(output.contains("## Error Metrics"));
        assert!(output.contains("**Total Errors**: 3"));
        let network = output.find("**network**: 2 occurrences").unwrap();
        let parse = output.find("**parse**: 1 occurrences").unwrap();
        assert!(network < parse);
    }
}
