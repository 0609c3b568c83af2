use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::AppState;

pub const METRICS: &[&str] = &["LCP", "FCP", "CLS", "INP", "TTFB"];
const RATINGS: &[&str] = &["good", "needs-improvement", "poor"];

/// One beacon from the page, as sent by `navigator.sendBeacon`.
#[derive(Debug, Deserialize)]
pub struct VitalsReport {
    pub name: String,
    pub value: f64,
    pub rating: String,
    pub id: String,
    #[serde(default)]
    pub page: String,
}

impl VitalsReport {
    fn check(&self) -> Result<(), ApiError> {
        if !METRICS.contains(&self.name.as_str()) {
            return Err(ApiError::BadRequest(format!("unknown metric {:?}", self.name)));
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(ApiError::BadRequest(format!("invalid value {}", self.value)));
        }
        if !RATINGS.contains(&self.rating.as_str()) {
            return Err(ApiError::BadRequest(format!("unknown rating {:?}", self.rating)));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: u64,
    pub mean: f64,
    pub poor: u64,
}

/// Running totals since the process started, per metric.
#[derive(Default)]
pub struct VitalsStore {
    totals: Mutex<BTreeMap<String, (u64, f64, u64)>>,
}

impl VitalsStore {
    pub fn record(&self, report: &VitalsReport) {
        let mut totals = self.totals.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (count, sum, poor) = totals.entry(report.name.clone()).or_default();
        *count += 1;
        *sum += report.value;
        if report.rating == "poor" {
            *poor += 1;
        }
    }

    pub fn summary(&self) -> BTreeMap<String, MetricSummary> {
        let totals = self.totals.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        totals
            .iter()
            .map(|(name, &(count, sum, poor))| {
                let mean = if count == 0 { 0.0 } else { sum / count as f64 };
                (name.clone(), MetricSummary { count, mean, poor })
            })
            .collect()
    }
}

// beacons arrive as text/plain, so the body is parsed by hand instead of with `Json`
pub async fn record_vitals(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let report: VitalsReport = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    report.check()?;

    info!(
        metric = %report.name,
        value = report.value,
        rating = %report.rating,
        page = %report.page,
        "web vital"
    );
    debug!("vitals report id {}", report.id);
    state.vitals.record(&report);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vitals_summary(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, MetricSummary>> {
    Json(state.vitals.summary())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, value: f64, rating: &str) -> VitalsReport {
        VitalsReport {
            name: name.into(),
            value,
            rating: rating.into(),
            id: "v1-1".into(),
            page: "/".into(),
        }
    }

    #[test]
    fn rejects_unknown_metrics_and_values() {
        assert!(report("LCP", 1200.0, "good").check().is_ok());
        assert!(report("FID", 10.0, "good").check().is_err());
        assert!(report("CLS", f64::NAN, "good").check().is_err());
        assert!(report("CLS", -0.1, "good").check().is_err());
        assert!(report("INP", 80.0, "great").check().is_err());
    }

    #[test]
    fn summary_averages_per_metric() {
        let store = VitalsStore::default();
        store.record(&report("LCP", 1000.0, "good"));
        store.record(&report("LCP", 5000.0, "poor"));
        store.record(&report("CLS", 0.05, "good"));

        let summary = store.summary();
        assert_eq!(summary["LCP"], MetricSummary { count: 2, mean: 3000.0, poor: 1 });
        assert_eq!(summary["CLS"].count, 1);
        assert!(!summary.contains_key("INP"));
    }
}
