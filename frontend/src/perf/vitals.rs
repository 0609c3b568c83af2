use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{PerformanceEntry, PerformanceObserver, PerformanceObserverEntryList, PerformanceObserverInit};

use crate::subscription::Subscription;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Metric {
    Lcp,
    Fcp,
    Cls,
    Inp,
    Ttfb,
}

impl Metric {
    /// Upper bounds of "good" and "needs improvement".
    pub fn thresholds(self) -> (f64, f64) {
        match self {
            Metric::Lcp => (2500.0, 4000.0),
            Metric::Fcp => (1800.0, 3000.0),
            Metric::Cls => (0.1, 0.25),
            Metric::Inp => (200.0, 500.0),
            Metric::Ttfb => (800.0, 1800.0),
        }
    }

    pub fn rate(self, value: f64) -> Rating {
        let (good, poor) = self.thresholds();
        if value <= good {
            Rating::Good
        } else if value <= poor {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        }
    }

    fn entry_type(self) -> &'static str {
        match self {
            Metric::Lcp => "largest-contentful-paint",
            Metric::Fcp => "paint",
            Metric::Cls => "layout-shift",
            Metric::Inp => "event",
            Metric::Ttfb => "navigation",
        }
    }

    /// FCP and TTFB never change once observed; the others settle when the page is hidden.
    fn is_final_on_first_value(self) -> bool {
        matches!(self, Metric::Fcp | Metric::Ttfb)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

/// Beacon payload posted to the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VitalsReport {
    pub name: Metric,
    pub value: f64,
    pub rating: Rating,
    pub id: String,
    pub page: String,
}

/// Cumulative Layout Shift over session windows: shifts less than 1s apart
/// and within 5s of the window start are summed, the largest window wins.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClsAccumulator {
    window_value: f64,
    window_start: f64,
    last_shift: f64,
    max: f64,
}

impl ClsAccumulator {
    const GAP_MS: f64 = 1000.0;
    const WINDOW_MS: f64 = 5000.0;

    pub fn add(&mut self, value: f64, start_time: f64, had_recent_input: bool) {
        // shifts right after user input are expected
        if had_recent_input {
            return;
        }
        let continues_window = self.window_value > 0.0
            && start_time - self.last_shift < Self::GAP_MS
            && start_time - self.window_start < Self::WINDOW_MS;
        if continues_window {
            self.window_value += value;
        } else {
            self.window_value = value;
            self.window_start = start_time;
        }
        self.last_shift = start_time;
        self.max = self.max.max(self.window_value);
    }

    pub fn value(&self) -> f64 {
        self.max
    }
}

/// Interaction to Next Paint approximated by the slowest interaction seen.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InpTracker {
    worst: Option<f64>,
}

impl InpTracker {
    pub fn add(&mut self, interaction_id: u64, duration: f64) {
        // entries without an interaction id are not discrete user interactions
        if interaction_id == 0 {
            return;
        }
        self.worst = Some(self.worst.map_or(duration, |worst| worst.max(duration)));
    }

    pub fn value(&self) -> Option<f64> {
        self.worst
    }
}

#[derive(Default)]
struct Collected {
    values: HashMap<Metric, f64>,
    reported: HashMap<Metric, f64>,
    cls: ClsAccumulator,
    inp: InpTracker,
}

impl Collected {
    fn record(&mut self, metric: Metric, entry: &PerformanceEntry) -> Option<f64> {
        match metric {
            Metric::Lcp => Some(entry.start_time()),
            Metric::Fcp => (entry.name() == "first-contentful-paint").then(|| entry.start_time()),
            Metric::Cls => {
                let value = number_field(entry, "value")?;
                let had_recent_input = js_sys::Reflect::get(entry, &JsValue::from_str("hadRecentInput"))
                    .ok()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                self.cls.add(value, entry.start_time(), had_recent_input);
                Some(self.cls.value())
            }
            Metric::Inp => {
                let interaction_id = number_field(entry, "interactionId").unwrap_or(0.0) as u64;
                self.inp.add(interaction_id, entry.duration());
                self.inp.value()
            }
            Metric::Ttfb => number_field(entry, "responseStart"),
        }
    }

    /// Values not yet sent (or changed since last sent).
    fn unreported(&mut self, only_final: bool) -> Vec<(Metric, f64)> {
        let pending: Vec<(Metric, f64)> = self
            .values
            .iter()
            .filter(|(metric, _)| !only_final || metric.is_final_on_first_value())
            .filter(|(metric, value)| self.reported.get(*metric) != Some(*value))
            .map(|(metric, value)| (*metric, *value))
            .collect();
        for (metric, value) in &pending {
            self.reported.insert(*metric, *value);
        }
        pending
    }
}

fn number_field(entry: &PerformanceEntry, field: &str) -> Option<f64> {
    js_sys::Reflect::get(entry, &JsValue::from_str(field))
        .ok()
        .and_then(|v| v.as_f64())
}

fn report_id() -> String {
    format!(
        "v1-{}-{}",
        js_sys::Date::now() as u64,
        (js_sys::Math::random() * 1e12) as u64
    )
}

fn send(endpoint: &str, id: &str, metric: Metric, value: f64) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let page = window.location().pathname().unwrap_or_default();
    let report = VitalsReport {
        name: metric,
        value,
        rating: metric.rate(value),
        id: id.to_string(),
        page,
    };
    debug!("web vital {:?} = {} ({:?})", report.name, report.value, report.rating);
    match serde_json::to_string(&report) {
        Ok(body) => {
            if let Err(err) = window.navigator().send_beacon_with_opt_str(endpoint, Some(&body)) {
                warn!("vitals beacon failed: {:?}", err);
            }
        }
        Err(err) => warn!("could not encode vitals report: {}", err),
    }
}

/// Starts observing the Web Vitals and beacons them to `endpoint`.
///
/// Keep the returned subscriptions for the page's lifetime.
pub fn start_collecting(endpoint: &'static str) -> Vec<Subscription> {
    let collected = Rc::new(RefCell::new(Collected::default()));
    let id = Rc::new(report_id());
    let mut subscriptions = Vec::new();

    for metric in [Metric::Lcp, Metric::Fcp, Metric::Cls, Metric::Inp, Metric::Ttfb] {
        let callback = {
            let collected = Rc::clone(&collected);
            let id = Rc::clone(&id);
            Closure::<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>::new(
                move |list: PerformanceObserverEntryList, _observer: PerformanceObserver| {
                    let mut collected = collected.borrow_mut();
                    for entry in list.get_entries().iter() {
                        let Ok(entry) = entry.dyn_into::<PerformanceEntry>() else {
                            continue;
                        };
                        if let Some(value) = collected.record(metric, &entry) {
                            collected.values.insert(metric, value);
                        }
                    }
                    for (metric, value) in collected.unreported(true) {
                        send(endpoint, &id, metric, value);
                    }
                },
            )
        };
        let observer = match PerformanceObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                warn!("PerformanceObserver unavailable: {:?}", err);
                return subscriptions;
            }
        };

        let options = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&options, &"type".into(), &metric.entry_type().into());
        let _ = js_sys::Reflect::set(&options, &"buffered".into(), &JsValue::TRUE);
        if metric == Metric::Inp {
            let _ = js_sys::Reflect::set(&options, &"durationThreshold".into(), &JsValue::from_f64(40.0));
        }
        observer.observe(options.unchecked_ref::<PerformanceObserverInit>());

        subscriptions.push(Subscription::new(move || {
            observer.disconnect();
            drop(callback);
        }));
    }

    subscriptions.push(flush_on_hide(endpoint, collected, id));
    subscriptions
}

fn flush_on_hide(endpoint: &'static str, collected: Rc<RefCell<Collected>>, id: Rc<String>) -> Subscription {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return Subscription::noop();
    };
    let listener = {
        let document = document.clone();
        Closure::<dyn FnMut()>::new(move || {
            if document.hidden() {
                for (metric, value) in collected.borrow_mut().unreported(false) {
                    send(endpoint, &id, metric, value);
                }
            }
        })
    };
    if let Err(err) = document.add_event_listener_with_callback("visibilitychange", listener.as_ref().unchecked_ref()) {
        warn!("could not watch page visibility: {:?}", err);
        return Subscription::noop();
    }
    Subscription::new(move || {
        let _ = document.remove_event_listener_with_callback("visibilitychange", listener.as_ref().unchecked_ref());
    })
}
