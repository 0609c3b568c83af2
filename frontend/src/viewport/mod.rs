//! Viewport-intersection gate used to defer heavy work until an element is
//! about to be seen.

mod gate;
mod options;
mod web;

pub use gate::{IntersectionBackend, Observation, RawEntry, ViewportGate, ViewportObservation};
pub use options::{MarginValue, ObserveOptions, RootMargin, Threshold};
pub use web::{use_in_view, DomIntersection};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewportError {
    #[error("threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
    #[error("invalid root margin {0:?}, expected 1-4 px/% offsets")]
    InvalidRootMargin(String),
}
