use std::fmt;
use std::str::FromStr;

use super::ViewportError;

/// Minimum visible-area fraction an entry must reach to count as intersecting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, ViewportError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ViewportError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarginValue {
    Px(f64),
    Percent(f64),
}

impl FromStr for MarginValue {
    type Err = ViewportError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || ViewportError::InvalidRootMargin(token.to_string());
        let (number, ctor): (&str, fn(f64) -> MarginValue) = if let Some(n) = token.strip_suffix("px") {
            (n, MarginValue::Px)
        } else if let Some(n) = token.strip_suffix('%') {
            (n, MarginValue::Percent)
        } else {
            // a bare zero is the only unitless length CSS accepts
            (token, MarginValue::Px)
        };
        let value: f64 = number.parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        if number == token && value != 0.0 {
            return Err(invalid());
        }
        Ok(ctor(value))
    }
}

impl fmt::Display for MarginValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginValue::Px(v) => write!(f, "{}px", v),
            MarginValue::Percent(v) => write!(f, "{}%", v),
        }
    }
}

/// Grows (positive) or shrinks (negative) the viewport used for the
/// intersection test, one offset per edge, CSS shorthand order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootMargin {
    pub top: MarginValue,
    pub right: MarginValue,
    pub bottom: MarginValue,
    pub left: MarginValue,
}

impl RootMargin {
    pub fn uniform(value: MarginValue) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

impl Default for RootMargin {
    fn default() -> Self {
        Self::uniform(MarginValue::Percent(0.0))
    }
}

impl FromStr for RootMargin {
    type Err = ViewportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<MarginValue>, _>>()?;
        match values.as_slice() {
            [all] => Ok(Self::uniform(*all)),
            [vertical, horizontal] => Ok(Self {
                top: *vertical,
                right: *horizontal,
                bottom: *vertical,
                left: *horizontal,
            }),
            [top, horizontal, bottom] => Ok(Self {
                top: *top,
                right: *horizontal,
                bottom: *bottom,
                left: *horizontal,
            }),
            [top, right, bottom, left] => Ok(Self {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            }),
            _ => Err(ViewportError::InvalidRootMargin(s.to_string())),
        }
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ObserveOptions {
    pub threshold: Threshold,
    pub root_margin: RootMargin,
    /// Disconnect permanently after the first intersecting observation.
    pub freeze_once_visible: bool,
}

impl ObserveOptions {
    /// One-shot reveal settings: fire once the element is `threshold` visible.
    pub fn once(threshold: f64) -> Result<Self, ViewportError> {
        Ok(Self {
            threshold: Threshold::new(threshold)?,
            root_margin: RootMargin::default(),
            freeze_once_visible: true,
        })
    }

    pub fn with_root_margin(mut self, margin: &str) -> Result<Self, ViewportError> {
        self.root_margin = margin.parse()?;
        Ok(self)
    }
}
