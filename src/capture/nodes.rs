//! Node-map value ranges
//!
//! Camera features (exposure, gain, ROI offsets) live in the SDK's node map
//! with a min/max and, for integers, an increment. Requested values are fitted
//! into that range instead of being rejected.

use serde::{Deserialize, Serialize};

/// Range of a float feature node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatNode {
    pub min: f64,
    pub max: f64,
}

impl FloatNode {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a requested value into the node range
    pub fn fit(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

/// Range of an integer feature node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerNode {
    pub min: i64,
    pub max: i64,
    pub inc: i64,
}

impl IntegerNode {
    pub fn new(min: i64, max: i64, inc: i64) -> Self {
        Self { min, max, inc }
    }

    /// Round down onto the increment grid anchored at `min`, then clamp
    pub fn fit(&self, value: i64) -> i64 {
        let inc = self.inc.max(1);
        let aligned = value - (value - self.min).rem_euclid(inc);
        aligned.min(self.max).max(self.min)
    }
}
