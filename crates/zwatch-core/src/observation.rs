use serde::{Deserialize, Serialize};

/// Decision and diagnostics for one processed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// 1-based position of the value in its stream
    pub index: u64,
    pub value: f64,
    pub is_anomaly: bool,
    pub z_score: f64,
    /// Running mean after this value was folded in
    pub ewma: f64,
    pub std_dev: f64,
}

impl Observation {
    /// Signed distance from the running mean, in standard deviations.
    /// Zero whenever `std_dev` is zero.
    pub fn signed_z_score(&self) -> f64 {
        if self.value < self.ewma {
            -self.z_score
        } else {
            self.z_score
        }
    }
}
