//! Trigger edge detection

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often the trigger line is sampled. Frame timing, not edge timing, sets
/// the resolution floor, so tens of milliseconds is enough.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Transition seen between two samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Rising,
    Falling,
    None,
}

/// Compares each line sample with the previous known level.
///
/// An unreadable sample (`None`) yields no edge and leaves the previous level
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct EdgeDetector {
    previous: Option<bool>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous level; the next sample produces no edge
    pub fn rearm(&mut self) {
        self.previous = None;
    }

    /// Set the previous level without emitting an edge
    pub fn seed(&mut self, level: bool) {
        self.previous = Some(level);
    }

    /// Last known level
    pub fn level(&self) -> Option<bool> {
        self.previous
    }

    pub fn sample(&mut self, level: Option<bool>) -> Edge {
        let Some(level) = level else {
            return Edge::None;
        };
        let edge = match (self.previous, level) {
            (Some(false), true) => Edge::Rising,
            (Some(true), false) => Edge::Falling,
            _ => Edge::None,
        };
        self.previous = Some(level);
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_sequence() {
        let mut detector = EdgeDetector::new();
        let samples = [None, Some(false), Some(false), Some(true), Some(true), Some(false)];
        let edges: Vec<Edge> = samples.iter().map(|s| detector.sample(*s)).collect();
        assert_eq!(
            edges,
            vec![Edge::None, Edge::None, Edge::None, Edge::Rising, Edge::None, Edge::Falling]
        );
    }

    #[test]
    fn test_first_sample_after_rearm_is_silent() {
        let mut detector = EdgeDetector::new();
        detector.sample(Some(false));
        detector.rearm();
        assert_eq!(detector.sample(Some(true)), Edge::None);
        assert_eq!(detector.sample(Some(false)), Edge::Falling);
    }

    #[test]
    fn test_unknown_sample_keeps_previous() {
        let mut detector = EdgeDetector::new();
        detector.sample(Some(false));
        assert_eq!(detector.sample(None), Edge::None);
        assert_eq!(detector.sample(Some(true)), Edge::Rising);
    }

    #[test]
    fn test_seed() {
        let mut detector = EdgeDetector::new();
        detector.seed(true);
        assert_eq!(detector.level(), Some(true));
        assert_eq!(detector.sample(Some(false)), Edge::Falling);
    }
}
