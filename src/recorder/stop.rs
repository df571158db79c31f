//! Stop conditions
//!
//! A recording's stop rules are a list of [`StopCondition`]s in priority
//! order, derived from the [`RecordingMode`]. The first one that holds wins.

use super::edge::Edge;
use super::state::{RecordingMode, StopReason};
use std::time::Duration;

/// A single rule that ends a recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopCondition {
    /// The trigger line fell
    FallingEdge,
    /// Maximum recording time
    SafetyCap(Duration),
    /// Fixed number of written frames
    FrameCount(u64),
    /// This many consecutive pull failures after the stream started
    ConsecutiveFailures(u32),
}

/// Everything a stop condition may look at
#[derive(Debug, Clone, Copy)]
pub struct StopContext {
    pub edge: Edge,
    pub elapsed: Duration,
    pub frames_written: u64,
    pub consecutive_failures: u32,
}

impl StopCondition {
    fn check(&self, ctx: &StopContext) -> Option<StopReason> {
        match *self {
            StopCondition::FallingEdge if ctx.edge == Edge::Falling => Some(StopReason::FallingEdge),
            StopCondition::SafetyCap(cap) if ctx.elapsed >= cap => Some(StopReason::SafetyCap),
            StopCondition::FrameCount(target) if ctx.frames_written >= target => {
                Some(StopReason::TargetReached)
            }
            StopCondition::ConsecutiveFailures(limit) if ctx.consecutive_failures >= limit => {
                Some(StopReason::StreamStalled)
            }
            _ => None,
        }
    }
}

/// Ordered set of stop conditions
#[derive(Debug, Clone, PartialEq)]
pub struct StopPolicy {
    conditions: Vec<StopCondition>,
}

impl StopPolicy {
    /// Build the policy for `mode`.
    ///
    /// `line_readable` drops the falling-edge rule when the camera cannot report
    /// its line level; the failure rule then covers hardware acquisition-stop.
    pub fn for_mode(mode: &RecordingMode, line_readable: bool, max_consecutive_failures: u32) -> Self {
        let mut conditions = Vec::new();
        match mode {
            RecordingMode::Triggered {
                stop_on_falling,
                safety_cap,
                target_frames,
                ..
            } => {
                if *stop_on_falling && line_readable {
                    conditions.push(StopCondition::FallingEdge);
                }
                if let Some(cap) = safety_cap {
                    conditions.push(StopCondition::SafetyCap(*cap));
                }
                if let Some(target) = target_frames {
                    conditions.push(StopCondition::FrameCount(*target));
                }
            }
            RecordingMode::FreeRun { .. } => {
                if let Some(target) = mode.target_frames() {
                    conditions.push(StopCondition::FrameCount(target));
                }
            }
        }
        conditions.push(StopCondition::ConsecutiveFailures(max_consecutive_failures.max(1)));
        Self { conditions }
    }

    pub fn conditions(&self) -> &[StopCondition] {
        &self.conditions
    }

    /// Maximum duration, if any rule imposes one
    pub fn safety_cap(&self) -> Option<Duration> {
        self.conditions.iter().find_map(|c| match c {
            StopCondition::SafetyCap(cap) => Some(*cap),
            _ => None,
        })
    }

    pub fn watches_line(&self) -> bool {
        self.conditions.contains(&StopCondition::FallingEdge)
    }

    /// First condition that holds, in priority order
    pub fn evaluate(&self, ctx: &StopContext) -> Option<StopReason> {
        self.conditions.iter().find_map(|c| c.check(ctx))
    }
}
