//! rig-recorder - free-run and TTL-triggered camera recording.
//!
//! A recording starts on the rising edge of a trigger line (or immediately in
//! free-run), stops on the falling edge, a safety cap, a frame count or a
//! stalled stream, and lands in `<base>A01.avi`, `<base>A02.avi`, ... so
//! videos line up with two-photon imaging files.

pub mod capture;
pub mod commands;
pub mod config;
pub mod output;
pub mod recorder;
pub mod utils;
