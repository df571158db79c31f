//! Recording system module
//!
//! - `coordinator`: the IDLE → ARMED → RECORDING → FINALIZING state machine
//! - `naming`: two-photon style `<base>A<NN>` output names
//! - `edge`: trigger line edge detection
//! - `stop`: ordered stop conditions

pub mod coordinator;
pub mod edge;
pub mod error;
pub mod naming;
pub mod state;
pub mod stop;

pub use coordinator::{RecordingCoordinator, RecordingEvent};
pub use error::{RecordingError, RecordingResult};
pub use naming::{next_sequence_name, SequenceName};
pub use state::{RecorderConfig, RecorderState, RecordingMode, RecordingSession, StopKind, StopReason};
