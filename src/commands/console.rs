//! Interactive operator loop
//!
//! Keeps the camera live in free-run and runs one recording per operator
//! command. Failed attempts are reported and the loop carries on; only `q`
//! or the end of operator input ends it.

use super::listener::CommandListener;
use super::{OperatorCommand, HELP};
use crate::capture::Camera;
use crate::recorder::{RecordingCoordinator, RecordingMode, RecordingSession};
use crate::utils::ErrorResponse;
use std::io::BufRead;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Idle wait between command polls
const HEARTBEAT: Duration = Duration::from_millis(50);

pub struct OperatorConsole<C: Camera> {
    coordinator: RecordingCoordinator<C>,
    free_run: RecordingMode,
    triggered: RecordingMode,
    heartbeat: Duration,
}

impl<C: Camera> OperatorConsole<C> {
    pub fn new(coordinator: RecordingCoordinator<C>, free_run: RecordingMode, triggered: RecordingMode) -> Self {
        Self {
            coordinator,
            free_run,
            triggered,
            heartbeat: HEARTBEAT,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn coordinator(&self) -> &RecordingCoordinator<C> {
        &self.coordinator
    }

    /// Serve operator commands read from `input` until quit.
    ///
    /// With `start_armed` the trigger is armed once before the first command.
    /// Returns the recordings that completed.
    pub fn run<R>(&mut self, input: R, start_armed: bool) -> Vec<RecordingSession>
    where
        R: BufRead + Send + 'static,
    {
        let cancel = self.coordinator.cancel_handle();
        let mut listener = CommandListener::start(input, cancel.clone());
        let mut sessions = Vec::new();

        if start_armed {
            tracing::info!("Starting in trigger mode: arming immediately");
            self.record(self.triggered.clone(), &mut sessions);
        }

        println!("\n[READY] Free-run mode (default).");
        println!("Commands:");
        println!("  t  -> arm trigger & record once when rising edge arrives");
        println!("  r  -> record immediately (free-run recording)");
        println!("  q  -> quit");
        println!("  h  -> help\n");

        loop {
            let Some(token) = listener.pop() else {
                if cancel.load(Ordering::SeqCst) {
                    tracing::info!("Operator input closed, quitting");
                    break;
                }
                std::thread::sleep(self.heartbeat);
                continue;
            };

            match token.parse::<OperatorCommand>() {
                Ok(OperatorCommand::Help) => println!("{HELP}"),
                Ok(OperatorCommand::Quit) => {
                    tracing::info!("Quitting");
                    break;
                }
                Ok(_) if cancel.load(Ordering::SeqCst) => {
                    tracing::info!("Quit requested, ignoring {:?}", token);
                    break;
                }
                Ok(OperatorCommand::RecordFreeRun) => {
                    tracing::info!("Free-run record requested");
                    self.record(self.free_run.clone(), &mut sessions);
                }
                Ok(OperatorCommand::ArmTrigger) => {
                    tracing::info!("Triggered record requested (arming trigger)");
                    self.record(self.triggered.clone(), &mut sessions);
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        listener.stop();
        sessions
    }

    fn record(&mut self, mode: RecordingMode, sessions: &mut Vec<RecordingSession>) {
        match self.coordinator.record(mode) {
            Ok(Some(session)) => {
                println!("[DONE] {} ({} frames)", session.stem, session.frames_written);
                sessions.push(session);
            }
            Ok(None) => {}
            Err(e) => eprintln!("[ERROR] {}", ErrorResponse::from(e)),
        }
    }
}
