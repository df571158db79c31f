//! Background command reader
//!
//! One thread reads lines from the operator's input and keeps only the most
//! recent token. A `q` token, end of input, or a read error also raises the
//! shared cancel flag so a running recording stops at its next iteration.

use parking_lot::Mutex;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub struct CommandListener {
    last: Arc<Mutex<Option<String>>>,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CommandListener {
    /// Spawn the reader thread
    pub fn start<R>(input: R, cancel: Arc<AtomicBool>) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let last = Arc::new(Mutex::new(None));
        let stopped = Arc::new(AtomicBool::new(false));

        let handle = {
            let last = last.clone();
            let stopped = stopped.clone();
            std::thread::Builder::new()
                .name("command-listener".to_string())
                .spawn(move || read_commands(input, last, stopped, cancel))
        };
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to spawn command listener: {}", e);
                stopped.store(true, Ordering::SeqCst);
                None
            }
        };

        Self { last, stopped, handle }
    }

    /// Take the most recent command, if any
    pub fn pop(&self) -> Option<String> {
        self.last.lock().take()
    }

    /// Stop after the current line. A thread blocked on input is left detached.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }

    /// The reader thread has exited or been asked to
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

fn read_commands<R: BufRead>(
    mut input: R,
    last: Arc<Mutex<Option<String>>>,
    stopped: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
) {
    let mut line = String::new();
    while !stopped.load(Ordering::SeqCst) {
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => {
                tracing::debug!("Operator input closed");
                break;
            }
            Ok(_) => {
                let token = line.trim().to_ascii_lowercase();
                if token.is_empty() {
                    continue;
                }
                if token == "q" {
                    cancel.store(true, Ordering::SeqCst);
                }
                *last.lock() = Some(token);
            }
            Err(e) => {
                tracing::warn!("Failed to read operator input: {}", e);
                break;
            }
        }
    }
    stopped.store(true, Ordering::SeqCst);
    cancel.store(true, Ordering::SeqCst);
}
