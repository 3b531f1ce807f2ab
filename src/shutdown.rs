//! Signal driven shutdown and diagnostic toggling
//!
//! Handlers only touch atomics. SIGINT/SIGTERM set the shutdown flag, which
//! the receive loop checks at its sleep points before running teardown on
//! the main thread. A second termination signal while the flag is already
//! set is a forced exit: the process ends with [`FATAL_EXIT`] at once,
//! without terminating the device or closing the log. SIGUSR1 flips the
//! INFO and DEBUG log bits.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::{flag, low_level, SigId};

use crate::logging;

/// Signals that request shutdown
pub const TERMINATION_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Signal that toggles diagnostic verbosity
pub const DIAGNOSTIC_SIGNAL: i32 = SIGUSR1;

/// Exit status for fatal conditions, including a forced exit
pub const FATAL_EXIT: i32 = -1;

/// Shared shutdown request flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the receive loop to stop at its next sleep point
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns the installed signal handlers; dropping it removes them
pub struct ShutdownController {
    flag: ShutdownFlag,
    registrations: Vec<SigId>,
}

impl ShutdownController {
    /// Install handlers for the termination and diagnostic signals
    pub fn register() -> io::Result<Self> {
        let mut controller = Self {
            flag: ShutdownFlag::new(),
            registrations: Vec::new(),
        };

        for signal in TERMINATION_SIGNALS {
            // Order matters: the conditional exit must see the flag before
            // the first delivery sets it
            controller.registrations.push(flag::register_conditional_shutdown(
                signal,
                FATAL_EXIT,
                Arc::clone(&controller.flag.0),
            )?);
            controller
                .registrations
                .push(flag::register(signal, Arc::clone(&controller.flag.0))?);
        }

        // SAFETY: the action is a lock-free atomic compare-and-swap, which is
        // async-signal-safe. It neither allocates nor takes locks.
        let diagnostic = unsafe {
            low_level::register(DIAGNOSTIC_SIGNAL, || {
                logging::toggle_diagnostics();
            })
        }?;
        controller.registrations.push(diagnostic);

        Ok(controller)
    }

    /// Handle to the flag set by termination signals
    pub fn flag(&self) -> ShutdownFlag {
        self.flag.clone()
    }
}

impl Drop for ShutdownController {
    fn drop(&mut self) {
        for id in self.registrations.drain(..) {
            low_level::unregister(id);
        }
    }
}
