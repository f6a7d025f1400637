//! Signal handling for graceful shutdown
//!
//! Provides Ctrl+C handling with two-phase shutdown:
//! - First Ctrl+C: stop the monitor before its next event
//! - Second Ctrl+C: Force exit with code 130

use std::sync::atomic::{AtomicBool, Ordering};

use modwatch::StopHandle;

/// Exit codes for CLI commands
#[repr(i32)]
pub enum ExitCode {
    /// User interrupted with Ctrl+C
    Interrupted = 130,
}

/// Global flag indicating user requested interruption
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install Ctrl+C handler for graceful shutdown
///
/// First Ctrl+C stops the monitor through `stop`, letting the current poll
/// cycle settle. Second Ctrl+C force-exits with code 130.
pub fn setup_signal_handler(stop: StopHandle) {
    if let Err(e) = ctrlc::set_handler(move || {
        if INTERRUPTED.swap(true, Ordering::AcqRel) {
            // Second Ctrl+C: force exit
            std::process::exit(ExitCode::Interrupted as i32);
        }
        eprintln!("\nInterrupted. Stopping monitor...");
        stop.stop();
    }) {
        eprintln!("Warning: Failed to set Ctrl+C handler: {e}");
    }
}

/// Check if user requested interruption via Ctrl+C
pub fn check_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Acquire)
}
