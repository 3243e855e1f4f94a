//! OS signal handling.
//!
//! # Responsibilities
//! - Register termination signal handlers (SIGTERM, SIGINT)
//! - Translate signals into named shutdown reasons
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered once; the stream is reused for later signals

use std::io;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Stream of process termination requests.
pub struct TerminationSignals {
    #[cfg(unix)]
    terminate: Signal,
    #[cfg(unix)]
    interrupt: Signal,
}

impl TerminationSignals {
    /// Register the handlers. Must be called from within a Tokio runtime.
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                interrupt: signal(SignalKind::interrupt())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next termination request and name it.
    pub async fn recv(&mut self) -> io::Result<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.terminate.recv() => Ok("SIGTERM"),
                _ = self.interrupt.recv() => Ok("SIGINT"),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            Ok("ctrl-c")
        }
    }
}
