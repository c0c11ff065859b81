//! Unified listener for handled UNIX signals.

use thiserror::Error;
use tokio::signal::unix;
use tracing::{info, warn};

/// Signal handling error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignalError {
    /// Unable to register signal handler.
    #[error("unable to register signal handler: {0}")]
    Register(#[source] std::io::Error),
}

/// Register signal handler.
fn register(kind: unix::SignalKind) -> Result<unix::Signal, SignalError> {
    unix::signal(kind).map_err(SignalError::Register)
}

/// Signal type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Signal {
    /// SIGTERM.
    Terminate,
    /// SIGINT.
    Interrupt,
    /// SIGQUIT.
    Quit,
    /// SIGHUP.
    HangUp,
}

impl Signal {
    /// Name of a signal, as written in UNIX manual pages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "SIGINT",
            Self::Quit => "SIGQUIT",
            Self::HangUp => "SIGHUP",
        }
    }

    /// Whether a given signal should result in the exporter shutting down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Terminate | Self::Interrupt | Self::Quit)
    }
}

/// Unified listener for all handled signals.
pub struct SignalStream {
    /// Signal listener for SIGTERM.
    sig_term: unix::Signal,
    /// Signal listener for SIGINT.
    sig_int: unix::Signal,
    /// Signal listener for SIGQUIT.
    sig_quit: unix::Signal,
    /// Signal listener for SIGHUP.
    sig_hup: unix::Signal,
}

impl SignalStream {
    /// Create new [`SignalStream`], registering all signal handlers.
    ///
    /// # Errors
    ///
    /// Returns `Err` if some signal handler failed to register.
    pub fn new() -> Result<Self, SignalError> {
        Ok(Self {
            sig_term: register(unix::SignalKind::terminate())?,
            sig_int: register(unix::SignalKind::interrupt())?,
            sig_quit: register(unix::SignalKind::quit())?,
            sig_hup: register(unix::SignalKind::hangup())?,
        })
    }

    /// Wait for the next received signal.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a terminated signal handler failed to re-register.
    pub async fn next(&mut self) -> Result<Signal, SignalError> {
        macro_rules! sig_recv {
            ($name:literal, $value:ident) => {
                info!(kind = $name, "received signal");
                return Ok(Signal::$value);
            };
        }
        macro_rules! sig_restart {
            ($name:literal, $sig:ident, $create:ident) => {
                warn!(kind = $name, "signal handler exited, restarting");
                self.$sig = register(unix::SignalKind::$create())?;
                continue;
            };
        }
        loop {
            tokio::select! {
                ret = self.sig_term.recv() => match ret {
                    Some(_) => { sig_recv!("SIGTERM", Terminate); }
                    None => { sig_restart!("SIGTERM", sig_term, terminate); }
                },
                ret = self.sig_int.recv() => match ret {
                    Some(_) => { sig_recv!("SIGINT", Interrupt); }
                    None => { sig_restart!("SIGINT", sig_int, interrupt); }
                },
                ret = self.sig_quit.recv() => match ret {
                    Some(_) => { sig_recv!("SIGQUIT", Quit); }
                    None => { sig_restart!("SIGQUIT", sig_quit, quit); }
                },
                ret = self.sig_hup.recv() => match ret {
                    Some(_) => { sig_recv!("SIGHUP", HangUp); }
                    None => { sig_restart!("SIGHUP", sig_hup, hangup); }
                },
            }
        }
    }
}
