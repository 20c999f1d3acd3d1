//! Run states and the sinks that receive status updates.
//!
//! Every phase transition of a run produces a [`StatusUpdate`] carrying both
//! the structured [`RunState`] and the display string a presentation layer
//! shows to the user.

use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Identity of a single run. Ids increase monotonically per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scheduled,
    Delaying,
    Typing,
    Paused,
    Finished,
    /// Cancelled after typing began.
    Stopped,
    /// Cancelled during the start delay.
    Cancelled,
    /// The injection primitive failed; carries the failure reason.
    Errored(String),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Finished | RunState::Stopped | RunState::Cancelled | RunState::Errored(_)
        )
    }

    /// True while a run is between scheduling and its terminal state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Scheduled | RunState::Delaying | RunState::Typing | RunState::Paused
        )
    }
}

/// One status report emitted by a run or by the controller on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub run: RunId,
    pub state: RunState,
    pub message: String,
}

impl StatusUpdate {
    pub fn new(run: RunId, state: RunState, message: impl Into<String>) -> Self {
        Self {
            run,
            state,
            message: message.into(),
        }
    }

    pub fn ready() -> Self {
        Self::new(RunId::default(), RunState::Idle, "Ready.")
    }

    pub fn delaying(run: RunId, delay: Duration) -> Self {
        Self::new(
            run,
            RunState::Delaying,
            format!("Starting in {:.1}s...", delay.as_secs_f64()),
        )
    }

    pub fn typing(run: RunId) -> Self {
        Self::new(run, RunState::Typing, "Typing...")
    }

    pub fn paused(run: RunId) -> Self {
        Self::new(run, RunState::Paused, "Paused.")
    }

    pub fn resumed(run: RunId) -> Self {
        Self::new(run, RunState::Typing, "Resumed.")
    }

    pub fn finished(run: RunId) -> Self {
        Self::new(run, RunState::Finished, "Finished.")
    }

    pub fn stopped(run: RunId) -> Self {
        Self::new(run, RunState::Stopped, "Stopped.")
    }

    pub fn cancelled(run: RunId) -> Self {
        Self::new(run, RunState::Cancelled, "Cancelled.")
    }

    pub fn errored(run: RunId, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let message = format!("Typing error: {reason}");
        Self::new(run, RunState::Errored(reason), message)
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Sink for status updates. Implementations must not block for long: they
/// are called from inside the run loop.
pub trait StatusReporter: Send + Sync {
    fn report(&self, update: &StatusUpdate);
}

impl<F> StatusReporter for F
where
    F: Fn(&StatusUpdate) + Send + Sync,
{
    fn report(&self, update: &StatusUpdate) {
        self(update)
    }
}

/// Writes every update to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn report(&self, update: &StatusUpdate) {
        match &update.state {
            RunState::Errored(_) => warn!(run = %update.run, "{}", update.message),
            _ => info!(run = %update.run, "{}", update.message),
        }
    }
}

/// Forwards every update into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StatusReporter for ChannelReporter {
    fn report(&self, update: &StatusUpdate) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.sender.send(update.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_messages() {
        let run = RunId(3);
        assert_eq!(
            StatusUpdate::delaying(run, Duration::from_secs(2)).message,
            "Starting in 2.0s..."
        );
        assert_eq!(StatusUpdate::typing(run).message, "Typing...");
        assert_eq!(StatusUpdate::finished(run).message, "Finished.");
        assert_eq!(StatusUpdate::stopped(run).message, "Stopped.");
        assert_eq!(StatusUpdate::cancelled(run).message, "Cancelled.");

        let err = StatusUpdate::errored(run, "no display");
        assert_eq!(err.message, "Typing error: no display");
        assert_eq!(err.state, RunState::Errored("no display".to_string()));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Finished.is_terminal());
        assert!(RunState::Stopped.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Errored(String::new()).is_terminal());
        assert!(!RunState::Paused.is_terminal());
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Idle.is_active());
        assert!(RunState::Delaying.is_active());
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |update: &StatusUpdate| seen.lock().unwrap().push(update.message.clone());
        reporter.report(&StatusUpdate::typing(RunId(1)));
        assert_eq!(seen.lock().unwrap().as_slice(), ["Typing..."]);
    }

    #[test]
    fn test_channel_reporter() {
        let (reporter, mut receiver) = ChannelReporter::new();
        reporter.report(&StatusUpdate::paused(RunId(1)));
        assert_eq!(receiver.try_recv().unwrap().state, RunState::Paused);

        drop(receiver);
        reporter.report(&StatusUpdate::finished(RunId(1)));
    }
}
