//! The control surface a presentation layer drives: start, pause/resume, stop.
//!
//! Each run gets its own [`RunSignal`]. Starting a new run cancels the signal
//! of the previous one, so the last start wins and the superseded run ends
//! through its own `Stopped`/`Cancelled` path. Late updates from a superseded
//! run still reach the reporter but no longer move [`Controller::state`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, TypeAssistError};
use crate::injector::SharedInjector;
use crate::reporter::{RunId, RunState, StatusReporter, StatusUpdate};
use crate::scheduler::{Run, RunRequest, DEFAULT_START_DELAY};
use crate::signal::RunSignal;

struct CurrentRun {
    id: RunId,
    signal: Arc<RunSignal>,
    task: Option<JoinHandle<RunState>>,
}

/// Forwards updates to the user's reporter and mirrors the current run's
/// latest update into a watch channel.
struct Tracker {
    inner: Arc<dyn StatusReporter>,
    current: AtomicU64,
    latest: watch::Sender<StatusUpdate>,
}

impl Tracker {
    /// Publish `update` if it belongs to the current run and does not move
    /// the watch backwards.
    fn publish(&self, update: &StatusUpdate) {
        self.latest.send_if_modified(|latest| {
            let current = RunId(self.current.load(Ordering::SeqCst));
            if update.run != current || update.run < latest.run {
                return false;
            }
            // A run's terminal state is final.
            if latest.run == update.run && latest.state.is_terminal() {
                return false;
            }
            *latest = update.clone();
            true
        });
    }

    /// Announce a pause toggle on `run`. The watch only moves between
    /// `Typing` and `Paused`; any other phase is left as it is.
    fn announce_pause(&self, run: RunId, paused: bool) {
        let mut announced = None;
        self.latest.send_if_modified(|latest| {
            let flips = latest.run == run
                && matches!(latest.state, RunState::Typing | RunState::Paused);
            let update = match (paused, flips) {
                (true, true) => StatusUpdate::paused(run),
                (false, true) => StatusUpdate::resumed(run),
                (true, false) => StatusUpdate::new(run, latest.state.clone(), "Paused."),
                (false, false) => StatusUpdate::new(run, latest.state.clone(), "Resumed."),
            };
            if flips {
                *latest = update.clone();
            }
            announced = Some(update);
            flips
        });
        if let Some(update) = announced {
            self.inner.report(&update);
        }
    }
}

impl StatusReporter for Tracker {
    fn report(&self, update: &StatusUpdate) {
        self.publish(update);
        self.inner.report(update);
    }
}

/// Starts, pauses and stops injection runs.
pub struct Controller {
    handle: Handle,
    injector: SharedInjector,
    tracker: Arc<Tracker>,
    start_delay: Duration,
    next_id: AtomicU64,
    current: Mutex<CurrentRun>,
}

impl Controller {
    /// Create a controller that schedules runs on the ambient tokio runtime.
    pub fn new(injector: SharedInjector, reporter: Arc<dyn StatusReporter>) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| TypeAssistError::runtime(e.to_string()))?;
        Ok(Self::with_handle(handle, injector, reporter))
    }

    pub fn with_handle(
        handle: Handle,
        injector: SharedInjector,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        let (latest, _) = watch::channel(StatusUpdate::ready());
        Self {
            handle,
            injector,
            tracker: Arc::new(Tracker {
                inner: reporter,
                current: AtomicU64::new(0),
                latest,
            }),
            start_delay: DEFAULT_START_DELAY,
            next_id: AtomicU64::new(1),
            current: Mutex::new(CurrentRun {
                id: RunId::default(),
                signal: Arc::new(RunSignal::new()),
                task: None,
            }),
        }
    }

    pub fn with_start_delay(mut self, start_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self
    }

    /// Schedule a new run typing `text` at `speed`. Returns without waiting.
    ///
    /// Fails only when `text` has no non-whitespace content.
    pub fn start(&self, text: &str, speed: i32) -> Result<RunId> {
        if text.trim().is_empty() {
            return Err(TypeAssistError::EmptyInput);
        }

        let id = RunId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let signal = Arc::new(RunSignal::new());
        let request = RunRequest::new(text, speed).with_start_delay(self.start_delay);

        let mut current = self.lock_current();
        if current.task.as_ref().is_some_and(|task| !task.is_finished()) {
            warn!("Run {} superseded by run {}", current.id, id);
        }
        current.signal.cancel();

        self.tracker.current.store(id.0, Ordering::SeqCst);
        self.tracker
            .latest
            .send_replace(StatusUpdate::new(id, RunState::Scheduled, "Scheduled."));

        let run = Run::new(
            id,
            request,
            signal.clone(),
            self.injector.clone(),
            self.tracker.clone(),
        );
        *current = CurrentRun {
            id,
            signal,
            task: Some(run.spawn(&self.handle)),
        };
        debug!("Run {} started", id);
        Ok(id)
    }

    /// Request cancellation of the current run. Takes effect at the run's next
    /// flag check; harmless if the run already ended.
    pub fn stop(&self) {
        let current = self.lock_current();
        debug!("Stop requested for run {}", current.id);
        current.signal.cancel();
    }

    /// Pause a typing run or resume a paused one. Returns the new pause state.
    ///
    /// The flag always flips, but [`Controller::state`] only changes while the
    /// current run is typing or paused.
    pub fn toggle_pause(&self) -> bool {
        let current = self.lock_current();
        let paused = current.signal.toggle_pause();
        self.tracker.announce_pause(current.id, paused);
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.lock_current().signal.is_paused()
    }

    pub fn is_running(&self) -> bool {
        self.lock_current()
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Id of the most recently started run, if any.
    pub fn current_run(&self) -> Option<RunId> {
        let id = self.lock_current().id;
        (id != RunId::default()).then_some(id)
    }

    /// State of the most recently started run.
    pub fn state(&self) -> RunState {
        self.tracker.latest.borrow().state.clone()
    }

    /// Latest update of the current run, refreshed on every report.
    pub fn subscribe(&self) -> watch::Receiver<StatusUpdate> {
        self.tracker.latest.subscribe()
    }

    /// Resolve once the current run reaches a terminal state. Returns
    /// immediately when nothing was ever started.
    pub async fn wait_until_idle(&self) -> RunState {
        let mut receiver = self.subscribe();
        let result = receiver
            .wait_for(|update| !update.state.is_active())
            .await
            .map(|update| update.state.clone());
        match result {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, CurrentRun> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.lock_current().signal.cancel();
    }
}
