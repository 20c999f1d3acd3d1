//! The timed, interruptible delivery of one text to the input focus.
//!
//! A [`Run`] waits out its start delay, then types the text one character at
//! a time at the cadence derived from its speed. Between characters it honours
//! the pause and cancel flags of its [`RunSignal`]. Every phase change goes to
//! the [`StatusReporter`]; the terminal state is also the task's output.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

use crate::error::TypeAssistError;
use crate::injector::SharedInjector;
use crate::reporter::{RunId, RunState, StatusReporter, StatusUpdate};
use crate::signal::RunSignal;
use crate::speed;

/// Grace period before the first character, so the user can focus the target.
pub const DEFAULT_START_DELAY: Duration = Duration::from_secs(2);
/// Granularity of cancellation checks during the start delay.
pub const DELAY_SLICE: Duration = Duration::from_millis(100);
/// Upper bound on how long a paused run waits before re-checking its flags.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

/// What to type and how fast. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub text: String,
    pub speed: i32,
    pub start_delay: Duration,
}

impl RunRequest {
    /// CRLF pairs in `text` are folded to `\n` so each line break is typed once.
    pub fn new(text: impl Into<String>, speed: i32) -> Self {
        let text = text.into();
        let text = if text.contains("\r\n") {
            text.replace("\r\n", "\n")
        } else {
            text
        };
        Self {
            text,
            speed,
            start_delay: DEFAULT_START_DELAY,
        }
    }

    pub fn with_start_delay(mut self, start_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self
    }

    /// Per-character delay, fixed for the lifetime of the run.
    pub fn interval(&self) -> Duration {
        speed::interval(self.speed)
    }
}

/// A single scheduled injection pass.
pub struct Run {
    id: RunId,
    request: RunRequest,
    interval: Duration,
    signal: Arc<RunSignal>,
    injector: SharedInjector,
    reporter: Arc<dyn StatusReporter>,
}

impl Run {
    pub fn new(
        id: RunId,
        request: RunRequest,
        signal: Arc<RunSignal>,
        injector: SharedInjector,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        let interval = request.interval();
        Self {
            id,
            request,
            interval,
            signal,
            injector,
            reporter,
        }
    }

    /// Launch the run detached on `handle`.
    pub fn spawn(self, handle: &Handle) -> JoinHandle<RunState> {
        handle.spawn(self.execute())
    }

    /// Drive the run to a terminal state.
    pub async fn execute(self) -> RunState {
        info!(
            run = %self.id,
            chars = self.request.text.chars().count(),
            speed = self.request.speed,
            interval_ms = self.interval.as_secs_f64() * 1000.0,
            "Run scheduled"
        );

        if let Some(update) = self.wait_start_delay().await {
            return self.finish(update);
        }

        self.report(StatusUpdate::typing(self.id));
        let outcome = self.type_text().await;
        self.finish(outcome)
    }

    /// Returns the terminal update if the run was cancelled while waiting.
    async fn wait_start_delay(&self) -> Option<StatusUpdate> {
        let delay = self.request.start_delay;
        self.report(StatusUpdate::delaying(self.id, delay));

        let deadline = Instant::now() + delay;
        loop {
            if self.signal.is_cancelled() {
                debug!(run = %self.id, "Cancelled during start delay");
                return Some(StatusUpdate::cancelled(self.id));
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            self.signal
                .changed((deadline - now).min(DELAY_SLICE))
                .await;
        }
    }

    async fn type_text(&self) -> StatusUpdate {
        for (index, ch) in self.request.text.chars().enumerate() {
            if self.signal.is_cancelled() {
                debug!(run = %self.id, emitted = index, "Stopped while typing");
                return StatusUpdate::stopped(self.id);
            }

            if self.signal.is_paused() {
                self.wait_while_paused().await;
                if self.signal.is_cancelled() {
                    debug!(run = %self.id, emitted = index, "Stopped while paused");
                    return StatusUpdate::stopped(self.id);
                }
            }

            if let Err(e) = self.inject(ch) {
                warn!(run = %self.id, "Injection failed at character {}: {}", index, e);
                return StatusUpdate::errored(self.id, e.to_string());
            }
            trace!(run = %self.id, index, ?ch, "Injected");

            sleep(self.interval).await;
        }
        StatusUpdate::finished(self.id)
    }

    async fn wait_while_paused(&self) {
        self.report(StatusUpdate::paused(self.id));
        debug!(run = %self.id, "Paused");
        while self.signal.is_paused() && !self.signal.is_cancelled() {
            self.signal.changed(PAUSE_POLL).await;
        }
        debug!(run = %self.id, "Leaving pause");
    }

    fn inject(&self, ch: char) -> crate::Result<()> {
        let mut injector = self
            .injector
            .lock()
            .map_err(|_| TypeAssistError::injection(ch, "injector lock poisoned"))?;
        injector.inject(ch)
    }

    fn report(&self, update: StatusUpdate) {
        self.reporter.report(&update);
    }

    fn finish(&self, update: StatusUpdate) -> RunState {
        info!(run = %self.id, "Run ended: {}", update.message);
        let state = update.state.clone();
        self.report(update);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::Injector;
    use crate::reporter::ChannelReporter;
    use std::sync::Mutex;

    type Hook = Box<dyn FnMut(usize) + Send>;

    /// Records every character and lets a test react after each injection.
    struct Recorder {
        typed: Arc<Mutex<Vec<char>>>,
        fail_at: Option<usize>,
        hook: Option<Hook>,
    }

    impl Injector for Recorder {
        fn inject(&mut self, ch: char) -> crate::Result<()> {
            let count = self.typed.lock().unwrap().len();
            if self.fail_at == Some(count) {
                return Err(TypeAssistError::injection(ch, "synthetic failure"));
            }
            self.typed.lock().unwrap().push(ch);
            if let Some(hook) = self.hook.as_mut() {
                hook(count + 1);
            }
            Ok(())
        }
    }

    fn recorder(fail_at: Option<usize>, hook: Option<Hook>) -> (SharedInjector, Arc<Mutex<Vec<char>>>) {
        let typed = Arc::new(Mutex::new(Vec::new()));
        let injector: SharedInjector = Arc::new(Mutex::new(Recorder {
            typed: typed.clone(),
            fail_at,
            hook,
        }));
        (injector, typed)
    }

    fn run_with(
        text: &str,
        delay: Duration,
        signal: Arc<RunSignal>,
        injector: SharedInjector,
    ) -> (Run, tokio::sync::mpsc::UnboundedReceiver<StatusUpdate>) {
        let (reporter, receiver) = ChannelReporter::new();
        let request = RunRequest::new(text, 100).with_start_delay(delay);
        let run = Run::new(RunId(1), request, signal, injector, Arc::new(reporter));
        (run, receiver)
    }

    #[test]
    fn test_request_folds_crlf_only() {
        let request = RunRequest::new("one\r\ntwo\rthree\n", 50);
        assert_eq!(request.text, "one\ntwo\rthree\n");
        assert_eq!(RunRequest::new("plain", 50).text, "plain");
    }

    fn drain(receiver: &mut tokio::sync::mpsc::UnboundedReceiver<StatusUpdate>) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(update) = receiver.try_recv() {
            messages.push(update.message);
        }
        messages
    }

    #[tokio::test(start_paused = true)]
    async fn test_types_everything_in_order() {
        let (injector, typed) = recorder(None, None);
        let (run, mut receiver) =
            run_with("hello", Duration::from_millis(300), Arc::new(RunSignal::new()), injector);

        assert_eq!(run.execute().await, RunState::Finished);
        assert_eq!(typed.lock().unwrap().iter().collect::<String>(), "hello");
        assert_eq!(
            drain(&mut receiver),
            ["Starting in 0.3s...", "Typing...", "Finished."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_reports_cancelled() {
        let signal = Arc::new(RunSignal::new());
        signal.cancel();
        let (injector, typed) = recorder(None, None);
        let (run, mut receiver) = run_with("abc", DEFAULT_START_DELAY, signal, injector);

        assert_eq!(run.execute().await, RunState::Cancelled);
        assert!(typed.lock().unwrap().is_empty());
        assert_eq!(drain(&mut receiver).last().unwrap(), "Cancelled.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_observed_within_one_slice() {
        let signal = Arc::new(RunSignal::new());
        let (injector, typed) = recorder(None, None);
        let (run, _receiver) = run_with("abc", Duration::from_secs(10), signal.clone(), injector);

        let started = Instant::now();
        let task = tokio::spawn(run.execute());
        sleep(Duration::from_millis(1_250)).await;
        signal.cancel();

        assert_eq!(task.await.unwrap(), RunState::Cancelled);
        assert!(started.elapsed() <= Duration::from_millis(1_250) + DELAY_SLICE);
        assert!(typed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_k_characters() {
        let signal = Arc::new(RunSignal::new());
        let hook_signal = signal.clone();
        let hook: Hook = Box::new(move |count| {
            if count == 3 {
                hook_signal.cancel();
            }
        });
        let (injector, typed) = recorder(None, Some(hook));
        let (run, mut receiver) = run_with("abcdefg", Duration::ZERO, signal, injector);

        assert_eq!(run.execute().await, RunState::Stopped);
        assert_eq!(typed.lock().unwrap().as_slice(), ['a', 'b', 'c']);
        assert_eq!(drain(&mut receiver).last().unwrap(), "Stopped.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_injection_failure_aborts_run() {
        let (injector, typed) = recorder(Some(2), None);
        let (run, mut receiver) =
            run_with("abcde", Duration::ZERO, Arc::new(RunSignal::new()), injector);

        let state = run.execute().await;
        match state {
            RunState::Errored(reason) => assert!(reason.contains("synthetic failure")),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(typed.lock().unwrap().as_slice(), ['a', 'b']);
        let last = drain(&mut receiver).pop().unwrap();
        assert!(last.starts_with("Typing error: "));
        assert!(last.contains("synthetic failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_holds_and_resume_continues() {
        let signal = Arc::new(RunSignal::new());
        let hook_signal = signal.clone();
        let hook: Hook = Box::new(move |count| {
            if count == 2 {
                hook_signal.set_paused(true);
            }
        });
        let (injector, typed) = recorder(None, Some(hook));
        let (run, mut receiver) = run_with("abcdef", Duration::ZERO, signal.clone(), injector);

        let task = tokio::spawn(run.execute());
        sleep(Duration::from_secs(5)).await;
        assert_eq!(typed.lock().unwrap().as_slice(), ['a', 'b']);

        signal.set_paused(false);
        assert_eq!(task.await.unwrap(), RunState::Finished);
        assert_eq!(typed.lock().unwrap().iter().collect::<String>(), "abcdef");

        let messages = drain(&mut receiver);
        assert_eq!(messages.iter().filter(|m| *m == "Paused.").count(), 1);
        assert_eq!(messages.last().unwrap(), "Finished.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_paused_emits_nothing_more() {
        let signal = Arc::new(RunSignal::new());
        let hook_signal = signal.clone();
        let hook: Hook = Box::new(move |count| {
            if count == 1 {
                hook_signal.set_paused(true);
            }
        });
        let (injector, typed) = recorder(None, Some(hook));
        let (run, _receiver) = run_with("xyz", Duration::ZERO, signal.clone(), injector);

        let task = tokio::spawn(run.execute());
        sleep(Duration::from_secs(1)).await;
        signal.cancel();

        assert_eq!(task.await.unwrap(), RunState::Stopped);
        assert_eq!(typed.lock().unwrap().as_slice(), ['x']);
    }

    #[test]
    fn test_request_interval_is_derived_from_speed() {
        let request = RunRequest::new("x", 100);
        assert_eq!(request.start_delay, DEFAULT_START_DELAY);
        assert!((request.interval().as_secs_f64() - 0.01).abs() < 1e-6);
    }
}
