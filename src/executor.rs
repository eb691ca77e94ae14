use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::action::{check_wait, Script};
use crate::error::{AutomatorError, Result};
use crate::injector::{dispatch, InputInjector};
use crate::status::{StatusLine, StatusSink};

/// Longest uninterrupted sleep; a stop request lands within one increment.
pub const POLL_INCREMENT: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackOptions {
    pub loop_count: u32,
    pub loop_interval_secs: f64,
}

impl Default for PlaybackOptions {
    fn default() -> Self { Self { loop_count: 1, loop_interval_secs: 2.0 } }
}

impl PlaybackOptions {
    pub fn validate(&self) -> Result<()> {
        if self.loop_count == 0 {
            return Err(AutomatorError::invalid("loop count must be at least 1"));
        }
        check_wait("loop interval", self.loop_interval_secs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub loops_completed: u32,
    pub actions_dispatched: usize,
}

// -------------- Playback Engine --------------
struct Shared {
    state: Mutex<PlaybackState>,
    stop: AtomicBool,
    current: AtomicUsize,
}

impl Shared {
    fn stop_requested(&self) -> bool { self.stop.load(Ordering::SeqCst) }
}

/// Plays scripts on a background thread, one run at a time.
pub struct PlaybackExecutor {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<Result<RunReport>>>>,
}

impl Default for PlaybackExecutor {
    fn default() -> Self { Self::new() }
}

impl PlaybackExecutor {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PlaybackState::Idle),
                stop: AtomicBool::new(false),
                current: AtomicUsize::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PlaybackState { *self.shared.state.lock() }

    pub fn is_running(&self) -> bool { self.state() == PlaybackState::Running }

    /// Index of the action most recently started. Only meaningful for display.
    pub fn current_index(&self) -> usize { self.shared.current.load(Ordering::Relaxed) }

    /// Starts playing a copy of `script`. Rejected, never queued, while another run is active.
    pub fn start<I>(&self, script: &Script, options: PlaybackOptions, injector: I, sink: Arc<dyn StatusSink>) -> Result<()>
    where
        I: InputInjector + 'static,
    {
        let mut state = self.shared.state.lock();
        if *state == PlaybackState::Running {
            return Err(AutomatorError::AlreadyRunning);
        }
        if script.is_empty() {
            return Err(AutomatorError::NoStepsAvailable);
        }
        options.validate()?;
        for (i, action) in script.iter().enumerate() {
            check_wait(&format!("wait of step {}", i + 1), action.wait_seconds)?;
        }

        // A finished run nobody collected
        if let Some(previous) = self.worker.lock().take() {
            let _ = previous.join();
        }

        *state = PlaybackState::Running;
        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.current.store(0, Ordering::Relaxed);
        drop(state);

        tracing::info!(steps = script.len(), loops = options.loop_count, "starting playback");
        let worker = Worker { shared: Arc::clone(&self.shared), script: script.clone(), options, sink };
        let handle = thread::spawn(move || worker.run(injector));
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Asks the active run to stop at its next check. Returns whether a run was signalled.
    pub fn stop(&self) -> bool {
        let state = self.shared.state.lock();
        if *state != PlaybackState::Running {
            return false;
        }
        self.shared.stop.store(true, Ordering::SeqCst);
        drop(state);
        tracing::info!("stop requested");
        true
    }

    /// Blocks until the current worker ends. `None` when there is nothing to collect.
    pub fn join(&self) -> Option<Result<RunReport>> {
        let handle = self.worker.lock().take()?;
        Some(collect(handle))
    }

    /// Like [`join`](Self::join) but never blocks on a run that is still going.
    pub fn try_join(&self) -> Option<Result<RunReport>> {
        if self.is_running() {
            return None;
        }
        self.join()
    }
}

impl Drop for PlaybackExecutor {
    fn drop(&mut self) { self.stop(); }
}

fn collect(handle: JoinHandle<Result<RunReport>>) -> Result<RunReport> {
    handle.join().unwrap_or_else(|_| Err(AutomatorError::InjectionFailure("playback worker panicked".into())))
}

// -------------- Worker --------------
struct Worker {
    shared: Arc<Shared>,
    script: Script,
    options: PlaybackOptions,
    sink: Arc<dyn StatusSink>,
}

/// Puts the executor back to idle however the worker exits.
struct IdleOnExit<'a>(&'a Shared);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) { *self.0.state.lock() = PlaybackState::Idle; }
}

impl Worker {
    fn run<I: InputInjector>(self, mut injector: I) -> Result<RunReport> {
        let _idle = IdleOnExit(&self.shared);
        let result = self.play(&mut injector);
        match &result {
            Ok(report) if report.outcome == RunOutcome::Completed => {
                tracing::info!(actions = report.actions_dispatched, "playback finished");
                self.sink.report("playback finished");
            }
            Ok(report) => {
                tracing::info!(actions = report.actions_dispatched, "playback stopped");
                self.sink.report("playback stopped");
            }
            Err(e) => {
                tracing::error!(error = %e, "playback failed");
                self.sink.report(format!("playback failed: {e}"));
            }
        }
        result
    }

    fn play(&self, injector: &mut dyn InputInjector) -> Result<RunReport> {
        let loops = self.options.loop_count;
        let total = self.script.len();
        let mut report = RunReport { outcome: RunOutcome::Completed, loops_completed: 0, actions_dispatched: 0 };

        for lp in 0..loops {
            if self.shared.stop_requested() {
                break;
            }
            self.sink.report(format!("starting loop {}/{}", lp + 1, loops));

            for (i, action) in self.script.iter().enumerate() {
                if self.shared.stop_requested() {
                    break;
                }
                self.shared.current.store(i, Ordering::Relaxed);
                self.sink.report(format!("step {}/{}: {}", i + 1, total, action.description));

                tracing::debug!(step = i + 1, kind = %action.kind, x = action.x, y = action.y, "dispatch");
                if let Some(done) = dispatch(injector, action)? {
                    self.sink.report(done);
                }
                report.actions_dispatched += 1;
                self.pause(action.wait_seconds);
            }

            if self.shared.stop_requested() {
                break;
            }
            report.loops_completed += 1;

            if lp + 1 < loops {
                self.sink.report(format!("waiting {}s before next loop", self.options.loop_interval_secs));
                self.pause(self.options.loop_interval_secs);
            }
        }

        if self.shared.stop_requested() {
            report.outcome = RunOutcome::Stopped;
        }
        Ok(report)
    }

    /// Sleeps up to `secs` in increments, giving up early on stop. Returns false if stopped.
    fn pause(&self, secs: f64) -> bool {
        let total = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        let started = Instant::now();
        loop {
            if self.shared.stop_requested() {
                return false;
            }
            let elapsed = started.elapsed();
            if elapsed >= total {
                return true;
            }
            thread::sleep((total - elapsed).min(POLL_INCREMENT));
        }
    }
}

// -------------- Single step --------------
/// Dispatches one action once, outside the run state machine.
pub fn test_action<S: StatusSink>(script: &Script, index: usize, injector: &mut dyn InputInjector, sink: &S) -> Result<()> {
    let action = match script.get(index) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!(index, len = script.len(), "no step to test");
            sink.post(StatusLine::now(format!("cannot test: {e}")));
            return Err(e);
        }
    };
    sink.post(StatusLine::now(format!("testing step {}: {}", index + 1, action.description)));
    match dispatch(injector, action)? {
        Some(done) => sink.post(StatusLine::now(format!("tested: {done}"))),
        None => sink.post(StatusLine::now("tested: wait step, nothing to inject")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionKind};
    use crate::injector::tests::{Call, Recorder};
    use crate::status::StatusLog;

    fn clicks(waits: &[f64]) -> Script {
        Script::from(
            waits
                .iter()
                .enumerate()
                .map(|(i, w)| Action::click(i as i32, 10 * i as i32, *w, format!("click {}", i + 1)).unwrap())
                .collect::<Vec<_>>(),
        )
    }

    fn opts(loop_count: u32, loop_interval_secs: f64) -> PlaybackOptions { PlaybackOptions { loop_count, loop_interval_secs } }

    fn wait_idle(exec: &PlaybackExecutor, limit: Duration) -> Duration {
        let started = Instant::now();
        while exec.is_running() {
            assert!(started.elapsed() < limit, "run did not go idle within {limit:?}");
            thread::sleep(Duration::from_millis(5));
        }
        started.elapsed()
    }

    #[test]
    fn test_plays_every_loop_in_order() {
        let exec = PlaybackExecutor::new();
        let rec = Recorder::default();
        let log = StatusLog::default();
        let mut script = clicks(&[0.0, 0.0]);
        script.push(Action::new(ActionKind::Move, 99, 98, 0.0, "hover").unwrap());
        script.push(Action::new(ActionKind::Wait, 0, 0, 0.0, "breathe").unwrap());

        exec.start(&script, opts(3, 0.0), rec.clone(), Arc::new(log.clone())).unwrap();
        let report = exec.join().unwrap().unwrap();

        assert_eq!(report, RunReport { outcome: RunOutcome::Completed, loops_completed: 3, actions_dispatched: 12 });
        let one_pass = [Call::Click(0, 0), Call::Click(1, 10), Call::Move(99, 98)];
        assert_eq!(rec.calls(), one_pass.repeat(3));
        assert_eq!(exec.state(), PlaybackState::Idle);
        assert_eq!(exec.current_index(), 3);

        let messages = log.messages();
        assert_eq!(messages.first().unwrap(), "starting loop 1/3");
        assert!(messages.contains(&"step 4/4: breathe".to_string()));
        assert!(messages.contains(&"starting loop 3/3".to_string()));
        assert_eq!(messages.iter().filter(|m| m.starts_with("waiting ")).count(), 2);
        assert_eq!(messages.last().unwrap(), "playback finished");
    }

    #[test]
    fn test_stop_during_long_wait() {
        let exec = PlaybackExecutor::new();
        let rec = Recorder::default();
        let log = StatusLog::default();
        exec.start(&clicks(&[10.0]), opts(3, 0.0), rec.clone(), Arc::new(log.clone())).unwrap();

        thread::sleep(POLL_INCREMENT / 2);
        assert!(exec.stop());
        let took = wait_idle(&exec, Duration::from_secs(2));
        assert!(took <= POLL_INCREMENT * 3, "stop took {took:?}");

        let report = exec.join().unwrap().unwrap();
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.loops_completed, 0);
        assert_eq!(rec.calls(), [Call::Click(0, 0)]);
        assert_eq!(log.latest().unwrap().message, "playback stopped");
        assert!(!exec.stop());
    }

    #[test]
    fn test_stop_during_loop_interval() {
        let exec = PlaybackExecutor::new();
        let rec = Recorder::default();
        exec.start(&clicks(&[0.0]), opts(5, 30.0), rec.clone(), Arc::new(StatusLog::default())).unwrap();

        thread::sleep(Duration::from_millis(150));
        exec.stop();
        wait_idle(&exec, Duration::from_secs(1));

        let report = exec.join().unwrap().unwrap();
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.loops_completed, 1);
        assert_eq!(rec.calls().len(), 1);
    }

    #[test]
    fn test_second_start_rejected() {
        let exec = PlaybackExecutor::new();
        let first = Recorder::default();
        let second = Recorder::default();
        exec.start(&clicks(&[5.0]), opts(1, 0.0), first.clone(), Arc::new(StatusLog::default())).unwrap();

        let again = exec.start(&clicks(&[0.0]), opts(1, 0.0), second.clone(), Arc::new(StatusLog::default()));
        assert!(matches!(again, Err(AutomatorError::AlreadyRunning)));
        assert!(exec.is_running());

        exec.stop();
        let report = exec.join().unwrap().unwrap();
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(first.calls(), [Call::Click(0, 0)]);
        assert!(second.calls().is_empty());
    }

    #[test]
    fn test_rejected_without_state_change() {
        let exec = PlaybackExecutor::new();
        let sink: Arc<dyn StatusSink> = Arc::new(StatusLog::default());

        let empty = exec.start(&Script::new(), opts(1, 0.0), Recorder::default(), Arc::clone(&sink));
        assert!(matches!(empty, Err(AutomatorError::NoStepsAvailable)));

        let zero_loops = exec.start(&clicks(&[0.0]), opts(0, 0.0), Recorder::default(), Arc::clone(&sink));
        assert!(matches!(zero_loops, Err(AutomatorError::InvalidInput(_))));

        let negative = exec.start(&clicks(&[0.0]), opts(1, -1.0), Recorder::default(), Arc::clone(&sink));
        assert!(matches!(negative, Err(AutomatorError::InvalidInput(_))));

        let mut bad_wait = clicks(&[0.0]);
        bad_wait.push(Action { kind: ActionKind::Click, x: 0, y: 0, wait_seconds: -3.0, description: String::new() });
        let bad = exec.start(&bad_wait, opts(1, 0.0), Recorder::default(), sink);
        assert!(matches!(bad, Err(AutomatorError::InvalidInput(_))));

        assert_eq!(exec.state(), PlaybackState::Idle);
        assert!(exec.join().is_none());
    }

    #[test]
    fn test_injection_failure_aborts_run() {
        let exec = PlaybackExecutor::new();
        let rec = Recorder::failing_on(1);
        let log = StatusLog::default();
        exec.start(&clicks(&[0.0, 0.0, 0.0]), opts(2, 0.0), rec.clone(), Arc::new(log.clone())).unwrap();

        let result = exec.join().unwrap();
        assert!(matches!(result, Err(AutomatorError::InjectionFailure(_))));
        assert_eq!(exec.state(), PlaybackState::Idle);
        assert_eq!(rec.calls(), [Call::Click(0, 0)]);
        assert!(log.latest().unwrap().message.starts_with("playback failed: input injection failed"));
    }

    #[test]
    fn test_wait_is_honoured() {
        let exec = PlaybackExecutor::new();
        let started = Instant::now();
        exec.start(&clicks(&[0.25]), opts(1, 0.0), Recorder::default(), Arc::new(StatusLog::default())).unwrap();
        let report = exec.join().unwrap().unwrap();
        let took = started.elapsed();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(took >= Duration::from_millis(250), "finished early after {took:?}");
        assert!(took < Duration::from_secs(2));
    }

    #[test]
    fn test_executor_is_reusable() {
        let exec = PlaybackExecutor::new();
        let rec = Recorder::default();
        let sink: Arc<dyn StatusSink> = Arc::new(StatusLog::default());
        exec.start(&clicks(&[0.0]), opts(1, 0.0), rec.clone(), Arc::clone(&sink)).unwrap();
        wait_idle(&exec, Duration::from_secs(1));
        assert!(exec.try_join().unwrap().is_ok());
        assert!(exec.try_join().is_none());

        exec.start(&clicks(&[0.0]), opts(1, 0.0), rec.clone(), sink).unwrap();
        exec.join().unwrap().unwrap();
        assert_eq!(rec.calls().len(), 2);
    }

    #[test]
    fn test_stop_between_runs_is_ignored() {
        let exec = PlaybackExecutor::new();
        let rec = Recorder::default();
        let sink: Arc<dyn StatusSink> = Arc::new(StatusLog::default());
        exec.start(&clicks(&[0.0]), opts(1, 0.0), rec.clone(), Arc::clone(&sink)).unwrap();
        wait_idle(&exec, Duration::from_secs(1));

        assert!(!exec.stop());
        assert!(!exec.shared.stop.load(Ordering::SeqCst));

        exec.start(&clicks(&[0.0, 0.0]), opts(1, 0.0), rec.clone(), sink).unwrap();
        let report = exec.join().unwrap().unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(rec.calls().len(), 3);
    }

    #[test]
    fn test_single_step() {
        let script = clicks(&[3.0, 3.0]);
        let mut rec = Recorder::default();
        let log = StatusLog::default();

        test_action(&script, 1, &mut rec, &log).unwrap();
        assert_eq!(rec.calls(), [Call::Click(1, 10)]);
        assert_eq!(log.latest().unwrap().message, "tested: clicked at (1, 10)");

        let out = test_action(&script, 2, &mut rec, &log);
        assert!(matches!(out, Err(AutomatorError::IndexOutOfRange { index: 2, len: 2 })));
        assert_eq!(rec.calls().len(), 1);
        assert!(log.latest().unwrap().message.starts_with("cannot test"));
    }
}
