//! Session poll loop.
//!
//! One background worker fetches the session's pending commands every
//! interval and hands each batch to a [`CommandSink`]. Ticks never overlap:
//! a tick that finds another one still in flight is skipped.
//!
//! Delivery is at-most-once. A command that fails is reported (and, with
//! reporting on, posted back) but never re-fetched by this loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gridrelay_config::SessionStore;
use gridrelay_engine::{Interpreter, SpreadsheetHost};
use gridrelay_protocol::{CommandResult, ResultsReport};
use serde_json::Value;

use crate::client::RelayClient;

/// Whatever applies a fetched batch.
pub trait CommandSink {
    /// Apply in order; one result per command.
    fn apply_commands(&mut self, commands: &[Value]) -> Vec<CommandResult>;
}

impl<H: SpreadsheetHost> CommandSink for Interpreter<H> {
    fn apply_commands(&mut self, commands: &[Value]) -> Vec<CommandResult> {
        Interpreter::apply_commands(self, commands)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval: Duration::from_millis(gridrelay_config::settings::DEFAULT_POLL_INTERVAL_MS) }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A non-empty batch was applied.
    Applied { count: usize, failed: usize },
    /// Backend answered with no commands.
    Empty,
    /// No candidate answered; logged and dropped.
    Unavailable,
    /// A previous tick was still in flight.
    Skipped,
}

/// Running totals since the loop was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub commands: u64,
    pub failed: u64,
    pub unavailable: u64,
    pub skipped: u64,
}

pub struct PollLoop<S> {
    shared: Arc<Shared<S>>,
    stop_signal: Arc<StopSignal>,
    worker: Option<JoinHandle<()>>,
    config: Option<PollConfig>,
}

struct Shared<S> {
    client: RelayClient,
    sessions: SessionStore,
    session_id: Mutex<Option<String>>,
    sink: Arc<Mutex<S>>,
    in_flight: AtomicBool,
    report_results: AtomicBool,
    stats: Mutex<PollStats>,
}

/// Stop flag the worker can sleep on.
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn new() -> Self {
        Self { stopped: Mutex::new(false), wake: Condvar::new() }
    }

    fn reset(&self) {
        *lock(&self.stopped) = false;
    }

    fn raise(&self) {
        *lock(&self.stopped) = true;
        self.wake.notify_all();
    }

    /// Sleep up to `timeout`; true if stop was raised.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = lock(&self.stopped);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Clears the in-flight flag when the tick ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: CommandSink + Send + 'static> PollLoop<S> {
    pub fn new(client: RelayClient, sessions: SessionStore, sink: Arc<Mutex<S>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                sessions,
                session_id: Mutex::new(None),
                sink,
                in_flight: AtomicBool::new(false),
                report_results: AtomicBool::new(false),
                stats: Mutex::new(PollStats::default()),
            }),
            stop_signal: Arc::new(StopSignal::new()),
            worker: None,
            config: None,
        }
    }

    /// Post each batch's results back to the backend that served it.
    pub fn set_report_results(&self, enabled: bool) {
        self.shared.report_results.store(enabled, Ordering::Relaxed);
    }

    /// Start polling. The first tick runs right away on the worker, then
    /// one per interval. Does nothing if already running.
    pub fn start(&mut self, config: PollConfig) {
        if self.is_running() {
            return;
        }

        self.config = Some(config);
        self.stop_signal.reset();

        let shared = Arc::clone(&self.shared);
        let stop_signal = Arc::clone(&self.stop_signal);
        let interval = config.interval;

        self.worker = Some(thread::spawn(move || loop {
            shared.tick();
            if stop_signal.wait(interval) {
                break;
            }
        }));

        log::info!("Poll loop started (every {} ms)", interval.as_millis());
    }

    /// Stop polling and wait for the worker to exit. A request already in
    /// flight finishes first. Does nothing if not running.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.stop_signal.raise();
        if handle.join().is_err() {
            log::warn!("Poll worker panicked");
        }
        log::info!("Poll loop stopped");
    }

    /// False once stopped, or if the worker has died.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Config of the current (or last) run.
    pub fn config(&self) -> Option<PollConfig> {
        self.config
    }

    /// Run one tick on the calling thread.
    pub fn poll_once(&self) -> TickOutcome {
        self.shared.tick()
    }

    /// Session id, created and persisted on first use.
    pub fn session_id(&self) -> String {
        self.shared.session_id()
    }

    pub fn sink(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.shared.sink)
    }

    pub fn stats(&self) -> PollStats {
        *lock(&self.shared.stats)
    }
}

impl<S> Drop for PollLoop<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.stop_signal.raise();
            let _ = handle.join();
        }
    }
}

impl<S: CommandSink> Shared<S> {
    fn session_id(&self) -> String {
        let mut cached = lock(&self.session_id);
        cached
            .get_or_insert_with(|| self.sessions.get_or_create())
            .clone()
    }

    fn tick(&self) -> TickOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            lock(&self.stats).skipped += 1;
            log::debug!("Previous poll still in flight, skipping tick");
            return TickOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);

        let session_id = self.session_id();
        let outcome = match self.client.poll_commands(&session_id) {
            Err(e) => {
                log::warn!("Command poll failed: {}", e);
                TickOutcome::Unavailable
            }
            Ok((_, commands)) if commands.is_empty() => TickOutcome::Empty,
            Ok((base, commands)) => {
                let results = lock(&self.sink).apply_commands(&commands);
                let failed = results.iter().filter(|r| !r.ok).count();
                log::info!("Applied {} command(s), {} failed", results.len(), failed);

                if self.report_results.load(Ordering::Relaxed) {
                    let report = ResultsReport { session_id, results };
                    if let Err(e) = self.client.report_results(&base, &report) {
                        log::warn!("Could not report results to {}: {}", base, e);
                    }
                }
                TickOutcome::Applied { count: commands.len(), failed }
            }
        };

        let mut stats = lock(&self.stats);
        stats.ticks += 1;
        match outcome {
            TickOutcome::Applied { count, failed } => {
                stats.commands += count as u64;
                stats.failed += failed as u64;
            }
            TickOutcome::Unavailable => stats.unavailable += 1,
            TickOutcome::Empty | TickOutcome::Skipped => {}
        }
        outcome
    }
}
