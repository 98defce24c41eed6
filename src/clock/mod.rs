//! Wall clock and tick scheduling for the timer engines.
//!
//! Engines never sleep themselves. While running they ask a [`TickScheduler`]
//! to deliver [`Tick`]s at a fixed cadence and charge the wall-clock delta
//! between consecutive ticks. A stopped scheduler bumps its generation so that
//! ticks still queued in the application channel are rejected.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Default tick cadence in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 200;

// ============================================================================
// Clock
// ============================================================================

/// Source of the current wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock whose time only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Moves the clock forward and returns the new time.
    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tick
// ============================================================================

/// Engine a tick is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickTarget {
    Countdown,
    Stopwatch,
}

/// A single sample of the wall clock delivered to an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub target: TickTarget,
    /// Generation of the scheduler that produced the tick
    pub generation: u64,
    pub now_ms: i64,
}

// ============================================================================
// TickScheduler
// ============================================================================

/// Periodic tick source owned by one engine.
pub trait TickScheduler: Send {
    /// Starts ticking. Calling this while already ticking does nothing.
    fn ensure_running(&mut self);

    /// Stops ticking. No tick produced before this call is accepted afterwards.
    fn stop(&mut self);

    /// Returns whether ticks are currently being produced.
    fn is_active(&self) -> bool;

    /// Current generation; changes on every start and stop.
    fn generation(&self) -> u64;

    /// Returns whether a delivered tick should be processed.
    fn accepts(&self, tick: &Tick) -> bool {
        self.is_active() && tick.generation == self.generation()
    }
}

/// Tick source backed by a tokio interval task.
pub struct IntervalTicker {
    target: TickTarget,
    period: Duration,
    clock: Arc<dyn Clock>,
    tx: mpsc::UnboundedSender<Tick>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

impl IntervalTicker {
    pub fn new(
        target: TickTarget,
        period_ms: u64,
        clock: Arc<dyn Clock>,
        tx: mpsc::UnboundedSender<Tick>,
    ) -> Self {
        Self {
            target,
            period: Duration::from_millis(period_ms.max(1)),
            clock,
            tx,
            task: None,
            generation: 0,
        }
    }
}

impl TickScheduler for IntervalTicker {
    fn ensure_running(&mut self) {
        if self.is_active() {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("tokioランタイム外ではティッカーを開始できません: {}", e);
                return;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let target = self.target;
        let period = self.period;
        let clock = Arc::clone(&self.clock);
        let tx = self.tx.clone();

        self.task = Some(handle.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let tick = Tick {
                    target,
                    generation,
                    now_ms: clock.now_ms(),
                };
                if tx.send(tick).is_err() {
                    break;
                }
            }
        }));
        tracing::debug!("{:?} ティッカー開始 (世代 {})", target, generation);
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.generation += 1;
            tracing::debug!("{:?} ティッカー停止", self.target);
        }
    }

    fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for IntervalTicker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// ManualTicker
// ============================================================================

/// Observable state of a [`ManualTicker`].
#[derive(Debug, Default)]
pub struct TickerProbe {
    active: AtomicBool,
    generation: AtomicU64,
    starts: AtomicU64,
    stops: AtomicU64,
}

impl TickerProbe {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Number of times ticking actually started.
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of times ticking actually stopped.
    pub fn stop_count(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Tick source that never produces ticks on its own.
///
/// Tests and the headless runner feed ticks to the engine directly; the probe
/// shows whether the engine currently wants them.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    probe: Arc<TickerProbe>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle for observing this ticker after it is moved into an engine.
    pub fn probe(&self) -> Arc<TickerProbe> {
        Arc::clone(&self.probe)
    }
}

impl TickScheduler for ManualTicker {
    fn ensure_running(&mut self) {
        if self.probe.active.swap(true, Ordering::SeqCst) {
            return;
        }
        self.probe.generation.fetch_add(1, Ordering::SeqCst);
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        if !self.probe.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.probe.generation.fetch_add(1, Ordering::SeqCst);
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.probe.is_active()
    }

    fn generation(&self) -> u64 {
        self.probe.generation()
    }
}

// ============================================================================
// Tests
// ============================================================================
