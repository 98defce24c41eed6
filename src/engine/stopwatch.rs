//! Stopwatch (count-up) engine.
//!
//! The stopwatch accumulates work time from zero. A work session ends with
//! [`StopwatchTimer::stop`], which publishes the pre-reset duration. An
//! optional break sub-phase counts up towards a target and may overshoot.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::EventHub;
use crate::clock::{Clock, Tick, TickScheduler};
use crate::types::StopwatchPhase;

// ============================================================================
// StopwatchEvent
// ============================================================================

/// Events published by the stopwatch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopwatchEvent {
    /// Work elapsed crossed the reminder threshold.
    ReminderReached { elapsed_ms: i64 },
    /// A work session was stopped with time on the clock.
    WorkSessionEnded { duration_ms: i64, ended_at_ms: i64 },
    /// Break elapsed crossed the break target. The break keeps counting.
    BreakTargetReached { elapsed_ms: i64, target_ms: i64 },
    /// The user ended the break.
    BreakEnded { elapsed_ms: i64, ended_at_ms: i64 },
}

/// Read-only copy of the engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopwatchSnapshot {
    pub phase: StopwatchPhase,
    pub elapsed_ms: i64,
    pub is_running: bool,
    pub break_target_ms: i64,
    pub reminder_ms: Option<i64>,
}

impl StopwatchSnapshot {
    pub fn is_break(&self) -> bool {
        self.phase == StopwatchPhase::Break
    }
}

// ============================================================================
// StopwatchTimer
// ============================================================================

/// Stopwatch engine.
pub struct StopwatchTimer {
    phase: StopwatchPhase,
    elapsed_ms: i64,
    is_running: bool,
    reminder_ms: Option<i64>,
    reminder_triggered: bool,
    break_target_ms: i64,
    break_end_triggered: bool,
    last_tick_ms: i64,
    scheduler: Box<dyn TickScheduler>,
    clock: Arc<dyn Clock>,
    events: EventHub<StopwatchEvent>,
}

impl StopwatchTimer {
    pub fn new(scheduler: Box<dyn TickScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            phase: StopwatchPhase::Work,
            elapsed_ms: 0,
            is_running: false,
            reminder_ms: None,
            reminder_triggered: false,
            break_target_ms: 0,
            break_end_triggered: false,
            last_tick_ms: clock.now_ms(),
            scheduler,
            clock,
            events: EventHub::new(),
        }
    }

    /// Subscribes to engine events.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StopwatchEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Starts or resumes counting; elapsed time is kept.
    pub fn start(&mut self) {
        if !self.is_running {
            self.last_tick_ms = self.clock.now_ms();
            self.is_running = true;
        }
        self.scheduler.ensure_running();
        tracing::debug!(
            "ストップウォッチ開始: phase={}, 経過={}ms",
            self.phase.as_str(),
            self.elapsed_ms
        );
    }

    pub fn pause(&mut self) {
        self.is_running = false;
        self.scheduler.stop();
        tracing::debug!("ストップウォッチ一時停止: 経過={}ms", self.elapsed_ms);
    }

    /// Stops and clears the stopwatch.
    ///
    /// Stopping a work session with time on the clock publishes
    /// [`StopwatchEvent::WorkSessionEnded`] with the duration before the reset.
    pub fn stop(&mut self) {
        let was_work = self.phase == StopwatchPhase::Work;
        let duration_ms = self.elapsed_ms;

        self.is_running = false;
        self.scheduler.stop();
        self.enter_work();

        if was_work && duration_ms > 0 {
            self.events.emit(StopwatchEvent::WorkSessionEnded {
                duration_ms,
                ended_at_ms: self.clock.now_ms(),
            });
        }
        tracing::debug!("ストップウォッチ停止 ({}ms 経過)", duration_ms);
    }

    /// Sets (or clears) the one-shot work reminder threshold.
    pub fn set_reminder_time(&mut self, target_ms: Option<i64>) {
        self.reminder_ms = target_ms.filter(|ms| *ms > 0);
    }

    /// Enters a break that counts up towards `target_ms`.
    pub fn start_break(&mut self, target_ms: i64) {
        self.phase = StopwatchPhase::Break;
        self.elapsed_ms = 0;
        self.break_target_ms = target_ms.max(0);
        self.break_end_triggered = false;
        self.reminder_triggered = false;

        if !self.is_running {
            self.last_tick_ms = self.clock.now_ms();
            self.is_running = true;
        }
        self.scheduler.ensure_running();
        tracing::debug!("ストップウォッチ休憩開始: 目標={}ms", self.break_target_ms);
    }

    /// Ends the break and returns to an empty, stopped work phase.
    ///
    /// Does nothing outside the break phase.
    pub fn end_break(&mut self) {
        if self.phase != StopwatchPhase::Break {
            return;
        }

        let elapsed_ms = self.elapsed_ms;
        self.is_running = false;
        self.scheduler.stop();
        self.enter_work();
        self.events.emit(StopwatchEvent::BreakEnded {
            elapsed_ms,
            ended_at_ms: self.clock.now_ms(),
        });
        tracing::debug!("ストップウォッチ休憩終了 ({}ms 経過)", elapsed_ms);
    }

    /// Same as [`StopwatchTimer::end_break`].
    pub fn skip_break(&mut self) {
        self.end_break();
    }

    /// Stops ticking and detaches every subscriber.
    pub fn dispose(&mut self) {
        self.events.clear();
        self.is_running = false;
        self.scheduler.stop();
    }

    // ------------------------------------------------------------------------
    // Ticking
    // ------------------------------------------------------------------------

    /// Handles a tick delivered by the scheduler. Stale ticks are ignored.
    pub fn on_tick(&mut self, tick: &Tick) -> bool {
        if !self.scheduler.accepts(tick) {
            return false;
        }
        self.tick(tick.now_ms);
        true
    }

    /// Charges the time elapsed since the previous tick.
    pub fn tick(&mut self, now_ms: i64) {
        if !self.is_running {
            return;
        }

        let delta = (now_ms - self.last_tick_ms).max(0);
        self.last_tick_ms = now_ms;
        self.elapsed_ms += delta;

        match self.phase {
            StopwatchPhase::Work => {
                if let Some(reminder_ms) = self.reminder_ms {
                    if !self.reminder_triggered && self.elapsed_ms >= reminder_ms {
                        self.reminder_triggered = true;
                        tracing::debug!("リマインダー到達: {}ms", self.elapsed_ms);
                        self.events.emit(StopwatchEvent::ReminderReached {
                            elapsed_ms: self.elapsed_ms,
                        });
                    }
                }
            }
            StopwatchPhase::Break => {
                if !self.break_end_triggered && self.elapsed_ms >= self.break_target_ms {
                    self.break_end_triggered = true;
                    tracing::debug!("ストップウォッチ休憩の目標時間に到達しました");
                    self.events.emit(StopwatchEvent::BreakTargetReached {
                        elapsed_ms: self.elapsed_ms,
                        target_ms: self.break_target_ms,
                    });
                }
            }
        }
    }

    fn enter_work(&mut self) {
        self.phase = StopwatchPhase::Work;
        self.elapsed_ms = 0;
        self.reminder_triggered = false;
        self.break_end_triggered = false;
        self.break_target_ms = 0;
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn phase(&self) -> StopwatchPhase {
        self.phase
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed_ms
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            phase: self.phase,
            elapsed_ms: self.elapsed_ms,
            is_running: self.is_running,
            break_target_ms: self.break_target_ms,
            reminder_ms: self.reminder_ms,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
