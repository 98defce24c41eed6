//! Countdown (pomodoro) engine.
//!
//! This module provides the countdown state machine:
//! - Phase transitions (Idle → Work → Break → Work …)
//! - Drift-resistant countdown charged with wall-clock deltas
//! - One-shot work-end and break-end events per phase entry
//! - Break overshoot tracking after the break target is reached

use std::sync::Arc;

use tokio::sync::mpsc;

use super::EventHub;
use crate::clock::{Clock, Tick, TickScheduler};
use crate::types::CountdownPhase;

/// Default work interval (25 minutes).
pub const DEFAULT_WORK_MS: i64 = 25 * 60 * 1000;
/// Default break interval (5 minutes).
pub const DEFAULT_BREAK_MS: i64 = 5 * 60 * 1000;

// ============================================================================
// CountdownEvent
// ============================================================================

/// Why a break ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakEndReason {
    /// The break target was reached while ticking. The engine stays in break.
    TargetReached,
    /// The user left the break (skip, or start from break).
    EndedByUser {
        /// Suppress the break-end sound
        silent: bool,
    },
}

/// Events published by the countdown engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownEvent {
    /// The work interval reached zero and the engine entered break.
    WorkEnded {
        /// Completed work intervals so far (including this one)
        cycle_count: u32,
        /// Length of the completed work interval
        duration_ms: i64,
        ended_at_ms: i64,
    },
    /// A break ended, either by reaching its target or by the user.
    BreakEnded {
        reason: BreakEndReason,
        /// Break time actually spent, overshoot included
        elapsed_ms: i64,
        ended_at_ms: i64,
    },
}

// ============================================================================
// CountdownDurations / CountdownSnapshot
// ============================================================================

/// Configured interval lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownDurations {
    pub work_ms: i64,
    pub break_ms: i64,
}

impl Default for CountdownDurations {
    fn default() -> Self {
        Self {
            work_ms: DEFAULT_WORK_MS,
            break_ms: DEFAULT_BREAK_MS,
        }
    }
}

/// Read-only copy of the engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownSnapshot {
    pub phase: CountdownPhase,
    pub remaining_ms: i64,
    pub total_duration_ms: i64,
    pub is_running: bool,
    pub cycle_count: u32,
    pub break_elapsed_ms: i64,
}

// ============================================================================
// CountdownTimer
// ============================================================================

/// Countdown engine.
pub struct CountdownTimer {
    phase: CountdownPhase,
    remaining_ms: i64,
    /// Length of the current phase, frozen at phase entry
    total_duration_ms: i64,
    is_running: bool,
    cycle_count: u32,
    break_elapsed_ms: i64,
    break_end_triggered: bool,
    last_tick_ms: i64,
    durations: CountdownDurations,
    scheduler: Box<dyn TickScheduler>,
    clock: Arc<dyn Clock>,
    events: EventHub<CountdownEvent>,
}

impl CountdownTimer {
    /// Creates an idle countdown with the given durations.
    pub fn new(
        durations: CountdownDurations,
        scheduler: Box<dyn TickScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let work_ms = durations.work_ms.max(0);
        Self {
            phase: CountdownPhase::Idle,
            remaining_ms: work_ms,
            total_duration_ms: work_ms,
            is_running: false,
            cycle_count: 0,
            break_elapsed_ms: 0,
            break_end_triggered: false,
            last_tick_ms: clock.now_ms(),
            durations,
            scheduler,
            clock,
            events: EventHub::new(),
        }
    }

    /// Subscribes to engine events.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CountdownEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Starts or resumes the countdown.
    ///
    /// From idle or break this enters a fresh work interval; leaving a break
    /// this way ends it silently. In work the phase is left untouched.
    pub fn start(&mut self) {
        let now = self.clock.now_ms();

        match self.phase {
            CountdownPhase::Idle => self.enter_work(),
            CountdownPhase::Break => {
                let elapsed_ms = self.break_elapsed_ms;
                self.enter_work();
                self.events.emit(CountdownEvent::BreakEnded {
                    reason: BreakEndReason::EndedByUser { silent: true },
                    elapsed_ms,
                    ended_at_ms: now,
                });
            }
            CountdownPhase::Work => {}
        }

        if !self.is_running {
            self.last_tick_ms = now;
            self.is_running = true;
        }
        self.scheduler.ensure_running();
        tracing::debug!(
            "カウントダウン開始: phase={}, 残り={}ms",
            self.phase.as_str(),
            self.remaining_ms
        );
    }

    /// Pauses the countdown, keeping the remaining time.
    pub fn pause(&mut self) {
        self.is_running = false;
        self.scheduler.stop();
        tracing::debug!("カウントダウン一時停止: 残り={}ms", self.remaining_ms);
    }

    /// Stops the countdown and returns to idle with a full work interval.
    pub fn reset(&mut self) {
        self.is_running = false;
        self.scheduler.stop();
        self.phase = CountdownPhase::Idle;
        self.remaining_ms = self.durations.work_ms.max(0);
        self.total_duration_ms = self.remaining_ms;
        self.break_elapsed_ms = 0;
        self.break_end_triggered = false;
        tracing::debug!("カウントダウンをリセットしました");
    }

    /// Leaves the break for a fresh work interval.
    ///
    /// Does nothing outside the break phase.
    pub fn skip_break(&mut self, silent: bool) {
        if self.phase != CountdownPhase::Break {
            return;
        }

        let elapsed_ms = self.break_elapsed_ms;
        self.enter_work();
        if self.is_running {
            self.scheduler.ensure_running();
        }
        self.events.emit(CountdownEvent::BreakEnded {
            reason: BreakEndReason::EndedByUser { silent },
            elapsed_ms,
            ended_at_ms: self.clock.now_ms(),
        });
        tracing::debug!("休憩をスキップしました ({}ms 経過)", elapsed_ms);
    }

    /// Replaces the configured durations.
    ///
    /// Idle engines show the new work duration immediately; a running phase
    /// keeps its length and the new values apply at the next phase entry.
    pub fn update_durations(&mut self, durations: CountdownDurations) {
        self.durations = durations;
        if self.phase == CountdownPhase::Idle {
            self.remaining_ms = durations.work_ms.max(0);
            self.total_duration_ms = self.remaining_ms;
        }
    }

    /// Stops ticking and detaches every subscriber.
    ///
    /// Subscribers go first so a tick racing with teardown has nobody to reach.
    pub fn dispose(&mut self) {
        self.events.clear();
        self.is_running = false;
        self.scheduler.stop();
    }

    // ------------------------------------------------------------------------
    // Ticking
    // ------------------------------------------------------------------------

    /// Handles a tick delivered by the scheduler. Stale ticks are ignored.
    ///
    /// Returns whether the tick was applied.
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

        match self.phase {
            CountdownPhase::Idle => {}
            CountdownPhase::Work => {
                self.remaining_ms = (self.remaining_ms - delta).max(0);
                if self.remaining_ms == 0 {
                    let duration_ms = self.total_duration_ms;
                    self.cycle_count += 1;
                    self.enter_break();
                    tracing::debug!("作業 {} 回目が完了しました", self.cycle_count);
                    self.events.emit(CountdownEvent::WorkEnded {
                        cycle_count: self.cycle_count,
                        duration_ms,
                        ended_at_ms: now_ms,
                    });
                }
            }
            CountdownPhase::Break => {
                self.break_elapsed_ms += delta;
                self.remaining_ms = (self.remaining_ms - delta).max(0);
                if self.remaining_ms == 0 && !self.break_end_triggered {
                    self.break_end_triggered = true;
                    tracing::debug!("休憩の目標時間に到達しました");
                    self.events.emit(CountdownEvent::BreakEnded {
                        reason: BreakEndReason::TargetReached,
                        elapsed_ms: self.break_elapsed_ms,
                        ended_at_ms: now_ms,
                    });
                }
            }
        }
    }

    fn enter_work(&mut self) {
        self.phase = CountdownPhase::Work;
        self.remaining_ms = self.durations.work_ms.max(0);
        self.total_duration_ms = self.remaining_ms;
        self.break_elapsed_ms = 0;
        self.break_end_triggered = false;
    }

    fn enter_break(&mut self) {
        self.phase = CountdownPhase::Break;
        self.remaining_ms = self.durations.break_ms.max(0);
        self.total_duration_ms = self.remaining_ms;
        self.break_elapsed_ms = 0;
        self.break_end_triggered = false;
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    pub fn remaining_ms(&self) -> i64 {
        self.remaining_ms
    }

    pub fn total_duration_ms(&self) -> i64 {
        self.total_duration_ms
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn break_elapsed_ms(&self) -> i64 {
        self.break_elapsed_ms
    }

    pub fn durations(&self) -> CountdownDurations {
        self.durations
    }

    /// Returns whether the scheduler is currently ticking.
    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn snapshot(&self) -> CountdownSnapshot {
        CountdownSnapshot {
            phase: self.phase,
            remaining_ms: self.remaining_ms,
            total_duration_ms: self.total_duration_ms,
            is_running: self.is_running,
            cycle_count: self.cycle_count,
            break_elapsed_ms: self.break_elapsed_ms,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
