//! Timer engines.
//!
//! Two engines drive the application:
//! - [`CountdownTimer`]: pomodoro countdown (idle → work → break → work …)
//! - [`StopwatchTimer`]: count-up stopwatch with an optional break sub-phase
//!
//! Engines own their state exclusively and are mutated only from the
//! application loop. They publish typed events through an [`EventHub`] so that
//! any number of subscribers (dispatcher, broadcaster, tests) can observe them.

pub mod countdown;
pub mod stopwatch;

pub use countdown::{
    BreakEndReason, CountdownDurations, CountdownEvent, CountdownSnapshot, CountdownTimer,
};
pub use stopwatch::{StopwatchEvent, StopwatchSnapshot, StopwatchTimer};

use tokio::sync::mpsc;

// ============================================================================
// EventHub
// ============================================================================

/// Fan-out of engine events to every live subscriber.
#[derive(Debug)]
pub struct EventHub<E> {
    subscribers: Vec<mpsc::UnboundedSender<E>>,
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<E: Clone> EventHub<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Sends an event to every subscriber, dropping those that went away.
    pub fn emit(&mut self, event: E) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drops all subscribers. Events emitted afterwards go nowhere.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
