//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing factory-test events through the
//! `log` facade.  The control tool routes these to the terminal and the
//! journal; a console UI would implement the same trait.

use log::{info, warn};

use crate::app::events::FactoryEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`FactoryEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &FactoryEvent) {
        match event {
            FactoryEvent::PhaseStarted(phase) => {
                info!("PHASE | {:?} started", phase);
            }
            FactoryEvent::PhaseFailed { phase, reason } => {
                warn!("PHASE | {:?} did not complete: {}", phase, reason);
            }
            FactoryEvent::TestCompleted { test, passed } => {
                info!("TEST  | {:<36} {}", test.key(), if *passed { "PASS" } else { "FAIL" });
            }
            FactoryEvent::Indicated(ind) => {
                info!("LEDS  | top={:?} middle={:?}", ind.top, ind.middle);
            }
            FactoryEvent::Finished { passed } => {
                info!("DONE  | overall {}", if *passed { "PASS" } else { "FAIL" });
            }
        }
    }
}
