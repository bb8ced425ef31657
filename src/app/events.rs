//! Outbound factory-test events.
//!
//! The [`FactoryTest`](crate::factory::FactoryTest) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, print them on the console,
//! forward them to the journal.

use crate::factory::classify::Indication;
use crate::factory::results::{Category, TestId};

/// Structured events emitted while the factory test runs.
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryEvent {
    /// A test phase has begun.
    PhaseStarted(Category),

    /// A phase aborted before completing; its remaining tests stay failed.
    PhaseFailed { phase: Category, reason: String },

    /// A single test point produced its outcome.
    TestCompleted { test: TestId, passed: bool },

    /// The outcome has been rendered on the LEDs.
    Indicated(Indication),

    /// The run finished (carries the overall verdict).
    Finished { passed: bool },
}
