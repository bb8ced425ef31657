//! Folding test results into a two-LED indication.
//!
//! ```text
//!   all pass                         top Green           middle off
//!   failures in 2+ categories        top White           middle off
//!   2+ failures, one category        top <category>      middle White
//!   exactly one failure              top <category>      middle <test>
//! ```
//!
//! Category colours: modem Yellow, bus presence Red, recording Blue.

use crate::drivers::leds::Colour;
use crate::factory::results::{Category, TestResults};

/// What the top and middle LEDs show after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indication {
    pub top: Colour,
    pub middle: Colour,
}

pub fn classify(results: &TestResults) -> Indication {
    let mut failures = results.failures();

    let Some(first) = failures.next() else {
        return Indication {
            top: Colour::Green,
            middle: Colour::Black,
        };
    };
    let category: Category = first.category();

    let mut count = 1;
    for test in failures {
        if test.category() != category {
            return Indication {
                top: Colour::White,
                middle: Colour::Black,
            };
        }
        count += 1;
    }

    let middle = if count > 1 {
        Colour::White
    } else {
        first.indicator_colour()
    };
    Indication {
        top: category.colour(),
        middle,
    }
}
