// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The verdict lattice. A task starts tentatively accepted and can only worsen
//! as evidence accumulates; [`Status::max`] is the join.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordering is significant: `derive(PartialOrd, Ord)` follows declaration order,
/// which is exactly the lattice order `AC < WA < RE < TLE < MLE < OLE < CE < IE`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Accepted: no adverse evidence observed.
    AC,
    /// Wrong answer: output or expected-nonzero exit code mismatch in the judge stage.
    WA,
    /// Runtime error: unexpected nonzero exit in the judge stage.
    RE,
    /// Time limit exceeded, as flagged by the watchdog.
    TLE,
    /// Memory limit exceeded, as flagged by the watchdog.
    MLE,
    /// Output limit exceeded, as flagged by the watchdog.
    OLE,
    /// Compile error: unexpected nonzero exit in the build stage.
    CE,
    /// Internal error: the system itself could not carry out the task.
    IE,
}

impl Status {
    /// The join of two statuses under the lattice order: the more serious of the two.
    pub fn max(self, other: Status) -> Status {
        std::cmp::max(self, other)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::AC => "AC",
            Status::WA => "WA",
            Status::RE => "RE",
            Status::TLE => "TLE",
            Status::MLE => "MLE",
            Status::OLE => "OLE",
            Status::CE => "CE",
            Status::IE => "IE",
        };
        f.write_str(s)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::AC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order_matches_severity_ranking() {
        let ordered = [
            Status::AC,
            Status::WA,
            Status::RE,
            Status::TLE,
            Status::MLE,
            Status::OLE,
            Status::CE,
            Status::IE,
        ];
        for window in ordered.windows(2) {
            assert!(window[0] < window[1], "{:?} should be < {:?}", window[0], window[1]);
        }
    }

    #[test]
    fn max_picks_the_worse_status() {
        assert_eq!(Status::AC.max(Status::WA), Status::WA);
        assert_eq!(Status::TLE.max(Status::RE), Status::TLE);
        assert_eq!(Status::IE.max(Status::AC), Status::IE);
    }

    #[test]
    fn max_is_commutative_and_associative() {
        let all = [
            Status::AC,
            Status::WA,
            Status::RE,
            Status::TLE,
            Status::MLE,
            Status::OLE,
            Status::CE,
            Status::IE,
        ];
        for &a in &all {
            for &b in &all {
                assert_eq!(a.max(b), b.max(a));
                for &c in &all {
                    assert_eq!(a.max(b).max(c), a.max(b.max(c)));
                }
            }
        }
    }

    #[test]
    fn join_order_of_evaluation_does_not_matter() {
        // Build-stage style classification: OLE, then MLE, then TLE, then CE, joined in any order.
        let triggers = [Status::OLE, Status::MLE, Status::TLE, Status::CE];
        let forward = triggers.iter().fold(Status::AC, |acc, &s| acc.max(s));
        let backward = triggers.iter().rev().fold(Status::AC, |acc, &s| acc.max(s));
        assert_eq!(forward, backward);
        assert_eq!(forward, Status::CE);
    }
}
