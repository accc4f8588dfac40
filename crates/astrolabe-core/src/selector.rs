//! Revision selection — pick the "current" or "newest" revision from a
//! freshly fetched snapshot set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;
use crate::types::RevisionSnapshot;

/// How to pick one revision out of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SelectionCriterion {
    /// Highest desired replica count.
    Largest,
    /// Latest creation timestamp.
    Newest,
}

impl FromStr for SelectionCriterion {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "largest" => Ok(Self::Largest),
            "newest" => Ok(Self::Newest),
            other => Err(SelectionError::UnknownCriterion(other.to_string())),
        }
    }
}

impl TryFrom<String> for SelectionCriterion {
    type Error = SelectionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Largest => "largest",
            Self::Newest => "newest",
        })
    }
}

impl From<SelectionCriterion> for String {
    fn from(c: SelectionCriterion) -> Self {
        c.to_string()
    }
}

/// Select the extremum of `snapshots` under `criterion`.
///
/// Single left-to-right scan; on ties the first snapshot encountered wins.
pub fn select(
    snapshots: &[RevisionSnapshot],
    criterion: SelectionCriterion,
) -> Result<&RevisionSnapshot, SelectionError> {
    let (first, rest) = snapshots.split_first().ok_or(SelectionError::Empty)?;
    let picked = rest.iter().fold(first, |best, candidate| {
        let better = match criterion {
            SelectionCriterion::Largest => candidate.desired_replicas > best.desired_replicas,
            SelectionCriterion::Newest => candidate.created_at > best.created_at,
        };
        if better { candidate } else { best }
    });
    Ok(picked)
}

/// Like [`select`], with the criterion given by name.
pub fn select_by_name<'a>(
    snapshots: &'a [RevisionSnapshot],
    criterion: &str,
) -> Result<&'a RevisionSnapshot, SelectionError> {
    select(snapshots, criterion.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rs(name: &str, replicas: u32, created_secs: i64) -> RevisionSnapshot {
        RevisionSnapshot::new(
            name,
            replicas,
            Utc.timestamp_opt(created_secs, 0).unwrap(),
        )
    }

    #[test]
    fn newest_and_largest_pick_the_later_bigger_revision() {
        let set = vec![rs("rs-a", 3, 1_000), rs("rs-b", 5, 2_000)];
        assert_eq!(select(&set, SelectionCriterion::Newest).unwrap().name, "rs-b");
        assert_eq!(select(&set, SelectionCriterion::Largest).unwrap().name, "rs-b");
    }

    #[test]
    fn criteria_are_independent() {
        // The old revision still carries most of the replicas.
        let set = vec![rs("rs-old", 10, 1_000), rs("rs-new", 1, 2_000)];
        assert_eq!(select(&set, SelectionCriterion::Largest).unwrap().name, "rs-old");
        assert_eq!(select(&set, SelectionCriterion::Newest).unwrap().name, "rs-new");
    }

    #[test]
    fn newest_scans_past_the_first_element() {
        let set = vec![rs("a", 1, 100), rs("b", 1, 50), rs("c", 1, 300), rs("d", 1, 200)];
        assert_eq!(select(&set, SelectionCriterion::Newest).unwrap().name, "c");
    }

    #[test]
    fn ties_go_to_the_first_encountered() {
        let set = vec![rs("a", 4, 100), rs("b", 4, 100), rs("c", 2, 100)];
        assert_eq!(select(&set, SelectionCriterion::Largest).unwrap().name, "a");
        assert_eq!(select(&set, SelectionCriterion::Newest).unwrap().name, "a");
    }

    #[test]
    fn single_element_is_always_selected() {
        let set = vec![rs("only", 0, 0)];
        for c in [SelectionCriterion::Largest, SelectionCriterion::Newest] {
            assert_eq!(select(&set, c).unwrap().name, "only");
        }
    }

    #[test]
    fn empty_set_fails() {
        for c in [SelectionCriterion::Largest, SelectionCriterion::Newest] {
            assert_eq!(select(&[], c).unwrap_err(), SelectionError::Empty);
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let set = vec![rs("a", 2, 10), rs("b", 7, 5), rs("c", 7, 20)];
        let first = select(&set, SelectionCriterion::Largest).unwrap().clone();
        for _ in 0..5 {
            assert_eq!(select(&set, SelectionCriterion::Largest).unwrap(), &first);
        }
    }

    #[test]
    fn unknown_criterion_name_is_rejected() {
        let set = vec![rs("a", 1, 1)];
        assert_eq!(
            select_by_name(&set, "oldest").unwrap_err(),
            SelectionError::UnknownCriterion("oldest".into())
        );
        assert_eq!(select_by_name(&set, "largest").unwrap().name, "a");
    }
}
