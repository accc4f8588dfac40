//! Count conditions — the `"3"`, `">2"`, `"<5"` comparison grammar.
//!
//! Conditions are parsed once, when the plan is loaded, and evaluated
//! against observed counts on every poll tick.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConditionSyntaxError;

/// A comparison against an observed non-negative count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "String")]
pub enum Condition {
    /// Bare integer: the count must equal `n`.
    Equals(u64),
    /// `>n`: the count must be strictly greater than `n`.
    GreaterThan(u64),
    /// `<n`: the count must be strictly less than `n`.
    LessThan(u64),
}

impl Condition {
    /// Whether `observed` satisfies this condition.
    pub fn matches(&self, observed: u64) -> bool {
        match *self {
            Condition::Equals(n) => observed == n,
            Condition::GreaterThan(n) => observed > n,
            Condition::LessThan(n) => observed < n,
        }
    }
}

/// Parse `expr` and evaluate it against `observed` in one step.
pub fn evaluate(observed: u64, expr: &str) -> Result<bool, ConditionSyntaxError> {
    Ok(expr.parse::<Condition>()?.matches(observed))
}

impl FromStr for Condition {
    type Err = ConditionSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax_error = || ConditionSyntaxError {
            input: s.to_string(),
        };

        let (ctor, digits): (fn(u64) -> Condition, &str) = if let Some(rest) = s.strip_prefix('>')
        {
            (Condition::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Condition::LessThan, rest)
        } else {
            (Condition::Equals, s)
        };

        // u64::from_str accepts a leading '+', the grammar does not.
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(syntax_error());
        }
        let n = digits.parse::<u64>().map_err(|_| syntax_error())?;
        Ok(ctor(n))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals(n) => write!(f, "{n}"),
            Condition::GreaterThan(n) => write!(f, ">{n}"),
            Condition::LessThan(n) => write!(f, "<{n}"),
        }
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.to_string()
    }
}

/// Plan documents may write `count: 3` (an integer scalar) as well as
/// `count: ">2"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCondition {
    Count(u64),
    Expr(String),
}

impl TryFrom<RawCondition> for Condition {
    type Error = ConditionSyntaxError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match raw {
            RawCondition::Count(n) => Ok(Condition::Equals(n)),
            RawCondition::Expr(s) => s.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_matches_only_exact_count() {
        for n in [0u64, 1, 3, 250] {
            let expr = n.to_string();
            assert!(evaluate(n, &expr).unwrap());
            assert!(!evaluate(n + 1, &expr).unwrap());
            if n > 0 {
                assert!(!evaluate(n - 1, &expr).unwrap());
            }
        }
    }

    #[test]
    fn greater_and_less_are_strict() {
        assert!(evaluate(3, ">2").unwrap());
        assert!(!evaluate(2, ">2").unwrap());
        assert!(!evaluate(1, ">2").unwrap());

        assert!(evaluate(4, "<5").unwrap());
        assert!(!evaluate(5, "<5").unwrap());
        assert!(!evaluate(6, "<5").unwrap());
        assert!(!evaluate(0, "<0").unwrap());
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for bad in ["=3", "abc", "", ">", "<", "-1", "+3", ">-2", " 3", "3 ", ">=2", "2<", "1.5"] {
            let err = evaluate(1, bad).unwrap_err();
            assert_eq!(err.input, bad);
        }
    }

    #[test]
    fn overflowing_count_is_a_syntax_error() {
        assert!("99999999999999999999999".parse::<Condition>().is_err());
    }

    #[test]
    fn evaluation_is_repeatable() {
        let cond: Condition = ">2".parse().unwrap();
        assert_eq!(cond.matches(3), cond.matches(3));
        assert_eq!(evaluate(3, ">2").unwrap(), evaluate(3, ">2").unwrap());
    }

    #[test]
    fn display_is_the_short_form() {
        assert_eq!(Condition::Equals(3).to_string(), "3");
        assert_eq!(Condition::GreaterThan(2).to_string(), ">2");
        assert_eq!(Condition::LessThan(5).to_string(), "<5");
    }

    #[test]
    fn deserializes_from_string_or_integer() {
        let cond: Condition = serde_yaml::from_str("\">2\"").unwrap();
        assert_eq!(cond, Condition::GreaterThan(2));

        let cond: Condition = serde_yaml::from_str("4").unwrap();
        assert_eq!(cond, Condition::Equals(4));

        let cond: Condition = serde_yaml::from_str("\"4\"").unwrap();
        assert_eq!(cond, Condition::Equals(4));

        assert!(serde_yaml::from_str::<Condition>("\"=4\"").is_err());
    }
}
