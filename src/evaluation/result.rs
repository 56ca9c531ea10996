//! Graded cover query result.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one cover point against one target, ordered from
/// worst to best.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoverQueryResult {
    /// No cover object protects the point.
    NotFound,
    /// Unrelated geometry blocks the line of fire.
    Obstruction,
    /// Protected, but the target cannot be seen from the point.
    FoundNoView,
    /// Protected, and the target can be engaged (by leaning, or over crouch cover).
    Found,
}

impl CoverQueryResult {
    pub fn is_found(self) -> bool {
        self == CoverQueryResult::Found
    }

    /// True for either found variant.
    pub fn is_protected(self) -> bool {
        self >= CoverQueryResult::FoundNoView
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        use CoverQueryResult::*;
        assert!(NotFound < Obstruction);
        assert!(Obstruction < FoundNoView);
        assert!(FoundNoView < Found);
        assert_eq!([Obstruction, Found, NotFound].into_iter().max(), Some(Found));
        assert!(FoundNoView.is_protected() && !FoundNoView.is_found());
        assert!(!Obstruction.is_protected());
    }
}
