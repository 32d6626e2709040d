//! Instance lifecycle states
//!
//! Every attribute read and write routes through a gate keyed by the
//! instance's current lifecycle state.

use std::fmt;

/// Per-instance gate governing attribute mutation
///
/// Transitions: construction runs in `EngineChanging` and lands in `Normal`.
/// Each instruction execution moves its model arguments
/// `Normal → UserChanging`, runs, and restores `Normal` on both success and
/// failure. `destroy` records a `DESTROY` instruction and marks the handle
/// `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Immutable from outside; direct assignment fails
    Normal,
    /// Construction and id assignment; writes bypass constraints
    EngineChanging,
    /// Instruction execution; writes run constraint checks
    UserChanging,
    /// Terminal; any read or write fails
    Destroyed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Normal => "normal",
            Lifecycle::EngineChanging => "engine-changing",
            Lifecycle::UserChanging => "user-changing",
            Lifecycle::Destroyed => "destroyed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Lifecycle::Normal.to_string(), "normal");
        assert_eq!(Lifecycle::Destroyed.to_string(), "destroyed");
    }

    #[test]
    fn test_copy_semantics() {
        let state = Lifecycle::UserChanging;
        let copy = state;
        assert_eq!(state, copy);
    }
}
