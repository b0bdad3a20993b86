//! Permit filter
//!
//! Decides whether a notification's state is eligible for any ticket action.

use crate::event::{Notification, State};
use std::collections::HashSet;

/// Set of check states that may open, comment or close tickets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitFilter {
    states: HashSet<State>,
}

impl PermitFilter {
    pub fn new(states: impl IntoIterator<Item = State>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    /// Filter that lets every state through
    pub fn allow_all() -> Self {
        Self::new(State::ALL)
    }

    pub fn permitted(&self, notification: &Notification) -> bool {
        self.states.contains(&notification.state())
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(state: State) -> Notification {
        Notification::new("web1", "http", state, "")
    }

    #[test]
    fn test_permitted_states() {
        let filter = PermitFilter::new([State::Ok, State::Critical]);

        assert!(filter.permitted(&notification(State::Ok)));
        assert!(filter.permitted(&notification(State::Critical)));
        assert!(!filter.permitted(&notification(State::Warning)));
        assert!(!filter.permitted(&notification(State::Unknown)));
    }

    #[test]
    fn test_allow_all() {
        let filter = PermitFilter::allow_all();
        for state in State::ALL {
            assert!(filter.permitted(&notification(state)));
        }
    }

    #[test]
    fn test_empty_filter_rejects_everything() {
        let filter = PermitFilter::new([]);
        assert!(!filter.permitted(&notification(State::Critical)));
        assert_eq!(filter.states().count(), 0);
    }
}
