//! Per-leg finite state machine reconciling planned and sensed contact.
//!
//! | scheduled | estimated | state  |
//! |-----------|-----------|--------|
//! | swing     | swing     | Swing  |
//! | swing     | stance    | Late   |
//! | stance    | stance    | Stance |
//! | stance    | swing     | Early  |
//!
//! The transition is a pure function of the current cycle's flags. [`LegFsm`]
//! only remembers the previous state so callers can react to entry edges.

use std::fmt;

use stride_core::types::{ContactFlags, ContactPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegState {
    /// Airborne as planned.
    Swing,
    /// On the ground as planned.
    Stance,
    /// Scheduled touchdown, foot not down yet.
    Early,
    /// Scheduled liftoff, foot still down.
    Late,
}

impl LegState {
    pub const ALL: [Self; 4] = [Self::Swing, Self::Stance, Self::Early, Self::Late];

    /// Total transition over the 2x2 input space.
    pub const fn from_flags(flags: ContactFlags) -> Self {
        match (flags.scheduled, flags.estimated) {
            (ContactPhase::Swing, ContactPhase::Swing) => Self::Swing,
            (ContactPhase::Swing, ContactPhase::Stance) => Self::Late,
            (ContactPhase::Stance, ContactPhase::Stance) => Self::Stance,
            (ContactPhase::Stance, ContactPhase::Swing) => Self::Early,
        }
    }

    /// Whether the schedule has the foot down: `Stance` or `Early`.
    pub const fn is_ground_phase(self) -> bool {
        matches!(self, Self::Stance | Self::Early)
    }

    pub const fn scheduled(self) -> ContactPhase {
        ContactPhase::from_stance(self.is_ground_phase())
    }

    pub const fn estimated(self) -> ContactPhase {
        ContactPhase::from_stance(matches!(self, Self::Stance | Self::Late))
    }
}

impl fmt::Display for LegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Swing => "swing",
            Self::Stance => "stance",
            Self::Early => "early",
            Self::Late => "late",
        })
    }
}

/// Result of one FSM update, with the edges the pipeline acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: LegState,
    pub previous: Option<LegState>,
    /// Entered `Swing` this cycle (including the first cycle).
    pub swing_entry: bool,
    /// Observed contact went false -> true this cycle.
    pub touchdown: bool,
}

/// Previous-state memory for one leg. No terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LegFsm {
    state: Option<LegState>,
}

impl LegFsm {
    pub const fn new() -> Self {
        Self { state: None }
    }

    pub const fn state(&self) -> Option<LegState> {
        self.state
    }

    pub fn update(&mut self, flags: ContactFlags) -> Transition {
        let state = LegState::from_flags(flags);
        let previous = self.state.replace(state);
        let was_down = previous.is_some_and(|p| p.estimated().is_stance());
        Transition {
            state,
            previous,
            swing_entry: state == LegState::Swing && previous != Some(LegState::Swing),
            touchdown: flags.estimated.is_stance() && !was_down,
        }
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(scheduled: bool, estimated: bool) -> ContactFlags {
        ContactFlags {
            scheduled: ContactPhase::from_stance(scheduled),
            estimated: ContactPhase::from_stance(estimated),
        }
    }

    #[test]
    fn transition_table() {
        assert_eq!(LegState::from_flags(flags(false, false)), LegState::Swing);
        assert_eq!(LegState::from_flags(flags(false, true)), LegState::Late);
        assert_eq!(LegState::from_flags(flags(true, true)), LegState::Stance);
        assert_eq!(LegState::from_flags(flags(true, false)), LegState::Early);
    }

    #[test]
    fn state_round_trips_its_flags() {
        for state in LegState::ALL {
            let f = ContactFlags {
                scheduled: state.scheduled(),
                estimated: state.estimated(),
            };
            assert_eq!(LegState::from_flags(f), state);
        }
    }

    #[test]
    fn repeated_input_is_idempotent() {
        let mut fsm = LegFsm::new();
        for (s, e) in [(false, false), (false, true), (true, true), (true, false)] {
            let first = fsm.update(flags(s, e));
            let second = fsm.update(flags(s, e));
            assert_eq!(first.state, second.state);
            assert!(!second.swing_entry);
            assert!(!second.touchdown);
        }
    }

    #[test]
    fn first_cycle_in_swing_is_an_entry() {
        let mut fsm = LegFsm::new();
        let t = fsm.update(flags(false, false));
        assert!(t.swing_entry);
        assert_eq!(t.previous, None);
    }

    #[test]
    fn swing_entry_after_late() {
        let mut fsm = LegFsm::new();
        fsm.update(flags(true, true));
        assert!(!fsm.update(flags(false, true)).swing_entry);
        let t = fsm.update(flags(false, false));
        assert!(t.swing_entry);
        assert_eq!(t.previous, Some(LegState::Late));
    }

    #[test]
    fn touchdown_follows_observed_contact() {
        let mut fsm = LegFsm::new();
        fsm.update(flags(false, false));
        // Scheduled touchdown without sensed contact is not an edge.
        assert!(!fsm.update(flags(true, false)).touchdown);
        // Early -> Stance: the foot lands late, inside scheduled stance.
        let t = fsm.update(flags(true, true));
        assert!(t.touchdown);
        assert_eq!(t.previous, Some(LegState::Early));
        assert!(!fsm.update(flags(true, true)).touchdown);
        // Stance -> Late keeps contact.
        assert!(!fsm.update(flags(false, true)).touchdown);
    }

    #[test]
    fn contact_during_swing_is_an_edge() {
        let mut fsm = LegFsm::new();
        fsm.update(flags(false, false));
        let t = fsm.update(flags(false, true));
        assert_eq!(t.state, LegState::Late);
        assert!(t.touchdown);
    }

    #[test]
    fn no_observed_contact_means_no_touchdown() {
        let mut fsm = LegFsm::new();
        for k in 0..1000 {
            let t = fsm.update(flags(k % 500 <= 375, false));
            assert!(!t.touchdown);
        }
    }

    #[test]
    fn first_cycle_with_contact_is_an_edge() {
        let mut fsm = LegFsm::new();
        assert!(fsm.update(flags(true, true)).touchdown);
    }

    #[test]
    fn reset_forgets_previous_state() {
        let mut fsm = LegFsm::new();
        fsm.update(flags(false, false));
        fsm.reset();
        assert_eq!(fsm.state(), None);
        assert!(fsm.update(flags(false, false)).swing_entry);
    }

    #[test]
    fn display_names() {
        assert_eq!(LegState::Early.to_string(), "early");
        assert_eq!(LegState::Late.to_string(), "late");
    }
}
