// State tracker - edge-triggered cry notifications
//
// Two states, no terminal state. The observer hears about a verdict only when
// it differs from the last published one; repeated verdicts are silent.

/// Published classification state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryState {
    #[default]
    NotCrying,
    Crying,
}

impl CryState {
    pub fn from_verdict(is_crying: bool) -> Self {
        if is_crying {
            CryState::Crying
        } else {
            CryState::NotCrying
        }
    }

    pub fn is_crying(self) -> bool {
        matches!(self, CryState::Crying)
    }
}

/// A published change of state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    CryingStarted,
    CryingStopped,
}

impl Transition {
    /// Boolean handed to observers
    pub fn is_crying(self) -> bool {
        matches!(self, Transition::CryingStarted)
    }
}

/// Pure transition function
///
/// # Returns
/// The next state, plus the transition when the verdict changes the state
pub fn transition(state: CryState, verdict: bool) -> (CryState, Option<Transition>) {
    match (state, verdict) {
        (CryState::NotCrying, true) => (CryState::Crying, Some(Transition::CryingStarted)),
        (CryState::Crying, false) => (CryState::NotCrying, Some(Transition::CryingStopped)),
        (state, _) => (state, None),
    }
}

/// Receives state changes
pub trait CryObserver: Send {
    fn on_change(&mut self, is_crying: bool);
}

impl<F> CryObserver for F
where
    F: FnMut(bool) + Send,
{
    fn on_change(&mut self, is_crying: bool) {
        self(is_crying)
    }
}

/// Holds the published state and applies verdicts to it
#[derive(Debug, Default, Clone)]
pub struct StateTracker {
    state: CryState,
    transitions: u64,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CryState {
        self.state
    }

    /// Number of transitions published since creation or reset
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Apply a verdict; state is updated before the transition is returned
    pub fn observe(&mut self, verdict: bool) -> Option<Transition> {
        let (next, change) = transition(self.state, verdict);
        self.state = next;
        if change.is_some() {
            self.transitions += 1;
        }
        change
    }

    /// Back to `NotCrying` without publishing anything
    pub fn reset(&mut self) {
        self.state = CryState::NotCrying;
        self.transitions = 0;
    }
}
