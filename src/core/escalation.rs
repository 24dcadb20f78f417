//! # Interrupt escalation.
//!
//! Repeated interrupts produce progressively stronger responses:
//!
//! ```text
//!   Normal ──1st──► Cancelling ──2nd──► Escalated ──3rd──► ForceExit
//!            │                   │                   │
//!        cancel context      warn only          exit process
//! ```
//!
//! The machine knows nothing about signals; the runtime feeds it.

/// Escalation state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EscalationState {
    /// No interrupt seen yet.
    #[default]
    Normal,
    /// Shared context cancelled; waiting for units to finish.
    Cancelling,
    /// Warning issued; the next interrupt terminates the process.
    Escalated,
    /// Terminal.
    ForceExit,
}

/// Action the runtime must take for one interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscalationStep {
    /// Cancel the shared execution context.
    Cancel,
    /// Emit a warning; nothing else.
    Warn,
    /// Terminate immediately, skipping shutdown hooks.
    ForceExit,
}

/// Counter-driven escalation machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct Escalation {
    state: EscalationState,
}

impl Escalation {
    /// Creates a machine in [`EscalationState::Normal`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> EscalationState {
        self.state
    }

    /// Records one interrupt and returns what to do about it.
    ///
    /// Interrupts after `ForceExit` keep answering `ForceExit`.
    pub fn advance(&mut self) -> EscalationStep {
        let (next, step) = match self.state {
            EscalationState::Normal => (EscalationState::Cancelling, EscalationStep::Cancel),
            EscalationState::Cancelling => (EscalationState::Escalated, EscalationStep::Warn),
            EscalationState::Escalated | EscalationState::ForceExit => {
                (EscalationState::ForceExit, EscalationStep::ForceExit)
            }
        };
        self.state = next;
        step
    }
}
