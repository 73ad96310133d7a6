/// Lifecycle of a component.
///
/// States are only ever left in forward direction:
///
/// ```text
/// Init ──► AwaitConfig ──► Running ──► Terminating ──► Terminated
///   │           │                          ▲
///   └───────────┴──────────────────────────┘
/// ```
///
/// `Init` skips `AwaitConfig` when the policy has no configuration port. An
/// interrupt while waiting for the configuration moves straight to
/// `Terminating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentState {
    Init,
    AwaitConfig,
    Running,
    Terminating,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid component state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ComponentState,
    pub to: ComponentState,
}

impl ComponentState {
    pub fn can_transition_to(self, next: ComponentState) -> bool {
        use ComponentState::*;

        matches!(
            (self, next),
            (Init, AwaitConfig)
                | (Init, Running)
                | (Init, Terminating)
                | (AwaitConfig, Running)
                | (AwaitConfig, Terminating)
                | (Running, Terminating)
                | (Terminating, Terminated)
        )
    }

    pub fn transition(&mut self, next: ComponentState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::trace!("component state {self:?} -> {next:?}");
        *self = next;
        Ok(())
    }

    /// Data packets may only be handed to the policy in this state.
    pub fn accepts_data(self) -> bool {
        self == ComponentState::Running
    }
}
