use conduit_communication_layer::{AddressError, BoxError, PortAddress};
use conduit_message::PortId;

/// Errors that prevent a component from starting.
///
/// These are the only fatal errors: once a component runs, transport and
/// processing failures are logged and the component keeps going.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("missing address for required port `{0}`")]
    MissingAddress(PortId),
    #[error("invalid address for port `{port}`")]
    InvalidAddress {
        port: PortId,
        #[source]
        source: AddressError,
    },
    #[error("component has no port named `{0}`")]
    UnknownPort(PortId),
    #[error("failed to open port `{port}` at `{address}`")]
    OpenPort {
        port: PortId,
        address: PortAddress,
        #[source]
        source: BoxError,
    },
    #[error("component declares no primary input port")]
    NoPrimaryInput,
}

/// Failure of a single policy invocation.
///
/// The text is sent to the component's error output, if it has one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PolicyError {
    message: String,
}

impl PolicyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<eyre::Report> for PolicyError {
    fn from(report: eyre::Report) -> Self {
        Self::new(format!("{report:#}"))
    }
}
