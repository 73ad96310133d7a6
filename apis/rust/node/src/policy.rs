use conduit_message::{Packet, PortId};

use crate::PolicyError;

/// Per-component processing behavior, driven by the
/// [`Component`][crate::Component] harness.
///
/// `handle` is called once per valid packet received on the primary input,
/// in receive order, and only after the configuration is known.
pub trait Policy {
    type Config;

    /// Where the configuration value comes from.
    fn configuration(&self) -> Configuration<Self::Config>;

    fn handle(&mut self, packet: Packet, config: &Self::Config) -> Result<Outputs, PolicyError>;
}

pub enum Configuration<C> {
    /// The value is known at startup.
    Static(C),
    /// The value is parsed from the first valid data packet on `port`.
    Gate {
        port: PortId,
        parse: fn(&[u8]) -> eyre::Result<C>,
    },
}

impl<C> Configuration<C> {
    pub fn gate(port: impl Into<PortId>, parse: fn(&[u8]) -> eyre::Result<C>) -> Self {
        Self::Gate {
            port: port.into(),
            parse,
        }
    }

    pub fn port(&self) -> Option<&PortId> {
        match self {
            Configuration::Static(_) => None,
            Configuration::Gate { port, .. } => Some(port),
        }
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for Configuration<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Gate { port, .. } => f.debug_struct("Gate").field("port", port).finish(),
        }
    }
}

/// Packets produced by one policy invocation, sent in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs(Vec<(PortId, Packet)>);

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(port: impl Into<PortId>, packet: Packet) -> Self {
        let mut outputs = Self::new();
        outputs.push(port, packet);
        outputs
    }

    pub fn push(&mut self, port: impl Into<PortId>, packet: Packet) {
        self.0.push((port.into(), packet));
    }
}

impl IntoIterator for Outputs {
    type Item = (PortId, Packet);
    type IntoIter = std::vec::IntoIter<(PortId, Packet)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(PortId, Packet)> for Outputs {
    fn from_iter<T: IntoIterator<Item = (PortId, Packet)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
