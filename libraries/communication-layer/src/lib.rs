#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Abstraction of the transports that carry packets between component ports.
//!
//! Provides a [`CommunicationLayer`] trait as an abstraction for different
//! point-to-point packet transports. Input ports *bind* an address and
//! deliver [`PortEvent`]s, output ports *connect* to an address and publish
//! packets. The following backends are currently supported:
//!
//! - **TCP:** packets are sent as length-prefixed messages over plain TCP
//!   connections. Use the [`TcpLayer`][tcp::TcpLayer] struct.
//! - **Memory:** in-process channels, used to embed components and to test
//!   them. Use the [`MemoryLayer`][memory::MemoryLayer] struct.

pub use address::{AddressError, PortAddress};
pub use conduit_message::Packet;

mod address;
pub mod memory;
#[cfg(feature = "tcp")]
pub mod tcp;

/// Error type returned by the transport backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Abstraction trait for different transport implementations.
pub trait CommunicationLayer: Send {
    /// Binds an input port to the given address.
    fn bind(&mut self, address: &PortAddress) -> Result<Box<dyn Subscriber>, BoxError>;

    /// Creates an output port that sends to the given address.
    fn connect(&mut self, address: &PortAddress) -> Result<Box<dyn Publisher>, BoxError>;
}

/// Sending side of a port.
pub trait Publisher: Send {
    /// Sends one packet.
    ///
    /// Blocks until the packet is handed to the transport.
    fn publish(&mut self, packet: &Packet) -> Result<(), BoxError>;

    /// Releases the underlying connection. Calling this more than once has no
    /// further effect.
    fn close(&mut self);
}

/// Receiving side of a port.
pub trait Subscriber: Send {
    /// Stream of events received on this port.
    ///
    /// The channel reports [`flume::RecvError::Disconnected`] once the
    /// transport has shut down.
    fn events(&self) -> &flume::Receiver<PortEvent>;

    /// Stops accepting packets and releases the bound address. Calling this
    /// more than once has no further effect.
    fn close(&mut self);
}

/// Something that happened on an input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    /// A packet was received. It is not validated yet.
    Packet(Packet),
    /// A peer unbound from this port.
    Disconnected,
    /// A transient receive error.
    Error(String),
}
