//! Message types shared by every conduit component.
//!
//! A [`Packet`] is the unit of data exchanged between components. Components
//! describe themselves through a [`descriptor::ComponentDescription`] so that
//! an external graph composer can discover their ports.

pub use id::PortId;
pub use packet::{validate, Frame, InvalidPacket, Packet, PacketKind, Substream, MIN_FRAMES};

pub mod descriptor;
pub mod id;
pub mod packet;
