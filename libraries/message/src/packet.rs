use serde::{Deserialize, Serialize};

/// A single byte frame of a packet.
pub type Frame = Vec<u8>;

/// Number of frames of a well-formed packet: one header frame and one payload
/// frame.
pub const MIN_FRAMES: usize = 2;

/// The kind of a packet, encoded as the single byte of its header frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Regular data.
    Data,
    /// Opens a substream of packets that belong together.
    OpenBracket,
    /// Closes the innermost open substream.
    CloseBracket,
}

impl PacketKind {
    pub fn header(self) -> u8 {
        match self {
            PacketKind::Data => 0,
            PacketKind::OpenBracket => 1,
            PacketKind::CloseBracket => 2,
        }
    }

    pub fn from_header(header: &[u8]) -> Option<Self> {
        match header {
            [0] => Some(PacketKind::Data),
            [1] => Some(PacketKind::OpenBracket),
            [2] => Some(PacketKind::CloseBracket),
            _ => None,
        }
    }
}

/// Reason why a packet was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPacket {
    #[error("packet has no frames")]
    Empty,
    #[error("packet has {0} frames, expected {MIN_FRAMES}")]
    FrameCount(usize),
    #[error("unknown packet header {0:?}")]
    UnknownHeader(Vec<u8>),
    #[error("close bracket without matching open bracket")]
    UnmatchedCloseBracket,
}

/// An ordered sequence of byte frames.
///
/// Packets are immutable once constructed. Use [`Packet::check`] (or
/// [`validate`]) before interpreting the frames; a packet that fails the check
/// must never be forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Packet {
    frames: Vec<Frame>,
}

impl Packet {
    /// Wraps `payload` into a data packet.
    pub fn data(payload: impl Into<Frame>) -> Self {
        Self::with_kind(PacketKind::Data, payload.into())
    }

    pub fn open_bracket() -> Self {
        Self::with_kind(PacketKind::OpenBracket, Frame::new())
    }

    pub fn close_bracket() -> Self {
        Self::with_kind(PacketKind::CloseBracket, Frame::new())
    }

    /// Takes the frames as they were received, without any checks.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    fn with_kind(kind: PacketKind, payload: Frame) -> Self {
        Self {
            frames: vec![vec![kind.header()], payload],
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// `true` for the zero-frame packet, which peers use to signal that they
    /// unbound.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Checks the frame structure and returns the packet kind.
    pub fn check(&self) -> Result<PacketKind, InvalidPacket> {
        match self.frames.as_slice() {
            [] => Err(InvalidPacket::Empty),
            [header, _payload] => PacketKind::from_header(header)
                .ok_or_else(|| InvalidPacket::UnknownHeader(header.clone())),
            other => Err(InvalidPacket::FrameCount(other.len())),
        }
    }

    /// The kind of a valid packet, `None` if the packet is malformed.
    pub fn kind(&self) -> Option<PacketKind> {
        self.check().ok()
    }

    /// The payload frame of a valid packet.
    pub fn payload(&self) -> Option<&[u8]> {
        self.check().ok().map(|_| self.frames[1].as_slice())
    }

    /// The payload as UTF-8 text, replacing invalid sequences.
    pub fn payload_str(&self) -> Option<std::borrow::Cow<'_, str>> {
        self.payload().map(String::from_utf8_lossy)
    }
}

/// Returns whether the given frames form a structurally valid packet.
pub fn validate(frames: &[Frame]) -> bool {
    match frames {
        [header, _payload] => PacketKind::from_header(header).is_some(),
        _ => false,
    }
}

/// Tracks the bracket nesting of the packets received on one port.
#[derive(Debug, Default, Clone)]
pub struct Substream {
    depth: usize,
}

impl Substream {
    /// Accounts for a packet of the given kind.
    ///
    /// A close bracket at depth zero is rejected and leaves the depth
    /// unchanged.
    pub fn track(&mut self, kind: PacketKind) -> Result<(), InvalidPacket> {
        match kind {
            PacketKind::Data => {}
            PacketKind::OpenBracket => self.depth += 1,
            PacketKind::CloseBracket => {
                self.depth = self
                    .depth
                    .checked_sub(1)
                    .ok_or(InvalidPacket::UnmatchedCloseBracket)?;
            }
        }
        Ok(())
    }

    /// Number of substreams that are currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_packet_is_valid() {
        let packet = Packet::data("hello");
        assert_eq!(packet.check(), Ok(PacketKind::Data));
        assert_eq!(packet.payload(), Some(&b"hello"[..]));
        assert!(validate(packet.frames()));
    }

    #[test]
    fn empty_packet_is_invalid() {
        let packet = Packet::from_frames(vec![]);
        assert!(packet.is_empty());
        assert_eq!(packet.check(), Err(InvalidPacket::Empty));
        assert!(!validate(packet.frames()));
        assert_eq!(packet.payload(), None);
    }

    #[test]
    fn frame_count_must_match() {
        let single = Packet::from_frames(vec![vec![0]]);
        assert_eq!(single.check(), Err(InvalidPacket::FrameCount(1)));

        let triple = Packet::from_frames(vec![vec![0], b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(triple.check(), Err(InvalidPacket::FrameCount(3)));
        assert!(!validate(triple.frames()));
    }

    #[test]
    fn unknown_header_is_invalid() {
        let packet = Packet::from_frames(vec![vec![7], b"x".to_vec()]);
        assert_eq!(packet.check(), Err(InvalidPacket::UnknownHeader(vec![7])));

        let long_header = Packet::from_frames(vec![vec![0, 0], b"x".to_vec()]);
        assert!(long_header.check().is_err());
    }

    #[test]
    fn brackets_are_valid_packets() {
        assert_eq!(Packet::open_bracket().kind(), Some(PacketKind::OpenBracket));
        assert_eq!(
            Packet::close_bracket().kind(),
            Some(PacketKind::CloseBracket)
        );
        assert_eq!(Packet::open_bracket().payload(), Some(&[][..]));
    }

    #[test]
    fn substream_rejects_unmatched_close() {
        let mut substream = Substream::default();
        assert_eq!(
            substream.track(PacketKind::CloseBracket),
            Err(InvalidPacket::UnmatchedCloseBracket)
        );

        substream.track(PacketKind::OpenBracket).unwrap();
        substream.track(PacketKind::OpenBracket).unwrap();
        substream.track(PacketKind::Data).unwrap();
        assert_eq!(substream.depth(), 2);
        substream.track(PacketKind::CloseBracket).unwrap();
        substream.track(PacketKind::CloseBracket).unwrap();
        assert_eq!(substream.depth(), 0);
        assert!(substream.track(PacketKind::CloseBracket).is_err());
    }
}
