//! Wire format shared by data and acknowledgment packets.
//!
//! All multi-byte fields are big-endian.
//!
//! ```text
//!  offset  size  field             present when
//!  0       2     corruption flag   always
//!  2       2     length            always
//!  4       4     ack number        always
//!  8       4     sequence number   length > 8
//!  12      len-12 payload          length > 8
//! ```
//!
//! The corruption flag is not derived from the content. Zero means valid, any
//! other value marks the packet as damaged. A zero-length datagram carries no
//! header at all and is the CLOSE sentinel.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of an acknowledgment, which is also the shortest decodable datagram.
pub const ACK_LEN: usize = 8;
/// Header size of a data packet.
pub const DATA_HEADER_LEN: usize = 12;
/// Largest packet exchanged on the wire (header included).
pub const MAX_PACKET_LEN: usize = 512;
/// Payload capacity of a full-size data packet.
pub const MAX_PAYLOAD_LEN: usize = MAX_PACKET_LEN - DATA_HEADER_LEN;
/// Flag value written by [`WireFrame::mark_corrupted`].
pub const CORRUPTED_FLAG: u16 = 1;

const OFF_FLAG: usize = 0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {len} bytes is shorter than the 8-byte header")]
    TooShort { len: usize },
    #[error("length field {length} describes neither an ack nor a data packet")]
    InvalidLength { length: u16 },
    #[error("length field claims {length} bytes but only {received} arrived")]
    Truncated { length: u16, received: usize },
    #[error("payload of {len} bytes exceeds the 500-byte packet capacity")]
    PayloadTooLarge { len: usize },
}

impl PacketError {
    /// True for errors raised while decoding a datagram off the wire.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, PacketError::PayloadTooLarge { .. })
    }
}

/// A logical protocol unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Data { ack_no: u32, seq: u32, payload: Bytes },
    Ack { ack_no: u32 },
}

impl Packet {
    /// Build a data packet. The ack number mirrors `seq`.
    pub fn data(seq: u32, payload: impl Into<Bytes>) -> Result<Self, PacketError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLarge { len: payload.len() });
        }
        Ok(Packet::Data {
            ack_no: seq,
            seq,
            payload,
        })
    }

    pub fn ack(ack_no: u32) -> Self {
        Packet::Ack { ack_no }
    }

    pub fn ack_no(&self) -> u32 {
        match self {
            Packet::Data { ack_no, .. } | Packet::Ack { ack_no } => *ack_no,
        }
    }

    pub fn seq(&self) -> Option<u32> {
        match self {
            Packet::Data { seq, .. } => Some(*seq),
            Packet::Ack { .. } => None,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Packet::Data { payload, .. } => payload,
            Packet::Ack { .. } => &[],
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Packet::Ack { .. })
    }

    /// Value of the length field, i.e. the encoded size.
    pub fn wire_len(&self) -> u16 {
        match self {
            // Payload size is bounded by `Packet::data`.
            Packet::Data { payload, .. } => (DATA_HEADER_LEN + payload.len()) as u16,
            Packet::Ack { .. } => ACK_LEN as u16,
        }
    }

    /// Serialise into a frame with a clear corruption flag.
    pub fn encode(&self) -> WireFrame {
        let length = self.wire_len();
        let mut buf = BytesMut::with_capacity(usize::from(length));
        buf.put_u16(0);
        buf.put_u16(length);
        buf.put_u32(self.ack_no());
        if let Packet::Data { seq, payload, .. } = self {
            buf.put_u32(*seq);
            buf.put_slice(payload);
        }
        WireFrame { buf }
    }

    /// Parse a received datagram. The received length is `buf.len()`;
    /// bytes past the length field are ignored.
    pub fn decode(buf: &[u8]) -> Result<DecodedPacket, PacketError> {
        if buf.len() < ACK_LEN {
            return Err(PacketError::TooShort { len: buf.len() });
        }

        let mut header = buf;
        let corruption_flag = header.get_u16();
        let length = header.get_u16();
        let ack_no = header.get_u32();

        let packet = match usize::from(length) {
            ACK_LEN => Packet::Ack { ack_no },
            len if len >= DATA_HEADER_LEN => {
                if buf.len() < len {
                    return Err(PacketError::Truncated {
                        length,
                        received: buf.len(),
                    });
                }
                let seq = header.get_u32();
                Packet::Data {
                    ack_no,
                    seq,
                    payload: Bytes::copy_from_slice(&buf[DATA_HEADER_LEN..len]),
                }
            }
            _ => return Err(PacketError::InvalidLength { length }),
        };

        Ok(DecodedPacket {
            corruption_flag,
            length,
            packet,
        })
    }
}

/// Encode a data packet for chunk `seq`.
pub fn encode_data(payload: impl Into<Bytes>, seq: u32) -> Result<WireFrame, PacketError> {
    Ok(Packet::data(seq, payload)?.encode())
}

pub fn encode_ack(ack_no: u32) -> WireFrame {
    Packet::ack(ack_no).encode()
}

/// A packet as it arrived, flag included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    pub corruption_flag: u16,
    pub length: u16,
    pub packet: Packet,
}

impl DecodedPacket {
    pub fn is_valid(&self) -> bool {
        self.corruption_flag == 0
    }
}

/// Serialised bytes of one packet, ready for the transport.
///
/// The only mutation allowed after encoding is toggling the corruption flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    buf: BytesMut,
}

impl WireFrame {
    pub fn mark_corrupted(&mut self) {
        self.write_flag(CORRUPTED_FLAG);
    }

    pub fn clear_corruption(&mut self) {
        self.write_flag(0);
    }

    pub fn corruption_flag(&self) -> u16 {
        u16::from_be_bytes([self.buf[OFF_FLAG], self.buf[OFF_FLAG + 1]])
    }

    pub fn is_valid(&self) -> bool {
        self.corruption_flag() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn write_flag(&mut self, flag: u16) {
        self.buf[OFF_FLAG..OFF_FLAG + 2].copy_from_slice(&flag.to_be_bytes());
    }
}

impl AsRef<[u8]> for WireFrame {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}
