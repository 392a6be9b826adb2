pub mod config;
pub mod interface;
pub mod packet;

pub use config::{ArqConfig, ArqConfigOverride, ConfigError};
pub use interface::{AckRejection, OutputSink, SendOutcome, TransferEvent, TransferObserver};
pub use packet::{DecodedPacket, Packet, PacketError, WireFrame, encode_ack, encode_data};
