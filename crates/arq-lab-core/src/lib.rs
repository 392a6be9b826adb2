pub mod chunk;
pub mod fault;
pub mod memory;
pub mod observer;
pub mod receiver;
pub mod sender;
pub mod trace;
pub mod transport;
pub mod udp;

#[cfg(test)]
mod testing;

pub use chunk::{read_chunks, split_payload};
pub use fault::FaultInjector;
pub use memory::MemoryTransport;
pub use observer::{RecordedEvent, RecordingObserver, TracingObserver};
pub use receiver::{DuplicatePolicy, ReceiveSummary, ReceiverEngine, ReceiverError, ReceiverState};
pub use sender::{SendSummary, SenderEngine, SenderError, SenderState};
pub use trace::TransferReport;
pub use transport::{RecvOutcome, Transport, TransportError};
pub use udp::UdpTransport;
