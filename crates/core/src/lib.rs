pub mod error;
pub mod media;
pub mod receiver;
pub mod sender;
pub mod source;
pub mod transport;

pub use error::{Result, RtpError};
pub use media::h264::{H264Payload, NalType, NalUnit};
pub use media::rtp::{RtpHeader, RtpPacket};
pub use receiver::{Receiver, ReceiverConfig, ReceiverHandle, ReceiverStats};
pub use sender::{SendSummary, Sender, SenderConfig};
pub use source::{AnnexBChunkSource, ChunkSource, ReaderChunkSource};
pub use transport::{Transport, UdpTransport};
