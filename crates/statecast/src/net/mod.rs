pub mod codec;
pub mod protocol;
pub mod transport;

pub use codec::{FrameDecoder, FrameEncoder, Reassembler};
pub use protocol::{
    CastError, DEFAULT_PACKET_SIZE, DEFAULT_PORT, HEADER_SIZE, PacketHeader, parts_for,
    split_datagram,
};
pub use transport::{Broadcaster, PacketSink, PacketSource, Receiver};
