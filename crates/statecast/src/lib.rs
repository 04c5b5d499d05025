//! One-to-many distribution of a fixed-size simulation state over UDP
//! broadcast, favoring freshness over reliability: consumers converge on the
//! most recent snapshot instead of queuing stale ones.
//!
//! The producer side ([`Maker`]) ticks a user update function and broadcasts
//! each resulting snapshot as a numbered sequence of packets; consumer sides
//! ([`Taker`], [`ManualTaker`]) reassemble frames packet by packet, abandon
//! any frame a newer one interrupts, and hand the host only the newest
//! complete snapshot. Lost frames are simply skipped — there is no
//! retransmission and no backlog.
//!
//! State types must be plain old data ([`bytemuck::Pod`]) with a serialized
//! size that is constant for the session; the maker and its takers must
//! agree on the packet size and port.

pub mod net;
pub mod pump;
pub mod queue;
pub mod timer;

pub use net::{
    Broadcaster, CastError, DEFAULT_PACKET_SIZE, DEFAULT_PORT, FrameDecoder, FrameEncoder,
    HEADER_SIZE, PacketHeader, PacketSink, PacketSource, Reassembler, Receiver,
};
pub use pump::{Config, Maker, ManualTaker, Taker};
pub use timer::Timer;

// Re-export the traits state types need to derive.
pub use bytemuck::{Pod, Zeroable};
