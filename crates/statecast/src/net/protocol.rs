use std::io;

pub const HEADER_SIZE: usize = 8;
pub const DEFAULT_PACKET_SIZE: usize = 1400;
pub const DEFAULT_PORT: u16 = 63059;
pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 200;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Wire header preceding every datagram payload. Fixed little-endian layout,
/// no magic or version negotiation: `frame` identifies the snapshot, `part`
/// its position in the snapshot's packet sequence. Part 0 always marks the
/// start of a frame; the total part count is implicit in the state size and
/// never transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub frame: u32,
    pub part: u32,
}

impl PacketHeader {
    pub fn new(frame: u32, part: u32) -> Self {
        Self { frame, part }
    }

    pub fn write(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.frame.to_le_bytes());
        buf[4..8].copy_from_slice(&self.part.to_le_bytes());
    }

    pub fn parse(buf: &[u8]) -> Result<Self, CastError> {
        if buf.len() < HEADER_SIZE {
            return Err(CastError::TruncatedHeader(buf.len()));
        }
        Ok(Self {
            frame: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            part: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
        })
    }
}

/// Splits a received datagram into its header and payload bytes.
pub fn split_datagram(datagram: &[u8]) -> Result<(PacketHeader, &[u8]), CastError> {
    let header = PacketHeader::parse(datagram)?;
    Ok((header, &datagram[HEADER_SIZE..]))
}

/// Number of packets needed to carry `state_len` bytes at the given packet
/// size budget.
pub fn parts_for(state_len: usize, packet_size: usize) -> u32 {
    let capacity = packet_size - HEADER_SIZE;
    (state_len.div_ceil(capacity)) as u32
}

#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("packet size {0} leaves no payload room ({HEADER_SIZE}-byte header)")]
    PacketTooSmall(usize),
    #[error("datagram too short for header: {0} bytes")]
    TruncatedHeader(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = PacketHeader::new(7, 2);
        let mut buf = [0u8; HEADER_SIZE];
        header.write(&mut buf);

        assert_eq!(PacketHeader::parse(&buf).unwrap(), header);
    }

    #[test]
    fn header_layout_is_little_endian() {
        let mut buf = [0u8; HEADER_SIZE];
        PacketHeader::new(0x0102_0304, 1).write(&mut buf);

        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn truncated_header_rejected() {
        assert!(matches!(
            PacketHeader::parse(&[0u8; 4]),
            Err(CastError::TruncatedHeader(4))
        ));
    }

    #[test]
    fn part_count() {
        // 1392-byte payload capacity at the default packet size
        assert_eq!(parts_for(4000, 1400), 3);
        assert_eq!(parts_for(1392, 1400), 1);
        assert_eq!(parts_for(1393, 1400), 2);
        assert_eq!(parts_for(2784, 1400), 2);
    }
}
