use bytemuck::{Pod, Zeroable};
use log::{debug, warn};

use super::protocol::{HEADER_SIZE, PacketHeader, parts_for, split_datagram};

/// Splits one state snapshot into an ordered sequence of datagrams.
///
/// Constructed once per frame. Each `produce_next` call fills the caller's
/// datagram buffer with the header and the next payload chunk and returns the
/// datagram length, or `None` once every part has been emitted.
pub struct FrameEncoder<'a> {
    state: &'a [u8],
    frame: u32,
    capacity: usize,
    next_part: u32,
    offset: usize,
}

impl<'a> FrameEncoder<'a> {
    pub fn new(state: &'a [u8], frame: u32, packet_size: usize) -> Self {
        assert!(packet_size > HEADER_SIZE);
        Self {
            state,
            frame,
            capacity: packet_size - HEADER_SIZE,
            next_part: 0,
            offset: 0,
        }
    }

    pub fn total_parts(&self) -> u32 {
        parts_for(self.state.len(), self.capacity + HEADER_SIZE)
    }

    pub fn produce_next(&mut self, datagram: &mut [u8]) -> Option<usize> {
        if self.offset >= self.state.len() {
            return None;
        }

        let chunk = self.capacity.min(self.state.len() - self.offset);
        PacketHeader::new(self.frame, self.next_part).write(datagram);
        datagram[HEADER_SIZE..HEADER_SIZE + chunk]
            .copy_from_slice(&self.state[self.offset..self.offset + chunk]);

        self.offset += chunk;
        self.next_part += 1;
        Some(HEADER_SIZE + chunk)
    }
}

/// Per-frame reassembly bookkeeping. Holds no buffer itself; the caller
/// passes the staging buffer to `consume` so the decoder can sit next to the
/// state it fills.
pub struct FrameDecoder {
    frame: u32,
    capacity: usize,
    state_len: usize,
    total_parts: u32,
    received: u32,
}

impl FrameDecoder {
    pub fn new(state_len: usize, frame: u32, packet_size: usize) -> Self {
        assert!(packet_size > HEADER_SIZE);
        Self {
            frame,
            capacity: packet_size - HEADER_SIZE,
            state_len,
            total_parts: parts_for(state_len, packet_size),
            received: 0,
        }
    }

    /// Copies one packet's payload into place. Returns `false` without
    /// touching `target` when the packet belongs to a different frame (the
    /// desync signal) or does not fit the expected layout.
    pub fn consume(&mut self, target: &mut [u8], header: PacketHeader, payload: &[u8]) -> bool {
        if header.frame != self.frame || header.part >= self.total_parts {
            return false;
        }

        let offset = header.part as usize * self.capacity;
        let expected = self.capacity.min(self.state_len - offset);
        if payload.len() != expected {
            return false;
        }

        target[offset..offset + expected].copy_from_slice(payload);
        self.received += 1;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.received >= self.total_parts
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn received_parts(&self) -> u32 {
        self.received
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }
}

/// Receive-side state machine: idle until a part-0 packet starts a frame,
/// then assembling until the frame completes or a packet from another frame
/// aborts it. At most one partial frame is ever held; a frame that cannot
/// finish before the next one starts is abandoned, never buffered.
pub struct Reassembler<S> {
    staging: S,
    packet_size: usize,
    progress: Option<FrameDecoder>,
}

impl<S: Pod> Reassembler<S> {
    pub fn new(packet_size: usize) -> Self {
        assert!(packet_size > HEADER_SIZE);
        Self {
            staging: S::zeroed(),
            packet_size,
            progress: None,
        }
    }

    /// Feeds one received datagram through the state machine. Returns the
    /// assembled snapshot when this datagram completes a frame. Malformed
    /// datagrams and parts arriving while idle (other than part 0) are
    /// dropped.
    pub fn submit(&mut self, datagram: &[u8]) -> Option<&S> {
        let Ok((header, payload)) = split_datagram(datagram) else {
            return None;
        };

        loop {
            if let Some(mut decoder) = self.progress.take() {
                if decoder.consume(bytemuck::bytes_of_mut(&mut self.staging), header, payload) {
                    if decoder.is_complete() {
                        debug!("assembled frame {}", decoder.frame());
                        return Some(&self.staging);
                    }
                    self.progress = Some(decoder);
                    return None;
                }

                warn!(
                    "aborting frame {} ({}/{} parts) on frame {} part {}",
                    decoder.frame(),
                    decoder.received_parts(),
                    decoder.total_parts(),
                    header.frame,
                    header.part
                );
                // re-evaluate the offending packet as a possible frame start
                continue;
            }

            if header.part != 0 {
                return None;
            }

            let mut decoder =
                FrameDecoder::new(std::mem::size_of::<S>(), header.frame, self.packet_size);
            if !decoder.consume(bytemuck::bytes_of_mut(&mut self.staging), header, payload) {
                return None;
            }
            if decoder.is_complete() {
                debug!("assembled frame {}", decoder.frame());
                return Some(&self.staging);
            }
            self.progress = Some(decoder);
            return None;
        }
    }
}
