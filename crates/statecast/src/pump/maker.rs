use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytemuck::Pod;
use log::{debug, error};

use super::Config;
use crate::net::codec::FrameEncoder;
use crate::net::protocol::CastError;
use crate::net::transport::{Broadcaster, PacketSink};
use crate::queue::{self, Consumer};
use crate::timer::Timer;

/// Simulation pump: a producer thread ticks the injected update function and
/// queues snapshot copies; a sender thread drains the queue latest-wins and
/// broadcasts one wire frame per cycle that drained anything. Returned by
/// [`Maker::start`] as a handle whose `stop` joins both threads.
pub struct Maker {
    done: Arc<AtomicBool>,
    driver: Driver,
    sender: Option<JoinHandle<()>>,
    drops: Arc<AtomicU64>,
}

enum Driver {
    Timed(Timer),
    Uncapped(Option<JoinHandle<()>>),
}

impl Maker {
    /// Spawns the sender and producer threads. The sender is gated until the
    /// producer clock has been primed, so no frame can be encoded before the
    /// first update ran against a live timestamp.
    pub fn start<S, F>(config: Config, initial: S, mut on_update: F) -> Result<Self, CastError>
    where
        S: Pod + Send + 'static,
        F: FnMut(f32, &mut S) + Send + 'static,
    {
        config.validate()?;
        let broadcaster = Broadcaster::new(config.addr, config.port)?;

        let (mut tx, rx) = queue::channel::<S>(config.queue_capacity);
        let done = Arc::new(AtomicBool::new(false));
        let drops = Arc::new(AtomicU64::new(0));
        let gate = Arc::new(Barrier::new(2));

        let sender = {
            let done = Arc::clone(&done);
            let gate = Arc::clone(&gate);
            let packet_size = config.packet_size;
            thread::spawn(move || sender_loop(broadcaster, rx, done, gate, packet_size))
        };

        // Producer-side tick: measure dt, run the update, queue a copy.
        let mut state = initial;
        let mut last = Instant::now();
        let tick_drops = Arc::clone(&drops);
        let mut tick = move || {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f32();
            last = now;

            on_update(dt, &mut state);
            if !tx.try_push(state) {
                tick_drops.fetch_add(1, Ordering::Relaxed);
            }
        };

        // Clock primed; release the sender before the first tick can fire.
        gate.wait();

        let driver = if config.tick_period > 0.0 {
            Driver::Timed(Timer::start(
                Duration::from_secs_f32(config.tick_period),
                tick,
            ))
        } else {
            let done = Arc::clone(&done);
            Driver::Uncapped(Some(thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    tick();
                }
            })))
        };

        Ok(Self {
            done,
            driver,
            sender: Some(sender),
            drops,
        })
    }

    /// Stops both threads and joins them. Idempotent; also runs on drop.
    pub fn stop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        match &mut self.driver {
            Driver::Timed(timer) => timer.stop(),
            Driver::Uncapped(handle) => {
                if let Some(handle) = handle.take() {
                    let _ = handle.join();
                }
            }
        }
        if let Some(handle) = self.sender.take() {
            let _ = handle.join();
        }
    }

    /// Snapshots dropped because the handoff queue was full. Not an error;
    /// the sender only ever wanted the newest one anyway.
    pub fn dropped(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

impl Drop for Maker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sender_loop<S, K>(
    mut sink: K,
    mut rx: Consumer<S>,
    done: Arc<AtomicBool>,
    gate: Arc<Barrier>,
    packet_size: usize,
) where
    S: Pod + Send + 'static,
    K: PacketSink,
{
    gate.wait();

    let mut frame: u32 = 0;
    let mut datagram = vec![0u8; packet_size];

    while !done.load(Ordering::Relaxed) {
        // Keep only the newest queued snapshot; the frame counter advances
        // once per send cycle, so coalesced intermediates never reach the
        // wire with numbers of their own.
        let Some((state, coalesced)) = rx.drain_latest() else {
            continue;
        };

        let mut encoder = FrameEncoder::new(bytemuck::bytes_of(&state), frame, packet_size);
        while let Some(len) = encoder.produce_next(&mut datagram) {
            if let Err(e) = sink.send(&datagram[..len]) {
                error!("send failed for frame {frame}: {e}");
                break;
            }
        }

        debug!("sent frame {frame} ({coalesced} coalesced)");
        frame = frame.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    use crate::net::protocol::{HEADER_SIZE, split_datagram};

    #[derive(Clone, Default)]
    struct CaptureSink {
        datagrams: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl PacketSink for CaptureSink {
        fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
            self.datagrams.lock().unwrap().push(datagram.to_vec());
            Ok(datagram.len())
        }
    }

    #[test]
    fn sender_coalesces_and_numbers_frames_per_cycle() {
        let packet_size = HEADER_SIZE + 8;
        let (mut tx, rx) = queue::channel::<u64>(8);
        let done = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(Barrier::new(2));
        let sink = CaptureSink::default();
        let captured = Arc::clone(&sink.datagrams);

        // three snapshots queued before the sender runs a single cycle
        for value in [10u64, 11, 12] {
            assert!(tx.try_push(value));
        }

        let handle = {
            let done = Arc::clone(&done);
            let gate = Arc::clone(&gate);
            thread::spawn(move || sender_loop(sink, rx, done, gate, packet_size))
        };
        gate.wait();

        let deadline = Instant::now() + Duration::from_secs(2);
        while captured.lock().unwrap().is_empty() && Instant::now() < deadline {
            thread::yield_now();
        }
        done.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        let datagrams = captured.lock().unwrap();
        assert_eq!(datagrams.len(), 1, "one frame for three queued snapshots");

        let (header, payload) = split_datagram(&datagrams[0]).unwrap();
        assert_eq!(header.frame, 0);
        assert_eq!(header.part, 0);
        assert_eq!(payload, 12u64.to_le_bytes());
    }
}
