use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytemuck::Pod;
use log::error;

use super::Config;
use crate::net::codec::Reassembler;
use crate::net::protocol::CastError;
use crate::net::transport::{PacketSource, Receiver};
use crate::queue::{self, Consumer, Producer};

/// Reception pump: a receiver thread runs the reassembly state machine
/// against the socket, a render thread drains completed snapshots
/// latest-wins and invokes the injected callback with the newest one plus
/// how many arrivals were collapsed into it.
pub struct Taker {
    done: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
    render: Option<JoinHandle<()>>,
    drops: Arc<AtomicU64>,
}

impl Taker {
    pub fn start<S, F>(config: Config, mut on_frame: F) -> Result<Self, CastError>
    where
        S: Pod + Send + 'static,
        F: FnMut(f32, &S, usize) + Send + 'static,
    {
        config.validate()?;
        let source = Receiver::bind(config.port, config.recv_timeout)?;

        let (tx, mut rx) = queue::channel::<S>(config.queue_capacity);
        let done = Arc::new(AtomicBool::new(false));
        let drops = Arc::new(AtomicU64::new(0));
        let gate = Arc::new(Barrier::new(3));

        let receiver = {
            let done = Arc::clone(&done);
            let gate = Arc::clone(&gate);
            let drops = Arc::clone(&drops);
            let packet_size = config.packet_size;
            thread::spawn(move || {
                gate.wait();
                receive_loop(source, tx, done, drops, packet_size);
            })
        };

        let render = {
            let done = Arc::clone(&done);
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.wait();

                let mut last = Instant::now();
                while !done.load(Ordering::Relaxed) {
                    if let Some((state, coalesced)) = rx.drain_latest() {
                        let now = Instant::now();
                        let dt = now.duration_since(last).as_secs_f32();
                        last = now;
                        on_frame(dt, &state, coalesced);
                    }
                }
            })
        };

        gate.wait();

        Ok(Self {
            done,
            receiver: Some(receiver),
            render: Some(render),
            drops,
        })
    }

    /// Stops both threads and joins them in creation order. Idempotent; also
    /// runs on drop. The bounded receive timeout caps how long the receiver
    /// can take to notice the flag.
    pub fn stop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.render.take() {
            let _ = handle.join();
        }
    }

    /// Completed snapshots dropped because the render side had not drained
    /// the queue yet.
    pub fn dropped(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

impl Drop for Taker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Receiver-thread-only variant for hosts that poll from their own loop
/// instead of handing a render thread to the library.
pub struct ManualTaker<S> {
    done: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
    rx: Consumer<S>,
    drops: Arc<AtomicU64>,
}

impl<S: Pod + Send + 'static> ManualTaker<S> {
    pub fn start(config: Config) -> Result<Self, CastError> {
        config.validate()?;
        let source = Receiver::bind(config.port, config.recv_timeout)?;

        let (tx, rx) = queue::channel::<S>(config.queue_capacity);
        let done = Arc::new(AtomicBool::new(false));
        let drops = Arc::new(AtomicU64::new(0));
        let gate = Arc::new(Barrier::new(2));

        let receiver = {
            let done = Arc::clone(&done);
            let gate = Arc::clone(&gate);
            let drops = Arc::clone(&drops);
            let packet_size = config.packet_size;
            thread::spawn(move || {
                gate.wait();
                receive_loop(source, tx, done, drops, packet_size);
            })
        };

        gate.wait();

        Ok(Self {
            done,
            receiver: Some(receiver),
            rx,
            drops,
        })
    }

    /// Drains every pending snapshot, writes the newest into `out`, and
    /// returns how many were collapsed this poll. `out` is untouched when
    /// nothing arrived.
    pub fn get_state(&mut self, out: &mut S) -> usize {
        match self.rx.drain_latest() {
            Some((state, count)) => {
                *out = state;
                count
            }
            None => 0,
        }
    }

}

impl<S> ManualTaker<S> {
    pub fn stop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
    }

    pub fn dropped(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

impl<S> Drop for ManualTaker<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop<S, R>(
    mut source: R,
    mut tx: Producer<S>,
    done: Arc<AtomicBool>,
    drops: Arc<AtomicU64>,
    packet_size: usize,
) where
    S: Pod + Send + 'static,
    R: PacketSource,
{
    let mut reassembler: Reassembler<S> = Reassembler::new(packet_size);
    let mut buf = vec![0u8; packet_size];

    while !done.load(Ordering::Relaxed) {
        match source.receive(&mut buf) {
            Ok(Some(len)) => {
                if let Some(&state) = reassembler.submit(&buf[..len]) {
                    if !tx.try_push(state) {
                        drops.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            // timeout: nothing arrived inside the bound, just try again
            Ok(None) => {}
            Err(e) => {
                error!("receive failed: {e}");
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
