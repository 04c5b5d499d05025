use std::io::BufRead;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use clap::{Parser, Subcommand};

use statecast::{Config, Maker, ManualTaker, Taker};

/// 4000-byte demo snapshot: a tick counter, a checksum over the payload, and
/// a fill pattern derived from the tick so receivers can verify byte-for-byte
/// reassembly.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct DemoState {
    tick: u64,
    checksum: u64,
    data: [u8; 3984],
}

impl DemoState {
    fn advance(&mut self) {
        self.tick += 1;
        for (i, byte) in self.data.iter_mut().enumerate() {
            *byte = (self.tick as usize).wrapping_add(i) as u8;
        }
        self.checksum = fnv1a(&self.data);
    }

    fn verify(&self) -> bool {
        fnv1a(&self.data) == self.checksum
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[derive(Parser)]
#[command(name = "statecast-demo")]
#[command(about = "Broadcast a checksummed demo state from one maker to many takers")]
struct Args {
    #[command(subcommand)]
    role: Role,

    #[arg(long, default_value = "127.0.0.1", help = "Broadcast address")]
    addr: IpAddr,

    #[arg(short, long, default_value_t = statecast::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value_t = statecast::DEFAULT_PACKET_SIZE)]
    packet_size: usize,

    #[arg(
        short,
        long,
        default_value_t = 60.0,
        help = "Updates per second; 0 runs the simulation uncapped"
    )]
    rate: f32,

    #[arg(long, default_value_t = 200, help = "Receive timeout per attempt in ms")]
    timeout_ms: u64,
}

#[derive(Subcommand)]
enum Role {
    /// Run the simulation and broadcast snapshots
    Make,
    /// Receive snapshots and report them
    Take {
        #[arg(long, help = "Poll from the main loop instead of a render thread")]
        manual: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config {
        addr: args.addr,
        port: args.port,
        packet_size: args.packet_size,
        tick_period: if args.rate > 0.0 { 1.0 / args.rate } else { 0.0 },
        recv_timeout: Duration::from_millis(args.timeout_ms),
        ..Config::default()
    };

    log::info!(
        "addr:{} port:{} packet_size:{} rate:{} timeout_ms:{}",
        args.addr,
        args.port,
        args.packet_size,
        args.rate,
        args.timeout_ms
    );

    match args.role {
        Role::Make => run_maker(config),
        Role::Take { manual: false } => run_taker(config),
        Role::Take { manual: true } => run_manual_taker(config),
    }
}

fn run_maker(config: Config) -> Result<()> {
    let mut maker = Maker::start(config, DemoState::zeroed(), |_dt, state: &mut DemoState| {
        state.advance();
    })?;

    log::info!("broadcasting; press Enter to stop");
    wait_for_enter();

    maker.stop();
    log::info!("stopped after dropping {} stale snapshots", maker.dropped());
    Ok(())
}

fn run_taker(config: Config) -> Result<()> {
    let mut taker = Taker::start(config, |dt, state: &DemoState, coalesced| {
        if state.verify() {
            log::info!("tick:{} dt:{:.4} coalesced:{}", state.tick, dt, coalesced);
        } else {
            log::warn!("checksum mismatch at tick {}", state.tick);
        }
    })?;

    log::info!("receiving; press Enter to stop");
    wait_for_enter();

    taker.stop();
    log::info!("stopped after dropping {} undrained snapshots", taker.dropped());
    Ok(())
}

fn run_manual_taker(config: Config) -> Result<()> {
    let mut taker: ManualTaker<DemoState> = ManualTaker::start(config)?;

    log::info!("polling; press Enter to stop");
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let watcher = thread::spawn(move || {
        wait_for_enter();
        stop_flag.store(true, Ordering::SeqCst);
    });

    let mut state = DemoState::zeroed();
    while !stop.load(Ordering::SeqCst) {
        let coalesced = taker.get_state(&mut state);
        if coalesced > 0 {
            if state.verify() {
                log::info!("tick:{} coalesced:{}", state.tick, coalesced);
            } else {
                log::warn!("checksum mismatch at tick {}", state.tick);
            }
        }
        thread::sleep(Duration::from_millis(33));
    }

    taker.stop();
    watcher.join().ok();
    log::info!("stopped after dropping {} unpolled snapshots", taker.dropped());
    Ok(())
}

fn wait_for_enter() {
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}
