use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use statecast::{Config, Maker, ManualTaker, Taker, Zeroable};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, PartialEq, statecast::Pod, statecast::Zeroable)]
#[repr(C)]
struct Blob {
    tick: u64,
    fill: [u8; 4000],
}

fn loopback_config(port: u16) -> Config {
    Config {
        port,
        tick_period: 1.0 / 200.0,
        recv_timeout: Duration::from_millis(20),
        ..Config::default()
    }
}

fn counting_maker(port: u16) -> Maker {
    Maker::start(loopback_config(port), Blob::zeroed(), |_dt, state: &mut Blob| {
        state.tick += 1;
        state.fill = [(state.tick % 251) as u8; 4000];
    })
    .unwrap()
}

#[test]
fn maker_to_manual_taker() {
    let port = next_port();
    let mut taker: ManualTaker<Blob> = ManualTaker::start(loopback_config(port)).unwrap();
    let mut maker = counting_maker(port);

    let mut state = Blob::zeroed();
    let mut collapsed = 0;
    let deadline = Instant::now() + Duration::from_secs(5);
    while state.tick == 0 && Instant::now() < deadline {
        collapsed = taker.get_state(&mut state);
        thread::sleep(Duration::from_millis(5));
    }

    maker.stop();
    taker.stop();

    assert!(state.tick > 0, "never received a complete snapshot");
    assert!(collapsed >= 1);
    assert_eq!(state.fill[0], (state.tick % 251) as u8);
    assert_eq!(state.fill[3999], (state.tick % 251) as u8);
}

#[test]
fn maker_to_taker_callback() {
    let port = next_port();
    let (delivered_tx, delivered_rx) = mpsc::channel::<(Blob, usize)>();

    let mut taker = Taker::start(loopback_config(port), move |_dt, state: &Blob, count| {
        let _ = delivered_tx.send((*state, count));
    })
    .unwrap();
    let mut maker = counting_maker(port);

    let (state, count) = delivered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("no snapshot delivered");

    maker.stop();
    taker.stop();

    assert!(state.tick > 0);
    assert!(count >= 1);
    assert_eq!(state.fill[1234], (state.tick % 251) as u8);
}

#[test]
fn snapshots_only_move_forward() {
    let port = next_port();
    let mut taker: ManualTaker<Blob> = ManualTaker::start(loopback_config(port)).unwrap();
    let mut maker = counting_maker(port);

    let mut state = Blob::zeroed();
    let mut last_tick = 0;
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut observed = 0;
    while observed < 5 && Instant::now() < deadline {
        if taker.get_state(&mut state) > 0 {
            assert!(state.tick > last_tick, "state went backwards");
            last_tick = state.tick;
            observed += 1;
        }
        thread::sleep(Duration::from_millis(5));
    }

    maker.stop();
    taker.stop();

    assert!(observed >= 2, "too few snapshots came through");
}

#[test]
fn shutdown_is_idempotent_and_stops_callbacks() {
    let port = next_port();
    let updates = Arc::new(AtomicU64::new(0));
    let frames = Arc::new(AtomicU64::new(0));

    let update_count = Arc::clone(&updates);
    let mut maker = Maker::start(
        loopback_config(port),
        Blob::zeroed(),
        move |_dt, state: &mut Blob| {
            state.tick += 1;
            update_count.fetch_add(1, Ordering::SeqCst);
        },
    )
    .unwrap();

    let frame_count = Arc::clone(&frames);
    let mut taker = Taker::start(loopback_config(port), move |_dt, _state: &Blob, _count| {
        frame_count.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    thread::sleep(Duration::from_millis(100));

    maker.stop();
    maker.stop();
    taker.stop();
    taker.stop();

    let updates_after = updates.load(Ordering::SeqCst);
    let frames_after = frames.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));

    assert_eq!(updates.load(Ordering::SeqCst), updates_after);
    assert_eq!(frames.load(Ordering::SeqCst), frames_after);
}

#[test]
fn uncapped_rate_runs_flat_out() {
    let port = next_port();
    let config = Config {
        tick_period: 0.0,
        ..loopback_config(port)
    };

    let updates = Arc::new(AtomicU64::new(0));
    let update_count = Arc::clone(&updates);
    let mut maker = Maker::start(config, Blob::zeroed(), move |_dt, state: &mut Blob| {
        state.tick += 1;
        update_count.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    thread::sleep(Duration::from_millis(50));
    maker.stop();

    // a 200 Hz timer could only manage ~10 ticks in 50ms
    assert!(updates.load(Ordering::SeqCst) > 100);
}
