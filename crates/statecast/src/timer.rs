//! Fixed-rate callback driver on a dedicated thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Invokes a callback every `period` on its own thread until stopped.
///
/// Scheduling is deadline-based: each tick's deadline advances by exactly one
/// period, and after a stall the schedule resets instead of bursting to catch
/// up. `stop` joins the thread, so no callback runs after it returns.
pub struct Timer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn start<F>(period: Duration, mut callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let mut deadline = Instant::now() + period;
            while !stop_flag.load(Ordering::Relaxed) {
                callback();

                let now = Instant::now();
                if let Some(remaining) = deadline.checked_duration_since(now) {
                    thread::sleep(remaining);
                    deadline += period;
                } else {
                    // fell behind; restart the schedule from here
                    deadline = now + period;
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the timer and waits for the driving thread to exit. Safe to call
    /// from any thread and more than once.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
