//! Synthetic CPU load
//!
//! Spawns named threads that alternate a busy spin with a short sleep, so a
//! sampler pointed at the current process has something to measure. Threads
//! stop and are joined when the [`SpinLoad`] is dropped.

use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Busy iterations per spin burst
pub const SPIN_ITER: u64 = 500_000;

/// Sleep between spin bursts
pub const SPIN_PAUSE: Duration = Duration::from_millis(100);

/// A set of running spin threads named `spin0`, `spin1`, ...
#[derive(Debug)]
pub struct SpinLoad {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl SpinLoad {
    /// Start `count` spin threads
    pub fn spawn(count: usize) -> std::io::Result<Self> {
        Self::spawn_with(count, SPIN_ITER, SPIN_PAUSE)
    }

    /// Start `count` spin threads with a custom burst length and pause
    ///
    /// Returns once every thread is running under its own name.
    pub fn spawn_with(count: usize, iterations: u64, pause: Duration) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let mut load = Self {
            running: Arc::clone(&running),
            handles: Vec::with_capacity(count),
        };

        let (ready_tx, ready_rx) = mpsc::channel();
        for i in 0..count {
            let running = Arc::clone(&running);
            let ready = ready_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("spin{}", i))
                .spawn(move || {
                    // The kernel name is set before this closure runs
                    let _ = ready.send(());
                    spin(&running, iterations, pause)
                })?;
            load.handles.push(handle);
        }
        drop(ready_tx);

        // Until every thread is named, a capture would see the parent's name
        for _ in 0..count {
            if ready_rx.recv().is_err() {
                break;
            }
        }

        debug!(threads = count, "spin load started");
        Ok(load)
    }

    /// Number of spin threads
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop all threads and wait for them to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("spin thread panicked");
            }
        }
    }
}

impl Drop for SpinLoad {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spin(running: &AtomicBool, iterations: u64, pause: Duration) {
    while running.load(Ordering::Relaxed) {
        let mut acc = 0u64;
        for i in 0..iterations {
            acc = black_box(acc.wrapping_add(i));
        }
        black_box(acc);
        thread::sleep(pause);
    }
}
