//! Dispatcher worker thread
//!
//! Runs a `Dispatcher` on a dedicated thread. Frames arrive over a bounded
//! crossbeam channel; routed words leave through the egress queues, whose
//! drains are handed back to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use tracing::{debug, info};

use crate::config::ConfigRegisters;
use crate::error::{DispatchError, Result};

use super::dispatch::{Dispatcher, EgressDrains, FrameFeeder};
use super::frame::Frame;
use super::stats::DispatchStats;

/// How long an idle worker waits for a frame before checking for shutdown
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Frames pulled from the channel ahead of the one in flight
const PREFETCH_FRAMES: usize = 2;

/// Configuration for a worker thread
pub struct WorkerConfig {
    /// Thread name
    pub name: String,
    /// Live configuration registers
    pub registers: Arc<ConfigRegisters>,
    /// Depth of each egress queue in words
    pub queue_depth: usize,
    /// Ingress frames
    pub frames: Receiver<Frame>,
}

/// Handle to a running dispatcher worker
pub struct WorkerHandle {
    /// Worker thread join handle
    thread: Option<JoinHandle<()>>,
    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
    stats: Arc<DispatchStats>,
    pub name: String,
}

impl WorkerHandle {
    /// Signal the worker to stop
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> std::result::Result<(), String> {
        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| "Worker thread panicked".to_string())
        } else {
            Ok(())
        }
    }

    /// Check if the worker is still running
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn a dispatcher thread.
///
/// The worker exits when stopped, or once the frame channel is
/// disconnected and every accepted frame has left the dispatcher.
pub fn spawn_dispatcher(config: WorkerConfig) -> Result<(WorkerHandle, EgressDrains)> {
    let (dispatcher, drains) = Dispatcher::with_queues(config.registers, config.queue_depth);
    let stats = Arc::clone(dispatcher.stats());
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let name = config.name;
    let frames = config.frames;

    let thread = thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_worker(dispatcher, frames, shutdown_clone))
        .map_err(|e| DispatchError::WorkerSpawn(e.to_string()))?;

    Ok((
        WorkerHandle {
            thread: Some(thread),
            shutdown,
            stats,
            name,
        },
        drains,
    ))
}

fn run_worker(mut dispatcher: Dispatcher, frames: Receiver<Frame>, shutdown: Arc<AtomicBool>) {
    info!("Dispatcher worker started");

    let mut feeder = FrameFeeder::new();
    let mut disconnected = false;

    while !shutdown.load(Ordering::Relaxed) {
        if feeder.is_empty() && dispatcher.is_idle() {
            if disconnected {
                break;
            }
            match frames.recv_timeout(IDLE_POLL) {
                Ok(frame) => feeder.push(frame),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    continue;
                }
            }
        }

        while !disconnected && feeder.pending() < PREFETCH_FRAMES {
            match frames.try_recv() {
                Ok(frame) => feeder.push(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => disconnected = true,
            }
        }

        if !dispatcher.step(&mut feeder) {
            // Waiting on a consumer, replaying the header or draining the last frame
            thread::yield_now();
        }
    }

    let stats = dispatcher.stats().snapshot();
    debug!(?stats, "Final dispatcher statistics");
    info!(frames = stats.frames(), "Dispatcher worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::packets::{
        LOCAL_IP, LOCAL_MAC, REMOTE_IP, REMOTE_MAC, SERVICE_PORT, test_config, udp_frame,
    };

    fn worker(depth: usize) -> (WorkerHandle, EgressDrains, crossbeam_channel::Sender<Frame>) {
        let (tx, rx) = crossbeam_channel::bounded(16);
        let (handle, drains) = spawn_dispatcher(WorkerConfig {
            name: "dispatch-test".to_string(),
            registers: Arc::new(ConfigRegisters::new(test_config())),
            queue_depth: depth,
            frames: rx,
        })
        .unwrap();
        (handle, drains, tx)
    }

    #[test]
    fn test_worker_routes_and_exits_on_disconnect() {
        let (handle, mut drains, tx) = worker(1024);

        let slow = udp_frame(LOCAL_MAC, REMOTE_MAC, REMOTE_IP, LOCAL_IP, 53, &[1; 16]);
        let fast = udp_frame(LOCAL_MAC, REMOTE_MAC, REMOTE_IP, LOCAL_IP, SERVICE_PORT, &[2; 16]);
        let foreign = udp_frame(REMOTE_MAC, LOCAL_MAC, LOCAL_IP, REMOTE_IP, 53, &[3; 16]);
        for bytes in [&slow, &fast, &foreign] {
            tx.send(Frame::from_ethernet(bytes, 0)).unwrap();
        }
        drop(tx);

        let stats = Arc::clone(handle.stats());
        handle.join().unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.slow, 1);
        assert_eq!(snap.fast, 1);
        assert_eq!(snap.dropped, 1);

        let slow_out = drains.slow.drain_frames();
        let fast_out = drains.fast.drain_frames();
        assert_eq!(slow_out.len(), 1);
        assert_eq!(slow_out[0].to_ethernet(), slow);
        assert_eq!(fast_out.len(), 1);
        assert_eq!(fast_out[0].to_ethernet(), fast);
        assert!(drains.other.drain_frames().is_empty());
    }

    #[test]
    fn test_worker_stop() {
        let (handle, _drains, _tx) = worker(64);
        assert!(handle.is_running());
        handle.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_worker_stops_while_blocked_on_last_frame() {
        let (handle, mut drains, tx) = worker(4);
        let frame = udp_frame(LOCAL_MAC, REMOTE_MAC, REMOTE_IP, LOCAL_IP, 53, &[5; 64]);
        tx.send(Frame::from_ethernet(&frame, 0)).unwrap();

        // Nobody drains: the last frame sits in the dispatcher with the feeder empty
        while handle.stats().snapshot().stall_ticks == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.is_running());
        assert!(drains.slow.drain_frames().is_empty());

        handle.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_worker_with_slow_consumer() {
        let (handle, mut drains, tx) = worker(4);
        let frame = udp_frame(LOCAL_MAC, REMOTE_MAC, REMOTE_IP, LOCAL_IP, 53, &[7; 100]);

        let consumer = std::thread::spawn(move || {
            let mut frames = Vec::new();
            while frames.len() < 5 {
                frames.extend(drains.slow.drain_frames());
                std::thread::sleep(Duration::from_micros(50));
            }
            frames
        });

        for _ in 0..5 {
            tx.send(Frame::from_ethernet(&frame, 0)).unwrap();
        }
        drop(tx);

        let out = consumer.join().unwrap();
        handle.join().unwrap();
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|f| f.to_ethernet() == frame));
    }
}
