//! Engine metrics — counters plus process statistics.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, System};

/// Engine-level metrics counters.
pub struct EngineMetrics {
    /// Total connections ever accepted.
    pub connections_total: AtomicU64,
    /// Connections currently open.
    pub connections_active: AtomicU64,
    /// Total frames received from clients.
    pub messages_received: AtomicU64,
    /// Total frames delivered to clients.
    pub messages_sent: AtomicU64,
    /// Frames dropped on full send buffers.
    pub messages_dropped: AtomicU64,
    /// Envelopes published to the fan-out bridge.
    pub bridge_published: AtomicU64,
    /// Envelopes received from other instances.
    pub bridge_received: AtomicU64,
    /// Process inspector for memory/cpu readings.
    sampler: Mutex<ProcessSampler>,
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics")
            .field("connections_active", &self.connections_active)
            .field("messages_sent", &self.messages_sent)
            .finish()
    }
}

impl EngineMetrics {
    /// Create new zeroed metrics.
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            bridge_published: AtomicU64::new(0),
            bridge_received: AtomicU64::new(0),
            sampler: Mutex::new(ProcessSampler::new()),
        }
    }

    /// Record an accepted connection.
    pub fn record_connected(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed connection.
    pub fn record_disconnected(&self) {
        // Saturating: a reaped row recovered at startup never went through
        // record_connected on this process.
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Record a frame received from a client.
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame delivered to a client.
    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame dropped on a full buffer.
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an envelope published to the bridge.
    pub fn record_bridge_published(&self) {
        self.bridge_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an envelope received from the bridge.
    pub fn record_bridge_received(&self) {
        self.bridge_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            bridge_published: self.bridge_published.load(Ordering::Relaxed),
            bridge_received: self.bridge_received.load(Ordering::Relaxed),
        }
    }

    /// Sample memory and cpu usage of this process.
    pub fn process_stats(&self) -> ProcessStats {
        match self.sampler.lock() {
            Ok(mut sampler) => sampler.sample(),
            Err(poisoned) => poisoned.into_inner().sample(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable counter snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total connections ever accepted.
    pub connections_total: u64,
    /// Connections currently open.
    pub connections_active: u64,
    /// Total frames received from clients.
    pub messages_received: u64,
    /// Total frames delivered to clients.
    pub messages_sent: u64,
    /// Frames dropped on full buffers.
    pub messages_dropped: u64,
    /// Envelopes published to the bridge.
    pub bridge_published: u64,
    /// Envelopes received from other instances.
    pub bridge_received: u64,
}

/// Memory and cpu usage of the server process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProcessStats {
    /// Resident memory in bytes.
    pub memory_bytes: u64,
    /// CPU usage in percent (all cores summed).
    pub cpu_percent: f32,
}

/// Samples this process via sysinfo.
struct ProcessSampler {
    system: System,
    pid: Option<Pid>,
}

impl ProcessSampler {
    fn new() -> Self {
        Self {
            system: System::new_all(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Refresh and read memory/cpu for our own pid.
    ///
    /// CPU usage is measured between successive refreshes, so the first
    /// sample after startup reads zero.
    fn sample(&mut self) -> ProcessStats {
        self.system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new().with_cpu().with_memory(),
        );

        let Some(process) = self.pid.and_then(|pid| self.system.process(pid)) else {
            return ProcessStats {
                memory_bytes: 0,
                cpu_percent: 0.0,
            };
        };

        ProcessStats {
            memory_bytes: process.memory(),
            cpu_percent: process.cpu_usage(),
        }
    }
}
