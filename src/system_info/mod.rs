//! System-Load Snapshot (spec component F).
//!
//! A periodic sampler reading `/proc/stat` and `/proc/meminfo` (falling
//! back to a cgroup-aware read when running containerized, the way
//! `Devolutions-devolutions-gateway`'s infra crates read cgroup files for
//! container-aware limits) and keeping a bounded ring-buffer history. No
//! teacher module samples system load directly; the periodic-interval loop
//! shape itself is grounded on `browser_pool/mod.rs`'s `scaler_loop`.

mod reader;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use reader::{
    read_cgroup_cpu_sample, read_cgroup_memory_sample, read_cpu_sample, read_memory_sample,
    CgroupCpuSample, CpuSample,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemInfoSample {
    pub timestamp: SystemTime,
    pub cpu_usage_ratio: f64,
    pub memory_usage_ratio: f64,
}

impl SystemInfoSample {
    pub fn is_cpu_overloaded(&self, threshold: f64) -> bool {
        self.cpu_usage_ratio >= threshold
    }

    pub fn is_memory_overloaded(&self, threshold: f64) -> bool {
        self.memory_usage_ratio >= threshold
    }

    pub fn is_overloaded(&self, cpu_threshold: f64, memory_threshold: f64) -> bool {
        self.is_cpu_overloaded(cpu_threshold) || self.is_memory_overloaded(memory_threshold)
    }
}

/// Maintains a bounded history of [`SystemInfoSample`]s, refreshed by a
/// caller-driven `sample()` call (typically on a `tokio::time::interval`
/// owned by the autoscaled pool or event bus).
pub struct SystemStatus {
    history: Mutex<VecDeque<SystemInfoSample>>,
    history_len: usize,
    previous_cpu: Mutex<Option<CpuSample>>,
    previous_cgroup_cpu: Mutex<Option<(CgroupCpuSample, std::time::Instant)>>,
}

impl SystemStatus {
    pub fn new(history_len: usize) -> Arc<Self> {
        Arc::new(Self {
            history: Mutex::new(VecDeque::with_capacity(history_len)),
            history_len,
            previous_cpu: Mutex::new(None),
            previous_cgroup_cpu: Mutex::new(None),
        })
    }

    /// Takes a fresh sample and pushes it onto the history, evicting the
    /// oldest entry if `history_len` is exceeded. Prefers cgroup v1/v2
    /// accounting when the process is running inside a cgroup-confined
    /// container (spec.md §4.4), falling back to the host-wide
    /// `/proc/stat`/`/proc/meminfo` reading otherwise.
    pub fn sample(&self) -> SystemInfoSample {
        let cpu_usage_ratio = self.sample_cpu();
        let memory_usage_ratio = read_cgroup_memory_sample().unwrap_or_else(|| read_memory_sample().unwrap_or(0.0));

        let sample = SystemInfoSample {
            timestamp: SystemTime::now(),
            cpu_usage_ratio,
            memory_usage_ratio,
        };

        let mut history = self.history.lock();
        if history.len() >= self.history_len {
            history.pop_front();
        }
        history.push_back(sample);
        sample
    }

    fn sample_cpu(&self) -> f64 {
        if let Some(cgroup_now) = read_cgroup_cpu_sample() {
            let now = std::time::Instant::now();
            let mut previous = self.previous_cgroup_cpu.lock();
            let ratio = match *previous {
                Some((prev_sample, prev_at)) => cgroup_now.usage_ratio_since(&prev_sample, now.duration_since(prev_at)),
                None => 0.0,
            };
            *previous = Some((cgroup_now, now));
            return ratio;
        }

        let cpu_now = read_cpu_sample();
        let mut previous = self.previous_cpu.lock();
        let ratio = match (*previous, cpu_now) {
            (Some(prev), Some(now)) => now.usage_ratio_since(&prev),
            _ => 0.0,
        };
        *previous = cpu_now;
        ratio
    }

    pub fn latest(&self) -> Option<SystemInfoSample> {
        self.history.lock().back().copied()
    }

    pub fn history(&self) -> Vec<SystemInfoSample> {
        self.history.lock().iter().copied().collect()
    }

    /// Mean CPU/memory usage over the retained history — what the
    /// autoscaled pool's scaler reads to smooth out single-sample noise.
    pub fn mean(&self) -> Option<SystemInfoSample> {
        let history = self.history.lock();
        if history.is_empty() {
            return None;
        }
        let len = history.len() as f64;
        let cpu = history.iter().map(|s| s.cpu_usage_ratio).sum::<f64>() / len;
        let mem = history.iter().map(|s| s.memory_usage_ratio).sum::<f64>() / len;
        Some(SystemInfoSample {
            timestamp: SystemTime::now(),
            cpu_usage_ratio: cpu,
            memory_usage_ratio: mem,
        })
    }
}

/// Drives `status.sample()` on a fixed interval until `cancel` fires.
pub async fn run_sampler(
    status: Arc<SystemStatus>,
    interval: Duration,
    cancel: crate::cancellation::CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                status.sample();
            }
            _ = cancel.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let status = SystemStatus::new(3);
        for _ in 0..10 {
            status.sample();
        }
        assert_eq!(status.history().len(), 3);
    }

    #[test]
    fn overload_thresholds_compare_correctly() {
        let sample = SystemInfoSample {
            timestamp: SystemTime::now(),
            cpu_usage_ratio: 0.97,
            memory_usage_ratio: 0.5,
        };
        assert!(sample.is_overloaded(0.95, 0.9));
        assert!(!sample.is_overloaded(0.99, 0.9));
    }
}
