//! Resource Monitor (C1): samples host CPU/memory and turns it into a
//! worker-count recommendation and a throttle signal for the scheduler.

use std::collections::VecDeque;
use sysinfo::System;

use crate::sync::Mutex;

const HISTORY_CAPACITY: usize = 100;
const THROTTLE_THRESHOLD: f64 = 0.85;
const LOW_LOAD_THRESHOLD: f64 = 0.3;
const HIGH_LOAD_THRESHOLD: f64 = 0.7;

/// Samples CPU/memory load and derives scheduling hints from it.
///
/// Combined load is `(cpu_percent + mem_percent) / 200.0`, kept in a
/// bounded ring of at most 100 samples. OS sampling failures are swallowed;
/// the monitor simply keeps reporting its last known value rather than
/// erroring the scheduling loop.
pub struct ResourceMonitor {
    sys: Mutex<System>,
    history: Mutex<VecDeque<f64>>,
    last_load: Mutex<f64>,
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMonitor {
    /// Create a monitor with an empty history and a conservative initial
    /// load estimate of `0.0`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            last_load: Mutex::new(0.0),
        }
    }

    /// Observe current CPU% and memory% and append the combined load to
    /// the bounded history. Returns the freshly observed load.
    pub fn sample(&self) -> f64 {
        let mut sys = self.sys.lock();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpus = sys.cpus();
        let cpu_percent = if cpus.is_empty() {
            // No CPUs reported by the OS sampler: fall back to the last
            // known combined load rather than treating it as zero load.
            (*self.last_load.lock() * 200.0).clamp(0.0, 100.0)
        } else {
            let sum: f32 = cpus.iter().map(sysinfo::Cpu::cpu_usage).sum();
            f64::from(sum / cpus.len() as f32)
        };

        let total_mem = sys.total_memory();
        let mem_percent = if total_mem == 0 {
            0.0
        } else {
            (sys.used_memory() as f64 / total_mem as f64) * 100.0
        };

        let load = ((cpu_percent + mem_percent) / 200.0).clamp(0.0, 1.0);
        drop(sys);

        *self.last_load.lock() = load;
        let mut history = self.history.lock();
        if history.len() >= HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(load);
        load
    }

    /// Mean of the recorded load history, or the last known load if no
    /// samples have been taken yet.
    #[must_use]
    pub fn mean_load(&self) -> f64 {
        let history = self.history.lock();
        if history.is_empty() {
            return *self.last_load.lock();
        }
        history.iter().sum::<f64>() / history.len() as f64
    }

    /// Recommended worker count given `base`: doubled under light load
    /// (<0.3 mean), unchanged under moderate load (<0.7), halved (floor 1)
    /// under heavy load.
    #[must_use]
    pub fn optimal_workers(&self, base: usize) -> usize {
        let mean = self.mean_load();
        if mean < LOW_LOAD_THRESHOLD {
            base.saturating_mul(2)
        } else if mean < HIGH_LOAD_THRESHOLD {
            base
        } else {
            (base / 2).max(1)
        }
    }

    /// True when the most recent sample exceeds the throttle threshold.
    #[must_use]
    pub fn should_throttle(&self) -> bool {
        *self.last_load.lock() > THROTTLE_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_monitor_does_not_throttle() {
        let monitor = ResourceMonitor::new();
        assert!(!monitor.should_throttle());
    }

    #[test]
    fn optimal_workers_follows_load_bands() {
        let monitor = ResourceMonitor::new();
        *monitor.last_load.lock() = 0.1;
        monitor.history.lock().push_back(0.1);
        assert_eq!(monitor.optimal_workers(4), 8);

        monitor.history.lock().clear();
        monitor.history.lock().push_back(0.5);
        assert_eq!(monitor.optimal_workers(4), 4);

        monitor.history.lock().clear();
        monitor.history.lock().push_back(0.9);
        assert_eq!(monitor.optimal_workers(4), 2);
    }

    #[test]
    fn optimal_workers_never_drops_below_one() {
        let monitor = ResourceMonitor::new();
        monitor.history.lock().push_back(0.99);
        assert_eq!(monitor.optimal_workers(1), 1);
    }

    #[test]
    fn history_is_bounded_to_100_samples() {
        let monitor = ResourceMonitor::new();
        for i in 0..150 {
            let mut history = monitor.history.lock();
            if history.len() >= 100 {
                history.pop_front();
            }
            history.push_back(f64::from(i) / 150.0);
        }
        assert_eq!(monitor.history.lock().len(), 100);
    }

    #[test]
    fn should_throttle_above_threshold() {
        let monitor = ResourceMonitor::new();
        *monitor.last_load.lock() = 0.9;
        assert!(monitor.should_throttle());
        *monitor.last_load.lock() = 0.5;
        assert!(!monitor.should_throttle());
    }
}
