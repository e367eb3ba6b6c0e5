//! Raw `/proc` readers. Best-effort: any parse failure is treated as "no
//! sample available" rather than propagated, since system load is an
//! advisory signal for the autoscaled pool, not a correctness requirement.

use std::fs;

#[derive(Debug, Clone, Copy)]
pub struct CpuSample {
    idle: u64,
    total: u64,
}

impl CpuSample {
    /// Fraction of CPU time spent non-idle between `self` and an earlier
    /// `previous` sample. `self` must be the more recent sample.
    pub fn usage_ratio_since(&self, previous: &CpuSample) -> f64 {
        let total_delta = self.total.saturating_sub(previous.total);
        if total_delta == 0 {
            return 0.0;
        }
        let idle_delta = self.idle.saturating_sub(previous.idle);
        1.0 - (idle_delta as f64 / total_delta as f64)
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
pub fn read_cpu_sample() -> Option<CpuSample> {
    let contents = fs::read_to_string("/proc/stat").ok()?;
    let line = contents.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    let idle = fields[3];
    let total: u64 = fields.iter().sum();
    Some(CpuSample { idle, total })
}

/// Reads used/total memory ratio from `/proc/meminfo`.
pub fn read_memory_sample() -> Option<f64> {
    let contents = fs::read_to_string("/proc/meminfo").ok()?;
    let mut total_kb = None;
    let mut available_kb = None;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total_kb = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available_kb = parse_kb(rest);
        }
    }
    let total = total_kb?;
    let available = available_kb?;
    if total == 0 {
        return None;
    }
    Some(1.0 - (available / total))
}

fn parse_kb(field: &str) -> Option<f64> {
    field.trim().trim_end_matches(" kB").trim().parse().ok()
}

/// A cgroup CPU accounting sample: total CPU time consumed by the
/// container and the number of cores the container is entitled to (derived
/// from its quota/period, or the host's core count when unlimited).
#[derive(Debug, Clone, Copy)]
pub struct CgroupCpuSample {
    usage_ns: u64,
    allocated_cores: f64,
}

impl CgroupCpuSample {
    /// Fraction of its allocated CPU budget the container consumed between
    /// `previous` and `self`, clamped to `[0, 1]`. Unlike the host-wide
    /// `CpuSample` there is no idle counter to diff against; usage is
    /// instead measured relative to wall-clock time scaled by the number of
    /// cores the container may use.
    pub fn usage_ratio_since(&self, previous: &CgroupCpuSample, elapsed: std::time::Duration) -> f64 {
        if self.allocated_cores <= 0.0 || elapsed.is_zero() {
            return 0.0;
        }
        let used_ns = self.usage_ns.saturating_sub(previous.usage_ns) as f64;
        let budget_ns = elapsed.as_nanos() as f64 * self.allocated_cores;
        if budget_ns <= 0.0 {
            return 0.0;
        }
        (used_ns / budget_ns).clamp(0.0, 1.0)
    }
}

const CGROUP_V2_ROOT: &str = "/sys/fs/cgroup";
const CGROUP_V1_CPUACCT_ROOT: &str = "/sys/fs/cgroup/cpuacct";
const CGROUP_V1_MEMORY_ROOT: &str = "/sys/fs/cgroup/memory";

/// Reads cgroup CPU accounting, preferring v2's unified hierarchy and
/// falling back to v1's `cpuacct`/`cpu` controllers. Returns `None` when
/// neither is present (i.e. not running inside a cgroup-confined
/// container), so callers fall back to the host-wide `/proc/stat` reading.
pub fn read_cgroup_cpu_sample() -> Option<CgroupCpuSample> {
    read_cgroup_v2_cpu_sample().or_else(read_cgroup_v1_cpu_sample)
}

fn read_cgroup_v2_cpu_sample() -> Option<CgroupCpuSample> {
    let stat = fs::read_to_string(format!("{CGROUP_V2_ROOT}/cpu.stat")).ok()?;
    let usage_usec: u64 = stat
        .lines()
        .find_map(|l| l.strip_prefix("usage_usec "))
        .and_then(|v| v.trim().parse().ok())?;

    let max = fs::read_to_string(format!("{CGROUP_V2_ROOT}/cpu.max")).ok()?;
    let mut fields = max.split_whitespace();
    let quota = fields.next()?;
    let period: f64 = fields.next()?.parse().ok()?;
    let allocated_cores = if quota == "max" {
        num_cpus_on_host()
    } else {
        quota.parse::<f64>().ok()? / period
    };

    Some(CgroupCpuSample {
        usage_ns: usage_usec.saturating_mul(1_000),
        allocated_cores,
    })
}

fn read_cgroup_v1_cpu_sample() -> Option<CgroupCpuSample> {
    let usage_ns: u64 = fs::read_to_string(format!("{CGROUP_V1_CPUACCT_ROOT}/cpuacct.usage"))
        .ok()?
        .trim()
        .parse()
        .ok()?;

    let quota_us: i64 = fs::read_to_string(format!("{CGROUP_V1_CPUACCT_ROOT}/../cpu/cpu.cfs_quota_us"))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(-1);
    let allocated_cores = if quota_us <= 0 {
        num_cpus_on_host()
    } else {
        let period_us: f64 = fs::read_to_string(format!("{CGROUP_V1_CPUACCT_ROOT}/../cpu/cpu.cfs_period_us"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(100_000.0);
        quota_us as f64 / period_us
    };

    Some(CgroupCpuSample { usage_ns, allocated_cores })
}

fn num_cpus_on_host() -> f64 {
    num_cpus::get().max(1) as f64
}

/// Reads used/limit memory ratio from the cgroup hierarchy, preferring v2's
/// `memory.current`/`memory.max` and falling back to v1's
/// `memory.usage_in_bytes`/`memory.limit_in_bytes`. Returns `None` when
/// neither is present, or when the container has no memory limit set (an
/// unbounded cgroup memory limit is not a meaningful denominator).
pub fn read_cgroup_memory_sample() -> Option<f64> {
    read_cgroup_v2_memory_sample().or_else(read_cgroup_v1_memory_sample)
}

fn read_cgroup_v2_memory_sample() -> Option<f64> {
    let current: f64 = fs::read_to_string(format!("{CGROUP_V2_ROOT}/memory.current"))
        .ok()?
        .trim()
        .parse()
        .ok()?;
    let max_raw = fs::read_to_string(format!("{CGROUP_V2_ROOT}/memory.max")).ok()?;
    let max_raw = max_raw.trim();
    if max_raw == "max" {
        return None;
    }
    let limit: f64 = max_raw.parse().ok()?;
    if limit <= 0.0 {
        return None;
    }
    Some((current / limit).clamp(0.0, 1.0))
}

fn read_cgroup_v1_memory_sample() -> Option<f64> {
    let usage: f64 = fs::read_to_string(format!("{CGROUP_V1_MEMORY_ROOT}/memory.usage_in_bytes"))
        .ok()?
        .trim()
        .parse()
        .ok()?;
    let limit: f64 = fs::read_to_string(format!("{CGROUP_V1_MEMORY_ROOT}/memory.limit_in_bytes"))
        .ok()?
        .trim()
        .parse()
        .ok()?;
    // An unset v1 limit reads back as a huge "no limit" sentinel rather than
    // a missing file; treat anything above 1 PiB as unbounded.
    if limit <= 0.0 || limit > 1e15 {
        return None;
    }
    Some((usage / limit).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_usage_ratio_is_between_zero_and_one() {
        let prev = CpuSample { idle: 100, total: 1000 };
        let now = CpuSample { idle: 150, total: 1500 };
        let ratio = now.usage_ratio_since(&prev);
        assert!((0.0..=1.0).contains(&ratio));
    }

    #[test]
    fn zero_total_delta_reports_zero_usage() {
        let sample = CpuSample { idle: 10, total: 100 };
        assert_eq!(sample.usage_ratio_since(&sample), 0.0);
    }

    #[test]
    fn cgroup_cpu_ratio_is_fraction_of_allocated_cores() {
        let prev = CgroupCpuSample { usage_ns: 0, allocated_cores: 2.0 };
        // 1 full core-second of usage out of a 2-core, 1-second budget.
        let now = CgroupCpuSample { usage_ns: 1_000_000_000, allocated_cores: 2.0 };
        let ratio = now.usage_ratio_since(&prev, std::time::Duration::from_secs(1));
        assert!((ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn cgroup_cpu_ratio_clamps_to_one() {
        let prev = CgroupCpuSample { usage_ns: 0, allocated_cores: 1.0 };
        let now = CgroupCpuSample { usage_ns: 5_000_000_000, allocated_cores: 1.0 };
        let ratio = now.usage_ratio_since(&prev, std::time::Duration::from_secs(1));
        assert_eq!(ratio, 1.0);
    }
}
