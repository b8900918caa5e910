use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Probe statistics shared across scanners, using lock-free atomic counters.
#[derive(Debug, Default)]
pub struct ProbeMetrics {
    scan_count: AtomicU64,
    probe_count: AtomicU64,
    total_candidates: AtomicU64,
    total_scan_time_ns: AtomicU64,
    bucket_hits: AtomicU64,
    bucket_misses: AtomicU64,
}

impl ProbeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One finished probing pass over a query.
    pub fn record_scan(&self, probes: u64, candidates: u64, duration_ns: u64) {
        self.scan_count.fetch_add(1, Ordering::Relaxed);
        self.probe_count.fetch_add(probes, Ordering::Relaxed);
        self.total_candidates.fetch_add(candidates, Ordering::Relaxed);
        self.total_scan_time_ns
            .fetch_add(duration_ns, Ordering::Relaxed);
    }

    pub fn record_bucket_hit(&self) {
        self.bucket_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bucket_miss(&self) {
        self.bucket_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> ProbeSnapshot {
        let scan_count = self.scan_count.load(Ordering::Relaxed);
        let probe_count = self.probe_count.load(Ordering::Relaxed);
        let total_candidates = self.total_candidates.load(Ordering::Relaxed);
        let total_scan_time_ns = self.total_scan_time_ns.load(Ordering::Relaxed);
        let hits = self.bucket_hits.load(Ordering::Relaxed);
        let misses = self.bucket_misses.load(Ordering::Relaxed);

        let per_scan = |total: u64| {
            if scan_count > 0 {
                total as f64 / scan_count as f64
            } else {
                0.0
            }
        };

        ProbeSnapshot {
            scan_count,
            probe_count,
            avg_scan_time_us: per_scan(total_scan_time_ns) / 1000.0,
            avg_probes_per_scan: per_scan(probe_count),
            avg_candidates_per_scan: per_scan(total_candidates),
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.scan_count.store(0, Ordering::Relaxed);
        self.probe_count.store(0, Ordering::Relaxed);
        self.total_candidates.store(0, Ordering::Relaxed);
        self.total_scan_time_ns.store(0, Ordering::Relaxed);
        self.bucket_hits.store(0, Ordering::Relaxed);
        self.bucket_misses.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of probe metrics.
#[derive(Debug, Clone)]
pub struct ProbeSnapshot {
    pub scan_count: u64,
    pub probe_count: u64,
    pub avg_scan_time_us: f64,
    pub avg_probes_per_scan: f64,
    pub avg_candidates_per_scan: f64,
    /// Fraction of probed buckets that held at least one id.
    pub hit_rate: f64,
}

impl std::fmt::Display for ProbeSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scans: {}, Probes: {}, Avg scan: {:.2}us, Avg probes: {:.1}, Avg candidates: {:.1}, Hit rate: {:.1}%",
            self.scan_count,
            self.probe_count,
            self.avg_scan_time_us,
            self.avg_probes_per_scan,
            self.avg_candidates_per_scan,
            self.hit_rate * 100.0,
        )
    }
}

/// Elapsed-time helper for one probing pass.
pub(crate) struct ScanTimer {
    start: Instant,
}

impl ScanTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}
