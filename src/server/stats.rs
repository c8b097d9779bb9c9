// Live gateway statistics: issuance and fetch outcomes, bytes served, throughput.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ErrorKind;

struct StatsSample {
    at: Instant,
    serve_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub tokens_issued: u64,
    pub fetches_granted: u64,
    pub rejected_unauthorized: u64,
    pub rejected_not_found: u64,
    pub rejected_range: u64,
    pub bytes_served: u64,
    pub serve_bps: u64,
    pub open_streams: usize,
    pub replay_records: usize,
}

pub struct GatewayStats {
    tokens_issued: AtomicU64,
    fetches_granted: AtomicU64,
    rejected_unauthorized: AtomicU64,
    rejected_not_found: AtomicU64,
    rejected_range: AtomicU64,
    serve_bytes_total: AtomicU64,
    last_sample: Mutex<StatsSample>,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self {
            tokens_issued: AtomicU64::new(0),
            fetches_granted: AtomicU64::new(0),
            rejected_unauthorized: AtomicU64::new(0),
            rejected_not_found: AtomicU64::new(0),
            rejected_range: AtomicU64::new(0),
            serve_bytes_total: AtomicU64::new(0),
            last_sample: Mutex::new(StatsSample {
                at: Instant::now(),
                serve_bytes: 0,
            }),
        }
    }

    pub fn record_issued(&self, count: u64) {
        self.tokens_issued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_granted(&self) {
        self.fetches_granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_served(&self, bytes: u64) {
        self.serve_bytes_total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::Authentication | ErrorKind::Authorization | ErrorKind::Replay => {
                &self.rejected_unauthorized
            }
            ErrorKind::Storage => &self.rejected_not_found,
            ErrorKind::Range => &self.rejected_range,
            ErrorKind::Issuance => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, open_streams: usize, replay_records: usize) -> StatsSnapshot {
        let now = Instant::now();
        let current_serve = self.serve_bytes_total.load(Ordering::Relaxed);

        let serve_bps = {
            let mut sample = self.last_sample.lock();
            let elapsed = now.duration_since(sample.at).as_secs_f64();

            let bps = if elapsed > 0.1 {
                (current_serve.saturating_sub(sample.serve_bytes) as f64 / elapsed) as u64
            } else {
                0
            };

            sample.at = now;
            sample.serve_bytes = current_serve;
            bps
        };

        StatsSnapshot {
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            fetches_granted: self.fetches_granted.load(Ordering::Relaxed),
            rejected_unauthorized: self.rejected_unauthorized.load(Ordering::Relaxed),
            rejected_not_found: self.rejected_not_found.load(Ordering::Relaxed),
            rejected_range: self.rejected_range.load(Ordering::Relaxed),
            bytes_served: current_serve,
            serve_bps,
            open_streams,
            replay_records,
        }
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}
