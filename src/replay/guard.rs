use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ReplayError;

/// Registry of consumed token ids, each held until its record expires.
///
/// Insertion goes through the map's entry API, which holds the shard lock for
/// the duration of the check-and-insert, so concurrent presentations of one id
/// yield exactly one acceptance.
pub struct ReplayGuard {
    entries: DashMap<String, Instant>,
    max_entries: usize,
}

impl ReplayGuard {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Accept `token_id` once per `ttl` window. Returns `false` on replay or
    /// when the registry is full.
    pub fn record_once(&self, token_id: &str, ttl: Duration) -> bool {
        self.try_record(token_id, ttl).is_ok()
    }

    /// Like [`record_once`](Self::record_once) but reports why a token was refused.
    pub fn try_record(&self, token_id: &str, ttl: Duration) -> Result<(), ReplayError> {
        let now = Instant::now();
        let Some(expiry) = now.checked_add(ttl) else {
            warn!("replay ttl {:?} out of range, refusing jti={}", ttl, token_id);
            return Err(ReplayError::TtlOutOfRange);
        };

        if self.entries.len() >= self.max_entries && !self.entries.contains_key(token_id) {
            let evicted = self.sweep_expired_at(now);
            if self.entries.len() >= self.max_entries {
                warn!(
                    "replay registry full ({} entries, {} evicted), refusing jti={}",
                    self.entries.len(),
                    evicted,
                    token_id
                );
                return Err(ReplayError::CapacityExhausted);
            }
        }

        match self.entries.entry(token_id.to_string()) {
            Entry::Occupied(mut slot) => {
                if *slot.get() > now {
                    debug!("replay detected jti={}", token_id);
                    return Err(ReplayError::Replayed);
                }
                // Previous record lapsed; the slot is free again.
                slot.insert(expiry);
                Ok(())
            }
            Entry::Vacant(slot) => {
                slot.insert(expiry);
                Ok(())
            }
        }
    }

    /// Remove every expired record, returning how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn sweep_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expiry| *expiry > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Spawn a background task sweeping expired records every `interval`
    /// until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = guard.sweep_expired();
                        if evicted > 0 {
                            debug!("replay sweep evicted={} live={}", evicted, guard.len());
                        }
                    }
                }
            }
            info!("replay sweeper stopped");
        })
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REPLAY_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_presentation_rejected() {
        let guard = ReplayGuard::new(16);
        assert!(guard.record_once("jti-1", Duration::from_secs(60)));
        assert_eq!(
            guard.try_record("jti-1", Duration::from_secs(60)),
            Err(ReplayError::Replayed)
        );
        assert!(guard.record_once("jti-2", Duration::from_secs(60)));
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_slot_reusable_after_expiry() {
        let guard = ReplayGuard::new(16);
        assert!(guard.record_once("jti", Duration::from_millis(20)));
        std::thread::sleep(Duration::from_millis(40));
        assert!(guard.record_once("jti", Duration::from_secs(60)));
        assert!(!guard.record_once("jti", Duration::from_secs(60)));
    }

    #[test]
    fn test_sweep_drops_only_expired() {
        let guard = ReplayGuard::new(16);
        guard.record_once("short", Duration::from_millis(10));
        guard.record_once("long", Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(guard.sweep_expired(), 1);
        assert_eq!(guard.len(), 1);
        assert!(!guard.record_once("long", Duration::from_secs(60)));
    }

    #[test]
    fn test_full_registry_fails_closed() {
        let guard = ReplayGuard::new(2);
        assert!(guard.record_once("a", Duration::from_secs(60)));
        assert!(guard.record_once("b", Duration::from_secs(60)));
        assert_eq!(
            guard.try_record("c", Duration::from_secs(60)),
            Err(ReplayError::CapacityExhausted)
        );
        // A known id still reports a replay, not exhaustion.
        assert_eq!(
            guard.try_record("a", Duration::from_secs(60)),
            Err(ReplayError::Replayed)
        );
    }

    #[test]
    fn test_unrepresentable_ttl_refused() {
        let guard = ReplayGuard::new(4);
        assert_eq!(
            guard.try_record("x", Duration::from_secs(u64::MAX)),
            Err(ReplayError::TtlOutOfRange)
        );
        assert!(!guard.record_once("y", Duration::MAX));
        assert!(guard.is_empty());
        assert!(guard.record_once("x", Duration::from_secs(60)));
    }

    #[test]
    fn test_full_registry_recovers_after_expiry() {
        let guard = ReplayGuard::new(1);
        assert!(guard.record_once("a", Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(30));
        assert!(guard.record_once("b", Duration::from_secs(60)));
        assert_eq!(guard.len(), 1);
    }
}
