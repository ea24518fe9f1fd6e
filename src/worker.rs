use {super::*, parking_lot::Mutex};

/// Identifies one accumulator in the registry. `worker_id` zero is the
/// synthetic per-user total; (0, 0) is the pool-wide total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WorkerKey {
    pub(crate) user_id: i32,
    pub(crate) worker_id: i64,
}

impl WorkerKey {
    pub(crate) fn new(user_id: i32, worker_id: i64) -> Self {
        Self { user_id, worker_id }
    }

    pub(crate) fn user_total(user_id: i32) -> Self {
        Self {
            user_id,
            worker_id: 0,
        }
    }

    pub(crate) fn is_user_total(&self) -> bool {
        self.worker_id == 0
    }
}

struct Accumulators {
    accept_count: u32,
    last_share_ip: Ipv4Addr,
    last_share_time: u32,
    accept_share_sec: SlidingWindow,
    reject_share_min: SlidingWindow,
}

/// Rolling share totals for one worker.
///
/// Accepted shares go into a per-second window, rejected shares into a
/// per-minute window; both span the last fifteen minutes. The mutex exists
/// because HTTP snapshots race the ingestion writer; locking here instead
/// of at the registry keeps lookup contention off the hot path.
pub(crate) struct WorkerShares {
    key: WorkerKey,
    accumulators: Mutex<Accumulators>,
}

impl WorkerShares {
    pub(crate) fn new(key: WorkerKey) -> Self {
        Self {
            key,
            accumulators: Mutex::new(Accumulators {
                accept_count: 0,
                last_share_ip: Ipv4Addr::UNSPECIFIED,
                last_share_time: 0,
                accept_share_sec: SlidingWindow::new(STATS_WINDOW_SECS as usize),
                reject_share_min: SlidingWindow::new((STATS_WINDOW_SECS / 60) as usize),
            }),
        }
    }

    pub(crate) fn key(&self) -> WorkerKey {
        self.key
    }

    /// Shares older than the window relative to `now` are dropped here even
    /// if the upstream freshness gate let them through.
    pub(crate) fn process_share(&self, share: &Share, now: u32) {
        let mut accumulators = self.accumulators.lock();

        if now > share.timestamp.saturating_add(STATS_WINDOW_SECS) {
            return;
        }

        if share.result == ShareResult::Accept {
            accumulators.accept_count += 1;
            accumulators
                .accept_share_sec
                .insert(share.timestamp as u64, share.share);
        } else {
            accumulators
                .reject_share_min
                .insert((share.timestamp / 60) as u64, share.share);
        }

        accumulators.last_share_ip = share.ip;
        accumulators.last_share_time = share.timestamp;
    }

    pub(crate) fn status(&self, now: u32) -> WorkerStatus {
        let accumulators = self.accumulators.lock();

        WorkerStatus {
            accept_1m: accumulators.accept_share_sec.sum(now as u64, 60),
            accept_5m: accumulators.accept_share_sec.sum(now as u64, 300),
            accept_15m: accumulators.accept_share_sec.sum(now as u64, 900),
            reject_15m: accumulators.reject_share_min.sum((now / 60) as u64, 15),
            accept_count: accumulators.accept_count,
            last_share_ip: accumulators.last_share_ip,
            last_share_time: accumulators.last_share_time,
        }
    }

    pub(crate) fn is_expired(&self, now: u32) -> bool {
        self.accumulators
            .lock()
            .last_share_time
            .saturating_add(STATS_WINDOW_SECS)
            < now
    }
}

/// Point-in-time copy of a worker's observable counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerStatus {
    pub(crate) accept_1m: u64,
    pub(crate) accept_5m: u64,
    pub(crate) accept_15m: u64,
    pub(crate) reject_15m: u64,
    pub(crate) accept_count: u32,
    pub(crate) last_share_ip: Ipv4Addr,
    pub(crate) last_share_time: u32,
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self {
            accept_1m: 0,
            accept_5m: 0,
            accept_15m: 0,
            reject_15m: 0,
            accept_count: 0,
            last_share_ip: Ipv4Addr::UNSPECIFIED,
            last_share_time: 0,
        }
    }
}

impl WorkerStatus {
    /// Additive over counters; the most recent `last_share_time` carries
    /// its IP along, first entry winning ties.
    pub(crate) fn merge(batch: &[WorkerStatus]) -> WorkerStatus {
        let mut merged = WorkerStatus::default();

        for status in batch {
            merged.accept_1m += status.accept_1m;
            merged.accept_5m += status.accept_5m;
            merged.accept_15m += status.accept_15m;
            merged.reject_15m += status.reject_15m;
            merged.accept_count += status.accept_count;

            if status.last_share_time > merged.last_share_time {
                merged.last_share_time = status.last_share_time;
                merged.last_share_ip = status.last_share_ip;
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::share::accept_share};

    fn reject_share(user_id: i32, worker_hash_id: i64, timestamp: u32, value: u64) -> Share {
        Share {
            result: ShareResult::Reject,
            ..accept_share(user_id, worker_hash_id, timestamp, value)
        }
    }

    #[test]
    fn accepts_accumulate_in_all_rate_windows() {
        let worker = WorkerShares::new(WorkerKey::new(1, 100));
        let now = 1_700_000_000;

        for offset in 0..60 {
            worker.process_share(&accept_share(1, 100, now - offset, 2), now);
        }

        let status = worker.status(now);
        assert_eq!(status.accept_1m, 120);
        assert_eq!(status.accept_5m, 120);
        assert_eq!(status.accept_15m, 120);
        assert_eq!(status.reject_15m, 0);
        assert_eq!(status.accept_count, 60);
        assert_eq!(status.last_share_time, now);
        assert_eq!(status.last_share_ip, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn rejects_land_in_minute_buckets_only() {
        let worker = WorkerShares::new(WorkerKey::new(2, 42));
        let now = 1_700_000_000;

        for age in [70, 130, 800, 1000] {
            worker.process_share(&reject_share(2, 42, now - age, 7), now);
        }

        let status = worker.status(now);
        // The share 1000 s old passes the wall-clock gate but falls
        // outside the fifteen minute bucket range.
        assert_eq!(status.reject_15m, 21);
        assert_eq!(status.accept_count, 0);
        assert_eq!(status.accept_15m, 0);
    }

    #[test]
    fn stale_share_is_dropped_entirely() {
        let worker = WorkerShares::new(WorkerKey::new(1, 100));
        let now = 1_700_000_000;

        worker.process_share(&accept_share(1, 100, now - STATS_WINDOW_SECS - 1, 5), now);

        let status = worker.status(now);
        assert_eq!(status, WorkerStatus::default());
    }

    #[test]
    fn rates_age_out_but_accept_count_is_monotonic() {
        let worker = WorkerShares::new(WorkerKey::new(1, 100));
        let now = 1_700_000_000;

        worker.process_share(&accept_share(1, 100, now, 3), now);

        let later = now + STATS_WINDOW_SECS + 1;
        let status = worker.status(later);
        assert_eq!(status.accept_15m, 0);
        assert_eq!(status.accept_count, 1);
        assert_eq!(status.last_share_time, now);
    }

    #[test]
    fn expiry_follows_last_share_time() {
        let worker = WorkerShares::new(WorkerKey::new(1, 100));
        let now = 1_700_000_000;

        worker.process_share(&accept_share(1, 100, now, 1), now);

        assert!(!worker.is_expired(now + STATS_WINDOW_SECS));
        assert!(worker.is_expired(now + STATS_WINDOW_SECS + 1));
    }

    #[test]
    fn fresh_worker_is_expired() {
        let worker = WorkerShares::new(WorkerKey::new(1, 100));
        assert!(worker.is_expired(STATS_WINDOW_SECS + 1));
    }

    #[test]
    fn merge_of_partition_equals_whole() {
        let now = 1_700_000_000;
        let whole = WorkerShares::new(WorkerKey::new(1, 100));
        let part_a = WorkerShares::new(WorkerKey::new(1, 100));
        let part_b = WorkerShares::new(WorkerKey::new(1, 200));

        for offset in 0..10 {
            let share = accept_share(1, 100, now - offset, 4);
            whole.process_share(&share, now);
            part_a.process_share(&share, now);
        }
        for offset in 0..5 {
            let share = reject_share(1, 200, now - 60 * offset, 6);
            whole.process_share(&share, now);
            part_b.process_share(&share, now);
        }

        let merged = WorkerStatus::merge(&[part_a.status(now), part_b.status(now)]);
        let direct = whole.status(now);

        assert_eq!(merged.accept_1m, direct.accept_1m);
        assert_eq!(merged.accept_5m, direct.accept_5m);
        assert_eq!(merged.accept_15m, direct.accept_15m);
        assert_eq!(merged.reject_15m, direct.reject_15m);
        assert_eq!(merged.accept_count, direct.accept_count);
        assert_eq!(merged.last_share_time, direct.last_share_time);
    }

    #[test]
    fn merge_takes_ip_from_most_recent_share() {
        let early = WorkerStatus {
            last_share_time: 100,
            last_share_ip: Ipv4Addr::new(1, 1, 1, 1),
            ..WorkerStatus::default()
        };

        let late = WorkerStatus {
            last_share_time: 200,
            last_share_ip: Ipv4Addr::new(2, 2, 2, 2),
            ..WorkerStatus::default()
        };

        let merged = WorkerStatus::merge(&[early, late]);
        assert_eq!(merged.last_share_time, 200);
        assert_eq!(merged.last_share_ip, Ipv4Addr::new(2, 2, 2, 2));

        // First wins on ties.
        let tied = WorkerStatus {
            last_share_time: 200,
            last_share_ip: Ipv4Addr::new(3, 3, 3, 3),
            ..WorkerStatus::default()
        };
        let merged = WorkerStatus::merge(&[late, tied]);
        assert_eq!(merged.last_share_ip, Ipv4Addr::new(2, 2, 2, 2));
    }

    #[test]
    fn merge_of_empty_batch_is_zeroed() {
        assert_eq!(WorkerStatus::merge(&[]), WorkerStatus::default());
    }
}
