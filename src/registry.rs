use {super::*, parking_lot::RwLock};

#[derive(Default)]
struct Index {
    workers: HashMap<WorkerKey, Arc<WorkerShares>>,
    user_worker_count: HashMap<i32, i32>,
    total_worker_count: u64,
    total_user_count: u64,
}

/// Two-level index of share accumulators: one entry per (user, worker)
/// pair plus a synthetic (user, 0) total per user. The pool-wide (0, 0)
/// accumulator lives outside the map and never expires.
///
/// A single ingestion task writes; HTTP readers resolve `Arc` handles
/// under the read lock and snapshot outside it, so a sweep can unlink an
/// entry while a reader still holds it.
pub(crate) struct StatsRegistry {
    index: RwLock<Index>,
    pool: WorkerShares,
}

impl StatsRegistry {
    pub(crate) fn new() -> Self {
        Self {
            index: RwLock::new(Index::default()),
            pool: WorkerShares::new(WorkerKey::new(0, 0)),
        }
    }

    /// Feed one share to the pool total, the worker's accumulator, and the
    /// user's total, creating the latter two on first sight.
    ///
    /// New accumulators are constructed and fed outside any registry lock;
    /// installation re-checks under the write lock, so a concurrent insert
    /// of the same key keeps the installed entry and discards the loser.
    pub(crate) fn process_share(&self, share: &Share, now: u32) {
        if now > share.timestamp.saturating_add(STATS_WINDOW_SECS) {
            return;
        }

        self.pool.process_share(share, now);

        let worker_key = WorkerKey::new(share.user_id, share.worker_hash_id);
        let user_key = WorkerKey::user_total(share.user_id);

        let (worker, user) = {
            let index = self.index.read();
            (
                index.workers.get(&worker_key).cloned(),
                index.workers.get(&user_key).cloned(),
            )
        };

        let mut fresh = Vec::new();

        for (key, existing) in [(worker_key, worker), (user_key, user)] {
            match existing {
                Some(shares) => shares.process_share(share, now),
                None => {
                    let shares = Arc::new(WorkerShares::new(key));
                    shares.process_share(share, now);
                    fresh.push(shares);
                }
            }
        }

        if !fresh.is_empty() {
            let mut index = self.index.write();
            for shares in fresh {
                index.install(shares);
            }
        }
    }

    /// Resolve every key to a snapshot. Handles are collected under the
    /// read lock and snapshotted after it is released; unknown keys yield
    /// a zeroed status.
    pub(crate) fn status_batch(&self, keys: &[WorkerKey], now: u32) -> Vec<WorkerStatus> {
        let handles: Vec<Option<Arc<WorkerShares>>> = {
            let index = self.index.read();
            keys.iter()
                .map(|key| index.workers.get(key).cloned())
                .collect()
        };

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .map(|shares| shares.status(now))
                    .unwrap_or_default()
            })
            .collect()
    }

    pub(crate) fn pool_status(&self, now: u32) -> WorkerStatus {
        self.pool.status(now)
    }

    pub(crate) fn user_worker_count(&self, user_id: i32) -> i32 {
        self.index
            .read()
            .user_worker_count
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    /// (total workers, total users) currently indexed.
    pub(crate) fn counts(&self) -> (u64, u64) {
        let index = self.index.read();
        (index.total_worker_count, index.total_user_count)
    }

    /// Drop every entry whose last share has aged out of the window,
    /// updating counters symmetrically to insertion. Safe at any cadence;
    /// the interval only bounds memory.
    pub(crate) fn sweep_expired(&self, now: u32) {
        let mut index = self.index.write();

        let expired: Vec<WorkerKey> = index
            .workers
            .iter()
            .filter(|(_, shares)| shares.is_expired(now))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            index.workers.remove(key);

            if key.is_user_total() {
                index.total_user_count -= 1;
            } else {
                index.total_worker_count -= 1;
                if let Some(count) = index.user_worker_count.get_mut(&key.user_id) {
                    *count -= 1;
                    if *count <= 0 {
                        index.user_worker_count.remove(&key.user_id);
                    }
                }
            }
        }

        info!("removed {} expired workers", expired.len());
    }

    #[cfg(test)]
    pub(crate) fn indexed_entries(&self) -> usize {
        self.index.read().workers.len()
    }
}

impl Index {
    fn install(&mut self, shares: Arc<WorkerShares>) {
        let key = shares.key();

        if let hash_map::Entry::Vacant(entry) = self.workers.entry(key) {
            entry.insert(shares);

            if key.is_user_total() {
                self.total_user_count += 1;
            } else {
                self.total_worker_count += 1;
                *self.user_worker_count.entry(key.user_id).or_default() += 1;
            }
        }
    }
}
