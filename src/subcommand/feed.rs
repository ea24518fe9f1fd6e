use {
    super::*,
    tokio::{
        fs::OpenOptions,
        io::AsyncWriteExt,
        time::{MissedTickBehavior, interval},
    },
};

/// Toy share producer. Appends synthetic records to a share log so a
/// server can be exercised without a live pool.
#[derive(Debug, Parser)]
pub(crate) struct Feed {
    #[arg(long, help = "Append share records to <SHARE_LOG>.")]
    share_log: PathBuf,

    #[arg(long, default_value = "1", help = "Spread shares across <USERS> users.")]
    users: i32,

    #[arg(
        long,
        default_value = "4",
        help = "Spread shares across <WORKERS> workers per user."
    )]
    workers: i64,

    #[arg(long, default_value = "10", help = "Append <RATE> shares per second.")]
    rate: u64,

    #[arg(long, default_value = "1000", help = "Record <DIFFICULTY> per share.")]
    difficulty: u64,

    #[arg(
        long,
        default_value = "16",
        help = "Reject every <REJECT_EVERY>th share; zero rejects none."
    )]
    reject_every: u64,
}

impl Feed {
    pub(crate) async fn run(&self, cancel_token: CancellationToken) -> Result {
        ensure!(self.users > 0, "users must be greater than zero");
        ensure!(self.workers > 0, "workers must be greater than zero");
        ensure!(self.rate > 0, "rate must be greater than zero");
        ensure!(self.difficulty > 0, "difficulty must be greater than zero");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.share_log)
            .await
            .with_context(|| format!("failed to open share log {}", self.share_log.display()))?;

        info!(
            "appending {} shares per second to {}",
            self.rate,
            self.share_log.display()
        );

        let mut ticker = interval(Duration::from_nanos(1_000_000_000 / self.rate));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sequence: u64 = 0;

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => break,

                _ = ticker.tick() => {
                    file.write_all(&self.synthesize(sequence).encode()).await?;
                    sequence += 1;
                }
            }
        }

        file.flush().await?;
        info!("appended {sequence} shares");

        Ok(())
    }

    fn synthesize(&self, sequence: u64) -> Share {
        let user_id = (sequence % self.users as u64) as i32 + 1;
        let worker_hash_id = ((sequence / self.users as u64) % self.workers as u64) as i64 + 1;

        let result = if self.reject_every > 0 && sequence % self.reject_every == self.reject_every - 1
        {
            ShareResult::Reject
        } else {
            ShareResult::Accept
        };

        Share {
            timestamp: unix_now(),
            user_id,
            worker_hash_id,
            ip: Ipv4Addr::new(10, (user_id % 256) as u8, (worker_hash_id % 256) as u8, 1),
            share: self.difficulty,
            result,
        }
    }
}
