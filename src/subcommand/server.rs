use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Server {
    #[command(flatten)]
    pub(crate) options: ServerOptions,
}

/// Shared state behind the HTTP handlers: the registry plus the request
/// accounting reported by `GET /`.
pub(crate) struct StatsServer {
    pub(crate) registry: StatsRegistry,
    started: u32,
    pub(crate) request_count: AtomicU64,
    pub(crate) response_bytes: AtomicU64,
}

impl StatsServer {
    pub(crate) fn new() -> Self {
        Self {
            registry: StatsRegistry::new(),
            started: unix_now(),
            request_count: AtomicU64::new(0),
            response_bytes: AtomicU64::new(0),
        }
    }

    pub(crate) fn uptime(&self) -> u32 {
        unix_now().saturating_sub(self.started)
    }
}

impl Server {
    pub(crate) async fn run(&self, cancel_token: CancellationToken) -> Result {
        let settings = Settings::from_server_options(self.options.clone())?;

        let source = FileShareLog::open_tail(
            settings.share_log().clone(),
            Share::SIZE,
            settings.backlog(),
        )
        .await
        .context("share log consumer setup failed")?;

        let state = Arc::new(StatsServer::new());

        let consumer: JoinHandle<()> = tokio::spawn(consume_share_log(
            source,
            state.clone(),
            settings.clone(),
            cancel_token.clone(),
        ));

        let serve_result = match TcpListener::bind((settings.address().to_string(), settings.port()))
            .await
        {
            Ok(listener) => {
                info!("listening on {}:{}", settings.address(), settings.port());

                axum::serve(listener, api::router(state.clone()))
                    .with_graceful_shutdown(cancel_token.clone().cancelled_owned())
                    .await
                    .map_err(Error::from)
            }
            Err(err) => Err(Error::from(err).context(format!(
                "failed to bind {}:{}",
                settings.address(),
                settings.port()
            ))),
        };

        cancel_token.cancel();
        consumer.await?;

        serve_result
    }
}

async fn consume_share_log(
    mut source: impl ShareSource,
    server: Arc<StatsServer>,
    settings: Settings,
    cancel_token: CancellationToken,
) {
    info!("share log consumer started");

    let mut last_sweep = unix_now();
    let sweep_interval = settings.sweep_interval().as_secs() as u32;

    loop {
        let message = tokio::select! {
            biased;

            _ = cancel_token.cancelled() => break,

            message = source.poll(settings.poll_timeout()) => message,
        };

        match message {
            Some(SourceMessage::Record { payload, offset }) => {
                consume_record(&server, &payload, offset);
            }
            Some(SourceMessage::EndOfLog) | None => {}
            Some(SourceMessage::Error(err)) if err.is_fatal() => {
                error!("share log consumer: {err}");
                process::exit(1);
            }
            Some(SourceMessage::Error(err)) => {
                error!("share log consumer: {err}, skipping");
            }
        }

        let now = unix_now();
        if last_sweep + sweep_interval < now {
            server.registry.sweep_expired(now);
            last_sweep = now;
        }
    }

    info!("share log consumer stopped");
}

fn consume_record(server: &StatsServer, payload: &[u8], offset: u64) {
    if payload.len() != Share::SIZE {
        error!(
            "share record at offset {offset} is {} bytes, expected {}",
            payload.len(),
            Share::SIZE
        );
        return;
    }

    let share = match Share::decode(payload) {
        Ok(share) => share,
        Err(err) => {
            error!("share record at offset {offset}: {err}");
            return;
        }
    };

    if !share.is_valid() {
        error!("invalid share at offset {offset}: {share}");
        return;
    }

    server.registry.process_share(&share, unix_now());
}
