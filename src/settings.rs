use super::*;

#[derive(Clone, Default, Debug, Parser)]
pub(crate) struct ServerOptions {
    #[arg(long, help = "Consume share records from <SHARE_LOG>.")]
    pub(crate) share_log: PathBuf,

    #[arg(
        long,
        help = "Re-read up to <BACKLOG> records from the share log tail on startup. [default: 900000]"
    )]
    pub(crate) backlog: Option<u64>,

    #[arg(long, help = "Listen on <ADDRESS> for HTTP queries. [default: 0.0.0.0]")]
    pub(crate) address: Option<String>,

    #[arg(long, help = "Listen on <PORT> for HTTP queries. [default: 8080]")]
    pub(crate) port: Option<u16>,

    #[arg(
        long,
        help = "Wait up to <POLL_TIMEOUT> milliseconds per share log poll. [default: 1000]"
    )]
    pub(crate) poll_timeout: Option<u64>,

    #[arg(
        long,
        help = "Remove expired workers every <SWEEP_INTERVAL> seconds. [default: 1800]"
    )]
    pub(crate) sweep_interval: Option<u64>,
}

#[derive(Clone, Debug)]
pub(crate) struct Settings {
    share_log: PathBuf,
    backlog: u64,
    address: String,
    port: u16,
    poll_timeout: Duration,
    sweep_interval: Duration,
}

impl Settings {
    pub(crate) fn from_server_options(options: ServerOptions) -> Result<Self> {
        let settings = Self {
            share_log: options.share_log,
            backlog: options.backlog.unwrap_or(DEFAULT_BACKLOG),
            address: options.address.unwrap_or_else(|| "0.0.0.0".into()),
            port: options.port.unwrap_or(8080),
            poll_timeout: Duration::from_millis(options.poll_timeout.unwrap_or(1000)),
            sweep_interval: Duration::from_secs(options.sweep_interval.unwrap_or(1800)),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result {
        ensure!(self.backlog > 0, "backlog must be greater than zero");
        ensure!(
            !self.poll_timeout.is_zero(),
            "poll timeout must be greater than zero"
        );
        ensure!(
            !self.sweep_interval.is_zero(),
            "sweep interval must be greater than zero"
        );
        Ok(())
    }

    pub(crate) fn share_log(&self) -> &PathBuf {
        &self.share_log
    }

    pub(crate) fn backlog(&self) -> u64 {
        self.backlog
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub(crate) fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}
