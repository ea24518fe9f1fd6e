use super::*;

pub(crate) mod feed;
pub(crate) mod server;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    #[command(about = "Append synthetic shares to a share log")]
    Feed(feed::Feed),
    #[command(about = "Serve share statistics over HTTP")]
    Server(server::Server),
}

impl Subcommand {
    pub(crate) async fn run(self, cancel_token: CancellationToken) -> Result {
        match self {
            Self::Feed(feed) => feed.run(cancel_token).await,
            Self::Server(server) => server.run(cancel_token).await,
        }
    }
}
