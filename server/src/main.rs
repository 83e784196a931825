use clap::Parser;
use log::{info, warn};
use server::arbiter::{AllowAll, Arbiter};
use server::dnf::DnfScheduler;
use server::matchmaking::MatchmakingQueue;
use server::network::Server;
use server::notify::{ChannelNotifier, Notifier};
use server::relay::{RelayConfig, RelayConnector, RelayNotifier};
use server::scoring::ScoringTriggers;
use server::store::InMemorySessionStore;
use std::sync::Arc;
use std::time::Duration;

/// Race session arbitration server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the request socket to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value = "9080")]
    port: u16,
    /// Seconds a straggler gets after the winner finishes
    #[clap(long, default_value = "60")]
    dnf_delay_secs: u64,

    /// Realtime relay host; events are dropped in-process when unset
    #[clap(long)]
    relay_host: Option<String>,
    /// Realtime relay port
    #[clap(long, default_value = "5222")]
    relay_port: u16,
    /// Credential presented to the relay
    #[clap(long, default_value = "")]
    relay_token: String,
    /// Identity token expected back from the relay
    #[clap(long, default_value = "")]
    relay_identity: String,
    /// Accept a relay that fails identity verification (lab setups only)
    #[clap(long)]
    accept_unverified_relay: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let store = Arc::new(InMemorySessionStore::new());
    let (dnf, dnf_rx) = DnfScheduler::new(Duration::from_secs(args.dnf_delay_secs));

    let notifier: Arc<dyn Notifier> = match &args.relay_host {
        Some(host) => {
            let connector = Arc::new(RelayConnector::new(RelayConfig {
                host: host.clone(),
                port: args.relay_port,
                engine_token: args.relay_token.clone(),
                relay_identity: args.relay_identity.clone(),
                accept_unverified_relay: args.accept_unverified_relay,
            }));
            connector.connect().await?;
            Arc::new(RelayNotifier::start(connector))
        }
        None => {
            warn!("no relay configured; realtime events stay in-process");
            Arc::new(ChannelNotifier::new())
        }
    };

    let arbiter = Arc::new(Arbiter::new(
        store.clone(),
        notifier,
        ScoringTriggers::default(),
        Arc::new(MatchmakingQueue::new()),
        Arc::new(dnf),
        Box::new(AllowAll),
    ));

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, store, arbiter, dnf_rx).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
            Ok(())
        }
    }
}
