//! Command-line interface.

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::crawlers::CrawlerRegistry;
use crate::lanes::LanePool;
use crate::server;

#[derive(Parser)]
#[command(name = "lotenrich", about = "Item-detail enrichment service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the enrichment HTTP server.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3000, env = "PORT")]
        port: u16,
    },
    /// Probe every lane's connectivity and latency.
    ProbeLanes {
        /// Probe target; defaults to a public echo endpoint.
        #[arg(long)]
        url: Option<String>,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let settings = Settings::load();

    match Cli::parse().command {
        Command::Serve { host, port } => {
            // Site crawlers are registered by the embedding deployment;
            // a bare registry still serves cached rows.
            server::serve(&settings, CrawlerRegistry::new(), &host, port).await
        }
        Command::ProbeLanes { url } => {
            let pool = LanePool::new(&settings)?;
            for result in pool.probe_all(url.as_deref()).await {
                match (&result.status, &result.error) {
                    (Some(status), _) => println!(
                        "lane {} [{}]: HTTP {} in {}ms",
                        result.index,
                        result.lane,
                        status,
                        result.latency_ms.unwrap_or(0)
                    ),
                    (None, Some(error)) => {
                        println!("lane {} [{}]: failed: {}", result.index, result.lane, error)
                    }
                    (None, None) => {}
                }
            }
            pool.cleanup();
            Ok(())
        }
    }
}
