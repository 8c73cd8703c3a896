// Native binary for certweb - route inspection and backend probing from a shell

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use certweb::{
    config::{load, CliArgs},
    http::{ApiClient, RequestOptions},
    platform,
    router::parse_href,
    xp,
};

/// certweb - certification browser client core
///
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Parser, Debug)]
#[command(name = "certweb")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Certification browser client core", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse an in-app href and print the route with its rebuilt path
    Route { href: String },
    /// GET a backend path through the retrying pipeline and print the JSON body
    Get {
        path: String,
        /// Bearer token for authenticated endpoints
        #[arg(long, env = "CERTWEB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Compute the XP summary for a list of difficulties (`-` for unknown)
    Xp {
        #[arg(required = true, allow_hyphen_values = true)]
        difficulties: Vec<String>,
    },
    /// Print the resolved configuration
    Config,
}

fn parse_difficulties(raw: &[String]) -> Result<Vec<Option<f64>>> {
    raw.iter()
        .map(|s| match s.as_str() {
            "-" | "null" => Ok(None),
            v => v
                .parse::<f64>()
                .map(Some)
                .with_context(|| format!("invalid difficulty '{v}'")),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let cfg = load(&cli.config).context("Failed to load configuration")?;
    platform::init_logging(cfg.log_level);

    match cli.command {
        Command::Route { href } => {
            let route = parse_href(&href);
            let out = json!({
                "href": href,
                "route": route.kind().as_str(),
                "params": route.params(),
                "path": route.to_path(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Get { path, token } => {
            if !path.starts_with('/') {
                bail!("path must start with '/', got '{path}'");
            }
            let client = ApiClient::from_config(&cfg);
            let opts = RequestOptions::get().bearer_opt(token.as_deref());
            let body: serde_json::Value = client
                .request(&path, opts)
                .await
                .with_context(|| format!("GET {}", client.url_for(&path)))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Xp { difficulties } => {
            let difficulties = parse_difficulties(&difficulties)?;
            match xp::summarize(&difficulties) {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => println!("null"),
            }
        }
        Command::Config => cfg.print_summary(),
    }

    Ok(())
}
