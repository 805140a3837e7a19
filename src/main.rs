use anyhow::Result;
use clap::{Parser, Subcommand};
use musealum_gateway::app::App;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "musealum-gateway")]
#[command(about = "Cultural-discovery prompt gateway for Musealum")]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Listen address, overriding BIND_ADDRESS.
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
    /// Answer a single prompt and print the JSON response.
    Ask {
        #[arg(value_name = "PROMPT")]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "musealum_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let app = match App::new() {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            info!("Starting musealum-gateway");
            if let Err(e) = app.serve(bind).await {
                error!("Server failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Ask { prompt } => match app.ask(&prompt).await {
            Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
            Err(e) => {
                error!("Prompt failed: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_no_subcommand() {
        let args = CliArgs::try_parse_from(["musealum-gateway"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn test_cli_parses_serve_bind() {
        let args =
            CliArgs::try_parse_from(["musealum-gateway", "serve", "--bind", "127.0.0.1:8080"])
                .unwrap();
        match args.command {
            Some(Command::Serve { bind }) => {
                assert_eq!(bind, Some("127.0.0.1:8080".parse().unwrap()))
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_ask() {
        let args = CliArgs::try_parse_from(["musealum-gateway", "ask", "Museums in Bucharest"])
            .unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Ask { ref prompt }) if prompt == "Museums in Bucharest"
        ));
    }

    #[test]
    fn test_cli_rejects_invalid_bind() {
        assert!(CliArgs::try_parse_from(["musealum-gateway", "serve", "--bind", "nowhere"]).is_err());
    }
}
