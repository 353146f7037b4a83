//! chirpstream: sign requests, classify stream lines and follow live streams.

mod backoff;
mod cmd_authorize;
mod cmd_classify;
mod cmd_sign;
mod cmd_stream;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use chirpstream_core::HttpMethod;
use chirpstream_http::{AuthorizationFlow, HttpStreamOpener};
use chirpstream_stream::StreamKind;

use crate::config::AppConfig;
use crate::logging::LogConfig;

#[derive(Parser)]
#[command(
    name = "chirpstream",
    about = "Microblog streaming client",
    version,
    long_about = None
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "CHIRPSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset; overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON logs on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a request and print the signature, header and query string
    Sign {
        /// HTTP method: GET or POST
        #[arg(short, long, default_value = "GET")]
        method: HttpMethod,

        /// Target URL
        url: String,

        /// Request parameter as key=value (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Fixed nonce for reproducible output
        #[arg(long)]
        nonce: Option<String>,

        /// Fixed Unix timestamp for reproducible output
        #[arg(long)]
        timestamp: Option<i64>,

        /// Print OAuth Echo headers instead
        #[arg(long)]
        echo: bool,
    },

    /// Classify stream lines from a file (or stdin) into JSON events
    Classify {
        /// Input file; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Follow a live stream and print each event as a JSON line
    Stream {
        /// firehose | sample | links | filter | retweet | user
        kind: StreamKind,

        /// User ids to follow (filter)
        #[arg(long, value_delimiter = ',')]
        follow: Vec<i64>,

        /// Keywords to track (filter, user)
        #[arg(long, value_delimiter = ',')]
        track: Vec<String>,

        /// Bounding boxes: swLon,swLat,neLon,neLat[,...]
        #[arg(long, allow_hyphen_values = true)]
        locations: Option<String>,

        /// Backfill count; negative values are allowed
        #[arg(long, allow_negative_numbers = true)]
        count: Option<i32>,

        /// Request length-prefixed framing
        #[arg(long)]
        delimited: bool,

        /// Receive all replies (user)
        #[arg(long)]
        replies_all: bool,

        /// `with` modifier (user)
        #[arg(long)]
        with: Option<String>,

        /// Reconnect with backoff when the stream drops
        #[arg(long)]
        reconnect: bool,
    },

    /// Run the PIN-based OAuth exchange and print access credentials
    Authorize {
        /// Use xAuth with this username instead; the password is read from stdin
        #[arg(long, value_name = "USERNAME")]
        xauth: Option<String>,
    },
}

/// Command-line flags win over the config file's `log` section.
fn log_config(cli: &Cli, file: &LogConfig) -> LogConfig {
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        cli.log_level.clone().unwrap_or_else(|| file.level.clone())
    };
    LogConfig {
        level,
        json: cli.log_json || file.json,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init_tracing(&log_config(&cli, &config.log));

    match cli.command {
        Commands::Sign { method, url, params, nonce, timestamp, echo } => cmd_sign::run(
            &config.registry.signer(),
            &config.credentials,
            cmd_sign::SignArgs { method, url, params, nonce, timestamp, echo },
        ),
        Commands::Classify { file } => cmd_classify::run(file.as_deref()),
        Commands::Stream {
            kind,
            follow,
            track,
            locations,
            count,
            delimited,
            replies_all,
            with,
            reconnect,
        } => {
            let opener = HttpStreamOpener::new(config.http.client_config())?;
            let args = cmd_stream::StreamArgs {
                kind,
                follow,
                track,
                locations,
                count,
                delimited,
                replies_all,
                with,
                reconnect,
            };
            cmd_stream::run(opener, config.registry, config.credentials, args).await
        }
        Commands::Authorize { xauth } => {
            let http = HttpStreamOpener::new(config.http.client_config())?;
            let flow = AuthorizationFlow::new(http, config.registry.signer(), config.oauth);
            match xauth {
                Some(username) => cmd_authorize::run_xauth(flow, config.credentials, &username).await,
                None => cmd_authorize::run(flow, config.credentials).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn stream_arguments_parse() {
        let cli = Cli::try_parse_from([
            "chirpstream", "stream", "filter", "--track", "rust,tokio", "--follow", "1,2",
            "--count", "-5", "--locations", "-122.75,36.8,-121.75,37.8",
        ])
        .unwrap();
        match cli.command {
            Commands::Stream { kind, track, follow, count, locations, .. } => {
                assert_eq!(kind, StreamKind::Filter);
                assert_eq!(track, ["rust", "tokio"]);
                assert_eq!(follow, [1, 2]);
                assert_eq!(count, Some(-5));
                assert_eq!(locations.as_deref(), Some("-122.75,36.8,-121.75,37.8"));
            }
            _ => panic!("expected stream"),
        }
    }

    #[test]
    fn log_flags_override_the_file() {
        let file = LogConfig { level: "info".into(), json: true };

        let cli = Cli::try_parse_from(["chirpstream", "classify"]).unwrap();
        assert_eq!(log_config(&cli, &file), file);

        let cli = Cli::try_parse_from(["chirpstream", "--log-level", "error", "classify"]).unwrap();
        assert_eq!(log_config(&cli, &file).level, "error");

        let cli = Cli::try_parse_from(["chirpstream", "classify", "-v"]).unwrap();
        assert_eq!(log_config(&cli, &LogConfig::default()).level, "debug");
    }
}
