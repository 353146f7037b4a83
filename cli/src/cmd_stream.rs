//! `chirpstream stream`: follow one live stream and print JSON lines.

use std::sync::Arc;

use anyhow::{bail, Result};
use futures::StreamExt;

use chirpstream_core::Credentials;
use chirpstream_http::HttpStreamOpener;
use chirpstream_stream::{
    BoundingBox, DisconnectReason, RegistryConfig, RegistryError, StreamConnection,
    StreamDescription, StreamKind, StreamRegistry,
};

use crate::backoff::{Backoff, BackoffConfig};

pub struct StreamArgs {
    pub kind: StreamKind,
    pub follow: Vec<i64>,
    pub track: Vec<String>,
    pub locations: Option<String>,
    pub count: Option<i32>,
    pub delimited: bool,
    pub replies_all: bool,
    pub with: Option<String>,
    pub reconnect: bool,
}

pub fn description(args: &StreamArgs) -> Result<StreamDescription> {
    let mut builder = StreamDescription::builder(args.kind);
    if !args.follow.is_empty() {
        builder = builder.follow(args.follow.iter().copied());
    }
    if !args.track.is_empty() {
        builder = builder.track(args.track.iter().cloned());
    }
    if let Some(locations) = &args.locations {
        builder = builder.locations(BoundingBox::parse_list(locations)?);
    }
    if let Some(count) = args.count {
        builder = builder.count(count);
    }
    if args.delimited {
        builder = builder.delimited();
    }
    if args.replies_all {
        builder = builder.replies_all();
    }
    if let Some(with) = &args.with {
        builder = builder.with(with.clone());
    }
    Ok(builder.build()?)
}

async fn connect_with_retry(
    registry: &StreamRegistry,
    credentials: &Credentials,
    description: &StreamDescription,
    backoff: &Backoff,
) -> Result<StreamConnection> {
    let mut attempt = 0;
    loop {
        match registry.connect(credentials.clone(), description.clone()).await {
            Ok(connection) => return Ok(connection),
            Err(e) if e.is_retryable() => {
                attempt += 1;
                let Some(delay) = backoff.next_delay(attempt, &e) else {
                    bail!("giving up after {} attempts: {e}", attempt - 1);
                };
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "connect failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub async fn run(
    opener: HttpStreamOpener,
    config: RegistryConfig,
    credentials: Credentials,
    args: StreamArgs,
) -> Result<()> {
    let description = description(&args)?;
    let registry = StreamRegistry::new(Arc::new(opener), config);
    let mut events = registry.events()?;
    let backoff = Backoff::new(BackoffConfig::default());

    connect_with_retry(&registry, &credentials, &description, &backoff).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted, shutting down");
                registry.shutdown();
                break;
            }
            item = events.next() => {
                let Some(item) = item else { break };
                println!("{}", serde_json::to_string(&item)?);
                match item.disconnect_reason() {
                    Some(DisconnectReason::Requested) | None => {}
                    Some(reason) if args.reconnect => {
                        tracing::warn!(connection = %item.connection, %reason, "reconnecting");
                        match connect_with_retry(&registry, &credentials, &description, &backoff).await {
                            Ok(_) => {}
                            Err(e) if matches!(e.downcast_ref::<RegistryError>(), Some(RegistryError::ShutDown)) => break,
                            Err(e) => return Err(e),
                        }
                    }
                    Some(_) => {
                        registry.shutdown();
                        break;
                    }
                }
            }
        }
    }

    // Flush whatever the workers posted while closing.
    while let Some(item) = events.next().await {
        println!("{}", serde_json::to_string(&item)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(kind: StreamKind) -> StreamArgs {
        StreamArgs {
            kind,
            follow: Vec::new(),
            track: Vec::new(),
            locations: None,
            count: None,
            delimited: false,
            replies_all: false,
            with: None,
            reconnect: false,
        }
    }

    #[test]
    fn filter_arguments_build_a_description() {
        let mut a = args(StreamKind::Filter);
        a.track = vec!["rust".into(), "tokio".into()];
        a.locations = Some("-122.75,36.8,-121.75,37.8".into());
        a.delimited = true;
        let desc = description(&a).unwrap();
        assert_eq!(desc.keywords(), ["rust", "tokio"]);
        assert_eq!(desc.locations().len(), 1);
        assert!(desc.is_delimited());
    }

    #[test]
    fn invalid_combination_is_rejected() {
        let mut a = args(StreamKind::Sample);
        a.follow = vec![12];
        assert!(description(&a).is_err());
        assert!(description(&args(StreamKind::Filter)).is_err());
    }
}
