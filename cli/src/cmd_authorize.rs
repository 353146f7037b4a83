//! `chirpstream authorize`: the PIN-based OAuth dance, or an xAuth
//! username/password exchange.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use serde_json::json;

use chirpstream_core::Credentials;
use chirpstream_http::{AccessToken, AuthorizationFlow};

/// Obtain a request token, have the user approve it in a browser, then
/// trade the PIN they are shown for access credentials.
pub async fn run(flow: AuthorizationFlow, consumer: Credentials) -> Result<()> {
    consumer.require_consumer_key()?;
    let request_token = flow.request_token(&consumer).await?;
    if !request_token.callback_confirmed {
        tracing::debug!("provider did not confirm the callback");
    }

    eprintln!("Open this page, approve access and enter the PIN shown:");
    eprintln!("  {}", flow.authorize_url(&request_token));
    eprint!("PIN: ");
    std::io::stderr().flush()?;

    let pin = read_line(std::io::stdin().lock(), "PIN")?;
    let access = flow.access_token(&consumer, &request_token, &pin).await?;
    print_access(&access, &consumer)
}

/// xAuth: the password is read from one line of stdin.
pub async fn run_xauth(flow: AuthorizationFlow, consumer: Credentials, username: &str) -> Result<()> {
    consumer.require_consumer_key()?;
    eprint!("Password for {username}: ");
    std::io::stderr().flush()?;
    let password = read_line(std::io::stdin().lock(), "password")?;
    let access = flow.xauth_access_token(&consumer, username, &password).await?;
    print_access(&access, &consumer)
}

fn print_access(access: &AccessToken, consumer: &Credentials) -> Result<()> {
    let credentials = access.credentials(consumer);

    let out = json!({
        "credentials": credentials,
        "screen_name": access.screen_name,
        "user_id": access.user_id,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn read_line(mut input: impl BufRead, what: &str) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).with_context(|| format!("reading {what}"))?;
    let value = line.trim();
    if value.is_empty() {
        bail!("no {what} entered");
    }
    Ok(value.to_string())
}
