//! `chirpstream sign`: print a signed request without sending it.

use anyhow::{anyhow, Result};
use serde_json::json;

use chirpstream_core::oauth::{
    HttpMethod, OAuthSigner, SigningContext, DEFAULT_ECHO_PROVIDER,
};
use chirpstream_core::Credentials;

pub struct SignArgs {
    pub method: HttpMethod,
    pub url: String,
    pub params: Vec<String>,
    pub nonce: Option<String>,
    pub timestamp: Option<i64>,
    pub echo: bool,
}

/// Split `key=value` arguments; a bare key gets an empty value.
pub fn parse_params(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some(("", _)) => Err(anyhow!("parameter {pair:?} has an empty name")),
            Some((key, value)) => Ok((key.to_string(), value.to_string())),
            None if pair.is_empty() => Err(anyhow!("empty parameter")),
            None => Ok((pair.clone(), String::new())),
        })
        .collect()
}

fn context(args: &SignArgs) -> SigningContext {
    let fresh = SigningContext::fresh();
    SigningContext::fixed(
        args.nonce.clone().unwrap_or(fresh.nonce),
        args.timestamp.unwrap_or(fresh.timestamp),
    )
}

pub fn render(signer: &OAuthSigner, creds: &Credentials, args: &SignArgs) -> Result<serde_json::Value> {
    let params = parse_params(&args.params)?;
    let context = context(args);

    if args.echo {
        let echo = signer.echo_headers_with(creds, DEFAULT_ECHO_PROVIDER, &params, &context)?;
        let headers: serde_json::Map<_, _> = echo
            .pairs()
            .into_iter()
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect();
        return Ok(json!({ "echo_headers": headers }));
    }

    let signed = signer.sign_with(creds, args.method, &args.url, &params, &context)?;
    Ok(json!({
        "method": signed.method().as_str(),
        "url": signed.url(),
        "base_string": signed.base_string(),
        "signature": signed.signature(),
        "authorization": signed.authorization_header(None),
        "query": signed.query_string(),
        "request_url": signed.url_with_query(),
    }))
}

pub fn run(signer: &OAuthSigner, creds: &Credentials, args: SignArgs) -> Result<()> {
    let out = render(signer, creds, &args)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
