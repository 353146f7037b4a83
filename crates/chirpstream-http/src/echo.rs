//! OAuth Echo: forwarding the user's identity to a third-party service.

use reqwest::RequestBuilder;

use chirpstream_core::oauth::EchoHeaders;

/// Attach `X-Auth-Service-Provider` and `X-Verify-Credentials-Authorization`
/// to a request bound for a delegating service.
pub fn with_echo_headers(builder: RequestBuilder, headers: &EchoHeaders) -> RequestBuilder {
    headers
        .pairs()
        .into_iter()
        .fold(builder, |builder, (name, value)| builder.header(name, value))
}
