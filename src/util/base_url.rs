use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum BaseUrlError {
    #[error("Invalid base URL: {0}")]
    Invalid(#[from] url::ParseError),
    /// API keys must not travel in clear text.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    Insecure,
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Parse the backend base URL and enforce HTTPS.
///
/// `http://` is accepted only for `localhost` / loopback addresses, which is
/// what test servers bind to. A trailing slash is stripped so paths can be
/// appended with `/`.
pub fn validate_base_url(raw: &str) -> Result<Url, BaseUrlError> {
    let mut url = Url::parse(raw.trim())?;

    match url.scheme() {
        "https" => {}
        "http" => {
            let loopback = match url.host() {
                Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
                Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
                Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
                None => false,
            };
            if !loopback {
                tracing::error!(base_url = %url, "Rejecting non-HTTPS base URL");
                return Err(BaseUrlError::Insecure);
            }
            tracing::warn!(base_url = %url, "Using non-HTTPS base URL (loopback only)");
        }
        other => return Err(BaseUrlError::UnsupportedScheme(other.to_string())),
    }

    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
