use forge_common::ForgeError;

/// Maps an HTTP status + response body into the shared error taxonomy.
/// `retry_after` is the raw `retry-after` header value, if any; providers
/// that send it in seconds rather than milliseconds still round-trip
/// correctly since we only ever surface it back to the caller.
pub fn from_http(status: u16, body: String, retry_after: Option<&str>) -> ForgeError {
    match status {
        401 | 403 => ForgeError::InvalidApiKey(body),
        429 => {
            let retry_after_ms = retry_after
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            ForgeError::RateLimitExceeded { retry_after_ms }
        }
        402 => ForgeError::QuotaExceeded(body),
        500..=599 => ForgeError::ProviderUnavailable(format!("{status}: {body}")),
        _ => ForgeError::MalformedResponse(format!("{status}: {body}")),
    }
}

pub fn malformed(context: impl std::fmt::Display) -> ForgeError {
    ForgeError::MalformedResponse(context.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_invalid_key() {
        assert!(matches!(
            from_http(401, "bad key".into(), None),
            ForgeError::InvalidApiKey(_)
        ));
    }

    #[test]
    fn rate_limit_converts_seconds_to_millis() {
        match from_http(429, String::new(), Some("2")) {
            ForgeError::RateLimitExceeded { retry_after_ms } => assert_eq!(retry_after_ms, 2000),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_error_is_provider_unavailable() {
        assert!(matches!(
            from_http(503, "down".into(), None),
            ForgeError::ProviderUnavailable(_)
        ));
    }
}
