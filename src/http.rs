//! Small helpers shared by the blocking HTTP clients.

use url::Url;

use crate::error::ConfigError;

/// Joins `path` onto a validated http(s) base URL.
pub(crate) fn endpoint(name: &'static str, base: &str, path: &str) -> Result<String, ConfigError> {
    let trimmed = base.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|err| ConfigError::InvalidUrl {
        name,
        value: base.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            name,
            value: base.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }
    Ok(format!("{trimmed}/{}", path.trim_start_matches('/')))
}

/// Reads a response body, substituting a placeholder when it is unreadable.
pub(crate) fn body_or_placeholder(resp: reqwest::blocking::Response) -> String {
    resp.text()
        .unwrap_or_else(|_| "<body unavailable>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_without_double_slashes() {
        assert_eq!(
            endpoint("base", "https://api.openai.com/v1/", "/embeddings").unwrap(),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            endpoint("base", "ftp://example.com", "x"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(endpoint("base", "not a url", "x").is_err());
    }
}
