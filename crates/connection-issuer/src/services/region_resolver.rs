//! Region-aware media server URL selection for direct signing.

use crate::config::Config;
use crate::errors::IssuerError;

/// Pick the media server URL for a request.
///
/// No hint (or an empty one) selects the default `LIVEKIT_URL`. A hint must
/// name a configured region.
///
/// # Errors
///
/// Returns `IssuerError::InvalidRegion` for an unmapped hint.
pub fn resolve_server_url<'a>(
    config: &'a Config,
    region: Option<&str>,
) -> Result<&'a str, IssuerError> {
    match region.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(config.livekit_url.as_str()),
        Some(region) => config
            .region_urls
            .get(region)
            .map(String::as_str)
            .ok_or_else(|| {
                tracing::debug!(target: "issuer.services.region", region = %region, "Unmapped region hint");
                IssuerError::InvalidRegion
            }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> Config {
        let vars = HashMap::from([
            ("LIVEKIT_URL".to_string(), "wss://default.example.com".to_string()),
            ("LIVEKIT_API_KEY".to_string(), "APIkey".to_string()),
            ("LIVEKIT_API_SECRET".to_string(), "secret".to_string()),
            (
                "LIVEKIT_REGION_URLS".to_string(),
                "eu=wss://eu.example.com,us=wss://us.example.com".to_string(),
            ),
        ]);
        Config::from_vars(&vars).unwrap()
    }

    #[test]
    fn test_no_region_uses_default() {
        let config = config();
        assert_eq!(
            resolve_server_url(&config, None).unwrap(),
            "wss://default.example.com"
        );
    }

    #[test]
    fn test_empty_region_uses_default() {
        let config = config();
        assert_eq!(
            resolve_server_url(&config, Some("")).unwrap(),
            "wss://default.example.com"
        );
    }

    #[test]
    fn test_mapped_region() {
        let config = config();
        assert_eq!(
            resolve_server_url(&config, Some("eu")).unwrap(),
            "wss://eu.example.com"
        );
        assert_eq!(
            resolve_server_url(&config, Some("us")).unwrap(),
            "wss://us.example.com"
        );
    }

    #[test]
    fn test_unmapped_region_rejected() {
        let config = config();
        let result = resolve_server_url(&config, Some("ap"));
        assert!(matches!(result, Err(IssuerError::InvalidRegion)));
    }

    #[test]
    fn test_region_lookup_is_case_sensitive() {
        let config = config();
        assert!(matches!(
            resolve_server_url(&config, Some("EU")),
            Err(IssuerError::InvalidRegion)
        ));
    }
}
