use std::env;

use axum::http::HeaderMap;

use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Optional API key gate. When the `API_KEY` environment variable is unset
/// or empty, requests pass through unchecked.
#[derive(Debug, Clone, Default)]
pub struct ApiKey {
    value: Option<String>,
}

impl ApiKey {
    pub fn from_env() -> Self {
        let value = env::var("API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self { value }
    }

    #[cfg(test)]
    pub fn fixed(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.value.is_some()
    }
}

pub fn require_api_key(headers: &HeaderMap, key: &ApiKey) -> Result<(), ApiError> {
    let Some(expected) = key.value.as_deref() else {
        return Ok(());
    };

    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_key_allows_everything() {
        let key = ApiKey::default();
        assert!(require_api_key(&HeaderMap::new(), &key).is_ok());
    }

    #[test]
    fn configured_key_rejects_missing_header() {
        let key = ApiKey::fixed("secret");
        assert!(matches!(
            require_api_key(&HeaderMap::new(), &key),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn configured_key_accepts_matching_header() {
        let key = ApiKey::fixed("secret");
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, "secret".parse().unwrap());
        assert!(require_api_key(&headers, &key).is_ok());
    }
}
