use axum::http::HeaderMap;

/// Credentials of whoever made the request.
///
/// Nothing here is verified locally: the value is forwarded to the host
/// platform, whose dataset lookup decides what the caller may touch.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub api_key: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
        }
    }

    /// Reads the `Authorization` header, accepting both a bare API key and `Bearer <key>`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let api_key = headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim())
            .filter(|h| !h.is_empty())
            .map(|h| h.to_string());

        Self { api_key }
    }

    /// Falls back to the service key when the caller brought none
    pub fn or_service_key(self, service_key: Option<&str>) -> Self {
        match self.api_key {
            Some(_) => self,
            None => Self {
                api_key: service_key.map(|k| k.to_string()),
            },
        }
    }
}
