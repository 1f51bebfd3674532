use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Failure of a call to a third-party HTTP API, grouped by what the caller can do about it.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{service}: authentication failed ({status})")]
    Authentication {
        service: &'static str,
        status: StatusCode,
    },
    #[error("{service}: upstream unavailable ({status})")]
    Unavailable {
        service: &'static str,
        status: StatusCode,
    },
    #[error("{service}: malformed response: {detail}")]
    Malformed {
        service: &'static str,
        detail: String,
    },
    #[error("HTTP client could not be built: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{service}: request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl HttpError {
    pub fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| HttpError::Transport { service, source }
    }

    pub fn malformed(service: &'static str, detail: impl Into<String>) -> Self {
        HttpError::Malformed {
            service,
            detail: detail.into(),
        }
    }
}

/// A client shared by every tool: bounded timeouts and a crate user agent.
pub fn client() -> Result<Client, HttpError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .map_err(HttpError::Client)
}

/// Map a non-success status to [HttpError].
pub fn check_status(service: &'static str, status: StatusCode) -> Result<(), HttpError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(HttpError::Authentication { service, status })
        }
        status => Err(HttpError::Unavailable { service, status }),
    }
}

/// Check the status and decode the body as JSON.
pub async fn decode_json<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<T, HttpError> {
    check_status(service, response.status())?;
    let body = response
        .bytes()
        .await
        .map_err(HttpError::transport(service))?;
    serde_json::from_slice(&body).map_err(|e| HttpError::malformed(service, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_configured_client() {
        assert!(client().is_ok());
    }

    #[test]
    fn status_categories() {
        assert!(check_status("tavily", StatusCode::OK).is_ok());
        assert!(matches!(
            check_status("tavily", StatusCode::UNAUTHORIZED),
            Err(HttpError::Authentication { .. })
        ));
        assert!(matches!(
            check_status("openweathermap", StatusCode::FORBIDDEN),
            Err(HttpError::Authentication { .. })
        ));
        let err = check_status("mymemory", StatusCode::SERVICE_UNAVAILABLE).unwrap_err();
        assert!(matches!(err, HttpError::Unavailable { .. }));
        assert_eq!(
            err.to_string(),
            "mymemory: upstream unavailable (503 Service Unavailable)"
        );
    }
}
