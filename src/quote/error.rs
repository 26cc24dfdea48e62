use std::error;
use std::fmt;

/// Failure raised by the market data client.
#[derive(Debug)]
pub enum MarketDataError {
    /// DNS, timeout or connection failure before a status code was seen.
    Network(Box<dyn error::Error + Send + Sync>),
    /// Any non-2xx status other than 429.
    Upstream { status: u16 },
    /// Still rate limited after the retry budget was spent.
    RateLimitExceeded { last_wait_hint_ms: u64 },
    /// The body did not have the documented shape.
    MalformedResponse(String),
}

/// Cloneable classification of a [`MarketDataError`], kept in store state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Upstream { status: u16 },
    RateLimitExceeded { last_wait_hint_ms: u64 },
    MalformedResponse,
}

impl MarketDataError {
    pub fn kind(&self) -> FailureKind {
        match *self {
            MarketDataError::Network(_) => FailureKind::Network,
            MarketDataError::Upstream { status } => FailureKind::Upstream { status },
            MarketDataError::RateLimitExceeded { last_wait_hint_ms } => {
                FailureKind::RateLimitExceeded { last_wait_hint_ms }
            }
            MarketDataError::MalformedResponse(_) => FailureKind::MalformedResponse,
        }
    }

    /// Banner text for the presentation layer.
    pub fn user_message(&self) -> String {
        match *self {
            MarketDataError::Network(_) => {
                "Unable to reach the price service. Check your connection and retry.".to_string()
            }
            MarketDataError::Upstream { status } => {
                format!("Unable to load prices (provider responded with {}).", status)
            }
            MarketDataError::RateLimitExceeded { .. } => {
                "Rate limit exceeded. Please try again in a moment.".to_string()
            }
            MarketDataError::MalformedResponse(_) => {
                "Unable to load prices: unexpected response from the provider.".to_string()
            }
        }
    }
}

impl fmt::Display for MarketDataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MarketDataError::Network(ref err) => write!(f, "Network Error: {}", err),
            MarketDataError::Upstream { status } => {
                write!(f, "Upstream Error: provider responded with {}", status)
            }
            MarketDataError::RateLimitExceeded { last_wait_hint_ms } => write!(
                f,
                "Rate Limit Exceeded: last wait hint was {}ms",
                last_wait_hint_ms
            ),
            MarketDataError::MalformedResponse(ref detail) => {
                write!(f, "Malformed Response: {}", detail)
            }
        }
    }
}

impl error::Error for MarketDataError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            MarketDataError::Network(ref err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> MarketDataError {
        MarketDataError::Network(Box::new(err))
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(err: serde_json::Error) -> MarketDataError {
        MarketDataError::MalformedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_display_upstream_error() {
        let err = MarketDataError::Upstream { status: 503 };
        assert_eq!(
            "Upstream Error: provider responded with 503",
            format!("{}", err)
        );
    }

    #[test]
    fn test_kind_keeps_wait_hint() {
        let err = MarketDataError::RateLimitExceeded {
            last_wait_hint_ms: 4000,
        };
        assert_eq!(
            FailureKind::RateLimitExceeded {
                last_wait_hint_ms: 4000
            },
            err.kind()
        );
    }

    #[test]
    fn test_network_error_exposes_source() {
        let cause = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let err = MarketDataError::Network(Box::new(cause));
        assert_eq!(FailureKind::Network, err.kind());
        assert!(error::Error::source(&err).is_some());
        assert_eq!("Network Error: reset by peer", format!("{}", err));
    }

    #[test]
    fn test_json_error_is_malformed_response() {
        let json_err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err: MarketDataError = json_err.into();
        assert_eq!(FailureKind::MalformedResponse, err.kind());
    }
}
