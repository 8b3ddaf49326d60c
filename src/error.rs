use serenity::http::HttpError;
use thiserror::Error;

/// JSON error code Discord returns for "Unknown Member".
pub const UNKNOWN_MEMBER: isize = 10007;

/// A failed call against the Discord API, classified by what the caller can do about it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing permissions")]
    Forbidden,

    #[error("not found (code {code:?})")]
    NotFound { code: Option<isize> },

    #[error("HTTP {status} (code {code:?})")]
    Http { status: u16, code: Option<isize> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Maps an unsuccessful response to the failure the scheduler reports.
pub fn classify(status: u16, code: isize) -> ApiError {
    match status {
        403 => ApiError::Forbidden,
        404 => ApiError::NotFound { code: Some(code) },
        _ if code == UNKNOWN_MEMBER => ApiError::NotFound { code: Some(code) },
        _ => ApiError::Http {
            status,
            code: Some(code),
        },
    }
}

impl From<serenity::Error> for ApiError {
    fn from(err: serenity::Error) -> Self {
        if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &err {
            return classify(response.status_code.as_u16(), response.error.code);
        }

        ApiError::Other(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_discord_responses() {
        assert!(matches!(classify(403, 50013), ApiError::Forbidden));
        assert!(matches!(classify(404, 10013), ApiError::NotFound { code: Some(10013) }));
        assert!(matches!(
            classify(400, UNKNOWN_MEMBER),
            ApiError::NotFound { code: Some(UNKNOWN_MEMBER) }
        ));
        assert!(matches!(
            classify(500, 0),
            ApiError::Http { status: 500, code: Some(0) }
        ));
        assert!(classify(404, 0).is_not_found());
        assert!(!classify(403, 0).is_not_found());
    }

    #[test]
    fn non_http_errors_are_other() {
        let err = ApiError::from(serenity::Error::Other("gateway closed"));
        assert!(matches!(err, ApiError::Other(_)));
    }
}
