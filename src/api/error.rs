use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("proxy unreachable: {0}")]
    Transport(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("upstream rate limit exceeded: {0}")]
    RateExceeded(String),
    #[error("invalid response ({1}): {0}")]
    InvalidResponse(String, String),
    #[error("unexpected API response: {0}")]
    UnexpectedApiResponse(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("unknown provider type: {0}")]
    UnknownProviderType(String),
    #[error("internal error")]
    InternalError,
}

impl Error {
    /// Whether retrying the same cycle may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Upstream(_)
                | Error::RateExceeded(_)
                | Error::InvalidResponse(_, _)
        )
    }

    fn status(&self) -> Status {
        match self {
            Error::RateExceeded(_) => Status::TooManyRequests,
            Error::UnknownProvider(_) | Error::UnknownProviderType(_) => Status::NotFound,
            Error::Transport(_)
            | Error::Upstream(_)
            | Error::InvalidResponse(_, _)
            | Error::UnexpectedApiResponse(_) => Status::BadGateway,
            Error::Storage(_) | Error::InternalError => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        Response::build()
            .status(self.status())
            .sized_body(body.len(), Cursor::new(body))
            .header(ContentType::JSON)
            .ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(Error::Transport("timeout".into()).is_transient());
        assert!(Error::RateExceeded("429".into()).is_transient());
        assert!(Error::InvalidResponse("<html>".into(), "expected value".into()).is_transient());
        assert!(!Error::UnexpectedApiResponse("no overview".into()).is_transient());
        assert!(!Error::Storage("read-only".into()).is_transient());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(Status::TooManyRequests, Error::RateExceeded(String::new()).status());
        assert_eq!(Status::NotFound, Error::UnknownProvider("x".into()).status());
        assert_eq!(Status::BadGateway, Error::Upstream("500".into()).status());
        assert_eq!(Status::InternalServerError, Error::InternalError.status());
    }

    #[test]
    fn display() {
        assert_eq!(
            "unknown provider type: fronius",
            Error::UnknownProviderType("fronius".into()).to_string()
        );
    }
}
