use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Rejected credentials or a token response without a token.
    Auth(String),
    /// Timeout, transport failure or non-2xx HTTP status.
    Comm(String),
    /// A required source returned nothing usable this cycle.
    DataUnavailable(String),
    /// Body that is not the JSON we expect: (body, reason).
    InvalidResponse(String, String),
    Unknown(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Auth(s) => write!(f, "authentication failed: {}", s),
            Error::Comm(s) => write!(f, "communication error: {}", s),
            Error::DataUnavailable(s) => write!(f, "no data: {}", s),
            Error::InvalidResponse(body, reason) => {
                write!(f, "invalid response ({}): {}", reason, body)
            }
            Error::Unknown(s) => write!(f, "unknown error: {}", s),
        }
    }
}

impl std::error::Error for Error {}

fn html(status: Status, body: String) -> response::Result<'static> {
    Response::build()
        .status(status)
        .sized_body(body.len(), Cursor::new(body))
        .header(ContentType::new("text", "html"))
        .ok()
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Error::Auth(s) => html(
                Status::Forbidden,
                format!("<html><body><h3>403 Forbidden</h3>Error while authenticating to SAJ API: <code>{}</code></body></html>", s),
            ),
            Error::Comm(s) => html(
                Status::BadGateway,
                format!("<html><body><h3>502 Bad Gateway</h3>Upstream API unreachable: <code>{}</code></body></html>", s),
            ),
            Error::DataUnavailable(s) => html(
                Status::ServiceUnavailable,
                format!("<html><body><h3>503 Service Unavailable</h3>No data available: <code>{}</code></body></html>", s),
            ),
            _ => html(
                Status::InternalServerError,
                format!(
                    "<html><body><h3>Unknown exception</h3><code>{:?}</code></body></html>",
                    self
                ),
            ),
        }
    }
}
