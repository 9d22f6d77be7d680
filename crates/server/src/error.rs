use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

pub const MISSING_FILE_MESSAGE: &str = "Must upload a file";

#[derive(Debug)]
pub enum Error {
    // Client errors
    MissingFile,
    Multipart(MultipartError),

    // Infrastructure
    Io(std::io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::MissingFile => (StatusCode::BAD_REQUEST, MISSING_FILE_MESSAGE.to_string()),
            Error::Multipart(err) => (err.status(), err.body_text()),
            Error::Io(err) => {
                error!("I/O failure while handling request: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to store file: {}", err),
                )
            }
        };

        (status, message).into_response()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
