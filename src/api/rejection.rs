use std::convert::Infallible;

use log::warn;
use serde::Serialize;
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{MethodNotAllowed, Reject, Rejection},
    reply::{self, Reply},
};

use crate::database::error::Error;

impl Reject for Error {}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Duplicate(_) | Error::SelfReference => {
                StatusCode::BAD_REQUEST
            }
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

fn error_reply(status: StatusCode, detail: String) -> reply::Response {
    reply::with_status(reply::json(&ErrorBody { detail }), status).into_response()
}

/// Turns every rejection into a `{"detail": ...}` JSON body.
pub async fn handle_rejection(rejection: Rejection) -> Result<reply::Response, Infallible> {
    if rejection.is_not_found() {
        return Ok(error_reply(StatusCode::NOT_FOUND, String::from("Not found")));
    }

    if let Some(error) = rejection.find::<Error>() {
        let status = error.status();
        match error {
            // already logged where it was raised
            Error::Query(_) => {
                return Ok(error_reply(status, String::from("Internal server error")))
            }
            _ => warn!("Rejected request ({status}): {error}"),
        }
        return Ok(error_reply(status, error.to_string()));
    }

    if let Some(error) = rejection.find::<BodyDeserializeError>() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, error.to_string()));
    }

    if rejection.find::<MethodNotAllowed>().is_some() {
        return Ok(error_reply(
            StatusCode::METHOD_NOT_ALLOWED,
            String::from("Method not allowed"),
        ));
    }

    warn!("Unhandled rejection: {rejection:?}");
    Ok(error_reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        String::from("Internal server error"),
    ))
}
