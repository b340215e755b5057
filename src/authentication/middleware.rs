use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_session, Session};
use crate::database::error::Error;

const AUTHORIZATION: &str = "authorization";
const TOKEN_SCHEMES: &[&str] = &["Token ", "Bearer "];

fn parse_header(value: &str, secret: &str) -> Result<Session, Error> {
    let token = TOKEN_SCHEMES
        .iter()
        .find_map(|scheme| value.strip_prefix(scheme))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Unauthorized(String::from("Malformed authorization header")))?;

    verify_session(token, secret).map(Session::from)
}

/// Requires a valid session token in the `Authorization` header.
pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
    warp::header::optional::<String>(AUTHORIZATION).and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            let header = header.ok_or_else(|| {
                Error::Unauthorized(String::from("Authentication credentials were not provided"))
            })?;
            parse_header(&header, &secret).map_err(Rejection::from)
        }
    })
}

/// Anonymous requests pass through as `None`; a token that is present must
/// still be valid.
pub fn with_possible_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (Option<Session>,), Error = Rejection> + Clone {
    warp::header::optional::<String>(AUTHORIZATION).and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            match header {
                Some(header) => parse_header(&header, &secret)
                    .map(Some)
                    .map_err(Rejection::from),
                None => Ok(None),
            }
        }
    })
}
