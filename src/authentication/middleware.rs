use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, JwtSessionData};

/// Requires a valid session cookie but discards its contents.
pub fn with_auth() -> impl Filter<Extract = ((),), Error = Rejection> + Copy {
    warp::cookie::<String>("session").and_then(|token: String| async move {
        match verify_jwt_session(token) {
            Ok(_) => Ok(()),
            Err(e) => Err(warp::reject::custom(e)),
        }
    })
}

/// Requires a valid session cookie and extracts the claims for the handler.
pub fn with_session() -> impl Filter<Extract = (JwtSessionData,), Error = Rejection> + Copy {
    warp::cookie::<String>("session").and_then(|token: String| async move {
        match verify_jwt_session(token) {
            Ok(session) => Ok(session),
            Err(e) => Err(warp::reject::custom(e)),
        }
    })
}

/// Extracts the session when present and valid, `None` otherwise. Used on
/// listings that show membership flags only to signed-in viewers.
pub fn with_possible_session(
) -> impl Filter<Extract = (Option<JwtSessionData>,), Error = Infallible> + Copy {
    warp::cookie::optional::<String>("session")
        .map(|token: Option<String>| token.and_then(|token| verify_jwt_session(token).ok()))
}
