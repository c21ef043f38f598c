use crate::domain::order::UserId;
use crate::error::StorefrontError;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::{Ready, ready};
use tracing::warn;
use uuid::Uuid;

/// Header carrying the caller's account id, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// The account making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

impl FromRequest for AuthenticatedUser {
    type Error = StorefrontError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

        ready(match user_id {
            Some(user_id) => Ok(AuthenticatedUser { user_id }),
            None => {
                warn!("missing or invalid {USER_ID_HEADER} header");
                Err(StorefrontError::Unauthorized(format!(
                    "Missing or invalid {USER_ID_HEADER} header"
                )))
            }
        })
    }
}
