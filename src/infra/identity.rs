use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use thiserror::Error;

/// Header carrying the email of the user the auth provider signed in.
pub const IDENTITY_HEADER: &str = "X-User-Email";

/// The acting user, passed explicitly into every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Identity {
            email: email.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("missing X-User-Email header")]
    Missing(),
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Identity {
    type Error = IdentityError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one(IDENTITY_HEADER).map(str::trim) {
            Some(email) if !email.is_empty() => Outcome::Success(Identity::new(email)),
            _ => Outcome::Error((Status::Unauthorized, IdentityError::Missing())),
        }
    }
}
