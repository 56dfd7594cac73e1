//! Session cookies.
//!
//! A session is the user id, signed with HMAC-SHA256 under the server's cookie secret:
//! `{user_id}.{base64url(hmac(secret, user_id))}`. Signatures are checked in constant time.
//!
//! Handlers that need a logged-in user take a [`SessionUser`] argument. Requests without a valid cookie are rejected
//! with `401 Unauthorized` before the handler runs.
use actix_web::{
    cookie::{Cookie, SameSite},
    dev::Payload,
    web,
    FromRequest,
    HttpRequest,
};
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use log::*;
use loyalty_common::Secret;
use sha2::Sha256;

use crate::errors::{AuthError, ServerError};

pub const SESSION_COOKIE: &str = "loyalty_session";

type HmacSha256 = Hmac<Sha256>;

//--------------------------------------    SessionSigner    ---------------------------------------------------------
#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl SessionSigner {
    pub fn new(secret: &Secret<String>) -> Result<Self, ServerError> {
        let mac = HmacSha256::new_from_slice(secret.reveal().as_bytes())
            .map_err(|e| ServerError::ConfigurationError(format!("Invalid cookie secret. {e}")))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, user_id: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(user_id.to_string().as_bytes());
        let signature = base64::encode_config(mac.finalize().into_bytes(), base64::URL_SAFE_NO_PAD);
        format!("{user_id}.{signature}")
    }

    /// Returns the user id carried by `token` if its signature is valid.
    pub fn verify(&self, token: &str) -> Result<i64, AuthError> {
        let (id, signature) =
            token.split_once('.').ok_or_else(|| AuthError::InvalidSession("Malformed session token".into()))?;
        let user_id = id.parse::<i64>().map_err(|_| AuthError::InvalidSession("Malformed user id".into()))?;
        let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD)
            .map_err(|_| AuthError::InvalidSession("Malformed signature".into()))?;
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AuthError::InvalidSession("Signature mismatch".into()))?;
        Ok(user_id)
    }

    pub fn session_cookie(&self, user_id: i64) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, self.sign(user_id)).path("/").http_only(true).same_site(SameSite::Strict).finish()
    }
}

//--------------------------------------     SessionUser     ---------------------------------------------------------
/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: i64,
}

impl FromRequest for SessionUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(session_user(req))
    }
}

fn session_user(req: &HttpRequest) -> Result<SessionUser, ServerError> {
    let signer = req
        .app_data::<web::Data<SessionSigner>>()
        .ok_or_else(|| ServerError::ConfigurationError("No session signer has been configured".into()))?;
    let cookie = req.cookie(SESSION_COOKIE).ok_or(AuthError::MissingSession)?;
    let user_id = signer.verify(cookie.value()).map_err(|e| {
        debug!("🔑️ Rejecting session cookie. {e}");
        e
    })?;
    trace!("🔑️ Request authenticated for user #{user_id}");
    Ok(SessionUser { user_id })
}

#[cfg(test)]
mod test {
    use super::*;

    fn signer(secret: &str) -> SessionSigner {
        SessionSigner::new(&Secret::new(secret.to_string())).unwrap()
    }

    #[test]
    fn signed_tokens_verify() {
        let signer = signer("correct horse battery staple");
        let token = signer.sign(42);
        assert!(token.starts_with("42."));
        assert_eq!(signer.verify(&token), Ok(42));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let signer = signer("correct horse battery staple");
        let token = signer.sign(42);
        let signature = token.split_once('.').unwrap().1;
        let forged = format!("43.{signature}");
        assert!(matches!(signer.verify(&forged), Err(AuthError::InvalidSession(_))));
        assert!(matches!(signer.verify("42"), Err(AuthError::InvalidSession(_))));
        assert!(matches!(signer.verify("abc.def"), Err(AuthError::InvalidSession(_))));
        assert!(matches!(signer.verify("42.!!!"), Err(AuthError::InvalidSession(_))));
    }

    #[test]
    fn other_secrets_are_rejected() {
        let token = signer("one").sign(7);
        assert!(signer("two").verify(&token).is_err());
    }

    #[test]
    fn cookie_is_http_only() {
        let cookie = signer("s").session_cookie(1);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
