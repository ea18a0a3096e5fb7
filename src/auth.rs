//! Resolving the caller's identity from the `Authorization: Bearer <token>` header.
//!
//! Tokens are issued by an external identity provider, this module only verifies them.
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use serde::Deserialize;
use tide::http::headers::AUTHORIZATION;
use tide::{Middleware, Next, Request};

use std::sync::Arc;

use crate::error::VoteError;

/**
 * The owner identity of the current request, stored in the request extensions
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Caller(pub String);

pub trait CallerResolver: Send + Sync {
    /**
     * Turn a bearer token into the owner id of the caller
     */
    fn resolve_caller(&self, token: &str) -> Result<String, VoteError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/**
 * Verifies JSON Web Tokens and uses their `sub` claim as the owner id
 */
pub struct JwtResolver {
    key: DecodingKey,
    validation: Validation,
}

impl JwtResolver {
    /**
     * Tokens signed with a shared HS256 secret
     */
    pub fn hs256(secret: &[u8], audience: Option<&str>) -> Self {
        Self::new(
            DecodingKey::from_secret(secret),
            Algorithm::HS256,
            audience,
        )
    }

    /**
     * Tokens signed by an RS256 key pair, such as an Auth0 tenant's signing certificate
     */
    pub fn rs256_pem(pem: &[u8], audience: Option<&str>) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::new(
            DecodingKey::from_rsa_pem(pem)?,
            Algorithm::RS256,
            audience,
        ))
    }

    fn new(key: DecodingKey, algorithm: Algorithm, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(algorithm);
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        Self { key, validation }
    }
}

impl CallerResolver for JwtResolver {
    fn resolve_caller(&self, token: &str) -> Result<String, VoteError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            debug!("Rejected token: {}", err);
            VoteError::Unauthorized(err.to_string())
        })?;
        Ok(data.claims.sub)
    }
}

/**
 * Pull the token out of an `Authorization` header value
 */
pub fn bearer_token(header: Option<&str>) -> Result<&str, VoteError> {
    let header =
        header.ok_or_else(|| VoteError::Unauthorized("Missing Authorization header".to_string()))?;
    let mut parts = header.splitn(2, ' ');

    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Err(VoteError::Unauthorized("Empty bearer token".to_string()))
            } else {
                Ok(token)
            }
        }
        _ => Err(VoteError::Unauthorized(
            "Authorization header is not a bearer token".to_string(),
        )),
    }
}

/**
 * Tide middleware rejecting requests without a valid bearer token, and recording the `Caller`
 * on the ones that have one
 */
#[derive(Clone)]
pub struct BearerAuth {
    resolver: Arc<dyn CallerResolver>,
}

impl BearerAuth {
    pub fn new(resolver: Arc<dyn CallerResolver>) -> Self {
        Self { resolver }
    }
}

#[tide::utils::async_trait]
impl<State: Clone + Send + Sync + 'static> Middleware<State> for BearerAuth {
    async fn handle(&self, mut req: Request<State>, next: Next<'_, State>) -> tide::Result {
        let owner = {
            let header = req
                .header(AUTHORIZATION)
                .map(|values| values.last().as_str());
            let token = bearer_token(header)?;
            self.resolver.resolve_caller(token)?
        };

        debug!("Request from {}", owner);
        req.set_ext(Caller(owner));
        Ok(next.run(req).await)
    }
}

/**
 * Resolver that treats the token itself as the owner id, for tests
 */
#[cfg(test)]
pub struct TokenIsCaller;

#[cfg(test)]
impl CallerResolver for TokenIsCaller {
    fn resolve_caller(&self, token: &str) -> Result<String, VoteError> {
        if token == "invalid" {
            return Err(VoteError::Unauthorized("invalid token".to_string()));
        }
        Ok(token.to_string())
    }
}
