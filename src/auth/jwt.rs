//! Bearer JWT authentication strategy, adapted from the teacher's
//! `middleware::auth` JWT implementation: same `Claims` shape, same header
//! parsing and validation flow, generalized to read its secret/issuer/
//! audience from a strategy's JSON `options` instead of a fixed `JwtConfig`.

use crate::auth::AuthStrategy;
use crate::models::error::GatewayError;
use actix_web::dev::ServiceRequest;
use actix_web::HttpMessage;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct JwtOptions {
    secret: String,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    audience: Option<String>,
}

/// Stateless: every call parses its own `options`, so one registered
/// instance serves every API/group that references the `jwt` strategy with
/// a different secret or issuer.
pub struct JwtStrategy;

#[async_trait(?Send)]
impl AuthStrategy for JwtStrategy {
    async fn authenticate(&self, req: &mut ServiceRequest, options: &Value) -> Result<(), GatewayError> {
        let opts: JwtOptions = serde_json::from_value(options.clone())
            .map_err(|e| GatewayError::Config(format!("invalid jwt strategy options: {e}")))?;

        let token = extract_bearer_token(req)?;
        let claims = validate(&token, &opts)?;
        req.extensions_mut().insert(claims);
        Ok(())
    }
}

fn extract_bearer_token(req: &ServiceRequest) -> Result<String, GatewayError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| GatewayError::Auth("missing Authorization header".to_string()))?;

    let value = header
        .to_str()
        .map_err(|_| GatewayError::Auth("invalid Authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Auth("Authorization header must start with 'Bearer '".to_string()))
}

fn validate(token: &str, opts: &JwtOptions) -> Result<Claims, GatewayError> {
    let mut validation = Validation::new(Algorithm::HS256);
    if let Some(issuer) = &opts.issuer {
        validation.set_issuer(&[issuer]);
    }
    if let Some(audience) = &opts.audience {
        validation.set_audience(&[audience]);
    }

    let decoding_key = DecodingKey::from_secret(opts.secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| GatewayError::Auth(format!("token validation failed: {e}")))
}

/// Test helper mirroring the teacher's `create_test_token`.
#[cfg(test)]
pub fn create_test_token(claims: &Claims, secret: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("encoding a test token should not fail")
}
