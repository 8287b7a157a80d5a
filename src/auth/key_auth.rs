//! Static shared-secret authentication strategy: checks a configured header
//! against a configured value. The simplest strategy the loader ships,
//! useful for service-to-service calls and as a minimal example of the
//! [`crate::auth::AuthStrategy`] contract.

use crate::auth::AuthStrategy;
use crate::models::error::GatewayError;
use actix_web::dev::ServiceRequest;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct KeyAuthOptions {
    #[serde(default = "default_header")]
    header: String,
    key: String,
}

fn default_header() -> String {
    "X-Api-Key".to_string()
}

pub struct KeyAuthStrategy;

#[async_trait(?Send)]
impl AuthStrategy for KeyAuthStrategy {
    async fn authenticate(&self, req: &mut ServiceRequest, options: &Value) -> Result<(), GatewayError> {
        let opts: KeyAuthOptions = serde_json::from_value(options.clone())
            .map_err(|e| GatewayError::Config(format!("invalid key-auth strategy options: {e}")))?;

        let provided = req
            .headers()
            .get(&opts.header)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| GatewayError::Auth(format!("missing {} header", opts.header)))?;

        if provided == opts.key {
            Ok(())
        } else {
            Err(GatewayError::Auth("invalid api key".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn options() -> Value {
        serde_json::json!({ "header": "X-Api-Key", "key": "secret-value" })
    }

    #[actix_web::test]
    async fn missing_header_is_rejected() {
        let mut req = TestRequest::default().to_srv_request();
        let err = KeyAuthStrategy.authenticate(&mut req, &options()).await;
        assert!(matches!(err, Err(GatewayError::Auth(_))));
    }

    #[actix_web::test]
    async fn wrong_key_is_rejected() {
        let mut req = TestRequest::default()
            .insert_header(("X-Api-Key", "wrong"))
            .to_srv_request();
        let err = KeyAuthStrategy.authenticate(&mut req, &options()).await;
        assert!(matches!(err, Err(GatewayError::Auth(_))));
    }

    #[actix_web::test]
    async fn correct_key_is_accepted() {
        let mut req = TestRequest::default()
            .insert_header(("X-Api-Key", "secret-value"))
            .to_srv_request();
        assert!(KeyAuthStrategy.authenticate(&mut req, &options()).await.is_ok());
    }
}
