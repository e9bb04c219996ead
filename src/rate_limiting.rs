use actix_governor::governor::middleware::StateInformationMiddleware;
use actix_governor::{
    GovernorConfig, GovernorConfigBuilder, KeyExtractor, SimpleKeyExtractionError,
};
use actix_web::dev::ServiceRequest;

use crate::configuration::RateLimiting;

/// Rate limit per credentials, or per peer IP for anonymous calls
#[derive(Clone)]
pub struct UserToken;

impl KeyExtractor for UserToken {
    type Key = String;
    type KeyExtractionError = SimpleKeyExtractionError<&'static str>;

    fn extract(&self, req: &ServiceRequest) -> Result<Self::Key, Self::KeyExtractionError> {
        let auth = req
            .headers()
            .get("Authorization")
            .and_then(|token| token.to_str().ok())
            .map(|token| token.trim().to_owned());

        if let Some(auth) = auth {
            return Ok(auth);
        }

        req.request()
            .peer_addr()
            .map(|x| x.ip().to_string())
            .ok_or_else(|| SimpleKeyExtractionError::new("Can't extract key"))
    }
}

pub fn build_rate_limiting_conf(
    settings: &RateLimiting,
) -> anyhow::Result<GovernorConfig<UserToken, StateInformationMiddleware>> {
    GovernorConfigBuilder::default()
        .per_second(settings.per_second)
        .burst_size(settings.burst_size)
        .key_extractor(UserToken)
        .use_headers()
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Rate limiting needs a non zero period and burst size"))
}
