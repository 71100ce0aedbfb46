use serde::{Deserialize, Serialize};

use super::providers::ProviderCredentials;

#[derive(Debug, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleRequest {
    pub google: AccessToken,
}

#[derive(Debug, Deserialize)]
pub struct FacebookRequest {
    pub facebook: AccessToken,
}

#[derive(Debug, Deserialize)]
pub struct TwitterTokens {
    pub access_token: String,
    pub access_token_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct TwitterRequest {
    pub twitter: TwitterTokens,
}

impl From<GoogleRequest> for ProviderCredentials {
    fn from(req: GoogleRequest) -> Self {
        Self::Google {
            access_token: req.google.access_token,
        }
    }
}

impl From<FacebookRequest> for ProviderCredentials {
    fn from(req: FacebookRequest) -> Self {
        Self::Facebook {
            access_token: req.facebook.access_token,
        }
    }
}

impl From<TwitterRequest> for ProviderCredentials {
    fn from(req: TwitterRequest) -> Self {
        Self::Twitter {
            access_token: req.twitter.access_token,
            access_token_secret: req.twitter.access_token_secret,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
