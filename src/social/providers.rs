use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::oauth1;
use crate::config::OAuthConfig;

const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const FACEBOOK_ME_URL: &str = "https://graph.facebook.com/me";
const TWITTER_VERIFY_URL: &str = "https://api.twitter.com/1.1/account/verify_credentials.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
    Twitter,
}

impl Provider {
    pub fn name(self) -> &'static str {
        match self {
            Provider::Google => "Google",
            Provider::Facebook => "Facebook",
            Provider::Twitter => "Twitter",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProviderCredentials {
    Google {
        access_token: String,
    },
    Facebook {
        access_token: String,
    },
    Twitter {
        access_token: String,
        access_token_secret: String,
    },
}

impl ProviderCredentials {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Google { .. } => Provider::Google,
            Self::Facebook { .. } => Provider::Facebook,
            Self::Twitter { .. } => Provider::Twitter,
        }
    }

    pub fn access_token(&self) -> &str {
        match self {
            Self::Google { access_token }
            | Self::Facebook { access_token }
            | Self::Twitter { access_token, .. } => access_token,
        }
    }
}

/// Identity attributes returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SocialProfile {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("Invalid or expired {} token", .0.name())]
    InvalidToken(Provider),
    #[error("Your {} account has no email address", .0.name())]
    MissingEmail(Provider),
    #[error("{} login is not configured", .0.name())]
    NotConfigured(Provider),
    #[error("provider request failed: {0}")]
    Upstream(#[from] anyhow::Error),
}

/// Exchanges a provider credential for the account's profile.
#[async_trait]
pub trait SocialAuth: Send + Sync {
    async fn profile(&self, creds: &ProviderCredentials) -> Result<SocialProfile, SocialError>;
}

pub struct HttpSocialAuth {
    client: reqwest::Client,
    twitter_consumer: Option<(String, String)>,
}

impl HttpSocialAuth {
    pub fn new(cfg: &OAuthConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        let twitter_consumer = match (&cfg.twitter_consumer_key, &cfg.twitter_consumer_secret) {
            (Some(key), Some(secret)) => Some((key.clone(), secret.clone())),
            _ => None,
        };
        Ok(Self {
            client,
            twitter_consumer,
        })
    }

    async fn read_profile(
        provider: Provider,
        response: reqwest::Response,
    ) -> Result<SocialProfile, SocialError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::BAD_REQUEST
        {
            warn!(provider = provider.name(), %status, "provider rejected token");
            return Err(SocialError::InvalidToken(provider));
        }
        if !status.is_success() {
            return Err(SocialError::Upstream(anyhow::anyhow!(
                "{} answered {}",
                provider.name(),
                status
            )));
        }
        let profile = response
            .json::<SocialProfile>()
            .await
            .map_err(|e| SocialError::Upstream(e.into()))?;
        debug!(provider = provider.name(), "provider profile fetched");
        Ok(profile)
    }
}

#[async_trait]
impl SocialAuth for HttpSocialAuth {
    async fn profile(&self, creds: &ProviderCredentials) -> Result<SocialProfile, SocialError> {
        let provider = creds.provider();
        let request = match creds {
            ProviderCredentials::Google { access_token } => self
                .client
                .get(GOOGLE_USERINFO_URL)
                .bearer_auth(access_token),
            ProviderCredentials::Facebook { access_token } => self.client.get(FACEBOOK_ME_URL).query(&[
                ("fields", "id,name,email"),
                ("access_token", access_token.as_str()),
            ]),
            ProviderCredentials::Twitter {
                access_token,
                access_token_secret,
            } => {
                let (key, secret) = self
                    .twitter_consumer
                    .as_ref()
                    .ok_or(SocialError::NotConfigured(provider))?;
                let query = [("include_email", "true")];
                let header = oauth1::authorization_header(
                    &oauth1::Credentials {
                        consumer_key: key,
                        consumer_secret: secret,
                        token: access_token,
                        token_secret: access_token_secret,
                    },
                    "GET",
                    TWITTER_VERIFY_URL,
                    &query,
                    &oauth1::nonce(),
                    OffsetDateTime::now_utc().unix_timestamp(),
                )?;
                self.client
                    .get(TWITTER_VERIFY_URL)
                    .query(&query)
                    .header(reqwest::header::AUTHORIZATION, header)
            }
        };
        let response = request
            .send()
            .await
            .map_err(|e| SocialError::Upstream(e.into()))?;
        Self::read_profile(provider, response).await
    }
}
