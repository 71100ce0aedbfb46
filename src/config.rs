use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Lifetimes of the one-off tokens mailed to users.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub reset_ttl_minutes: i64,
    pub verification_ttl_days: i64,
}

/// Where links in outgoing mail point to.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Base of this API, e.g. `http://localhost:8080/api/v1`.
    pub public_base_url: String,
    /// Frontend page handling verification links: `{base}/{token}/{uid}`.
    pub verification_base_url: Option<String>,
    /// Frontend page handling reset links: `{base}/{token}`.
    pub reset_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub twitter_consumer_key: Option<String>,
    pub twitter_consumer_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub links: LinkConfig,
    pub mail: MailConfig,
    pub oauth: OAuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "authors-haven".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authors-haven-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
        };
        let tokens = TokenConfig {
            reset_ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES", 60),
            verification_ttl_days: env_parse("VERIFICATION_TTL_DAYS", 7),
        };
        let links = LinkConfig {
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api/v1".into()),
            verification_base_url: std::env::var("VERIFICATION_BASE_URL").ok(),
            reset_base_url: std::env::var("RESET_BASE_URL").ok(),
        };
        let mail = MailConfig {
            smtp_host: std::env::var("SMTP_HOST").ok(),
            smtp_port: env_parse("SMTP_PORT", 587),
            smtp_username: std::env::var("SMTP_USERNAME").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Authors Haven <no-reply@authorshaven.local>".into()),
        };
        let oauth = OAuthConfig {
            twitter_consumer_key: std::env::var("TWITTER_CONSUMER_KEY").ok(),
            twitter_consumer_secret: std::env::var("TWITTER_CONSUMER_SECRET").ok(),
        };
        Ok(Self {
            database_url,
            jwt,
            tokens,
            links,
            mail,
            oauth,
        })
    }

    /// Link mailed after registration.
    pub fn verification_link(&self, uidb64: &str, token: &str) -> String {
        match &self.links.verification_base_url {
            Some(base) => format!("{}/{}/{}", base.trim_end_matches('/'), token, uidb64),
            None => format!(
                "{}/verify/{}/{}",
                self.links.public_base_url.trim_end_matches('/'),
                uidb64,
                token
            ),
        }
    }

    pub fn reset_link(&self, token: &str) -> String {
        match &self.links.reset_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), token),
            None => format!(
                "{}/password-reset/{}",
                self.links.public_base_url.trim_end_matches('/'),
                token
            ),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            tokens: TokenConfig {
                reset_ttl_minutes: 60,
                verification_ttl_days: 7,
            },
            links: LinkConfig {
                public_base_url: "http://localhost:8080/api/v1".into(),
                verification_base_url: None,
                reset_base_url: None,
            },
            mail: MailConfig {
                smtp_host: None,
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
                from: "Authors Haven <no-reply@authorshaven.local>".into(),
            },
            oauth: OAuthConfig {
                twitter_consumer_key: Some("consumer-key".into()),
                twitter_consumer_secret: Some("consumer-secret".into()),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
