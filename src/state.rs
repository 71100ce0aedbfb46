use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::repo::UserRepo;
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::mail::{Mailer, OutboxMailer, SmtpMailer};
use crate::memory::MemoryStore;
use crate::notifications::repo::NotificationRepo;
use crate::reset::repo::ResetRepo;
use crate::social::providers::{HttpSocialAuth, SocialAuth};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub resets: Arc<dyn ResetRepo>,
    pub notifications: Arc<dyn NotificationRepo>,
    pub mailer: Arc<dyn Mailer>,
    pub social: Arc<dyn SocialAuth>,
}

/// The three repositories, usually backed by one store.
pub struct Repos {
    pub users: Arc<dyn UserRepo>,
    pub resets: Arc<dyn ResetRepo>,
    pub notifications: Arc<dyn NotificationRepo>,
}

impl Repos {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserRepo + ResetRepo + NotificationRepo + 'static,
    {
        Self {
            users: store.clone(),
            resets: store.clone(),
            notifications: store,
        }
    }
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let repos = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url).await?;
                if let Err(e) = store.migrate().await {
                    warn!(error = %e, "migration failed; continuing");
                }
                info!("using postgres store");
                Repos::shared(Arc::new(store))
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
                Repos::shared(Arc::new(MemoryStore::new()))
            }
        };

        let mailer: Arc<dyn Mailer> = match SmtpMailer::from_config(&config.mail)? {
            Some(smtp) => Arc::new(smtp),
            None => {
                warn!("SMTP_HOST not set; outgoing mail is only logged");
                Arc::new(OutboxMailer::new())
            }
        };
        let social = Arc::new(HttpSocialAuth::new(&config.oauth)?) as Arc<dyn SocialAuth>;

        Ok(Self::from_parts(config, repos, mailer, social))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        repos: Repos,
        mailer: Arc<dyn Mailer>,
        social: Arc<dyn SocialAuth>,
    ) -> Self {
        Self {
            config,
            users: repos.users,
            resets: repos.resets,
            notifications: repos.notifications,
            mailer,
            social,
        }
    }
}
