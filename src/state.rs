use crate::auth::{
    events::{AuthEvents, TracingAuthEvents},
    repo::{PgUserStore, UserStore},
    JwtKeys,
};
use crate::config::AppConfig;
use crate::polls::repo::{PgPollStore, PollStore};
use sqlx::PgPool;
use std::sync::Arc;
use tera::Tera;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: Arc<JwtKeys>,
    pub polls: Arc<dyn PollStore>,
    pub users: Arc<dyn UserStore>,
    pub templates: Arc<Tera>,
    pub auth_events: Arc<dyn AuthEvents>,
}

impl AppState {
    /// Postgres-backed state logging auth events through `tracing`.
    pub fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        Self::from_parts(
            config,
            Arc::new(PgPollStore::new(db.clone())),
            Arc::new(PgUserStore::new(db)),
            Arc::new(TracingAuthEvents),
        )
    }

    pub fn from_parts(
        config: AppConfig,
        polls: Arc<dyn PollStore>,
        users: Arc<dyn UserStore>,
        auth_events: Arc<dyn AuthEvents>,
    ) -> anyhow::Result<Self> {
        let keys = Arc::new(JwtKeys::from(&config));
        let templates = Arc::new(crate::templates::engine()?);
        Ok(Self {
            config: Arc::new(config),
            keys,
            polls,
            users,
            templates,
            auth_events,
        })
    }
}
