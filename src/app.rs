use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use wordwave_storage::{Backend, RemoteStore, Storage};

use crate::api::types::AppState;
use crate::assistant::{AiSearch, Assistant, ChatClient, RetryPolicy};
use crate::config::{BackendKind, Config};
use crate::session::{spawn_sweeper, SessionStore};

const REMOTE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub data_dir: String,
    pub backend: BackendKind,
    pub session_ttl: Duration,
}

pub async fn open_backend(settings: &Settings, config: &Config) -> Result<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match settings.backend {
        BackendKind::Local => {
            tracing::info!("Using local SQLite backend in {}", settings.data_dir);
            Arc::new(Storage::new(&settings.data_dir).await?)
        }
        BackendKind::Remote => {
            tracing::info!("Using hosted backend at {}", config.supabase_url);
            Arc::new(
                RemoteStore::new(config.remote(REMOTE_TIMEOUT))
                    .context("remote backend needs SUPABASE_URL")?,
            )
        }
    };
    Ok(backend)
}

pub fn build_state(
    backend: Arc<dyn Backend>,
    config: Config,
    session_ttl: Duration,
) -> Result<AppState> {
    let search = match &config.webhook_url {
        Some(url) => Some(AiSearch::new(url.clone(), RetryPolicy::default())?),
        None => {
            tracing::warn!("No AI search webhook configured, AI search is disabled");
            None
        }
    };

    Ok(AppState {
        backend,
        sessions: Arc::new(SessionStore::new(session_ttl)),
        assistant: Assistant {
            search,
            chat: ChatClient::new(config.chat()),
        },
        config: Arc::new(config),
    })
}

pub async fn run(settings: Settings) -> Result<()> {
    let config = Config::load();
    let backend = open_backend(&settings, &config).await?;
    let state = build_state(backend, config, settings.session_ttl)?;

    let sweeper = spawn_sweeper(state.sessions.clone(), settings.session_ttl / 4);
    let served = crate::api::server::serve(settings.port, state).await;
    sweeper.abort();
    served
}
