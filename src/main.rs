//! Luna Tutor - moon-phase tutoring chat API
//!
//! Serves "Dr. Luna", a friendly moon expert for elementary-school students.
//! Each browser session gets its own conversation; replies come from any
//! OpenAI-compatible or Ollama completion endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod providers;
mod routes;

use config::{Config, Persona};
use crate::core::{DispatcherSettings, SessionRegistry, TurnDispatcher, TutorSession};
use providers::CompletionProvider;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub persona: Arc<Persona>,
    pub provider: Arc<dyn CompletionProvider>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config, persona: Persona, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            config: Arc::new(config),
            persona: Arc::new(persona),
            provider,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// A fresh session with an empty profile and its own dispatcher.
    pub fn open_session(&self) -> TutorSession {
        let dispatcher = TurnDispatcher::new(
            self.provider.clone(),
            DispatcherSettings {
                options: self.config.completion_options(),
                timeout: self.config.request_timeout,
            },
        );

        TutorSession::new(
            self.persona.clone(),
            self.config.rename_policy,
            self.config.classes.default_label(),
            dispatcher,
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "luna_tutor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let persona = match &config.persona_file {
        Some(path) => Persona::load_from_file(path).await?,
        None => Persona::builtin(),
    };

    let provider = providers::from_config(&config)?;
    tracing::info!(
        "🌙 Using {} provider with model {} (max_tokens={}, temperature={}, timeout={:?})",
        provider.name(),
        config.model,
        config.max_tokens,
        config.temperature,
        config.request_timeout
    );

    let state = AppState::new(config, persona, provider);

    let app = Router::new()
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    tracing::info!("🔭 Dr. Luna is listening at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
