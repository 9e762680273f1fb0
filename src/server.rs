use std::{future::Future, sync::Arc};

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    api::{self, ApiDoc},
    cache::{CachedJson, ReportCache, ReportKey},
    config::Config,
    error::{Error, Result},
    model::Role,
    reports::{Analytics, RequestContext},
    scope::{Caller, has_role},
    store::Store,
};

pub struct AppState {
    pub store: Store,
    pub analytics: Analytics,
    pub cache: ReportCache,
}

impl AppState {
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            analytics: Analytics::new(store.clone(), config.analytics.clone()),
            cache: ReportCache::new(&config.cache),
            store,
        }
    }

    /// Serve a cached report, building it on a miss. The role is checked before the
    /// cache is consulted; scope resolution and the report itself run in the loader.
    pub async fn report<T, F, Fut>(
        &self,
        caller: Caller,
        role: Role,
        key: ReportKey,
        build: F,
    ) -> Result<CachedJson>
    where
        T: Serialize,
        F: FnOnce(Analytics, RequestContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !has_role(&caller, role) {
            return Err(Error::Forbidden(format!(
                "user {} does not have the {:?} role",
                caller.id, role
            )));
        }
        let analytics = self.analytics.clone();
        self.cache
            .get_or_compute(key, async move {
                let ctx = analytics.context(caller, role).await?;
                build(analytics, ctx).await
            })
            .await
    }
}

pub fn router<S>(state: Arc<AppState>, sessions: SessionManagerLayer<S>, config: &Config) -> Router
where
    S: SessionStore + Clone,
{
    Router::new()
        .merge(api::routes())
        .layer(sessions)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Store::connect(&config.database_url).await?;
    let session_store = SqliteStore::new(store.pool().clone());
    session_store.migrate().await?;
    let sessions = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(
            config.server.session_ttl_days,
        )));

    let state = Arc::new(AppState::new(store, &config));
    let app = router(state, sessions, &config);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Starting server at http://{}", listener.local_addr()?);
    info!(
        "Swagger UI available at http://{}/swagger-ui/",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}
