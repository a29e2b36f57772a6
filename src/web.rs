use crate::{
    config::Config,
    display::{format_record, DisplayRecord},
    recommend::{RecommendError, Recommender, Tone, ALL},
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, RwLock};
use tokio::signal;

/// Shared daemon state. The recommender is absent until the background
/// initialization (catalog load + index build) finishes; requests arriving
/// before that get a 503, never an empty result.
#[derive(Default)]
pub struct SharedState {
    recommender: RwLock<Option<Arc<Recommender>>>,
}

impl SharedState {
    pub fn set_recommender(&self, recommender: Arc<Recommender>) {
        *self.recommender.write().expect("state lock poisoned") = Some(recommender);
    }

    fn recommender(&self) -> Result<Arc<Recommender>, HttpError> {
        self.recommender
            .read()
            .expect("state lock poisoned")
            .clone()
            .ok_or(HttpError(RecommendError::NotReady))
    }
}

pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/categories", get(categories))
        .route("/recommend", post(recommend))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

async fn start_app(config: Config, addr: String) {
    let state = Arc::new(SharedState::default());

    // Catalog load and index build can take minutes on first run (model
    // download + corpus embedding); bind first and answer 503 meanwhile.
    let init_state = state.clone();
    tokio::task::spawn_blocking(move || match crate::build_recommender(&config) {
        Ok(recommender) => {
            log::info!(
                "recommender ready: {} books in catalog",
                recommender.catalog().len()
            );
            init_state.set_recommender(Arc::new(recommender));
        }
        Err(err) => {
            log::error!("initialization failed, daemon will stay unready: {err:?}");
        }
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {addr}: {err}"));
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("http server failed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub fn start_daemon(config: Config, addr: String) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async { start_app(config, addr).await });
}

// Wraps `RecommendError` so axum knows what status each variant maps to.
#[derive(Debug)]
struct HttpError(RecommendError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.0 {
            RecommendError::NotReady => (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": self.0.to_string()}).to_string(),
            ),
            RecommendError::Search(_) => {
                log::error!("{self:?}");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": self.0.to_string()}).to_string(),
                )
            }
        }
        .into_response()
    }
}

impl From<RecommendError> for HttpError {
    fn from(err: RecommendError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
    pub tones: Vec<String>,
}

async fn categories(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<CategoriesResponse>, HttpError> {
    let recommender = state.recommender()?;

    let mut categories = vec![ALL.to_string()];
    categories.extend(recommender.catalog().categories());

    Ok(Json(CategoriesResponse {
        categories,
        tones: Tone::NAMES.iter().map(|t| t.to_string()).collect(),
    }))
}

fn default_all() -> String {
    ALL.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommendRequest {
    pub query: String,

    #[serde(default = "default_all")]
    pub category: String,

    #[serde(default = "default_all")]
    pub tone: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<DisplayRecord>,
}

async fn recommend(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, HttpError> {
    log::debug!("payload: {payload:?}");

    let recommender = state.recommender()?;

    // Unknown tones degrade to no reordering rather than failing the
    // request; the vocabulary is advertised by /categories.
    let tone = payload.tone.parse::<Tone>().unwrap_or_else(|err| {
        log::warn!("{err}, treating as '{ALL}'");
        Tone::All
    });

    // fastembed's query embedding is synchronous
    let books = tokio::task::block_in_place(move || {
        recommender.recommend(&payload.query, &payload.category, tone)
    })?;

    Ok(Json(RecommendResponse {
        recommendations: books.iter().map(format_record).collect(),
    }))
}
