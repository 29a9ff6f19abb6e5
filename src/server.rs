use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use crate::analysis::{AnalysisStage, Analyzer};
use crate::api::{AnalyzeRequest, HistoryQuery, HistoryResponse, ValidationError};
use crate::auth::{require_identity, AuthState, Identity};
use crate::history::HistoryStore;
use crate::format_currency;

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<StreamEvent>>>>;

const ANALYSIS_CHANNEL_TTL: Duration = Duration::from_secs(10);
const STREAM_CHANNEL_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    analyzer: Analyzer,
    history: Arc<HistoryStore>,
    channels: Channels,
}

impl AppState {
    pub fn new(analyzer: Analyzer, history: Arc<HistoryStore>) -> Self {
        Self {
            analyzer,
            history,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of progress channels currently held open.
    pub async fn open_streams(&self) -> usize {
        self.channels.lock().await.len()
    }
}

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub web_root: Option<String>,
}

#[derive(Clone, Serialize)]
struct StreamEvent {
    event: String,
    message: String,
    timestamp_ms: u128,
}

#[derive(serde::Deserialize)]
struct StreamQuery {
    request_id: String,
}

pub async fn serve(state: AppState, auth: AuthState, options: ServeOptions) -> Result<(), String> {
    let app = build_app(state, auth, options.web_root.as_deref());

    let addr: SocketAddr = format!("{}:{}", options.host, options.port)
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| format!("failed to bind server: {}", err))?;
    tracing::info!(%addr, "media value server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| format!("server error: {}", err))?;

    Ok(())
}

pub fn build_app(state: AppState, auth: AuthState, web_root: Option<&str>) -> Router {
    let protected = Router::new()
        .route("/api/analyze", post(analyze_handler))
        .route("/api/history", get(history_handler))
        .route_layer(axum::middleware::from_fn_with_state(auth, require_identity));

    let mut app = Router::new()
        .route("/api/health", get(health))
        .route("/api/analyze/stream", get(stream_handler))
        .merge(protected)
        .with_state(state);

    if let Some(web_root) = web_root {
        let index_path = format!("{}/index.html", web_root.trim_end_matches('/'));
        let static_service = ServeDir::new(web_root).not_found_service(ServeFile::new(index_path));
        app = app.fallback_service(static_service);
    }

    app.layer(build_cors())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn analyze_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "rejected analyze body");
            return bad_request(ValidationError::MissingFields);
        }
    };
    let request_id = request.request_id.clone();
    let input = match request.into_input() {
        Ok(input) => input,
        Err(err) => return bad_request(err),
    };

    tracing::info!(
        user = %identity.0,
        post_url = %input.post_url,
        brands = %input.brands.join(", "),
        "analyzing post"
    );

    // Progress is only streamed when the client named the request up front.
    let channel = match request_id.as_deref() {
        Some(id) => Some(get_or_create_channel(&state, id).await),
        None => None,
    };

    let result = state
        .analyzer
        .analyze_post_with_progress(&input.post_url, &input.brands, |stage: AnalysisStage| {
            if let Some(sender) = channel.as_ref() {
                send_event(sender, stage.key(), stage.message());
            }
        })
        .await;

    if let Some(id) = request_id {
        schedule_cleanup(state.channels.clone(), id, ANALYSIS_CHANNEL_TTL);
    }

    if result.is_error() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(result)).into_response();
    }

    match state
        .history
        .record(&identity.0, &input.post_url, &input.brands, &result)
        .await
    {
        Ok(Some(record)) => {
            tracing::info!(
                user = %identity.0,
                record_id = %record.id,
                media_value = %record.media_value_usd.map(format_currency).unwrap_or_default(),
                "analysis recorded"
            );
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(user = %identity.0, error = %err, "failed to record analysis");
        }
    }

    (StatusCode::OK, Json(result)).into_response()
}

fn bad_request(err: ValidationError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

async fn history_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let records = state.history.recent(&identity.0, query.limit()).await;
    Json(HistoryResponse {
        user_id: identity.0,
        records,
    })
}

async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let sender = get_or_create_channel(&state, &query.request_id).await;
    let receiver = sender.subscribe();
    // Subscriptions for ids that are never analyzed must not linger.
    schedule_cleanup(state.channels.clone(), query.request_id.clone(), STREAM_CHANNEL_TTL);
    let open = state.open_streams().await;
    tracing::debug!(request_id = %query.request_id, open, "progress stream opened");
    let stream = BroadcastStream::new(receiver).filter_map(|event| match event {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data)))
        }
        Err(_) => None,
    });

    send_event(&sender, "connected", "Streaming analysis progress");
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(8)))
}

async fn get_or_create_channel(state: &AppState, request_id: &str) -> broadcast::Sender<StreamEvent> {
    let mut guard = state.channels.lock().await;
    if let Some(sender) = guard.get(request_id) {
        return sender.clone();
    }
    let (sender, _) = broadcast::channel(32);
    guard.insert(request_id.to_string(), sender.clone());
    sender
}

fn send_event(sender: &broadcast::Sender<StreamEvent>, event: &str, message: &str) {
    let _ = sender.send(StreamEvent {
        event: event.to_string(),
        message: message.to_string(),
        timestamp_ms: now_ms(),
    });
}

fn schedule_cleanup(channels: Channels, request_id: String, ttl: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        let mut guard = channels.lock().await;
        guard.remove(&request_id);
    });
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal, starting graceful shutdown");
}
