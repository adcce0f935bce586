//! HTTP surface for `relaytvd serve`: live and ad-hoc transcodes, recording
//! playback, the DVR JSON API and the static web client.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path as UrlPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use relaytv_core::{
    render_playlist, ArgumentBuilder, BackendLocator, ChannelMap, DispatchError, DispatchResult,
    DvrStore, LiveTranscode, MdnsBrowser, NewTimer, PlaylistOptions, ProcessSpawner, Recording,
    RecorderHandle, RecorderSettings, RecordingScheduler, Relay, RelayConfig, RuntimeSettings,
    RuntimeSettingsError, SqliteDvrStore, StoreError, StoreResult, StreamDispatcher, StreamPlan,
    SystemProcessSpawner, TranscodeBackend, Transcoder, VideoCodec,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Encoder chunks buffered per client before the relay waits on the socket.
const STREAM_BUFFER_CHUNKS: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub backend_url: Option<String>,
    pub disable_mdns: bool,
}

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteDvrStore>,
    pub recorder: RecorderHandle,
    pub dispatcher: StreamDispatcher,
    pub runtime: RuntimeSettings,
    pub locator: BackendLocator,
    pub channels: Arc<ChannelMap>,
    pub default_host: String,
    /// Cancels every in-flight relay on shutdown.
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState, public_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/stream/:channel", get(live_stream))
        .route("/transcode/*segments", get(adhoc_stream))
        .route("/api/play/*segments", get(playback_stream))
        .route("/api/status", get(status))
        .route("/api/config", get(get_config).post(update_config))
        .route("/api/recordings", get(list_recordings))
        .route("/api/recordings/:id", delete(delete_recording))
        .route("/api/recordings/:id/stop", post(stop_recording))
        .route("/api/timers", get(list_timers).post(add_timer))
        .route("/api/timers/:id", delete(delete_timer))
        .route("/api/channels", get(list_channels))
        .route("/api/version", get(version))
        .route("/playlist.m3u", get(playlist))
        .with_state(state);

    match public_dir {
        Some(dir) => {
            let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
            app.fallback_service(spa)
        }
        None => app,
    }
}

/// Wires the scheduler, discovery and HTTP server together and runs until Ctrl-C.
pub async fn serve(
    config: &RelayConfig,
    store: SqliteDvrStore,
    options: ServeOptions,
) -> Result<()> {
    let bind = options
        .bind
        .clone()
        .unwrap_or_else(|| config.server.bind.clone());
    let port = options.port.unwrap_or(config.server.port);
    let shutdown = CancellationToken::new();

    let store = Arc::new(store);
    let dvr: Arc<dyn DvrStore> = store.clone();

    let backend_url = options
        .backend_url
        .clone()
        .or_else(|| config.discovery.backend_url.clone());
    let locator = match backend_url {
        Some(raw) => {
            let url = Url::parse(&raw).map_err(|err| {
                AppError::InvalidArgument(format!("invalid backend url {raw}: {err}"))
            })?;
            info!(url = %url, "using configured backend");
            BackendLocator::pinned(url)
        }
        None => BackendLocator::new(),
    };

    let runtime = RuntimeSettings::load(
        config.runtime_settings_path(),
        LiveTranscode {
            backend: config.transcode.backend,
            codec: config.transcode.codec,
        },
    )?;

    let channels = match ChannelMap::load(config.channels_path()) {
        Ok(map) => {
            info!(count = map.len(), "channel map loaded");
            map
        }
        Err(err) => {
            warn!(error = %err, "channel map unavailable, playlist will be empty");
            ChannelMap::default()
        }
    };

    let spawner: Arc<dyn ProcessSpawner> =
        Arc::new(SystemProcessSpawner::new(&config.encoder.ffmpeg));
    let transcoder = Transcoder::new(
        ArgumentBuilder::new(config.encoder.vaapi_device.clone()),
        Relay::new(Some(Arc::clone(&spawner)), config.encoder.relay_chunk_bytes),
    );

    let recorder_settings = RecorderSettings::new(
        config.recordings_dir(),
        format!("http://127.0.0.1:{port}"),
    )
    .with_poll_interval(config.scheduler.poll_interval())
    .with_capacity(config.scheduler.max_active_recordings);
    let scheduler = RecordingScheduler::new(Arc::clone(&dvr), recorder_settings, Some(spawner));

    let state = AppState {
        store,
        recorder: scheduler.handle(),
        dispatcher: StreamDispatcher::new(
            locator.clone(),
            runtime.clone(),
            dvr,
            Arc::new(transcoder),
        ),
        runtime,
        locator: locator.clone(),
        channels: Arc::new(channels),
        default_host: format!("localhost:{port}"),
        shutdown: shutdown.clone(),
    };

    let scheduler_task = {
        let token = shutdown.clone();
        tokio::spawn(async move { scheduler.run(token).await })
    };

    if config.discovery.mdns_enabled && !options.disable_mdns && locator.current().is_none() {
        spawn_mdns_browser(
            MdnsBrowser::new(
                locator,
                config.discovery.service_type.clone(),
                config.discovery.service_instance.clone(),
                config.discovery.query_interval(),
            ),
            shutdown.clone(),
        );
    }

    let public_dir = Path::new(&config.server.public_dir);
    let app = router(state, public_dir.is_dir().then_some(public_dir));

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port)).await?;
    let local: SocketAddr = listener.local_addr()?;
    info!(addr = %local, version = VERSION, "relaytvd listening");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal.cancelled() => {}
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        error!(error = %err, "failed to listen for ctrl-c");
                    }
                    info!("shutdown requested");
                    signal.cancel();
                }
            }
        })
        .await?;

    shutdown.cancel();
    if let Err(err) = scheduler_task.await {
        warn!(error = %err, "scheduler task ended abnormally");
    }
    Ok(())
}

/// The mDNS stream is driven on its own thread and runtime, so its future
/// never has to be `Send`.
fn spawn_mdns_browser(browser: MdnsBrowser, shutdown: CancellationToken) {
    let spawned = std::thread::Builder::new()
        .name("mdns-browser".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(error = %err, "failed to start mdns runtime");
                    return;
                }
            };
            if let Err(err) = runtime.block_on(browser.run(shutdown)) {
                warn!(error = %err, "backend discovery stopped");
            }
        });
    if let Err(err) = spawned {
        error!(error = %err, "failed to spawn mdns thread");
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidTimer(reason) => Self::new(StatusCode::BAD_REQUEST, reason),
            other => {
                error!(error = %other, "store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %err, "stream dispatch failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<RuntimeSettingsError> for ApiError {
    fn from(err: RuntimeSettingsError) -> Self {
        error!(error = %err, "failed to persist runtime settings");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Runs a SQLite call on the blocking pool.
async fn with_store<T, F>(state: &AppState, call: F) -> ApiResult<T>
where
    F: FnOnce(&SqliteDvrStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || call(&store))
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .map_err(ApiError::from)
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

async fn live_stream(State(state): State<AppState>, UrlPath(channel): UrlPath<String>) -> Response {
    let plan = state.dispatcher.live(&channel);
    start_stream(&state, plan)
}

async fn adhoc_stream(
    State(state): State<AppState>,
    UrlPath(segments): UrlPath<String>,
) -> Response {
    let plan = state.dispatcher.adhoc(&segments);
    start_stream(&state, plan)
}

async fn playback_stream(
    State(state): State<AppState>,
    UrlPath(segments): UrlPath<String>,
) -> Response {
    let dispatcher = state.dispatcher.clone();
    let plan = tokio::task::spawn_blocking(move || dispatcher.playback(&segments)).await;
    match plan {
        Ok(plan) => start_stream(&state, plan),
        Err(err) => {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Spawns the encoder and answers with a body fed by its stdout. Dropping the
/// body (client gone) closes the channel, which ends the relay and the encoder.
fn start_stream(state: &AppState, plan: DispatchResult<StreamPlan>) -> Response {
    let plan = match plan {
        Ok(plan) => plan,
        Err(err) => return ApiError::from(err).into_response(),
    };
    let running = match state.dispatcher.start(&plan) {
        Ok(running) => running,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let (mut tx, rx) = mpsc::channel::<io::Result<Bytes>>(STREAM_BUFFER_CHUNKS);
    let cancel = state.shutdown.child_token();
    let source = plan.source.clone();
    tokio::spawn(async move {
        match running.pump(&mut tx, cancel).await {
            Ok(outcome) => info!(
                source = %source,
                end = ?outcome.end,
                bytes = outcome.bytes_relayed,
                exit = %outcome.exit,
                "stream closed"
            ),
            Err(err) => warn!(source = %source, error = %err, "stream relay failed"),
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, plan.content_type())
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "close")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    version: &'static str,
    backend: TranscodeBackend,
    codec: VideoCodec,
    backend_url: Option<String>,
    active_recordings: usize,
    active_ids: Vec<i64>,
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let live = state.runtime.current();
    let active_ids = state.recorder.active_recording_ids().await;
    Json(StatusBody {
        status: "ok",
        version: VERSION,
        backend: live.backend,
        codec: live.codec,
        backend_url: state.locator.current().map(String::from),
        active_recordings: active_ids.len(),
        active_ids,
    })
}

async fn get_config(State(state): State<AppState>) -> Json<LiveTranscode> {
    Json(state.runtime.current())
}

#[derive(Debug, Deserialize)]
struct ConfigUpdate {
    backend: Option<TranscodeBackend>,
    codec: Option<VideoCodec>,
}

async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> ApiResult<Json<Value>> {
    let runtime = state.runtime.clone();
    let next = tokio::task::spawn_blocking(move || runtime.update(update.backend, update.codec))
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))??;
    Ok(Json(json!({
        "success": true,
        "backend": next.backend,
        "codec": next.codec,
    })))
}

#[derive(Debug, Serialize)]
struct RecordingView {
    #[serde(flatten)]
    recording: Recording,
    active: bool,
}

async fn list_recordings(State(state): State<AppState>) -> ApiResult<Json<Vec<RecordingView>>> {
    let recordings = with_store(&state, |store| store.list_recordings()).await?;
    let active = state.recorder.active_recording_ids().await;
    Ok(Json(
        recordings
            .into_iter()
            .map(|recording| RecordingView {
                active: active.contains(&recording.id),
                recording,
            })
            .collect(),
    ))
}

async fn delete_recording(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
) -> ApiResult<Json<Value>> {
    if state.recorder.stop_recording(id).await {
        debug!(recording_id = id, "stopped active recording before delete");
    }
    if with_store(&state, move |store| store.delete_recording(id)).await? {
        Ok(success())
    } else {
        Err(ApiError::not_found("Recording not found"))
    }
}

async fn stop_recording(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
) -> ApiResult<Json<Value>> {
    if state.recorder.stop_recording(id).await {
        Ok(success())
    } else {
        Err(ApiError::not_found("Recording not found or not active"))
    }
}

async fn list_timers(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let timers = with_store(&state, |store| store.list_timers()).await?;
    Ok(Json(json!(timers)))
}

async fn add_timer(
    State(state): State<AppState>,
    Json(timer): Json<NewTimer>,
) -> ApiResult<Json<Value>> {
    let id = with_store(&state, move |store| store.add_timer(&timer)).await?;
    Ok(Json(json!({ "success": true, "id": id })))
}

async fn delete_timer(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
) -> ApiResult<Json<Value>> {
    if with_store(&state, move |store| store.delete_timer(id)).await? {
        Ok(success())
    } else {
        Err(ApiError::not_found("Timer not found"))
    }
}

async fn list_channels(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.channels.channels()))
}

async fn version() -> Json<Value> {
    Json(json!({ "version": VERSION }))
}

#[derive(Debug, Default, Deserialize)]
struct PlaylistQuery {
    backend: Option<String>,
    codec: Option<String>,
    bitrate: Option<String>,
    ac6: Option<String>,
}

impl PlaylistQuery {
    /// Unknown values are dropped rather than rejected, like path segments.
    fn options(&self) -> PlaylistOptions {
        PlaylistOptions {
            backend: self.backend.as_deref().and_then(|v| v.parse().ok()),
            codec: self.codec.as_deref().and_then(|v| v.parse().ok()),
            bitrate_kbps: self
                .bitrate
                .as_deref()
                .and_then(|v| v.trim_end_matches(['k', 'K']).parse().ok())
                .filter(|kbps: &u32| *kbps > 0),
            surround: self.ac6.as_deref().is_some_and(leading_number_is_nonzero),
        }
    }
}

/// `ac6=1` turns surround on. A bare `ac6`, `ac6=0` or a non-numeric value
/// leaves it off, reading the value like C `atoi`.
fn leading_number_is_nonzero(value: &str) -> bool {
    let value = value.trim_start();
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    digits
        .chars()
        .take_while(char::is_ascii_digit)
        .any(|digit| digit != '0')
}

async fn playlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PlaylistQuery>,
) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(state.default_host.as_str());
    let body = render_playlist(&state.channels, host, &query.options());
    (
        [(header::CONTENT_TYPE, "audio/x-mpegurl")],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const CHANNELS: &str = "[KQED]\n\tVCHANNEL = 9.1\n[KTVU]\n\tVCHANNEL = 2.1\n";

    fn test_state(dir: &TempDir) -> AppState {
        let store = SqliteDvrStore::builder()
            .path(dir.path().join("dvr.sqlite"))
            .create_if_missing(true)
            .build()
            .unwrap();
        store.initialize().unwrap();
        let store = Arc::new(store);
        let dvr: Arc<dyn DvrStore> = store.clone();
        let runtime = RuntimeSettings::in_memory(LiveTranscode::default());
        let locator = BackendLocator::new();
        let scheduler = RecordingScheduler::new(
            Arc::clone(&dvr),
            RecorderSettings::new(dir.path().join("recordings"), "http://127.0.0.1:3000"),
            None,
        );
        let transcoder = Transcoder::new(ArgumentBuilder::default(), Relay::new(None, 8192));
        AppState {
            store,
            recorder: scheduler.handle(),
            dispatcher: StreamDispatcher::new(
                locator.clone(),
                runtime.clone(),
                dvr,
                Arc::new(transcoder),
            ),
            runtime,
            locator,
            channels: Arc::new(ChannelMap::parse(CHANNELS)),
            default_host: "localhost:3000".into(),
            shutdown: CancellationToken::new(),
        }
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn live_stream_without_backend_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let app = router(test_state(&dir), None);
        let (status, body) = call(app, get("/stream/5.1")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("backend"));
    }

    #[tokio::test]
    async fn playback_rejects_bad_and_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let (status, _) = call(router(state.clone(), None), get("/api/play/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(router(state, None), get("/api/play/42/mp4/h264")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn timers_round_trip_through_the_api() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let body = json!({
            "type": "once",
            "title": "News",
            "channel_num": "5.1",
            "start_time": 1_000,
            "end_time": 2_000,
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/timers")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = call(router(state.clone(), None), request).await;
        assert_eq!(status, StatusCode::OK);
        let created: Value = serde_json::from_slice(&body).unwrap();
        let id = created["id"].as_i64().unwrap();

        let (_, body) = call(router(state.clone(), None), get("/api/timers")).await;
        let listed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(listed[0]["channel"], "5.1");

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/timers/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(router(state, None), request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_timer_is_a_bad_request() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let request = Request::builder()
            .method("POST")
            .uri("/api/timers")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"title": "Backwards", "channel": "2.1", "start_ms": 10, "end_ms": 5})
                    .to_string(),
            ))
            .unwrap();
        let (status, _) = call(router(state, None), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stopping_inactive_recording_is_not_found() {
        let dir = TempDir::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/recordings/7/stop")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(router(test_state(&dir), None), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn config_update_changes_status() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let request = Request::builder()
            .method("POST")
            .uri("/api/config")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"backend":"nvenc","codec":"hevc"}"#))
            .unwrap();
        let (status, _) = call(router(state.clone(), None), request).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(router(state, None), get("/api/status")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["backend"], "nvenc");
        assert_eq!(json["codec"], "hevc");
        assert_eq!(json["active_recordings"], 0);
    }

    #[tokio::test]
    async fn playlist_uses_host_header_and_query() {
        let dir = TempDir::new().unwrap();
        let request = Request::builder()
            .uri("/playlist.m3u?backend=qsv&codec=hevc&bitrate=4000&ac6=1")
            .header(header::HOST, "tv.lan:3000")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(router(test_state(&dir), None), request).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("#EXTM3U\n"));
        assert!(text.contains("http://tv.lan:3000/transcode/qsv/hevc/b4000/ac6/2.1\n"));
    }

    #[tokio::test]
    async fn playlist_ac6_needs_a_nonzero_value() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        for query in ["ac6", "ac6=0", "ac6=", "ac6=true"] {
            let uri = format!("/playlist.m3u?codec=hevc&{query}");
            let (status, body) = call(router(state.clone(), None), get(&uri)).await;
            assert_eq!(status, StatusCode::OK);
            let text = String::from_utf8(body.to_vec()).unwrap();
            assert!(!text.contains("/ac6/"), "{query} enabled surround");
            assert!(text.contains("/transcode/hevc/2.1\n"), "{query}: {text}");
        }
    }

    #[test]
    fn ac6_value_is_read_like_atoi() {
        assert!(leading_number_is_nonzero("1"));
        assert!(leading_number_is_nonzero("06"));
        assert!(leading_number_is_nonzero(" 2x"));
        assert!(!leading_number_is_nonzero("00"));
        assert!(!leading_number_is_nonzero(""));
        assert!(!leading_number_is_nonzero("yes"));
    }
}
