use actix_web::dev::{Service, ServerHandle};
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use tokio::runtime::Runtime;

use crate::config::ServerConfig;
use crate::main_db::DEFAULT_LIST_LIMIT;
use crate::route_simulator::{SimulationParams, DEFAULT_INTERVAL_SECONDS, DEFAULT_SPEED_KNOTS};
use crate::storage::{RunStatus, Storage};
use crate::track::TrackId;
use crate::utils::unix_to_rfc3339;

const GEOJSON_SUFFIX: &str = ".geojson";

#[derive(Serialize)]
struct TrackListItem {
    id: TrackId,
    name: String,
    started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_m: Option<f64>,
}

#[derive(Serialize)]
struct SimulationResponse {
    track_id: TrackId,
    points: usize,
    ended_at: i64,
    speed_kn: f64,
    interval: i64,
    status: &'static str,
}

pub struct AppState {
    storage: Arc<Storage>,
    // set on shutdown, in-flight simulations stop at their next step
    cancel: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self::with_cancel(storage, Arc::new(AtomicBool::new(false)))
    }

    pub fn with_cancel(storage: Arc<Storage>, cancel: Arc<AtomicBool>) -> Self {
        AppState { storage, cancel }
    }
}

fn error_response(
    status: StatusCode,
    code: &str,
    message: &str,
    details: Option<Value>,
) -> HttpResponse {
    let mut error = json!({ "code": code, "message": message });
    if let Some(details) = details {
        error["details"] = details;
    }
    HttpResponse::build(status).json(json!({ "error": error }))
}

fn db_error(message: &str, err: impl std::fmt::Display) -> HttpResponse {
    warn!("{}: {}", message, err);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "db_error",
        message,
        Some(json!({ "err": format!("{:#}", err) })),
    )
}

// Query values that fail to parse are treated as absent.
fn query_value<T: std::str::FromStr>(query: &HashMap<String, String>, key: &str) -> Option<T> {
    query.get(key).and_then(|v| v.parse().ok())
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}

async fn list_tracks(
    query: web::Query<HashMap<String, String>>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let limit = query_value(&query, "limit").unwrap_or(DEFAULT_LIST_LIMIT);
    let storage = data.storage.clone();
    let tracks = match web::block(move || storage.list_tracks(limit)).await {
        Ok(Ok(tracks)) => tracks,
        Ok(Err(err)) => return db_error("failed to list tracks", err),
        Err(err) => return db_error("failed to list tracks", err),
    };

    let tracks: Vec<TrackListItem> = tracks
        .into_iter()
        .map(|track| TrackListItem {
            id: track.id,
            started_at: unix_to_rfc3339(track.started_at).unwrap_or_default(),
            ended_at: track.ended_at.and_then(unix_to_rfc3339),
            distance_m: track.distance_m,
            name: track.name,
        })
        .collect();
    HttpResponse::Ok().json(json!({ "tracks": tracks }))
}

async fn track_geojson(file: web::Path<String>, data: web::Data<AppState>) -> HttpResponse {
    let file = file.into_inner();
    let raw_id = match file.strip_suffix(GEOJSON_SUFFIX) {
        Some(raw_id) => raw_id,
        None => {
            return error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                "invalid track path",
                None,
            )
        }
    };
    let id: TrackId = match raw_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_id",
                "invalid track id",
                Some(json!({ "id": raw_id })),
            )
        }
    };

    let storage = data.storage.clone();
    match web::block(move || storage.track_feature(id)).await {
        Ok(Ok(Some(feature))) => HttpResponse::Ok()
            .content_type("application/geo+json; charset=utf-8")
            .body(feature.to_string()),
        Ok(Ok(None)) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            "track not found",
            Some(json!({ "id": id })),
        ),
        Ok(Err(err)) => db_error("failed to load track", err),
        Err(err) => db_error("failed to load track", err),
    }
}

async fn simulate_broughton(
    query: web::Query<HashMap<String, String>>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let params = SimulationParams::new(
        query_value(&query, "speed_kn").unwrap_or(DEFAULT_SPEED_KNOTS),
        query_value(&query, "interval_s").unwrap_or(DEFAULT_INTERVAL_SECONDS),
    );
    let storage = data.storage.clone();
    let cancel = data.cancel.clone();
    let report =
        match web::block(move || storage.simulate_broughton_to_newcastle(params, &cancel)).await {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => return db_error("simulation failed", err),
            Err(err) => return db_error("simulation failed", err),
        };
    let status = match report.status {
        RunStatus::Completed => "completed",
        RunStatus::Canceled => "canceled",
    };
    HttpResponse::Ok().json(SimulationResponse {
        track_id: report.track_id,
        points: report.points,
        ended_at: report.ended_at,
        speed_kn: report.speed_knots,
        interval: report.interval_seconds,
        status,
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(health))
        .route("/api/tracks", web::get().to(list_tracks))
        .route("/api/tracks/{file}", web::get().to(track_geojson))
        .route("/api/sim/broughton", web::post().to(simulate_broughton));
}

pub struct WakemapServer {
    host: String,
    port: u16,
    storage: Arc<Storage>,
    cancel: Arc<AtomicBool>,
    server_handle: Option<ServerHandle>,
    handle: Option<thread::JoinHandle<()>>,
}

impl WakemapServer {
    pub fn new(config: &ServerConfig, storage: Arc<Storage>) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            storage,
            cancel: Arc::new(AtomicBool::new(false)),
            server_handle: None,
            handle: None,
        }
    }

    /// The bound address once started; with port 0 this is the real port.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    // Start the server in a separate thread
    pub fn start(&mut self) -> Result<()> {
        let host = self.host.clone();
        let port = self.port;
        let app_state = web::Data::new(AppState::with_cancel(
            self.storage.clone(),
            self.cancel.clone(),
        ));

        let (tx, rx) = mpsc::channel::<Result<(u16, ServerHandle)>>();

        let handle = thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = tx.send(Err(anyhow!("failed to create tokio runtime: {}", err)));
                    return;
                }
            };
            runtime.block_on(async move {
                info!("Setting up server routes...");
                let server = match HttpServer::new(move || {
                    App::new()
                        .app_data(app_state.clone())
                        .wrap_fn(|req, srv| {
                            info!("Incoming request: {} {}", req.method(), req.uri());
                            srv.call(req)
                        })
                        .configure(configure)
                })
                .bind((host.as_str(), port))
                {
                    Ok(server) => server,
                    Err(err) => {
                        let _ = tx.send(Err(anyhow!(
                            "failed to bind server to {}:{}: {}",
                            host,
                            port,
                            err
                        )));
                        return;
                    }
                };

                // port 0 asks the OS for a free one
                let actual_port = server
                    .addrs()
                    .first()
                    .map(|addr| addr.port())
                    .unwrap_or(port);
                let server = server.run();
                let _ = tx.send(Ok((actual_port, server.handle())));

                info!("Server bound successfully to {}:{}", host, actual_port);
                if let Err(err) = server.await {
                    error!("Server failed to run: {}", err);
                }
            });
        });

        let (actual_port, server_handle) = rx
            .recv()
            .map_err(|_| anyhow!("server thread exited before binding"))??;
        self.port = actual_port;
        self.server_handle = Some(server_handle);
        self.handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(server_handle) = self.server_handle.take() {
            pollster::block_on(server_handle.stop(true));
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("server thread panicked");
            }
        }
    }
}

impl Drop for WakemapServer {
    fn drop(&mut self) {
        self.stop();
    }
}
