use dotenvy::dotenv;
use axum::{
    routing::{get, post},
    Json, Router,
    middleware
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{TraceLayer, DefaultMakeSpan, DefaultOnResponse};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod server_timing;
mod static_files;
mod handlers {
    pub mod contact_handlers;
    pub mod vitals_handlers;
}

use config::Config;
use error::ApiError;
use handlers::contact_handlers::{self, ContactLimiter, Mailer};
use handlers::vitals_handlers::{self, VitalsStore};

pub struct AppState {
    contact_limiter: ContactLimiter,
    trusted_proxies: Vec<IpAddr>,
    mailer: Mailer,
    vitals: VitalsStore,
    started: Instant,
}

impl AppState {
    pub fn new(config: &Config, mailer: Mailer) -> Self {
        Self {
            contact_limiter: contact_handlers::contact_limiter(config.contact_rate_per_minute),
            trusted_proxies: config.trusted_proxies.clone(),
            mailer,
            vitals: VitalsStore::default(),
            started: Instant::now(),
        }
    }

    /// Drops limiter entries for addresses that are back to a full quota.
    pub fn prune_rate_limits(&self) {
        self.contact_limiter.retain_recent();
        self.contact_limiter.shrink_to_fit();
    }
}

const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

async fn health_check(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mail = match state.mailer {
        Mailer::Smtp { .. } => "smtp",
        _ => "log",
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
        "mail": mail,
    }))
}

async fn api_not_found() -> ApiError {
    ApiError::NotFound
}

pub fn app(state: Arc<AppState>, static_dir: &Path) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/contact", post(contact_handlers::submit_contact))
        .route("/vitals", post(vitals_handlers::record_vitals).get(vitals_handlers::vitals_summary))
        .fallback(api_not_found);

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .merge(static_files::service_worker_routes(static_dir))
        .fallback_service(static_files::spa(static_dir))
        .layer(middleware::from_fn(server_timing::server_timing))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
        )
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_origin(Any) // the dev frontend runs on another port
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .expose_headers([axum::http::header::CONTENT_TYPE, server_timing::SERVER_TIMING.clone()])
        )
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("backend=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().expect("invalid configuration");
    let mailer = Mailer::from_config(config.smtp.as_ref()).expect("invalid SMTP configuration");
    let state = Arc::new(AppState::new(&config, mailer));

    if !config.static_dir.join("index.html").exists() {
        tracing::warn!("{} has no index.html, build the frontend first", config.static_dir.display());
    }
    let app = app(state.clone(), &config.static_dir);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            state.prune_rate_limits();
            tracing::debug!("contact limiter tracks {} addresses", state.contact_limiter.len());
        }
    });

    use tokio::net::TcpListener;

    let listener = TcpListener::bind(config.bind_addr).await.expect("failed to bind");
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use std::num::NonZeroU32;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use handlers::contact_handlers::ContactRequest;

    struct Harness {
        app: Router,
        state: Arc<AppState>,
        _static_dir: TempDir,
    }

    fn harness(rate: u32) -> Harness {
        harness_with(rate, &[])
    }

    fn harness_with(rate: u32, trusted_proxies: &[&str]) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<!doctype html><title>studio</title>").unwrap();
        std::fs::write(dir.path().join("sw.js"), "importScripts('/service_worker.js');").unwrap();

        let mut config = Config::from_lookup(|_| None).unwrap();
        config.contact_rate_per_minute = NonZeroU32::new(rate).unwrap();
        config.trusted_proxies = trusted_proxies.iter().map(|ip| ip.parse().unwrap()).collect();
        let state = Arc::new(AppState::new(&config, Mailer::Memory(Mutex::new(Vec::new()))));
        Harness {
            app: app(state.clone(), dir.path()),
            state,
            _static_dir: dir,
        }
    }

    fn contact(peer: &str, body: serde_json::Value) -> Request<Body> {
        forwarded_contact(peer, None, body)
    }

    fn forwarded_contact(peer: &str, forwarded_for: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let peer = SocketAddr::new(peer.parse().unwrap(), 40000);
        let mut request = Request::post("/api/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(axum::extract::ConnectInfo(peer));
        if let Some(forwarded_for) = forwarded_for {
            request = request.header("x-forwarded-for", forwarded_for);
        }
        request.body(Body::from(body.to_string())).unwrap()
    }

    fn valid_contact() -> serde_json::Value {
        json!({
            "name": "Ada",
            "email": "ada@example.com",
            "service": "motion",
            "message": "We need a scroll story for our launch."
        })
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn timing(response: &Response) -> String {
        response
            .headers()
            .get("server-timing")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    fn delivered(state: &AppState) -> Vec<ContactRequest> {
        match &state.mailer {
            Mailer::Memory(sent) => sent.lock().unwrap().clone(),
            _ => Vec::new(),
        }
    }

    #[tokio::test]
    async fn health_reports_server_timing() {
        let h = harness(5);
        let response = h.app.oneshot(Request::get("/api/health").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(timing(&response).starts_with("app;dur="));
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["mail"], "log");
    }

    #[tokio::test]
    async fn valid_contact_is_delivered() {
        let h = harness(5);
        let response = h.app.clone().oneshot(contact("203.0.113.7", valid_contact())).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let timing = timing(&response);
        assert!(timing.starts_with("mail;dur="), "{}", timing);
        assert!(timing.contains(", app;dur="), "{}", timing);

        let sent = delivered(&h.state);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].service, "motion");
        assert_eq!(sent[0].company, "");
    }

    #[tokio::test]
    async fn invalid_contact_lists_fields() {
        let h = harness(5);
        let response = h
            .app
            .clone()
            .oneshot(contact("203.0.113.7", json!({"name": "", "email": "nope", "message": "hi"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        let fields: Vec<_> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, vec!["name", "email", "message"]);
        assert!(delivered(&h.state).is_empty());
    }

    #[tokio::test]
    async fn malformed_contact_is_a_bad_request() {
        let h = harness(5);
        let request = Request::post("/api/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\":"))
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn contact_is_rate_limited_per_address() {
        let h = harness(2);
        for _ in 0..2 {
            let response = h.app.clone().oneshot(contact("198.51.100.1", valid_contact())).await.unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }
        let limited = h.app.clone().oneshot(contact("198.51.100.1", valid_contact())).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = h.app.clone().oneshot(contact("198.51.100.2", valid_contact())).await.unwrap();
        assert_eq!(other.status(), StatusCode::ACCEPTED);
        assert_eq!(delivered(&h.state).len(), 3);
    }

    #[tokio::test]
    async fn spoofed_forwarded_for_does_not_dodge_the_limit() {
        let h = harness(2);
        let mut accepted = 0;
        for n in 0..20 {
            let spoofed = format!("198.51.100.{}", n);
            let response = h
                .app
                .clone()
                .oneshot(forwarded_contact("203.0.113.50", Some(&spoofed), valid_contact()))
                .await
                .unwrap();
            if response.status() == StatusCode::ACCEPTED {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 2);
        assert_eq!(h.state.contact_limiter.len(), 1);

        h.state.prune_rate_limits();
        assert!(h.state.contact_limiter.len() <= 1);
    }

    #[tokio::test]
    async fn trusted_proxy_forwards_the_visitor_address() {
        let h = harness_with(1, &["10.0.0.1"]);
        let first = h
            .app
            .clone()
            .oneshot(forwarded_contact("10.0.0.1", Some("198.51.100.1"), valid_contact()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let other_visitor = h
            .app
            .clone()
            .oneshot(forwarded_contact("10.0.0.1", Some("198.51.100.2"), valid_contact()))
            .await
            .unwrap();
        assert_eq!(other_visitor.status(), StatusCode::ACCEPTED);

        let repeat = h
            .app
            .clone()
            .oneshot(forwarded_contact("10.0.0.1", Some("198.51.100.1"), valid_contact()))
            .await
            .unwrap();
        assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn vitals_beacon_is_recorded() {
        let h = harness(5);
        let beacon = Request::post("/api/vitals")
            .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(Body::from(
                json!({"name": "LCP", "value": 1830.5, "rating": "good", "id": "v1-1", "page": "/"}).to_string(),
            ))
            .unwrap();
        let response = h.app.clone().oneshot(beacon).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let bogus = Request::post("/api/vitals")
            .body(Body::from(json!({"name": "FID", "value": 3, "rating": "good", "id": "x"}).to_string()))
            .unwrap();
        assert_eq!(h.app.clone().oneshot(bogus).await.unwrap().status(), StatusCode::BAD_REQUEST);

        let summary = h.app.oneshot(Request::get("/api/vitals").body(Body::empty()).unwrap()).await.unwrap();
        let body = json_body(summary).await;
        assert_eq!(body["LCP"]["count"], 1);
        assert_eq!(body["LCP"]["mean"], 1830.5);
        assert!(body.get("FID").is_none());
    }

    #[tokio::test]
    async fn unknown_api_route_is_json_404() {
        let h = harness(5);
        let response = h.app.oneshot(Request::get("/api/nope").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Not found");
    }

    #[tokio::test]
    async fn client_routes_fall_back_to_index() {
        let h = harness(5);
        let response = h.app.oneshot(Request::get("/services/motion").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(std::str::from_utf8(&body).unwrap().contains("<title>studio</title>"));
    }

    #[tokio::test]
    async fn service_worker_script_is_never_cached() {
        let h = harness(5);
        let response = h.app.oneshot(Request::get("/sw.js").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["service-worker-allowed"], "/");
    }
}
