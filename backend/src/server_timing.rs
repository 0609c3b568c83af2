use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

pub static SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

/// One `name;dur=..;desc=".."` metric.
pub fn entry(name: &str, elapsed: Duration, description: &str) -> String {
    format!(
        "{};dur={:.1};desc=\"{}\"",
        name,
        elapsed.as_secs_f64() * 1000.0,
        description.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

/// Adds the total handling time to every response, after whatever metrics
/// the handler already reported.
pub async fn server_timing(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;

    let total = entry("app", started.elapsed(), "Request handling");
    let value = match response.headers().get(&SERVER_TIMING).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}, {}", existing, total),
        _ => total,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        response.headers_mut().insert(SERVER_TIMING.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_milliseconds_and_escapes_description() {
        assert_eq!(
            entry("db", Duration::from_micros(12_340), "say \"hi\""),
            r#"db;dur=12.3;desc="say \"hi\"""#
        );
    }
}
