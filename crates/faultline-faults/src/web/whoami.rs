//! Request reflection for `whoami` routes

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use warp::http::header::HOST;
use warp::http::{HeaderMap, Method};

/// What a handler knows about an incoming request
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// Request method
    pub method: Method,
    /// Request path
    pub path: String,
    /// Decoded query pairs in arrival order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: HeaderMap,
    /// Peer address, when known
    pub remote: Option<SocketAddr>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Reflection {
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<ServerInfo>,
    request: RequestReflection,
}

#[derive(Debug, Serialize)]
struct ServerInfo {
    hostname: String,
    initialized_at: String,
    current_time: String,
    uptime_seconds: i64,
    faultline_version: &'static str,
}

#[derive(Debug, Serialize)]
struct RequestReflection {
    connected_from: String,
    scheme: &'static str,
    host: String,
    method: String,
    path: String,
    query: BTreeMap<String, Vec<String>>,
    headers: BTreeMap<String, Vec<String>>,
}

pub(crate) fn reflect(request: &RequestInfo, initialized_at: Option<DateTime<Utc>>) -> Reflection {
    let server = initialized_at.map(|initialized_at| {
        let now = Utc::now();
        ServerInfo {
            hostname: std::env::var("HOSTNAME").unwrap_or_default(),
            initialized_at: initialized_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            current_time: now.to_rfc3339_opts(SecondsFormat::Nanos, true),
            uptime_seconds: (now - initialized_at).num_seconds(),
            faultline_version: env!("CARGO_PKG_VERSION"),
        }
    });

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in &request.query {
        query.entry(key.clone()).or_default().push(value.clone());
    }

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &request.headers {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let host = request
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    Reflection {
        server,
        request: RequestReflection {
            connected_from: request.remote.map(|addr| addr.to_string()).unwrap_or_default(),
            scheme: "http",
            host,
            method: request.method.to_string(),
            path: request.path.clone(),
            query,
            headers,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use warp::http::HeaderValue;

    fn request() -> RequestInfo {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("example.test"));
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));

        RequestInfo {
            method: Method::GET,
            path: "/".to_string(),
            query: vec![("q".into(), "1".into()), ("q".into(), "2".into())],
            headers,
            remote: Some("10.0.0.7:5000".parse().unwrap()),
        }
    }

    #[test]
    fn reflects_request_details() {
        let json = serde_json::to_value(reflect(&request(), None)).unwrap();

        assert!(json.get("server").is_none());
        let request = &json["request"];
        assert_eq!(request["host"], "example.test");
        assert_eq!(request["connected_from"], "10.0.0.7:5000");
        assert_eq!(request["query"]["q"], Value::from(vec!["1", "2"]));
        assert_eq!(request["headers"]["x-tag"], Value::from(vec!["a", "b"]));
    }

    #[test]
    fn includes_server_info_on_request() {
        let json = serde_json::to_value(reflect(&request(), Some(Utc::now()))).unwrap();
        assert_eq!(json["server"]["faultline_version"], env!("CARGO_PKG_VERSION"));
        assert!(json["server"]["uptime_seconds"].as_i64().unwrap() >= 0);
    }
}
