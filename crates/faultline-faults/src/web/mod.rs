//! Flaky HTTP web server
//!
//! A web server follows its plan tick by tick: while every assigned plan
//! fires it is shut down, otherwise it listens. Without a fault it gets a
//! dedicated plan that never fires, so it simply listens forever.
//!
//! Requests are dispatched to [`Route`]s by exact path; each route carries
//! its own plan and decides independently whether to fail.

mod route;
mod whoami;

pub use route::{Route, RouteConfig, RouteContent, RouteFaultConfig};
pub use whoami::RequestInfo;

use crate::error::ModuleError;
use crate::plan_source::inline_plan;
use faultline_fluent::{DurationSpec, FloatSpec};
use faultline_planner::{CycleHooks, PlanAssignments, PlanHandle, PlanSignal, PlanSpec, Plannable};
use parking_lot::Mutex;
use route::{never_fail_plan, text_response};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};
use warp::http::{HeaderMap, Method, Response, StatusCode};
use warp::path::FullPath;
use warp::{Filter, Rejection};

/// Interface used when none is declared
pub const DEFAULT_INTERFACE: &str = "0.0.0.0";

/// Port used when none is declared
pub const DEFAULT_PORT: u16 = 80;

/// Lowercase ASCII slug, non-alphanumeric runs collapsed to `-`
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Failure behaviour of a web server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebServerFaultConfig {
    /// Named plans; the server goes down only while all of them fire
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_refs: Vec<String>,
    /// Chance of being down during a tick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<FloatSpec>,
    /// Tick interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<DurationSpec>,
    /// Total duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationSpec>,
}

/// Web server declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebServerConfig {
    /// Listen interface, default `0.0.0.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Listen port, default `80`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Failure behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<WebServerFaultConfig>,
    /// Routes; the health-check set when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteConfig>>,
}

impl WebServerConfig {
    /// Listen interface
    #[must_use]
    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or(DEFAULT_INTERFACE)
    }

    /// Listen port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Identity: `webserver-<interface>-<port>` as a slug
    #[must_use]
    pub fn uid(&self) -> String {
        slugify(&format!("webserver-{}-{}", self.interface(), self.port()))
    }

    /// Declared routes, or `/` (whoami) plus `/livez`, `/readyz`, `/healthz`
    #[must_use]
    pub fn routes(&self) -> Vec<RouteConfig> {
        if let Some(routes) = &self.routes {
            return routes.clone();
        }

        vec![
            RouteConfig {
                path: "/".to_string(),
                content: RouteContent {
                    whoami: true,
                    no_server_info: true,
                    ..RouteContent::default()
                },
                ..RouteConfig::default()
            },
            RouteConfig::text("/livez", "I'm Alive!"),
            RouteConfig::text("/readyz", "I'm Ready!"),
            RouteConfig::text("/healthz", "I'm Healthy!"),
        ]
    }

    /// Socket address to listen on
    ///
    /// # Errors
    /// Returns `ModuleError::InvalidAddress` when the interface is not an IP.
    pub fn address(&self) -> Result<SocketAddr, ModuleError> {
        let ip: IpAddr = self
            .interface()
            .parse()
            .map_err(|e: std::net::AddrParseError| ModuleError::InvalidAddress {
                address: format!("{}:{}", self.interface(), self.port()),
                reason: e.to_string(),
            })?;
        Ok(SocketAddr::new(ip, self.port()))
    }

    fn inline_plan(&self) -> Option<PlanSpec> {
        self.fault.as_ref().and_then(|fault| {
            inline_plan(
                fault.percentage.as_ref(),
                None,
                fault.interval.as_ref(),
                fault.duration.as_ref(),
            )
        })
    }

    /// Check server-level fields; routes are checked by [`Route::new`]
    ///
    /// # Errors
    /// Invalid address or inline plan.
    pub fn validate(&self) -> Result<(), ModuleError> {
        self.address()?;
        if let Some(plan) = self.inline_plan() {
            plan.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Listener {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Runtime web server
#[derive(Debug)]
pub struct WebServer {
    uid: String,
    config: WebServerConfig,
    address: SocketAddr,
    routes: Arc<Vec<Arc<Route>>>,
    listener: Mutex<Option<Listener>>,
    assignments: PlanAssignments,
}

impl WebServer {
    /// Create a server around already built routes
    ///
    /// # Errors
    /// See [`WebServerConfig::validate`].
    pub fn new(config: WebServerConfig, routes: Vec<Arc<Route>>) -> Result<Self, ModuleError> {
        config.validate()?;
        Ok(Self {
            uid: config.uid(),
            address: config.address()?,
            config,
            routes: Arc::new(routes),
            listener: Mutex::new(None),
            assignments: PlanAssignments::new(),
        })
    }

    /// Create a server and its routes from one declaration
    ///
    /// # Errors
    /// The first server or route validation error.
    pub fn from_config(config: WebServerConfig) -> Result<Self, ModuleError> {
        let uid = config.uid();
        let routes = config
            .routes()
            .into_iter()
            .map(|route| Route::new(&uid, route).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(config, routes)
    }

    /// Identity
    #[inline]
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Configured address
    #[inline]
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Routes in declaration order
    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Plans this server is attached to
    #[must_use]
    pub fn assignments(&self) -> &PlanAssignments {
        &self.assignments
    }

    /// Bound address while listening
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .as_ref()
            .filter(|listener| !listener.task.is_finished())
            .map(|listener| listener.addr)
    }

    /// Whether the listener is up
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.local_addr().is_some()
    }

    /// Start listening in the background; no-op while already listening
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `ModuleError::Listen` when the address cannot be bound.
    pub fn listen(&self) -> Result<SocketAddr, ModuleError> {
        let mut guard = self.listener.lock();
        if let Some(listener) = guard.as_ref() {
            if !listener.task.is_finished() {
                return Ok(listener.addr);
            }
        }

        let (shutdown, signal) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(router(Arc::clone(&self.routes)))
            .try_bind_with_graceful_shutdown(self.address, async move {
                let _ = signal.await;
            })
            .map_err(|e| ModuleError::listen(self.address, e))?;

        let uid = self.uid.clone();
        let task = tokio::spawn(async move {
            server.await;
            info!(webserver = %uid, "webserver is down");
        });

        info!(webserver = %self.uid, %addr, "listening webserver");
        *guard = Some(Listener {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Stop listening; no-op while down
    pub fn stop(&self) {
        if let Some(listener) = self.listener.lock().take() {
            info!(webserver = %self.uid, "shutting down webserver");
            let _ = listener.shutdown.send(());
        }
    }
}

impl Drop for WebServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Plannable for WebServer {
    fn name(&self) -> String {
        self.uid.clone()
    }

    fn desired_plan_names(&self) -> Vec<String> {
        self.config
            .fault
            .as_ref()
            .map(|fault| fault.plan_refs.clone())
            .unwrap_or_default()
    }

    fn make_inline_plan(&self) -> Option<PlanSpec> {
        self.config.inline_plan()
    }

    fn make_default_plan(&self) -> Option<PlanSpec> {
        Some(never_fail_plan())
    }

    fn assign_plan(&self, plan: PlanHandle) {
        self.assignments.push(plan);
    }

    fn cycle_hooks(self: Arc<Self>) -> CycleHooks {
        CycleHooks::new().with_pre_sleep(move |_| {
            if self.assignments.all_outcomes() {
                self.stop();
            } else if let Err(e) = self.listen() {
                error!(webserver = %self.uid, error = %e, "error while listening to webserver");
            }
            PlanSignal::Continue
        })
    }
}

fn router(
    routes: Arc<Vec<Arc<Route>>>,
) -> impl Filter<Extract = (Response<String>,), Error = Rejection> + Clone + Send + Sync + 'static {
    warp::method()
        .and(warp::path::full())
        .and(
            warp::query::<Vec<(String, String)>>()
                .or(warp::any().map(Vec::<(String, String)>::new))
                .unify(),
        )
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and_then(
            move |method: Method,
                  path: FullPath,
                  query: Vec<(String, String)>,
                  headers: HeaderMap,
                  remote: Option<SocketAddr>| {
                let routes = Arc::clone(&routes);
                async move {
                    let request = RequestInfo {
                        method,
                        path: path.as_str().to_string(),
                        query,
                        headers,
                        remote,
                    };
                    Ok::<_, Rejection>(dispatch(&routes, &request).await)
                }
            },
        )
}

async fn dispatch(routes: &[Arc<Route>], request: &RequestInfo) -> Response<String> {
    let found = {
        let mut matched = routes.iter().filter(|route| route.path() == request.path).peekable();
        if matched.peek().is_none() {
            return text_response(StatusCode::NOT_FOUND, "404 page not found".to_string());
        }
        matched.find(|route| route.allows(&request.method)).cloned()
    };

    match found {
        Some(route) => route.respond(request).await,
        None => text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "405 method not allowed".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("webserver-0.0.0.0-80"), "webserver-0-0-0-0-80");
        assert_eq!(slugify("route-/"), "route");
        assert_eq!(slugify("route-/Api//v1/"), "route-api-v1");
    }

    #[test]
    fn defaults_and_identity() {
        let config = WebServerConfig::default();
        assert_eq!(config.uid(), "webserver-0-0-0-0-80");
        assert_eq!(config.address().unwrap(), "0.0.0.0:80".parse().unwrap());

        let paths: Vec<_> = config.routes().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, ["/", "/livez", "/readyz", "/healthz"]);
    }

    #[test]
    fn invalid_interface_is_rejected() {
        let config = WebServerConfig {
            interface: Some("localhost".to_string()),
            ..WebServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ModuleError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn no_fault_means_never_failing_default_plan() {
        let server = WebServer::from_config(WebServerConfig::default()).unwrap();
        assert!(server.desired_plan_names().is_empty());
        assert!(!server.has_inline_plan());
        assert_eq!(server.make_default_plan(), Some(never_fail_plan()));
        assert_eq!(server.routes().len(), 4);
        assert!(!server.is_listening());
    }
}
