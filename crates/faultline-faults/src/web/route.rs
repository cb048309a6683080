//! HTTP routes with their own failure plans
//!
//! A route answers normally until every plan assigned to it reports a
//! firing outcome; it then picks a random status from the enabled error
//! categories. An optional response delay applies in both states.

use super::slugify;
use super::whoami::{reflect, RequestInfo};
use crate::error::ModuleError;
use crate::plan_source::inline_plan;
use chrono::{DateTime, Utc};
use faultline_fluent::{DurationSpec, FloatSpec};
use faultline_planner::{CycleHooks, PhaseSpec, PlanAssignments, PlanHandle, PlanSpec, Plannable};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::header::{HeaderValue, CONTENT_TYPE};
use warp::http::{Method, Response, StatusCode};

const DEFAULT_CONTENT: &str = "Hello from faultline!";

const DEFAULT_METHODS: [Method; 3] = [Method::HEAD, Method::GET, Method::POST];

const VALID_METHODS: [Method; 9] = [
    Method::HEAD,
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::CONNECT,
    Method::TRACE,
];

const CLIENT_ERRORS: [StatusCode; 7] = [
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
    StatusCode::NOT_ACCEPTABLE,
    StatusCode::UNPROCESSABLE_ENTITY,
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::CONFLICT,
];

const SERVER_ERRORS: [StatusCode; 5] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
    StatusCode::INSUFFICIENT_STORAGE,
];

/// Response body of a route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteContent {
    /// Fixed text body
    #[serde(default, rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_text: Option<String>,
    /// Reflect the request back as JSON
    #[serde(default)]
    pub whoami: bool,
    /// Leave server details out of the reflection
    #[serde(default)]
    pub no_server_info: bool,
}

impl RouteContent {
    /// Fixed text
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            static_text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

/// Failure behaviour of a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFaultConfig {
    /// Named plans; the route fails only while all of them fire
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_refs: Vec<String>,
    /// Failure chance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<FloatSpec>,
    /// Tick interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<DurationSpec>,
    /// Total duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationSpec>,
    /// Delay added to every response, drawn per request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_delay: Option<DurationSpec>,
    /// Allow 4xx statuses; default `false`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_errors: Option<bool>,
    /// Allow 5xx statuses; default `true`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_errors: Option<bool>,
}

impl RouteFaultConfig {
    /// Statuses a failing route may answer with
    #[must_use]
    pub fn statuses(&self) -> Vec<StatusCode> {
        let mut statuses = Vec::new();
        if self.client_errors.unwrap_or(false) {
            statuses.extend(CLIENT_ERRORS);
        }
        if self.server_errors.unwrap_or(true) {
            statuses.extend(SERVER_ERRORS);
        }
        statuses
    }

    fn inline_plan(&self) -> Option<PlanSpec> {
        inline_plan(
            self.percentage.as_ref(),
            None,
            self.interval.as_ref(),
            self.duration.as_ref(),
        )
    }
}

/// Route declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Absolute path, matched exactly
    pub path: String,
    /// Allowed methods; defaults to `HEAD`, `GET`, `POST`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    /// Body
    #[serde(default)]
    pub content: RouteContent,
    /// Failure behaviour; absent means never fail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<RouteFaultConfig>,
}

impl RouteConfig {
    /// Route serving fixed text
    #[must_use]
    pub fn text(path: &str, text: &str) -> Self {
        Self {
            path: path.to_string(),
            content: RouteContent::text(text),
            ..Self::default()
        }
    }

    /// Upper-cased, de-duplicated methods
    ///
    /// # Errors
    /// Returns `ModuleError::InvalidMethod` for anything outside the nine
    /// standard methods.
    pub fn methods(&self) -> Result<Vec<Method>, ModuleError> {
        if self.methods.is_empty() {
            return Ok(DEFAULT_METHODS.to_vec());
        }

        let mut methods = Vec::new();
        for raw in &self.methods {
            let upper = raw.trim().to_ascii_uppercase();
            let method = VALID_METHODS
                .iter()
                .find(|m| m.as_str() == upper)
                .ok_or_else(|| ModuleError::InvalidMethod(upper.clone()))?;
            if !methods.contains(method) {
                methods.push(method.clone());
            }
        }
        Ok(methods)
    }

    /// Check the declaration
    ///
    /// # Errors
    /// Invalid path, method, failure categories or inline plan.
    pub fn validate(&self) -> Result<(), ModuleError> {
        if !self.path.starts_with('/') {
            return Err(ModuleError::InvalidPath(self.path.clone()));
        }
        self.methods()?;

        if let Some(fault) = &self.fault {
            if fault.statuses().is_empty() {
                return Err(ModuleError::NoFailureCategory);
            }
            if let Some(plan) = fault.inline_plan() {
                plan.validate()?;
            }
        }
        Ok(())
    }
}

/// Runtime route
#[derive(Debug)]
pub struct Route {
    uid: String,
    config: RouteConfig,
    methods: Vec<Method>,
    statuses: Vec<StatusCode>,
    created_at: DateTime<Utc>,
    assignments: PlanAssignments,
}

impl Route {
    /// Create a route owned by the web server `server_uid`
    ///
    /// # Errors
    /// See [`RouteConfig::validate`].
    pub fn new(server_uid: &str, config: RouteConfig) -> Result<Self, ModuleError> {
        config.validate()?;
        let methods = config.methods()?;
        let statuses = config
            .fault
            .as_ref()
            .map(RouteFaultConfig::statuses)
            .unwrap_or_default();

        Ok(Self {
            uid: format!("{server_uid}-{}", slugify(&format!("route-{}", config.path))),
            config,
            methods,
            statuses,
            created_at: Utc::now(),
            assignments: PlanAssignments::new(),
        })
    }

    /// Identity, unique per web server
    #[inline]
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Matched path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.config.path
    }

    /// Allowed methods
    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Whether `method` is served
    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Plans this route is attached to
    #[must_use]
    pub fn assignments(&self) -> &PlanAssignments {
        &self.assignments
    }

    /// Whether the route currently answers with errors
    #[must_use]
    pub fn is_failing(&self) -> bool {
        !self.statuses.is_empty() && self.assignments.all_outcomes()
    }

    /// Build the response for one request
    pub async fn respond(&self, request: &RequestInfo) -> Response<String> {
        let delay = self
            .config
            .fault
            .as_ref()
            .and_then(|fault| fault.response_delay.as_ref())
            .map(DurationSpec::draw);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.is_failing() {
            let status = self
                .statuses
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let reason = status.canonical_reason().unwrap_or_default();
            return text_response(status, reason.to_string());
        }

        let content = &self.config.content;
        if content.whoami {
            let reflection = reflect(request, (!content.no_server_info).then_some(self.created_at));
            return match serde_json::to_string_pretty(&reflection) {
                Ok(body) => body_response(StatusCode::OK, body, "application/json"),
                Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            };
        }

        let body = content
            .static_text
            .clone()
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT.to_string());
        body_response(StatusCode::OK, body, "text/html")
    }
}

impl Plannable for Route {
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
        self.config
            .fault
            .as_ref()
            .and_then(RouteFaultConfig::inline_plan)
    }

    fn make_default_plan(&self) -> Option<PlanSpec> {
        Some(never_fail_plan())
    }

    fn assign_plan(&self, plan: PlanHandle) {
        self.assignments.push(plan);
    }

    fn cycle_hooks(self: Arc<Self>) -> CycleHooks {
        // State is read out of band through the assigned plan handles.
        CycleHooks::new()
    }
}

/// Endless plan whose outcome never fires
pub(crate) fn never_fail_plan() -> PlanSpec {
    PlanSpec::single(PhaseSpec::default().with_percentage(FloatSpec::exactly(0.0)))
}

pub(crate) fn text_response(status: StatusCode, body: String) -> Response<String> {
    body_response(status, body, "text/plain; charset=utf-8")
}

fn body_response(status: StatusCode, body: String, content_type: &'static str) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
