//! Preparation pass: from a parsed document to wired, ready-to-run modules
//!
//! Order matters for error reporting:
//! 1. every module declaration is validated, with a prefixed error
//! 2. duplicate web servers and duplicate routes per web server are rejected
//! 3. declared plans are registered (duplicates and invalid plans rejected)
//! 4. modules are attached: process, cpu, memory, web servers, routes
//!
//! Nothing runs until [`PreparedConfig::start`].

use crate::config::Config;
use crate::error::ConfigError;
use faultline_faults::{
    CpuLoader, ExitController, MemoryLeaker, ProcessExitController, ProcessManager, Route,
    WebServer, WebServerConfig,
};
use faultline_planner::{find_duplicates, PlanOutcome, PlanRegistry, PlannerSettings};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Modules wired to their plans, not yet running
#[derive(Debug)]
pub struct PreparedConfig {
    schema_version: Option<String>,
    registry: PlanRegistry,
    process: Option<Arc<ProcessManager>>,
    cpu: Option<Arc<CpuLoader>>,
    memory: Option<Arc<MemoryLeaker>>,
    web_servers: Vec<Arc<WebServer>>,
}

impl PreparedConfig {
    /// Prepare with the real process exit controller
    ///
    /// # Errors
    /// See [`PreparedConfig::with_exit_controller`].
    pub fn new(config: &Config, settings: PlannerSettings) -> Result<Self, ConfigError> {
        Self::with_exit_controller(config, settings, Arc::new(ProcessExitController))
    }

    /// Prepare, routing scheduled exits through `controller`
    ///
    /// # Errors
    /// The first validation or wiring error, prefixed with the declaration
    /// it belongs to.
    pub fn with_exit_controller(
        config: &Config,
        settings: PlannerSettings,
        controller: Arc<dyn ExitController>,
    ) -> Result<Self, ConfigError> {
        let process = config
            .process
            .clone()
            .map(|process| ProcessManager::new(process, controller).map(Arc::new))
            .transpose()
            .map_err(ConfigError::Process)?;
        let cpu = config
            .cpu
            .clone()
            .map(|cpu| CpuLoader::new(cpu).map(Arc::new))
            .transpose()
            .map_err(ConfigError::Cpu)?;
        let memory = config
            .memory
            .clone()
            .map(|memory| MemoryLeaker::new(memory).map(Arc::new))
            .transpose()
            .map_err(ConfigError::Memory)?;

        let mut servers = Vec::with_capacity(config.web_servers.len());
        for server in &config.web_servers {
            let uid = server.uid();
            server.validate().map_err(|source| ConfigError::WebServer {
                uid: uid.clone(),
                source,
            })?;

            let mut routes = Vec::new();
            for route in server.routes() {
                let path = route.path.clone();
                let route = Route::new(&uid, route).map_err(|source| ConfigError::Route {
                    path,
                    webserver: uid.clone(),
                    source,
                })?;
                routes.push(Arc::new(route));
            }
            servers.push((server.clone(), routes));
        }

        let uids: Vec<String> = config.web_servers.iter().map(WebServerConfig::uid).collect();
        let duplicates = find_duplicates(uids.iter().map(String::as_str));
        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateWebServers(duplicates));
        }
        for (server, routes) in &servers {
            let duplicates = find_duplicates(routes.iter().map(|route| route.uid()));
            if !duplicates.is_empty() {
                return Err(ConfigError::DuplicateRoutes {
                    webserver: server.uid(),
                    routes: duplicates,
                });
            }
        }

        let mut registry = PlanRegistry::new(settings);
        registry.add_plans(&config.plans)?;

        if let Some(process) = process.as_ref().filter(|process| process.has_exit()) {
            registry.attach(process.clone())?;
        }
        if let Some(cpu) = &cpu {
            registry.attach(cpu.clone())?;
        }
        if let Some(memory) = &memory {
            registry.attach(memory.clone())?;
        }

        let mut web_servers = Vec::with_capacity(servers.len());
        for (server, routes) in servers {
            let uid = server.uid();
            let server = WebServer::new(server, routes)
                .map(Arc::new)
                .map_err(|source| ConfigError::WebServer { uid, source })?;
            registry.attach(server.clone())?;
            for route in server.routes() {
                registry.attach(route.clone())?;
            }
            web_servers.push(server);
        }

        info!(
            plans = registry.len(),
            web_servers = web_servers.len(),
            "configuration is prepared"
        );

        Ok(Self {
            schema_version: config.schema_version.clone(),
            registry,
            process,
            cpu,
            memory,
            web_servers,
        })
    }

    /// Schema tag carried by the document
    #[must_use]
    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    /// Wired plans
    #[must_use]
    pub fn registry(&self) -> &PlanRegistry {
        &self.registry
    }

    /// Process manager, when declared
    #[must_use]
    pub fn process(&self) -> Option<&Arc<ProcessManager>> {
        self.process.as_ref()
    }

    /// CPU loader, when declared
    #[must_use]
    pub fn cpu(&self) -> Option<&Arc<CpuLoader>> {
        self.cpu.as_ref()
    }

    /// Memory leaker, when declared
    #[must_use]
    pub fn memory(&self) -> Option<&Arc<MemoryLeaker>> {
        self.memory.as_ref()
    }

    /// Web servers in declaration order
    #[must_use]
    pub fn web_servers(&self) -> &[Arc<WebServer>] {
        &self.web_servers
    }

    /// Sleep the process delay, then start every plan
    pub async fn start(self) -> Running {
        if let Some(process) = &self.process {
            let delay = process.delay();
            if !delay.is_zero() {
                info!(sleep = ?delay, "sleeping because of process manager configuration");
                tokio::time::sleep(delay).await;
                info!("woke up");
            }
        }

        let tasks = self.registry.start_all();
        info!(plans = tasks.len(), "all plans are started");
        Running {
            tasks,
            web_servers: self.web_servers,
        }
    }
}

/// Started plans and the modules serving requests while they run
#[derive(Debug)]
pub struct Running {
    tasks: Vec<JoinHandle<PlanOutcome>>,
    web_servers: Vec<Arc<WebServer>>,
}

impl Running {
    /// Number of running plan tasks
    #[must_use]
    pub fn plan_count(&self) -> usize {
        self.tasks.len()
    }

    /// Web servers in declaration order
    #[must_use]
    pub fn web_servers(&self) -> &[Arc<WebServer>] {
        &self.web_servers
    }

    /// Wait for every plan to finish; a plan task that panicked is logged and skipped
    pub async fn wait(self) -> Vec<PlanOutcome> {
        join_all(self.tasks)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!(error = %e, "plan task failed");
                    None
                }
            })
            .collect()
    }

    /// Stop every web server and abort the remaining plans
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for server in &self.web_servers {
            server.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_faults::ModuleError;
    use faultline_planner::WiringError;
    use pretty_assertions::assert_eq;

    fn prepare(yaml: &str) -> Result<PreparedConfig, ConfigError> {
        PreparedConfig::new(&Config::parse(yaml).unwrap(), PlannerSettings::default())
    }

    #[test]
    fn empty_document_prepares_nothing() {
        let prepared = prepare("schemaVersion: \"0.1-beta\"\n").unwrap();
        assert_eq!(prepared.schema_version(), Some("0.1-beta"));
        assert!(prepared.registry().is_empty());
        assert!(prepared.web_servers().is_empty());
    }

    #[test]
    fn module_errors_are_prefixed() {
        let err = prepare("cpu:\n  interval: 1s\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::Cpu(ModuleError::MissingPlan { what: "load" })
        );

        let err = prepare("memory:\n  planRefs: [a, b]\n").unwrap_err();
        assert_eq!(err, ConfigError::Memory(ModuleError::TooManyPlanRefs));

        let err = prepare("webServers:\n  - interface: localhost\n").unwrap_err();
        assert!(err.to_string().starts_with("webserver webserver-localhost-80 is invalid"));

        let err = prepare("webServers:\n  - routes:\n      - path: /x\n        methods: [FETCH]\n")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "route /x is invalid for webserver webserver-0-0-0-0-80: FETCH is not a valid HTTP method"
        );
    }

    #[test]
    fn module_validation_precedes_plan_checks() {
        let err = prepare(
            "plans:\n  - name: a\n  - name: a\ncpu:\n  planRefs: [a, b]\n",
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::Cpu(ModuleError::TooManyPlanRefs));
    }

    #[test]
    fn duplicates_are_reported() {
        let err = prepare("webServers:\n  - port: 81\n  - port: 81\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateWebServers(vec!["webserver-0-0-0-0-81".to_string()])
        );

        let err = prepare("webServers:\n  - routes:\n      - path: /Api\n      - path: /api\n")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "there are duplicate routes in webserver webserver-0-0-0-0-80: webserver-0-0-0-0-80-route-api"
        );

        let err = prepare("plans:\n  - name: b\n  - name: a\n  - name: b\n  - name: a\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "there are duplicate plans: a, b");
    }

    #[test]
    fn unknown_plan_reference() {
        let err = prepare("memory:\n  planRefs: [ghost]\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::Wiring(WiringError::UnknownPlan {
                plan: "ghost".to_string(),
                plannable: "memory-leaker".to_string(),
            })
        );
    }

    #[test]
    fn invalid_plan_is_named() {
        let err = prepare(
            "plans:\n  - name: broken\n    percentage: 1, 2\n    size: 1Mi\n",
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("plan broken is invalid:"));
    }

    #[test]
    fn modules_are_wired() {
        let prepared = prepare(
            "plans:\n  - name: wave\n    percentage: 10\nprocess:\n  delay: 1s\ncpu:\n  planRefs: [wave]\nmemory:\n  size: 1Ki\nwebServers:\n  - port: 8081\n",
        )
        .unwrap();

        assert!(prepared.process().is_some());
        assert_eq!(prepared.cpu().unwrap().assignments().len(), 1);
        assert_eq!(
            prepared.memory().unwrap().assignments().first().unwrap().name(),
            "memory-leaker-inline-plan"
        );

        let server = &prepared.web_servers()[0];
        assert_eq!(
            server.assignments().first().unwrap().name(),
            "webserver-0-0-0-0-8081-default-plan"
        );
        assert_eq!(server.routes().len(), 4);
        assert!(server
            .routes()
            .iter()
            .all(|route| route.assignments().len() == 1));

        // wave, memory inline, server default, four route defaults; the process has no exit
        assert_eq!(prepared.registry().handles().len(), 7);
    }
}
