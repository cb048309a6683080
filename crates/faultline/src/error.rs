//! Errors raised while loading and preparing a configuration
//!
//! Every module error is wrapped with a prefix naming the declaration it
//! came from, so a single line tells the operator what to fix.

use faultline_faults::ModuleError;
use faultline_planner::WiringError;

/// A configuration that cannot be loaded or prepared
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `-f ""`
    #[error("provided filename is empty")]
    EmptyFilename,

    /// `-f -` while stdin is an interactive terminal
    #[error("stdin is not available to read from")]
    StdinIsTerminal,

    /// File or stdin could not be read
    #[error("unable to read {source_name}: {reason}")]
    Read { source_name: String, reason: String },

    /// Document is neither valid JSON nor valid YAML for the schema
    #[error("invalid {format} configuration: {reason}")]
    Parse {
        format: &'static str,
        reason: String,
    },

    /// The document has no content at all
    #[error("configuration is empty")]
    EmptyDocument,

    #[error("process manager is invalid: {0}")]
    Process(#[source] ModuleError),

    #[error("cpu loader is invalid: {0}")]
    Cpu(#[source] ModuleError),

    #[error("memory leaker is invalid: {0}")]
    Memory(#[source] ModuleError),

    #[error("webserver {uid} is invalid: {source}")]
    WebServer {
        uid: String,
        #[source]
        source: ModuleError,
    },

    #[error("route {path} is invalid for webserver {webserver}: {source}")]
    Route {
        path: String,
        webserver: String,
        #[source]
        source: ModuleError,
    },

    #[error("there are duplicate webservers: {}", .0.join(", "))]
    DuplicateWebServers(Vec<String>),

    #[error("there are duplicate routes in webserver {webserver}: {}", .routes.join(", "))]
    DuplicateRoutes {
        webserver: String,
        routes: Vec<String>,
    },

    /// Plan declaration or plan binding failure
    #[error(transparent)]
    Wiring(#[from] WiringError),

    /// Verbosity outside `trace|debug|info|warn|error`
    #[error("invalid verbosity {0}: expected one of trace, debug, info, warn, error")]
    InvalidVerbosity(String),

    /// A global subscriber was already installed
    #[error("unable to install logger: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Create a read error
    pub fn read(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Read {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a parse error
    pub fn parse(format: &'static str, reason: impl ToString) -> Self {
        Self::Parse {
            format,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_declaration() {
        let err = ConfigError::Route {
            path: "/flaky".to_string(),
            webserver: "webserver-0-0-0-0-80".to_string(),
            source: ModuleError::NoFailureCategory,
        };
        assert_eq!(
            err.to_string(),
            "route /flaky is invalid for webserver webserver-0-0-0-0-80: no failure category is enabled"
        );

        let err = ConfigError::Cpu(ModuleError::TooManyPlanRefs);
        assert_eq!(
            err.to_string(),
            "cpu loader is invalid: plan refs can not contain more than one element"
        );

        let err: ConfigError = WiringError::DuplicatePlans(vec!["a".into(), "b".into()]).into();
        assert_eq!(err.to_string(), "there are duplicate plans: a, b");
    }
}
