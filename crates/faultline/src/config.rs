//! Configuration documents
//!
//! A document is JSON when its first non-blank character is `{`, YAML
//! otherwise. It is read from a file or, with `-`, from a piped stdin.

use crate::error::ConfigError;
use faultline_faults::{CpuLoadConfig, MemoryLeakConfig, ProcessConfig, WebServerConfig};
use faultline_planner::PlanSpec;
use serde::{Deserialize, Serialize};
use std::io::{IsTerminal, Read};
use std::path::Path;
use tracing::debug;

/// Filename selecting stdin
pub const STDIN: &str = "-";

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Informational schema tag, e.g. `0.1-beta`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Startup delay and scheduled exit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessConfig>,
    /// CPU load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuLoadConfig>,
    /// Memory leak
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryLeakConfig>,
    /// Shared plans referenced by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plans: Vec<PlanSpec>,
    /// Flaky web servers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_servers: Vec<WebServerConfig>,
}

impl Config {
    /// Parse a document, detecting JSON or YAML
    ///
    /// # Errors
    /// Returns `ConfigError::EmptyDocument` for blank input and
    /// `ConfigError::Parse` for syntax or schema errors.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyDocument);
        }

        if trimmed.starts_with('{') {
            debug!("parsing json configuration");
            serde_json::from_str(trimmed).map_err(|e| ConfigError::parse("json", e))
        } else {
            debug!("parsing yaml configuration");
            serde_yaml::from_str(content).map_err(|e| ConfigError::parse("yaml", e))
        }
    }

    /// Load from a file path, or from stdin when `filename` is `-`
    ///
    /// # Errors
    /// - `ConfigError::EmptyFilename` for an empty name
    /// - `ConfigError::StdinIsTerminal` when stdin is interactive
    /// - `ConfigError::Read` when the source cannot be read
    /// - anything [`Config::parse`] returns
    pub fn load(filename: &str) -> Result<Self, ConfigError> {
        if filename.is_empty() {
            return Err(ConfigError::EmptyFilename);
        }

        if filename == STDIN {
            debug!("loading configuration from stdin");
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                return Err(ConfigError::StdinIsTerminal);
            }
            return Self::from_reader(stdin.lock(), "stdin");
        }

        Self::from_file(filename)
    }

    /// Load from a file
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(filename = %path.display(), "loading configuration from file");
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::read(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    /// Load from any reader; `source_name` is only used in errors
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn from_reader(mut reader: impl Read, source_name: &str) -> Result<Self, ConfigError> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| ConfigError::read(source_name, e))?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const YAML: &str = r#"
schemaVersion: "0.1-beta"
process:
  delay: 1s
  exit:
    after: 10s to 20s
    code: 2
cpu:
  planRefs: [wave]
memory:
  size: 10Mi
  interval: 1s
plans:
  - name: wave
    subPlans:
      - percentage: 10, 50
        interval: 1s
        duration: 10s
      - percentage: 90
webServers:
  - port: 8080
    routes:
      - path: /
        content:
          whoami: true
"#;

    #[test]
    fn yaml_document() {
        let config = Config::parse(YAML).unwrap();
        assert_eq!(config.schema_version.as_deref(), Some("0.1-beta"));
        assert_eq!(config.process.unwrap().exit.unwrap().code, 2);
        assert_eq!(config.cpu.unwrap().plan_refs, ["wave"]);
        assert_eq!(config.plans.len(), 1);
        assert_eq!(config.plans[0].phases().len(), 2);
        assert_eq!(config.web_servers[0].port(), 8080);
        assert_eq!(config.web_servers[0].routes().len(), 1);
    }

    #[test]
    fn json_document_with_leading_whitespace() {
        let json = r#"
            {"plans": [{"name": "steady", "percentage": 50}], "memory": {"planRefs": ["steady"]}}
        "#;
        let config = Config::parse(json).unwrap();
        assert_eq!(config.plans[0].name.as_deref(), Some("steady"));
        assert_eq!(config.memory.unwrap().plan_refs, ["steady"]);
    }

    #[test]
    fn blank_and_broken_documents() {
        assert_eq!(Config::parse("  \n ").unwrap_err(), ConfigError::EmptyDocument);
        assert!(matches!(
            Config::parse("{ not json").unwrap_err(),
            ConfigError::Parse { format: "json", .. }
        ));
        assert!(matches!(
            Config::parse("plans: [[").unwrap_err(),
            ConfigError::Parse { format: "yaml", .. }
        ));
        assert!(matches!(
            Config::parse("webservers: []\n").unwrap_err(),
            ConfigError::Parse { format: "yaml", .. }
        ));
    }

    #[test]
    fn empty_filename_is_rejected() {
        let err = Config::load("").unwrap_err();
        assert_eq!(err.to_string(), "provided filename is empty");
    }

    #[test]
    fn reader_source() {
        let config = Config::from_reader("cpu:\n  percentage: 5\n".as_bytes(), "stdin").unwrap();
        assert!(config.cpu.is_some());
    }
}
