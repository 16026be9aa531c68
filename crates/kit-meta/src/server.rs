//! MCP server definitions
//!
//! An `mcp-server` artifact's content file is a JSON document describing how
//! to launch the server. Environment values may reference declared variables
//! with `${NAME}`; substitution happens at sync time from the resolved
//! credential view, never in the stored file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A tool-agnostic MCP server definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerDef {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment passed to the server process. Values may contain
    /// `${NAME}` placeholders for declared variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ServerDef {
    /// Load a server definition from its installed content file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::ServerParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Variable names referenced as `${NAME}` anywhere in `env` values.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        for value in self.env.values() {
            let mut rest = value.as_str();
            while let Some(start) = rest.find("${") {
                let tail = &rest[start + 2..];
                match tail.find('}') {
                    Some(end) => {
                        let name = &tail[..end];
                        if !name.is_empty() && !names.iter().any(|n| n == name) {
                            names.push(name.to_string());
                        }
                        rest = &tail[end + 1..];
                    }
                    None => break,
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_minimal_definition() {
        let def: ServerDef =
            serde_json::from_str(r#"{"command": "npx", "args": ["-y", "server-github"]}"#).unwrap();
        assert_eq!(def.command, "npx");
        assert_eq!(def.args, vec!["-y", "server-github"]);
        assert!(def.env.is_empty());
    }

    #[test]
    fn collects_placeholders() {
        let def: ServerDef = serde_json::from_str(
            r#"{
                "command": "npx",
                "env": {
                    "GITHUB_TOKEN": "${GITHUB_TOKEN}",
                    "URL": "https://${GITHUB_HOST}/api"
                }
            }"#,
        )
        .unwrap();
        let mut names = def.placeholders();
        names.sort();
        assert_eq!(names, vec!["GITHUB_HOST", "GITHUB_TOKEN"]);
    }

    #[test]
    fn unterminated_placeholder_ignored() {
        let def: ServerDef =
            serde_json::from_str(r#"{"command": "x", "env": {"A": "${OPEN"}}"#).unwrap();
        assert!(def.placeholders().is_empty());
    }

    #[test]
    fn load_reports_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = ServerDef::load(&path).unwrap_err();
        assert!(matches!(err, Error::ServerParse { .. }));
    }
}
