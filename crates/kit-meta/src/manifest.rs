//! Manifest model (`kit.toml`)
//!
//! Example manifest:
//!
//! ```toml
//! [[artifacts]]
//! name = "rust-style"
//! kind = "doc"
//! path = "docs/rust-style.md"
//!
//! [[artifacts]]
//! name = "github"
//! kind = "mcp-server"
//! path = "servers/github.json"
//! env = [{ name = "GITHUB_TOKEN" }, { name = "GITHUB_HOST", default = "github.com" }]
//!
//! [sets]
//! dev = ["rust-style", "github"]
//! ```
//!
//! A variable declared without a default is required: artifacts with
//! unresolved required variables are skipped at sync time. The manifest is
//! validated once at load; sync logic can assume every dependency and set
//! member resolves.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// File name of the per-repository manifest.
pub const MANIFEST_FILE: &str = "kit.toml";

/// What an artifact is, which decides how it is installed and synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Coding-standard or other prose document.
    Doc,
    /// IDE command definition.
    Command,
    /// MCP server definition; its content file holds a [`crate::ServerDef`].
    McpServer,
}

/// An environment variable an artifact consumes.
///
/// No default means the variable is required and must resolve from a
/// credential store before the artifact may reach a target surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvVarDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl EnvVarDecl {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// One distributable artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactDef {
    pub name: String,
    pub kind: ArtifactKind,
    /// Repository-relative path of the artifact's content file.
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVarDecl>,
    /// Names of other artifacts this one depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

impl ArtifactDef {
    /// Names of the declared variables with no default.
    pub fn required_env(&self) -> Vec<&str> {
        self.env
            .iter()
            .filter(|v| v.is_required())
            .map(|v| v.name.as_str())
            .collect()
    }
}

/// A repository's full manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub artifacts: Vec<ArtifactDef>,
    /// Named sets grouping artifact names for activation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sets: BTreeMap<String, Vec<String>>,
}

impl Manifest {
    /// Parse and validate manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content).map_err(|e| Error::ManifestParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and validate the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content, path)
    }

    pub fn artifact(&self, name: &str) -> Option<&ArtifactDef> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Expand `roots` to the full dependency closure, in a stable order with
    /// dependencies before their dependents.
    ///
    /// Unknown roots fail with [`Error::UnknownArtifact`]. Cycles cannot
    /// occur here, since validation rejects them at load time.
    pub fn closure(&self, roots: &[String]) -> Result<Vec<String>> {
        let mut ordered = Vec::new();
        let mut seen = BTreeSet::new();
        for root in roots {
            self.visit(root, &mut seen, &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit(
        &self,
        name: &str,
        seen: &mut BTreeSet<String>,
        ordered: &mut Vec<String>,
    ) -> Result<()> {
        if seen.contains(name) {
            return Ok(());
        }
        let artifact = self.artifact(name).ok_or_else(|| Error::UnknownArtifact {
            name: name.to_string(),
        })?;
        seen.insert(name.to_string());
        for dep in &artifact.requires {
            self.visit(dep, seen, ordered)?;
        }
        ordered.push(name.to_string());
        Ok(())
    }

    /// Validate the whole document, rejecting it with a field-level error
    /// rather than failing later inside sync logic.
    fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for artifact in &self.artifacts {
            let field = format!("artifacts.{}", artifact.name);
            if artifact.name.is_empty() {
                return Err(Error::field("artifacts.name", "must not be empty"));
            }
            if !artifact
                .name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
            {
                return Err(Error::field(
                    &field,
                    "names use lowercase letters, digits, '-' and '_'",
                ));
            }
            if !names.insert(artifact.name.as_str()) {
                return Err(Error::field(&field, "duplicate artifact name"));
            }
            if artifact.path.is_empty() {
                return Err(Error::field(format!("{field}.path"), "must not be empty"));
            }
            if Path::new(&artifact.path).is_absolute() || artifact.path.contains("..") {
                return Err(Error::field(
                    format!("{field}.path"),
                    "must be a repository-relative path without '..'",
                ));
            }
            let mut env_names = BTreeSet::new();
            for var in &artifact.env {
                if !is_env_name(&var.name) {
                    return Err(Error::field(
                        format!("{field}.env.{}", var.name),
                        "variable names are uppercase letters, digits and underscores",
                    ));
                }
                if !env_names.insert(var.name.as_str()) {
                    return Err(Error::field(
                        format!("{field}.env.{}", var.name),
                        "duplicate variable declaration",
                    ));
                }
            }
        }

        for artifact in &self.artifacts {
            for dep in &artifact.requires {
                if !names.contains(dep.as_str()) {
                    return Err(Error::field(
                        format!("artifacts.{}.requires", artifact.name),
                        format!("unknown artifact '{dep}'"),
                    ));
                }
            }
        }

        for (set, members) in &self.sets {
            if members.is_empty() {
                return Err(Error::field(format!("sets.{set}"), "set has no members"));
            }
            for member in members {
                if !names.contains(member.as_str()) {
                    return Err(Error::field(
                        format!("sets.{set}"),
                        format!("unknown artifact '{member}'"),
                    ));
                }
            }
        }

        self.reject_cycles()
    }

    /// Depth-first search for dependency cycles, reporting the offending
    /// chain by name.
    fn reject_cycles(&self) -> Result<()> {
        let mut done = BTreeSet::new();
        for artifact in &self.artifacts {
            let mut stack = Vec::new();
            self.walk_cycle(&artifact.name, &mut stack, &mut done)?;
        }
        Ok(())
    }

    fn walk_cycle(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        done: &mut BTreeSet<String>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut chain: Vec<&str> = stack[pos..].iter().map(String::as_str).collect();
            chain.push(name);
            return Err(Error::DependencyCycle {
                chain: chain.join(" -> "),
            });
        }
        stack.push(name.to_string());
        // Validation order: requires entries are checked against known names
        // before cycle detection runs, so the lookup cannot miss.
        if let Some(artifact) = self.artifact(name) {
            for dep in &artifact.requires {
                self.walk_cycle(dep, stack, done)?;
            }
        }
        stack.pop();
        done.insert(name.to_string());
        Ok(())
    }
}

/// Uppercase-with-underscores convention shared with the credential stores.
fn is_env_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_uppercase() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}
