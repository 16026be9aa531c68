//! Layered credential stores
//!
//! Secrets live in line-oriented `NAME=value` files, one per scope. Values
//! containing newlines, quotes, or a leading/trailing blank are
//! double-quoted with backslash escapes and may span lines. Project entries
//! shadow global entries of the same name. Secrets never travel into
//! manifests or logs; anything user-facing goes through [`masked`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use kit_meta::ArtifactDef;
use regex::Regex;

use crate::config::{RuntimeContext, Scope};
use crate::{Error, Result};

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("static pattern"));

/// Enforce the uppercase-with-underscores naming convention.
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidCredentialName {
            name: name.to_string(),
        })
    }
}

/// The only form of a secret value that may reach a display surface.
pub fn masked(value: &str) -> String {
    let visible: String = value.chars().take(2).collect();
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

/// One scope's secret file.
pub struct CredentialStore {
    path: PathBuf,
    scope: Scope,
    project_root: PathBuf,
}

impl CredentialStore {
    pub fn open(ctx: &RuntimeContext, scope: Scope) -> Self {
        Self {
            path: ctx.credentials_path(scope),
            scope,
            project_root: ctx.project_root.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every entry. A missing file is an empty store.
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = kit_fs::read_to_string_locked(&self.path)?;
        parse_entries(&content, &self.path)
    }

    /// Insert or replace one entry and persist the store.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        validate_name(name)?;
        let mut entries = self.load()?;
        entries.insert(name.to_string(), value.to_string());
        kit_fs::atomic_write(&self.path, serialize_entries(&entries).as_bytes())?;
        tracing::info!(name, scope = %self.scope, "stored credential");
        if self.scope == Scope::Project {
            self.ensure_ignored()?;
        }
        Ok(())
    }

    /// Remove one entry. Returns whether it existed.
    pub fn unset(&self, name: &str) -> Result<bool> {
        let mut entries = self.load()?;
        let removed = entries.remove(name).is_some();
        if removed {
            kit_fs::atomic_write(&self.path, serialize_entries(&entries).as_bytes())?;
        }
        Ok(removed)
    }

    /// Keep the project secret file out of version control.
    ///
    /// Appends the file's project-relative path to `.gitignore` when the
    /// surrounding project is a git repository and the entry is not yet
    /// present.
    fn ensure_ignored(&self) -> Result<()> {
        if !self.project_root.join(".git").exists() {
            return Ok(());
        }
        let rel = match self.path.strip_prefix(&self.project_root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => return Ok(()),
        };
        let gitignore = self.project_root.join(".gitignore");
        let mut content = if gitignore.exists() {
            std::fs::read_to_string(&gitignore).map_err(|e| kit_fs::Error::io(&gitignore, e))?
        } else {
            String::new()
        };
        if content.lines().any(|line| line.trim() == rel) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&rel);
        content.push('\n');
        kit_fs::atomic_write(&gitignore, content.as_bytes())?;
        tracing::debug!(entry = %rel, "added credential file to .gitignore");
        Ok(())
    }
}

/// Layered (project over global) read view with a request-scoped cache.
///
/// Each store is read at most once per resolver instance; construct one
/// resolver per command invocation.
pub struct CredentialResolver {
    global: CredentialStore,
    project: CredentialStore,
    merged: RefCell<Option<BTreeMap<String, String>>>,
}

impl CredentialResolver {
    pub fn new(ctx: &RuntimeContext) -> Self {
        Self {
            global: CredentialStore::open(ctx, Scope::Global),
            project: CredentialStore::open(ctx, Scope::Project),
            merged: RefCell::new(None),
        }
    }

    /// The merged view: project entries shadow global entries.
    pub fn merged(&self) -> Result<BTreeMap<String, String>> {
        if let Some(cached) = self.merged.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let mut view = self.global.load()?;
        view.extend(self.project.load()?);
        *self.merged.borrow_mut() = Some(view.clone());
        Ok(view)
    }

    /// Resolve every declared variable of `artifact`.
    ///
    /// Returns the full name→value map, falling back to declared defaults.
    /// Any required variable without a value fails with
    /// [`Error::MissingCredentials`] naming all of them; callers must not
    /// have written anything for this artifact yet.
    pub fn resolve(&self, namespace: &str, artifact: &ArtifactDef) -> Result<BTreeMap<String, String>> {
        let view = self.merged()?;
        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();
        for decl in &artifact.env {
            match view.get(&decl.name).cloned().or_else(|| decl.default.clone()) {
                Some(value) => {
                    resolved.insert(decl.name.clone(), value);
                }
                None => missing.push(decl.name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(Error::MissingCredentials {
                artifact: format!("{namespace}.{}", artifact.name),
                missing,
            })
        }
    }
}

/// Parse a line-oriented store, reporting malformed lines by number.
fn parse_entries(content: &str, path: &Path) -> Result<BTreeMap<String, String>> {
    let mut entries = BTreeMap::new();
    let mut lines = content.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (name, rest) = trimmed.split_once('=').ok_or_else(|| Error::MalformedStore {
            path: path.to_path_buf(),
            message: format!("line {line_no}: expected NAME=value"),
        })?;
        let name = name.trim();
        if !NAME_PATTERN.is_match(name) {
            return Err(Error::MalformedStore {
                path: path.to_path_buf(),
                message: format!("line {line_no}: invalid name '{name}'"),
            });
        }

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            // Quoted value, possibly spanning lines until the closing quote.
            let mut raw = quoted.to_string();
            loop {
                match take_quoted(&raw) {
                    Some(value) => break value,
                    None => match lines.next() {
                        Some((_, next)) => {
                            raw.push('\n');
                            raw.push_str(next);
                        }
                        None => {
                            return Err(Error::MalformedStore {
                                path: path.to_path_buf(),
                                message: format!("line {line_no}: unterminated quoted value"),
                            });
                        }
                    },
                }
            }
        } else {
            rest.to_string()
        };

        entries.insert(name.to_string(), value);
    }
    Ok(entries)
}

/// Unescape `raw` up to an unescaped closing quote; `None` when the value
/// continues on the next line.
fn take_quoted(raw: &str) -> Option<String> {
    let mut value = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => value.push('\n'),
                Some(other) => value.push(other),
                None => return None,
            },
            '"' => return Some(value),
            other => value.push(other),
        }
    }
    None
}

fn serialize_entries(entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (name, value) in entries {
        let needs_quoting = value.contains('\n')
            || value.contains('"')
            || value.contains('\\')
            || value.trim() != value
            || value.is_empty();
        if needs_quoting {
            let escaped = value
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            out.push_str(&format!("{name}=\"{escaped}\"\n"));
        } else {
            out.push_str(&format!("{name}={value}\n"));
        }
    }
    out
}
