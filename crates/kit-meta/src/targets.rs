//! Target surface registry
//!
//! Each entry describes one external tool's configuration surface: where the
//! JSON file lives relative to the project root and which top-level key
//! holds the managed server map. Most tools use `"mcpServers"`; VS Code uses
//! `"servers"` and Zed `"context_servers"`. Probing which tools actually
//! exist on a machine is outside the engine; this table is plain data the
//! caller filters.

/// Compile-time description of one tool's configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    /// Short stable identifier for reports and CLI selection.
    pub slug: &'static str,
    /// Config file path relative to the project root.
    pub config_path: &'static str,
    /// Top-level JSON key of the managed server map.
    pub servers_key: &'static str,
}

const TARGETS: &[TargetSpec] = &[
    TargetSpec {
        slug: "claude",
        config_path: ".mcp.json",
        servers_key: "mcpServers",
    },
    TargetSpec {
        slug: "cursor",
        config_path: ".cursor/mcp.json",
        servers_key: "mcpServers",
    },
    TargetSpec {
        slug: "vscode",
        config_path: ".vscode/mcp.json",
        servers_key: "servers",
    },
    TargetSpec {
        slug: "zed",
        config_path: ".zed/settings.json",
        servers_key: "context_servers",
    },
];

/// All known target surfaces.
pub fn target_specs() -> &'static [TargetSpec] {
    TARGETS
}

/// Look up a target surface by slug.
pub fn target_spec(slug: &str) -> Option<&'static TargetSpec> {
    TARGETS.iter().find(|t| t.slug == slug)
}
