//! Show the agent's active sandbox, creating one if none is running.

use anyhow::Result;
use colored::Colorize;
use std::fmt::Write;

use super::Session;
use crate::sandbox::SandboxInfo;

/// Format sandbox details as a displayable string.
pub fn format_sandbox(info: &SandboxInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "━".repeat(50).dimmed());
    let _ = writeln!(out, "{}", "   Automaton Sandbox".yellow().bold());
    let _ = writeln!(out, "{}", "━".repeat(50).dimmed());

    let status = if info.is_running() {
        info.status.green().bold()
    } else {
        info.status.red()
    };
    let _ = writeln!(out, "  ID:         {}", info.id.cyan());
    let _ = writeln!(out, "  Status:     {status}");
    if !info.region.is_empty() {
        let _ = writeln!(out, "  Region:     {}", info.region.cyan());
    }
    let _ = writeln!(
        out,
        "  Resources:  {}",
        format!(
            "{} vCPU / {} MB / {} GB",
            info.vcpu, info.memory_mb, info.disk_gb
        )
        .cyan()
    );
    let _ = writeln!(
        out,
        "  Created:    {}",
        info.created_at_parsed()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string())
            .cyan()
    );
    let _ = writeln!(out, "{}", "━".repeat(50).dimmed());
    out
}

pub async fn run(session: &Session) -> Result<()> {
    let (_client, info) = session.attach_active().await?;
    print!("{}", format_sandbox(&info));
    Ok(())
}
