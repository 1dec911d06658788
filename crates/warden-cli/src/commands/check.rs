//! check command - validate the access configuration

use super::CommandContext;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use warden_core::AuthConfig;

#[derive(Serialize)]
struct CheckResult {
    config: Option<String>,
    configured: bool,
    unrestricted: bool,
    password_entries: usize,
    directory: Option<DirectorySummary>,
}

#[derive(Serialize)]
struct DirectorySummary {
    server_url: String,
    search_base: String,
    search_filter: String,
    admin_bind: bool,
    start_tls: bool,
    timeout_seconds: u64,
}

impl CheckResult {
    fn new(path: Option<&Path>, config: Option<&AuthConfig>) -> Self {
        Self {
            config: path.map(|p| p.display().to_string()),
            configured: config.is_some(),
            unrestricted: config.is_some_and(|c| c.unrestricted),
            password_entries: config.map_or(0, |c| c.passwords.len()),
            directory: config
                .and_then(|c| c.directory.as_ref())
                .map(|d| DirectorySummary {
                    server_url: d.server_url.clone(),
                    search_base: d.search_base.clone(),
                    search_filter: d.search_filter_template.clone(),
                    admin_bind: d.admin_credentials().is_some(),
                    start_tls: d.use_start_tls,
                    timeout_seconds: d.timeout_seconds,
                }),
        }
    }
}

/// Loading already validated the file; this reports what was loaded
pub fn execute(ctx: &CommandContext, path: Option<&Path>) -> Result<bool> {
    let result = CheckResult::new(path, ctx.config.as_ref());

    if ctx.is_json() {
        ctx.print_json(&result)?;
        return Ok(result.configured);
    }

    let Some(path) = &result.config else {
        ctx.error(&format!(
            "{} no configuration file, every attempt fails with {}",
            "✗".red(),
            "configuration".yellow()
        ));
        return Ok(false);
    };

    println!("{} {}", "✓".green(), path.as_str().bold());

    if result.unrestricted {
        println!(
            "  {} {}",
            "unrestricted:".bold(),
            "every attempt succeeds".yellow()
        );
    }
    println!("  {} {}", "password entries:".bold(), result.password_entries);

    match &result.directory {
        Some(directory) => {
            println!("  {} {}", "directory:".bold(), directory.server_url);
            println!("    search base:   {}", directory.search_base);
            println!("    search filter: {}", directory.search_filter);
            println!("    admin bind:    {}", directory.admin_bind);
            println!("    StartTLS:      {}", directory.start_tls);
            println!("    timeout:       {}s", directory.timeout_seconds);
        }
        None => println!("  {} {}", "directory:".bold(), "none".dimmed()),
    }

    Ok(true)
}
