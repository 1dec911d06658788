//! Utility functions for the Warden CLI

use anyhow::{Context, Result};
use std::io::BufRead;

/// Use the given password, or read the first line of stdin
pub fn read_password(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => read_first_line(std::io::stdin().lock()),
    }
}

/// First line of `reader` without its line terminator
pub fn read_first_line(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}
