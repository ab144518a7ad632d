// src/accounts.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Read the tracked-accounts file: one account per line, `#` starts a
/// comment, blank lines ignored. Order is preserved and duplicates kept.
pub fn read_accounts(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading accounts from {}", path.display()))?;
    Ok(parse_accounts(&content))
}

pub fn parse_accounts(s: &str) -> Vec<String> {
    let mut accounts = Vec::new();
    for line in s.lines() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let line = line.trim();
        if !line.is_empty() {
            accounts.push(line.to_string());
        }
    }
    accounts
}
