//! Endpoint address sources.
//!
//! Two formats are understood:
//!
//! - an address list: one address per line, blank lines and `#` comments ignored
//! - an INI inventory: every key of every section names a host; the address is
//!   the key up to its first space, then up to its first `:`
//!
//! Addresses are returned as written. Validation happens in the liveness
//! probe, which excludes anything that is not an IP literal.

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Parses an address list.
pub fn parse_address_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_address_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read address list {}", path.display()))?;
    Ok(parse_address_list(&contents))
}

/// Writes `addresses` one per line.
pub fn write_address_list(path: &Path, addresses: &[String]) -> Result<()> {
    std::fs::write(path, addresses.join("\n"))
        .with_context(|| format!("Failed to write address list {}", path.display()))
}

/// Parses an INI inventory into host addresses, in file order.
///
/// Keys are lower-cased. Indented lines continue the previous value and
/// are skipped, as are `#` and `;` comments. A key appearing twice in one
/// section is kept once.
///
/// # Errors
///
/// Returns an error if a key appears before the first section header.
pub fn parse_ini_inventory(contents: &str) -> Result<Vec<String>> {
    let mut hosts = Vec::new();
    let mut section: Option<&str> = None;
    let mut section_start = 0;

    for (lineno, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if raw.starts_with(char::is_whitespace) && section.is_some() {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = Some(&line[1..line.len() - 1]);
            section_start = hosts.len();
            continue;
        }
        if section.is_none() {
            bail!("line {}: entry {:?} is outside of any section", lineno + 1, line);
        }

        let key = line
            .split(['=', ':'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let host = key
            .split(' ')
            .next()
            .unwrap_or_default()
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string();

        if !host.is_empty() && !hosts[section_start..].contains(&host) {
            hosts.push(host);
        }
    }

    Ok(hosts)
}

pub fn read_ini_inventory(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inventory {}", path.display()))?;
    parse_ini_inventory(&contents)
        .with_context(|| format!("Invalid inventory {}", path.display()))
}
