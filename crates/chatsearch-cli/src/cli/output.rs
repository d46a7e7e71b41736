use anyhow::{Context, Result};
use serde::Serialize;

/// Prints one JSON document per line, or indented when `pretty` is set.
pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    println!("{}", to_json(value, pretty)?);
    Ok(())
}

pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("Failed to serialize output")
}
