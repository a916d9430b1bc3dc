//! JSON I/O handling for CLI
//!
//! - Input: one JSON document via stdin
//! - Output: one JSON object per line via stdout
//! - UTF-8 only

use std::io::{self, Read, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read a JSON document from stdin; empty input is `None`
pub fn read_request() -> CliResult<Option<Value>> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_request(&input)
}

fn parse_request(input: &str) -> CliResult<Option<Value>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(input)?))
}

/// Read a JSON document from stdin, failing on empty input
pub fn read_required_request() -> CliResult<Value> {
    read_request()?.ok_or_else(|| CliError::bad_request("empty request"))
}

fn render(response: &Value, out: &mut impl Write) -> CliResult<()> {
    serde_json::to_writer(&mut *out, response)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    render(&response, &mut io::stdout())
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    render(&response, &mut io::stdout())
}
