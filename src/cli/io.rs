//! JSON I/O handling for CLI
//!
//! - Input: optional single JSON object via stdin
//! - Output: single JSON object via stdout

use std::io::{self, Read, Write};

use serde_json::Value;

use super::errors::CliResult;

/// Read one JSON value from the whole of stdin
pub fn read_stdin_json() -> CliResult<Value> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    Ok(serde_json::from_str(input.trim())?)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_value(&success(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_value(&failure(code, message))
}

fn success(data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "data": data
    })
}

fn failure(code: &str, message: &str) -> Value {
    serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

fn write_value(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelopes() {
        let ok = success(serde_json::json!({"id": 1}));
        assert_eq!(ok["status"], "ok");
        assert_eq!(ok["data"]["id"], 1);

        let err = failure("NOT_FOUND", "post not found: 9");
        assert_eq!(err["status"], "error");
        assert_eq!(err["code"], "NOT_FOUND");
    }
}
