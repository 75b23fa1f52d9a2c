//! Line-oriented call scripts.
//!
//! Each non-blank line is either `METHOD [ARGS_JSON]` or `wait MILLIS`.
//! Lines starting with `#` are comments.

use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::Value;

use ctv_core::MethodCall;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Call(MethodCall),
    Wait(Duration),
}

/// Parse one script line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<ScriptStep>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    if head == "wait" {
        let millis: u64 = rest
            .parse()
            .with_context(|| format!("wait expects milliseconds, got '{}'", rest))?;
        return Ok(Some(ScriptStep::Wait(Duration::from_millis(millis))));
    }

    let arguments = parse_arguments(rest)?;
    Ok(Some(ScriptStep::Call(MethodCall::new(head, arguments))))
}

/// Parse a JSON argument string; empty means no arguments.
pub fn parse_arguments(raw: &str) -> anyhow::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(e) => bail!("arguments are not valid JSON ({}): {}", e, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_call_with_arguments() {
        let step = parse_line(r#"startScreenMirroring {"deviceId":"abc","deviceName":"Living Room TV"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            step,
            ScriptStep::Call(MethodCall::new(
                "startScreenMirroring",
                json!({ "deviceId": "abc", "deviceName": "Living Room TV" })
            ))
        );
    }

    #[test]
    fn test_parse_bare_call() {
        let step = parse_line("  stopCasting  ").unwrap().unwrap();
        assert_eq!(step, ScriptStep::Call(MethodCall::bare("stopCasting")));
    }

    #[test]
    fn test_parse_wait() {
        let step = parse_line("wait 250").unwrap().unwrap();
        assert_eq!(step, ScriptStep::Wait(Duration::from_millis(250)));
        assert!(parse_line("wait soon").is_err());
    }

    #[test]
    fn test_skip_comments_and_blanks() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("# start the cast").unwrap(), None);
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_line("startScreenMirroring {oops").is_err());
    }
}
