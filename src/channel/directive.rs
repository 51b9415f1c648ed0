//! Status-line and directive parsing for responses from the controller.

use crate::error::{BridgeError, Result};

/// The outcome carried by a status line's leading token, plus the
/// directive keywords that followed it (each `;`-delimited token after
/// the status token).
pub struct StatusLine {
    pub ok: bool,
    pub directives: Vec<String>,
}

/// Splits a status line into its status token and trailing directive
/// tokens. `+OK` / `-ERR` is the only recognized leading token; anything
/// else is a fatal protocol error. Directive tokens are kept verbatim
/// (just the keyword — `DIR`'s own payload arrives as a following data
/// block, read separately by the caller).
pub fn parse_status_line(line: &str) -> Result<StatusLine> {
    let mut parts = line.split(';');
    let status_token = parts.next().unwrap_or("").trim();
    let ok = match status_token {
        "+OK" => true,
        "-ERR" => false,
        _ => return Err(BridgeError::Protocol),
    };
    let mut directives = Vec::new();
    for part in parts {
        let keyword = part.split_whitespace().next().unwrap_or("").to_string();
        if keyword != "QUIT" && keyword != "DIR" {
            return Err(BridgeError::Protocol);
        }
        directives.push(keyword);
    }
    Ok(StatusLine { ok, directives })
}

/// Parses one `<path> <mode-string>` line from a `DIR` directive's data
/// block.
pub fn parse_dir_entry(line: &str) -> Result<(String, String)> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let path = parts.next().ok_or(BridgeError::Protocol)?;
    let modes = parts.next().ok_or(BridgeError::Protocol)?.trim();
    if path.is_empty() || modes.is_empty() {
        return Err(BridgeError::Protocol);
    }
    Ok((path.to_string(), modes.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_ok() {
        let s = parse_status_line("+OK").unwrap();
        assert!(s.ok);
        assert!(s.directives.is_empty());
    }

    #[test]
    fn parses_err() {
        let s = parse_status_line("-ERR").unwrap();
        assert!(!s.ok);
    }

    #[test]
    fn parses_ok_with_dir_and_quit() {
        let s = parse_status_line("+OK;DIR;QUIT").unwrap();
        assert!(s.ok);
        assert_eq!(s.directives, vec!["DIR".to_string(), "QUIT".to_string()]);
    }

    #[test]
    fn unrecognized_leading_token_is_fatal() {
        assert_eq!(parse_status_line("MAYBE").unwrap_err(), BridgeError::Protocol);
    }

    #[test]
    fn unrecognized_directive_is_fatal() {
        assert_eq!(parse_status_line("+OK;BOGUS").unwrap_err(), BridgeError::Protocol);
    }

    #[test]
    fn dir_entry_splits_path_and_modes() {
        let (path, modes) = parse_dir_entry("/hello rw").unwrap();
        assert_eq!(path, "/hello");
        assert_eq!(modes, "rw");
    }
}
