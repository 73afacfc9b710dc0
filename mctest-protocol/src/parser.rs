//! Sideband response grammar.
//!
//! A `metaget <key>` request is answered either by a bare `END` line (key
//! absent) or by one `META` line followed by `END`:
//!
//! ```text
//! META <key> age: <int>; exptime: <int>; from: <ip-or-"unknown">
//! END
//! ```
//!
//! The two branches are decided on the first response line alone, so a
//! session can never partially match both.

use crate::meta::Origin;
use std::net::Ipv4Addr;
use winnow::prelude::*;
use winnow::token::take_while;

pub const END_MARKER: &str = "END";

/// Parsed `META` line. The key is echoed so callers can reject replies
/// that do not belong to the request they sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaLine {
    pub key: String,
    pub age: u64,
    pub exptime: u64,
    pub origin: Origin,
}

/// Format the request for one key, without the line terminator.
pub fn metaget_request(key: &str) -> String {
    format!("metaget {}", key)
}

/// True when `line` is the bare end marker (NotFound branch).
pub fn is_end_marker(line: &str) -> bool {
    line.trim_end() == END_MARKER
}

pub fn parse_meta_line(input: &str) -> Result<MetaLine, String> {
    meta_line.parse(input.trim_end()).map_err(|e| e.to_string())
}

fn meta_line(input: &mut &str) -> ModalResult<MetaLine> {
    let _ = "META ".parse_next(input)?;
    let key = take_while(1.., |c: char| !c.is_whitespace()).parse_next(input)?;
    let _ = " age: ".parse_next(input)?;
    let age = parse_u64.parse_next(input)?;
    let _ = "; exptime: ".parse_next(input)?;
    let exptime = parse_u64.parse_next(input)?;
    let _ = "; from: ".parse_next(input)?;
    let origin = parse_origin.parse_next(input)?;
    Ok(MetaLine {
        key: key.to_string(),
        age,
        exptime,
        origin,
    })
}

fn parse_u64(input: &mut &str) -> ModalResult<u64> {
    take_while(1.., |c: char| c.is_ascii_digit())
        .parse_next(input)?
        .parse()
        .map_err(|_| winnow::error::ErrMode::Cut(winnow::error::ContextError::default()))
}

fn parse_origin(input: &mut &str) -> ModalResult<Origin> {
    let token = take_while(1.., |c: char| !c.is_whitespace()).parse_next(input)?;
    if token == "unknown" {
        return Ok(Origin::Unknown);
    }
    token
        .parse::<Ipv4Addr>()
        .map(Origin::Ip)
        .map_err(|_| winnow::error::ErrMode::Cut(winnow::error::ContextError::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_meta_line_with_unknown_origin() {
        let parsed = parse_meta_line("META abc123xy age: 0; exptime: 0; from: unknown").unwrap();
        assert_eq!(
            parsed,
            MetaLine {
                key: "abc123xy".to_string(),
                age: 0,
                exptime: 0,
                origin: Origin::Unknown,
            }
        );
    }

    #[test]
    fn parses_meta_line_with_ip_origin() {
        let parsed = parse_meta_line("META k1 age: 1; exptime: 15; from: 127.0.0.1").unwrap();
        assert_eq!(parsed.age, 1);
        assert_eq!(parsed.exptime, 15);
        assert_eq!(parsed.origin, Origin::Ip("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn trailing_crlf_is_tolerated() {
        let parsed = parse_meta_line("META k age: 2; exptime: 0; from: unknown\r\n").unwrap();
        assert_eq!(parsed.age, 2);
    }

    #[test]
    fn end_marker_detection() {
        assert!(is_end_marker("END"));
        assert!(is_end_marker("END\r\n"));
        assert!(!is_end_marker("META k age: 0; exptime: 0; from: unknown"));
        assert!(!is_end_marker("ENDING"));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_meta_line("META k age: x; exptime: 0; from: unknown").is_err());
        assert!(parse_meta_line("META k age: 0 exptime: 0 from: unknown").is_err());
        assert!(parse_meta_line("META k age: 0; exptime: 0; from: not-an-ip").is_err());
        assert!(parse_meta_line("SERVER_ERROR out of memory").is_err());
        assert!(parse_meta_line("").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_meta_line("META k age: 0; exptime: 0; from: unknown extra").is_err());
    }

    #[test]
    fn request_formatting() {
        assert_eq!(metaget_request("abc123xy"), "metaget abc123xy");
    }
}
