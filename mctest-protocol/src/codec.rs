//! ASCII cache-protocol framing for the ordinary client path.
//!
//! Only the commands the harness drives are covered: `set`, multi-key
//! `get`, and `incr`. Requests are returned without the trailing CRLF;
//! the transport appends it.

use winnow::prelude::*;
use winnow::token::take_while;

pub fn set_request(key: &str, flags: u32, exptime: u32, value: &str) -> String {
    format!(
        "set {} {} {} {}\r\n{}",
        key,
        flags,
        exptime,
        value.len(),
        value
    )
}

pub fn get_request(keys: &[&str]) -> String {
    format!("get {}", keys.join(" "))
}

pub fn incr_request(key: &str, delta: u64) -> String {
    format!("incr {} {}", key, delta)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreReply {
    Stored,
    NotStored,
    Error(String),
}

pub fn parse_store_reply(line: &str) -> StoreReply {
    match line.trim_end() {
        "STORED" => StoreReply::Stored,
        "NOT_STORED" => StoreReply::NotStored,
        other => StoreReply::Error(other.to_string()),
    }
}

/// Header of one `VALUE <key> <flags> <bytes>` block in a `get` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHeader {
    pub key: String,
    pub flags: u32,
    pub len: usize,
}

pub fn parse_value_header(input: &str) -> Result<ValueHeader, String> {
    value_header
        .parse(input.trim_end())
        .map_err(|e| e.to_string())
}

fn value_header(input: &mut &str) -> ModalResult<ValueHeader> {
    let _ = "VALUE ".parse_next(input)?;
    let key = take_while(1.., |c: char| !c.is_whitespace()).parse_next(input)?;
    let _ = ' '.parse_next(input)?;
    let flags = parse_u32.parse_next(input)?;
    let _ = ' '.parse_next(input)?;
    let len = parse_usize.parse_next(input)?;
    Ok(ValueHeader {
        key: key.to_string(),
        flags,
        len,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrReply {
    Value(u64),
    NotFound,
    Error(String),
}

pub fn parse_incr_reply(line: &str) -> IncrReply {
    let line = line.trim_end();
    if line == "NOT_FOUND" {
        return IncrReply::NotFound;
    }
    match line.parse::<u64>() {
        Ok(value) => IncrReply::Value(value),
        Err(_) => IncrReply::Error(line.to_string()),
    }
}

fn parse_u32(input: &mut &str) -> ModalResult<u32> {
    take_while(1.., |c: char| c.is_ascii_digit())
        .parse_next(input)?
        .parse()
        .map_err(|_| winnow::error::ErrMode::Cut(winnow::error::ContextError::default()))
}

fn parse_usize(input: &mut &str) -> ModalResult<usize> {
    take_while(1.., |c: char| c.is_ascii_digit())
        .parse_next(input)?
        .parse()
        .map_err(|_| winnow::error::ErrMode::Cut(winnow::error::ContextError::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_request_frames_value_length() {
        assert_eq!(
            set_request("k1", 0, 15, "val789zz"),
            "set k1 0 15 8\r\nval789zz"
        );
    }

    #[test]
    fn get_request_joins_keys() {
        assert_eq!(get_request(&["a", "b", "c"]), "get a b c");
        assert_eq!(get_request(&["solo"]), "get solo");
    }

    #[test]
    fn store_replies() {
        assert_eq!(parse_store_reply("STORED\r\n"), StoreReply::Stored);
        assert_eq!(parse_store_reply("NOT_STORED"), StoreReply::NotStored);
        assert!(matches!(
            parse_store_reply("SERVER_ERROR out of memory"),
            StoreReply::Error(_)
        ));
    }

    #[test]
    fn value_header_parses() {
        assert_eq!(
            parse_value_header("VALUE abc123xy 0 8").unwrap(),
            ValueHeader {
                key: "abc123xy".to_string(),
                flags: 0,
                len: 8,
            }
        );
        assert!(parse_value_header("END").is_err());
        assert!(parse_value_header("VALUE k 0").is_err());
    }

    #[test]
    fn incr_replies() {
        assert_eq!(parse_incr_reply("16\r\n"), IncrReply::Value(16));
        assert_eq!(parse_incr_reply("NOT_FOUND"), IncrReply::NotFound);
        assert!(matches!(
            parse_incr_reply("CLIENT_ERROR cannot increment"),
            IncrReply::Error(_)
        ));
    }
}
