//! Per-key metadata returned by the sideband `metaget` command.

use std::fmt;
use std::net::Ipv4Addr;

/// Origin address of the last writer, as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The server does not track the writer, or the write predates tracking.
    Unknown,
    Ip(Ipv4Addr),
}

impl Origin {
    pub fn is_local(&self) -> bool {
        match self {
            Origin::Unknown => true,
            Origin::Ip(ip) => ip.is_loopback(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Unknown => write!(f, "unknown"),
            Origin::Ip(ip) => write!(f, "{}", ip),
        }
    }
}

/// Result of one metainfo probe.
///
/// `Found` carries the age since the last write in seconds, the remaining
/// expiry (0 for no expiry), and the origin of the last writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaInfo {
    Found {
        age: u64,
        exptime: u64,
        origin: Origin,
    },
    NotFound,
}

impl MetaInfo {
    pub fn is_found(&self) -> bool {
        matches!(self, MetaInfo::Found { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_display_round_trips() {
        assert_eq!(Origin::Unknown.to_string(), "unknown");
        assert_eq!(
            Origin::Ip(Ipv4Addr::new(127, 0, 0, 1)).to_string(),
            "127.0.0.1"
        );
    }

    #[test]
    fn loopback_and_unknown_are_local() {
        assert!(Origin::Unknown.is_local());
        assert!(Origin::Ip(Ipv4Addr::LOCALHOST).is_local());
        assert!(!Origin::Ip(Ipv4Addr::new(10, 0, 0, 2)).is_local());
    }
}
