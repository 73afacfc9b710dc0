//! Integration tests for the sideband response grammar.
//!
//! These exercise the two-branch decision a probe session makes on raw
//! response lines: the Found branch (META line then END) and the
//! NotFound branch (END alone) must never overlap.

use mctest_protocol::parser::{is_end_marker, metaget_request, parse_meta_line};
use mctest_protocol::Origin;

#[test]
fn found_and_not_found_branches_are_disjoint() {
    let found_first_line = "META abc123xy age: 0; exptime: 0; from: unknown";
    let not_found_first_line = "END";

    assert!(!is_end_marker(found_first_line));
    assert!(parse_meta_line(found_first_line).is_ok());

    assert!(is_end_marker(not_found_first_line));
    assert!(parse_meta_line(not_found_first_line).is_err());
}

#[test]
fn full_found_exchange_parses() {
    // As read off the wire for `metaget abc123xy`, CRLF already stripped
    // by the line reader.
    let request = metaget_request("abc123xy");
    assert_eq!(request, "metaget abc123xy");

    let meta = parse_meta_line("META abc123xy age: 1; exptime: 15; from: 127.0.0.1").unwrap();
    assert_eq!(meta.key, "abc123xy");
    assert_eq!(meta.age, 1);
    assert_eq!(meta.exptime, 15);
    assert_eq!(meta.origin, Origin::Ip("127.0.0.1".parse().unwrap()));
}

#[test]
fn drifted_responses_match_neither_branch() {
    for line in [
        "MET abc age: 0; exptime: 0; from: unknown",
        "META abc age: -1; exptime: 0; from: unknown",
        "META abc age: 0; exptime: 0; from: 999.999.999.999",
        "ERROR",
        "VALUE abc 0 8",
    ] {
        assert!(!is_end_marker(line), "{} should not be END", line);
        assert!(parse_meta_line(line).is_err(), "{} should not parse", line);
    }
}
