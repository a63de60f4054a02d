//! Tests for fetch.

use super::parse;
use crate::cli::commands::parse_headers;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_fetch_defaults() {
    match parse(&["segcache", "fetch", "https://example.com/a.mp4", "--id", "a"]) {
        CliCommand::Fetch {
            url,
            id,
            start,
            end,
            headers,
        } => {
            assert_eq!(url, "https://example.com/a.mp4");
            assert_eq!(id, "a");
            assert_eq!(start, 0);
            assert!(end.is_none());
            assert!(headers.is_empty());
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_range() {
    match parse(&[
        "segcache",
        "fetch",
        "https://example.com/a.mp4",
        "--id",
        "a",
        "--start",
        "1024",
        "--end",
        "4096",
    ]) {
        CliCommand::Fetch { start, end, .. } => {
            assert_eq!(start, 1024);
            assert_eq!(end, Some(4096));
        }
        _ => panic!("expected Fetch with range"),
    }
}

#[test]
fn cli_fetch_requires_id() {
    assert!(Cli::try_parse_from(["segcache", "fetch", "https://example.com/a.mp4"]).is_err());
}

#[test]
fn cli_parse_fetch_headers() {
    match parse(&[
        "segcache",
        "fetch",
        "https://example.com/a.mp4",
        "--id",
        "a",
        "-H",
        "Referer: https://example.com/",
        "--header",
        "Cookie: k=v",
    ]) {
        CliCommand::Fetch { headers, .. } => {
            let map = parse_headers(&headers).unwrap();
            assert_eq!(map.len(), 2);
            assert_eq!(map["Referer"], "https://example.com/");
            assert_eq!(map["Cookie"], "k=v");
        }
        _ => panic!("expected Fetch with headers"),
    }
}

#[test]
fn header_without_colon_is_rejected() {
    assert!(parse_headers(&["NoColon".to_string()]).is_err());
    assert!(parse_headers(&[": value".to_string()]).is_err());
}
