//! Integration tests: fixture messages through parsing, tracing, search and
//! report generation.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_fs::prelude::*;
use predicates::prelude::*;

use mailtrace::error::{ForensicError, Result};
use mailtrace::geo::{DisabledLocator, GeoLocator};
use mailtrace::model::evidence::{BodyKind, GeoLocation};
use mailtrace::model::message::RawMessage;
use mailtrace::parser::{body, header, message};
use mailtrace::search::SearchOptions;
use mailtrace::session::AnalysisSession;
use mailtrace::trace;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn parse_fixture(name: &str) -> mailtrace::model::message::ParsedMessage {
    let raw = RawMessage::load(fixture(name)).unwrap();
    message::parse_message(&raw).unwrap()
}

/// Answers every lookup with a fixed place and counts calls.
struct StaticLocator {
    calls: AtomicUsize,
}

impl GeoLocator for StaticLocator {
    fn locate(&self, ip: Ipv4Addr) -> Result<GeoLocation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeoLocation {
            ip,
            city: "Amsterdam".into(),
            country_name: "Netherlands".into(),
            latitude: 52.374,
            longitude: 4.8897,
            country_code: Some("NL".into()),
            region: Some("North Holland".into()),
            org: None,
        })
    }
}

fn session(name: &str, locator: Arc<dyn GeoLocator>) -> AnalysisSession {
    let mut s = AnalysisSession::new(locator, Duration::from_secs(5));
    s.load_file(fixture(name)).unwrap();
    s
}

// ─── Headers ────────────────────────────────────────────────────────

#[test]
fn test_plain_headers() {
    let parsed = parse_fixture("plain.eml");
    let headers = header::extract_headers(&parsed).unwrap();
    assert_eq!(
        headers.from.as_deref(),
        Some("Alice Example <alice@example.com>")
    );
    assert_eq!(headers.to.as_deref(), Some("bob@example.net"));
    assert_eq!(headers.subject.as_deref(), Some("Wire transfer today"));
    let date = headers.date.unwrap();
    assert_eq!(date.to_rfc3339(), "2024-02-05T14:30:00+02:00");
}

#[test]
fn test_encoded_subject_is_decoded() {
    let parsed = parse_fixture("multipart_html.eml");
    let headers = header::extract_headers(&parsed).unwrap();
    assert_eq!(headers.subject.as_deref(), Some("Résumé urgent"));
}

#[test]
fn test_bad_date_is_reported_with_raw_value() {
    let parsed = parse_fixture("bad_date.eml");
    match header::extract_headers(&parsed) {
        Err(ForensicError::DateFormat(raw)) => assert_eq!(raw, "sometime last week"),
        other => panic!("expected DateFormat, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = RawMessage::load(fixture("does_not_exist.eml")).unwrap_err();
    assert!(matches!(err, ForensicError::Io { .. }));
}

// ─── Body ───────────────────────────────────────────────────────────

#[test]
fn test_html_preferred_over_plain_and_attachment() {
    let parsed = parse_fixture("multipart_html.eml");
    let resolved = body::resolve_body(&parsed).unwrap();
    assert_eq!(resolved.kind, BodyKind::Html);
    assert!(resolved.display_text().starts_with("Hello there"));
    assert!(!resolved.display_text().contains("var x"));
    assert!(!resolved.display_text().contains("color: red"));
    assert_eq!(resolved.images, vec!["https://tracker.example.com/pixel.gif"]);
    assert_eq!(resolved.links, vec!["https://phish.example.com/login"]);
}

#[test]
fn test_plain_body() {
    let parsed = parse_fixture("plain.eml");
    let resolved = body::resolve_body(&parsed).unwrap();
    assert_eq!(resolved.kind, BodyKind::Plain);
    assert!(resolved.rendered_text.is_none());
    assert!(resolved.content.contains("Hello investigator."));
    assert!(resolved.images.is_empty());
}

#[test]
fn test_attachment_only_has_no_renderable_body() {
    let parsed = parse_fixture("attachment_only.eml");
    assert!(matches!(
        body::resolve_body(&parsed),
        Err(ForensicError::NoRenderableBody)
    ));
}

// ─── Trace ──────────────────────────────────────────────────────────

#[test]
fn test_origin_from_last_received() {
    let parsed = parse_fixture("plain.eml");
    let chain = header::received_chain(&parsed);
    assert_eq!(chain.len(), 2);
    assert_eq!(
        trace::origin_ip(&chain).unwrap(),
        Ipv4Addr::new(203, 0, 113, 5)
    );
    let hops = trace::hops(&chain);
    assert_eq!(hops[0].ips, vec![Ipv4Addr::new(198, 51, 100, 20)]);
}

#[test]
fn test_first_literal_of_last_entry_wins() {
    let parsed = parse_fixture("multipart_html.eml");
    let chain = header::received_chain(&parsed);
    assert_eq!(
        trace::origin_ip(&chain).unwrap(),
        Ipv4Addr::new(10, 0, 0, 7)
    );
}

#[test]
fn test_no_received_header() {
    let parsed = parse_fixture("no_received.eml");
    let chain = header::received_chain(&parsed);
    assert!(matches!(
        trace::origin_ip(&chain),
        Err(ForensicError::NoReceivedHeader)
    ));
}

#[test]
fn test_earlier_ip_is_not_used() {
    let parsed = parse_fixture("earlier_only_ip.eml");
    let chain = header::received_chain(&parsed);
    assert!(matches!(
        trace::origin_ip(&chain),
        Err(ForensicError::NoIpFound)
    ));
}

#[test]
fn test_trace_survives_bad_date() {
    let mut s = session("bad_date.eml", Arc::new(DisabledLocator));
    assert_eq!(s.origin_ip().unwrap(), Ipv4Addr::new(203, 0, 113, 9));
}

// ─── Search ─────────────────────────────────────────────────────────

#[test]
fn test_search_plain_fixture() {
    let mut s = session("plain.eml", Arc::new(DisabledLocator));
    s.analyze().unwrap();

    let hits = s.search("wire", SearchOptions::default()).unwrap();
    assert_eq!(hits.len(), 1);

    let hits = s
        .search("wire", SearchOptions { ignore_case: true })
        .unwrap();
    assert_eq!(hits.len(), 2);

    let text = s.body().unwrap().display_text().to_string();
    for hit in &hits {
        let matched: String = text.chars().skip(hit.start).take(hit.len()).collect();
        assert_eq!(matched.to_lowercase(), "wire");
    }

    assert!(matches!(
        s.search("  ", SearchOptions::default()),
        Err(ForensicError::EmptyQuery)
    ));
}

#[test]
fn test_search_bad_date_fixture() {
    let mut s = session("bad_date.eml", Arc::new(DisabledLocator));
    assert!(matches!(s.analyze(), Err(ForensicError::DateFormat(_))));

    let hits = s.search("text", SearchOptions::default()).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(s.body().unwrap().display_text().trim(), "Body text.");
}

#[test]
fn test_search_html_fixture_uses_rendered_text() {
    let mut s = session("multipart_html.eml", Arc::new(DisabledLocator));
    s.analyze().unwrap();
    assert!(s.search("<p>", SearchOptions::default()).unwrap().is_empty());
    assert_eq!(
        s.search("Verify", SearchOptions::default()).unwrap().len(),
        1
    );
}

// ─── Reports ────────────────────────────────────────────────────────

#[test]
fn test_report_with_location() {
    let out = assert_fs::TempDir::new().unwrap();
    let locator = Arc::new(StaticLocator {
        calls: AtomicUsize::new(0),
    });
    let mut s = session("plain.eml", locator.clone());
    s.analyze().unwrap();

    let path = s.write_report(out.path(), true).unwrap();
    assert_eq!(locator.calls.load(Ordering::SeqCst), 1);

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("email_report_") && name.ends_with(".html"));

    out.child(&name).assert(predicate::path::exists());
    let html = std::fs::read_to_string(out.child(&name).path()).unwrap();
    let expected = predicate::str::contains("Alice Example &lt;alice@example.com&gt;")
        .and(predicate::str::contains("Wire transfer today"))
        .and(predicate::str::contains("2024-02-05 14:30:00"))
        .and(predicate::str::contains("203.0.113.5"))
        .and(predicate::str::contains("Amsterdam"))
        .and(predicate::str::contains("Hello investigator."));
    assert!(expected.eval(html.as_str()), "unexpected report:\n{html}");
}

#[test]
fn test_report_without_geolocation() {
    let out = assert_fs::TempDir::new().unwrap();
    let mut s = session("multipart_html.eml", Arc::new(DisabledLocator));

    let path = s.write_report(out.path(), false).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    let html = std::fs::read_to_string(out.child(&name).path()).unwrap();
    let expected = predicate::str::contains("Résumé urgent")
        .and(predicate::str::contains("https://phish.example.com/login"))
        .and(predicate::str::contains("Geolocation unavailable."))
        .and(predicate::str::contains("<script>").not());
    assert!(expected.eval(html.as_str()), "unexpected report:\n{html}");
}

#[test]
fn test_two_reports_do_not_collide() {
    let out = assert_fs::TempDir::new().unwrap();
    let mut s = session("no_received.eml", Arc::new(DisabledLocator));
    let first = s.write_report(out.path(), true).unwrap();
    let second = s.write_report(out.path(), true).unwrap();
    assert_ne!(first, second);
    let html = std::fs::read_to_string(&first).unwrap();
    assert!(!html.contains("<h2>Origin</h2>"));
    out.child(second.file_name().unwrap())
        .assert(predicate::path::is_file());
}

#[test]
fn test_map_artifact() {
    let out = assert_fs::TempDir::new().unwrap();
    let mut s = session(
        "plain.eml",
        Arc::new(StaticLocator {
            calls: AtomicUsize::new(0),
        }),
    );
    s.trace().unwrap();
    let path = s.write_map(out.path()).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("ip_trace_map_"));
    let html = std::fs::read_to_string(out.child(&name).path()).unwrap();
    let expected = predicate::str::contains("setView([52.374, 4.8897], 10)")
        .and(predicate::str::contains("Amsterdam, Netherlands"));
    assert!(expected.eval(html.as_str()));
}
