//! The HTML analysis report.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use html_escape::encode_text;

use crate::error::Result;
use crate::model::evidence::{GeoLocation, HeaderFields, ResolvedBody};

use super::{write_artifact, REPORT_PREFIX};

/// Shown in place of a header the message does not carry.
pub const ABSENT: &str = "(not present)";

/// Format used for the Date line.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything a report can show.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub headers: &'a HeaderFields,
    pub body: &'a ResolvedBody,
    /// Origin address from the Received chain, if one was found.
    pub origin: Option<Ipv4Addr>,
    /// Geolocation of the origin; optional, the report never needs it.
    pub location: Option<&'a GeoLocation>,
}

/// Render the report as a self-contained HTML document.
///
/// Section order is fixed: From, To, Subject, Date, Origin (when an origin
/// IP is known), Body, Images, Links.
///
/// Every value is HTML-escaped, so a header only appears verbatim when it
/// holds none of `<`, `>` or `&`. `Alice <a@b.test>` is
/// written as `Alice &lt;a@b.test&gt;`.
pub fn render_report(input: &ReportInput<'_>) -> String {
    let headers = input.headers;
    let date = headers
        .date
        .map(|d| d.format(DATE_FORMAT).to_string());

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Email Analysis Report</title>\n");
    out.push_str(
        "<style>body{font-family:sans-serif;margin:2em}pre{white-space:pre-wrap;\
         background:#f6f6f6;padding:1em}.note{color:#666;font-size:90%}</style>\n",
    );
    out.push_str("</head>\n<body>\n<h1>Email Analysis Report</h1>\n");

    push_field(&mut out, "From", headers.from.as_deref());
    push_field(&mut out, "To", headers.to.as_deref());
    push_field(&mut out, "Subject", headers.subject.as_deref());
    push_field(&mut out, "Date", date.as_deref());

    if let Some(ip) = input.origin {
        out.push_str("<h2>Origin</h2>\n");
        push_field(&mut out, "IP Address", Some(&ip.to_string()));
        match input.location {
            Some(geo) => {
                push_field(&mut out, "City", Some(&geo.city));
                push_field(&mut out, "Country", Some(&geo.country_name));
                push_field(
                    &mut out,
                    "Coordinates",
                    Some(&format!("{:.4}, {:.4}", geo.latitude, geo.longitude)),
                );
                if let Some(org) = &geo.org {
                    push_field(&mut out, "Network", Some(org));
                }
            }
            None => out.push_str("<p class=\"note\">Geolocation unavailable.</p>\n"),
        }
        out.push_str(
            "<p class=\"note\">Origin is read from the earliest Received header and is \
             not authenticated; headers can be forged.</p>\n",
        );
    }

    out.push_str("<h2>Body:</h2>\n<pre>");
    out.push_str(&encode_text(input.body.display_text()));
    out.push_str("</pre>\n");

    push_list(&mut out, "Images", &input.body.images);
    push_list(&mut out, "Links", &input.body.links);

    out.push_str("</body>\n</html>\n");
    out
}

/// Render and write `email_report_<stamp>.html` into `dir`.
pub fn write_report(dir: &Path, input: &ReportInput<'_>, stamp: NaiveDateTime) -> Result<PathBuf> {
    write_artifact(dir, REPORT_PREFIX, stamp, &render_report(input))
}

fn push_field(out: &mut String, label: &str, value: Option<&str>) {
    let value = value.map(encode_text);
    out.push_str(&format!(
        "<p><strong>{label}:</strong> {}</p>\n",
        value.as_deref().unwrap_or(ABSENT)
    ));
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("<h2>{title}</h2>\n<ul>\n"));
    for item in items {
        out.push_str(&format!("<li>{}</li>\n", encode_text(item)));
    }
    out.push_str("</ul>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::evidence::BodyKind;
    use chrono::DateTime;

    fn headers() -> HeaderFields {
        HeaderFields {
            from: Some("alice@example.com".into()),
            to: Some("bob@example.org".into()),
            subject: Some("Wire transfer today".into()),
            date: DateTime::parse_from_rfc2822("Mon, 05 Feb 2024 14:30:00 +0200").ok(),
        }
    }

    fn plain(text: &str) -> ResolvedBody {
        ResolvedBody {
            kind: BodyKind::Plain,
            content: text.into(),
            rendered_text: None,
            images: vec![],
            links: vec![],
        }
    }

    #[test]
    fn test_contains_literal_header_values() {
        let h = headers();
        let body = plain("Please send the funds.");
        let html = render_report(&ReportInput {
            headers: &h,
            body: &body,
            origin: None,
            location: None,
        });
        assert!(html.contains("alice@example.com"));
        assert!(html.contains("bob@example.org"));
        assert!(html.contains("Wire transfer today"));
        assert!(html.contains("2024-02-05 14:30:00"));
        assert!(html.contains("Please send the funds."));
        assert!(!html.contains("<h2>Origin</h2>"));
    }

    #[test]
    fn test_section_order() {
        let h = headers();
        let body = plain("b");
        let html = render_report(&ReportInput {
            headers: &h,
            body: &body,
            origin: Some(Ipv4Addr::new(203, 0, 113, 5)),
            location: None,
        });
        let pos = |needle: &str| html.find(needle).unwrap();
        assert!(pos("From:") < pos("To:"));
        assert!(pos("To:") < pos("Subject:"));
        assert!(pos("Subject:") < pos("Date:"));
        assert!(pos("Date:") < pos("<h2>Origin</h2>"));
        assert!(pos("<h2>Origin</h2>") < pos("<h2>Body:</h2>"));
        assert!(html.contains("203.0.113.5"));
        assert!(html.contains("Geolocation unavailable."));
    }

    #[test]
    fn test_absent_headers_marked() {
        let h = HeaderFields::default();
        let body = plain("b");
        let html = render_report(&ReportInput {
            headers: &h,
            body: &body,
            origin: None,
            location: None,
        });
        assert_eq!(html.matches(ABSENT).count(), 4);
    }

    #[test]
    fn test_markup_is_escaped() {
        let h = HeaderFields {
            from: Some("Eve <eve@evil.test>".into()),
            ..HeaderFields::default()
        };
        let body = plain("<script>alert(1)</script>");
        let html = render_report(&ReportInput {
            headers: &h,
            body: &body,
            origin: None,
            location: None,
        });
        assert!(html.contains("Eve &lt;eve@evil.test&gt;"));
        assert!(!html.contains("Eve <eve@evil.test>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_location_and_lists() {
        let h = headers();
        let body = ResolvedBody {
            kind: BodyKind::Html,
            content: String::new(),
            rendered_text: Some("hi".into()),
            images: vec!["cid:logo".into()],
            links: vec!["https://x.test/?a=1&b=2".into()],
        };
        let geo = GeoLocation {
            ip: Ipv4Addr::new(8, 8, 8, 8),
            city: "Mountain View".into(),
            country_name: "United States".into(),
            latitude: 37.4056,
            longitude: -122.0775,
            country_code: Some("US".into()),
            region: None,
            org: Some("AS15169 Google LLC".into()),
        };
        let html = render_report(&ReportInput {
            headers: &h,
            body: &body,
            origin: Some(geo.ip),
            location: Some(&geo),
        });
        assert!(html.contains("Mountain View"));
        assert!(html.contains("United States"));
        assert!(html.contains("37.4056, -122.0775"));
        assert!(html.contains("<li>cid:logo</li>"));
        assert!(html.contains("https://x.test/?a=1&amp;b=2"));
    }
}
