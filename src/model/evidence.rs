//! Evidence extracted from a parsed message.

use std::net::Ipv4Addr;

use chrono::{DateTime, FixedOffset};

/// The scalar headers an investigator looks at first.
///
/// `None` means the header is absent; `Some("")` means present but empty.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct HeaderFields {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    /// Normalized `Date:`; the original UTC offset is kept.
    pub date: Option<DateTime<FixedOffset>>,
}

/// Which kind of part the body resolver picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Html,
    Plain,
}

/// The single body part chosen for display.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResolvedBody {
    pub kind: BodyKind,
    /// Decoded content of the chosen part (markup included for HTML).
    pub content: String,
    /// Markup-free rendering; `None` for plain-text bodies.
    pub rendered_text: Option<String>,
    /// `<img src>` values in document order.
    pub images: Vec<String>,
    /// `<a href>` values in document order.
    pub links: Vec<String>,
}

impl ResolvedBody {
    /// The text shown to the user and searched for keywords.
    pub fn display_text(&self) -> &str {
        self.rendered_text.as_deref().unwrap_or(&self.content)
    }
}

/// Raw `Received:` values, top to bottom as they appear in the message.
///
/// MTAs prepend, so the first entry is the newest hop and the last entry is
/// the earliest one, closest to the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReceivedChain(pub Vec<String>);

impl ReceivedChain {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The earliest hop.
    pub fn earliest(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Approximate physical location of an IP address.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoLocation {
    pub ip: Ipv4Addr,
    pub city: String,
    pub country_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Two-letter ISO country code, when the provider sent one.
    pub country_code: Option<String>,
    pub region: Option<String>,
    /// Owning network, e.g. `"AS15169 Google LLC"`.
    pub org: Option<String>,
}

impl GeoLocation {
    /// `"City, Country"`, the marker label used on maps.
    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.country_name)
    }
}

/// A keyword match: half-open `[start, end)` in characters of the display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SearchHit {
    pub start: usize,
    pub end: usize,
}

impl SearchHit {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The hit with up to `radius` characters of context on each side.
    ///
    /// Returns `(before, matched, after)`.
    pub fn snippet(&self, text: &str, radius: usize) -> (String, String, String) {
        let chars: Vec<char> = text.chars().collect();
        let end = self.end.min(chars.len());
        let start = self.start.min(end);
        let from = start.saturating_sub(radius);
        let to = (end + radius).min(chars.len());
        (
            chars[from..start].iter().collect(),
            chars[start..end].iter().collect(),
            chars[end..to].iter().collect(),
        )
    }
}
