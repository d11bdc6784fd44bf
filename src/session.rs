//! One analysis session: a loaded message and everything derived from it.
//!
//! Loading a message replaces the previous one and drops its derived
//! results wholesale. Each stage is computed on first use from the stage it
//! consumes and nothing else: the body and keyword search never look at
//! `Date:`, and the `Received:` trace never looks at the body.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};

use crate::error::{ForensicError, Result};
use crate::geo::{self, GeoLocator};
use crate::model::evidence::{GeoLocation, HeaderFields, ReceivedChain, ResolvedBody, SearchHit};
use crate::model::message::{ParsedMessage, RawMessage};
use crate::parser::body::resolve_body;
use crate::parser::{header, message};
use crate::report::{self, ReportInput};
use crate::search::{self, SearchOptions};
use crate::trace;

/// Every per-message result at once.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub headers: HeaderFields,
    pub received: ReceivedChain,
    pub body: ResolvedBody,
}

/// Owns the current message and the injected geolocation client.
pub struct AnalysisSession {
    locator: Arc<dyn GeoLocator>,
    lookup_timeout: Duration,
    raw: Option<RawMessage>,
    parsed: Option<ParsedMessage>,
    body: Option<ResolvedBody>,
    location: Option<GeoLocation>,
}

impl AnalysisSession {
    pub fn new(locator: Arc<dyn GeoLocator>, lookup_timeout: Duration) -> Self {
        Self {
            locator,
            lookup_timeout,
            raw: None,
            parsed: None,
            body: None,
            location: None,
        }
    }

    /// Replace the current message. Earlier results are discarded.
    pub fn load(&mut self, raw: RawMessage) {
        info!(
            bytes = raw.len(),
            source = ?raw.source(),
            "Loaded message"
        );
        self.raw = Some(raw);
        self.parsed = None;
        self.body = None;
        self.location = None;
    }

    /// Read a message file and make it the current message.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let raw = RawMessage::load(path)?;
        self.load(raw);
        Ok(())
    }

    pub fn raw(&self) -> Option<&RawMessage> {
        self.raw.as_ref()
    }

    /// The MIME structure of the current message, parsed on first use.
    pub fn parsed(&mut self) -> Result<&ParsedMessage> {
        if self.parsed.is_none() {
            let raw = self.raw.as_ref().ok_or(ForensicError::NoMessageLoaded)?;
            self.parsed = Some(message::parse_message(raw)?);
        }
        self.parsed.as_ref().ok_or(ForensicError::NoMessageLoaded)
    }

    /// From, To, Subject and Date. Fails on an unparsable `Date:`.
    pub fn headers(&mut self) -> Result<HeaderFields> {
        header::extract_headers(self.parsed()?)
    }

    /// The displayable body, resolved on first use.
    pub fn body(&mut self) -> Result<&ResolvedBody> {
        if self.body.is_none() {
            let body = resolve_body(self.parsed()?)?;
            self.body = Some(body);
        }
        self.body.as_ref().ok_or(ForensicError::NoMessageLoaded)
    }

    /// Run every stage and collect the results; the first failure wins.
    pub fn analyze(&mut self) -> Result<Analysis> {
        let headers = self.headers()?;
        let received = self.received_chain()?;
        let body = self.body()?.clone();
        Ok(Analysis {
            headers,
            received,
            body,
        })
    }

    /// The Received chain of the current message.
    pub fn received_chain(&mut self) -> Result<ReceivedChain> {
        Ok(header::received_chain(self.parsed()?))
    }

    /// Originating IP from the earliest Received hop.
    pub fn origin_ip(&mut self) -> Result<Ipv4Addr> {
        trace::origin_ip(&self.received_chain()?)
    }

    /// Geolocate the origin IP on a background thread, waiting at most the
    /// configured timeout. The result is kept for the report.
    pub fn trace(&mut self) -> Result<&GeoLocation> {
        let ip = self.origin_ip()?;
        let pending = geo::spawn_lookup(Arc::clone(&self.locator), ip);
        let location = pending.wait(self.lookup_timeout)?;
        info!(%ip, city = %location.city, country = %location.country_name, "Geolocated origin");
        Ok(self.location.insert(location))
    }

    /// The last successful geolocation for the current message.
    pub fn location(&self) -> Option<&GeoLocation> {
        self.location.as_ref()
    }

    /// Search the displayed body text.
    pub fn search(&mut self, query: &str, options: SearchOptions) -> Result<Vec<SearchHit>> {
        search::search_body(self.body()?, query, options)
    }

    /// Write the HTML report into `dir`.
    ///
    /// When `with_geolocation` is set and no location is known yet, a trace
    /// is attempted; its failure is logged and the report is written
    /// without the location.
    pub fn write_report(&mut self, dir: &Path, with_geolocation: bool) -> Result<PathBuf> {
        let headers = self.headers()?;
        self.body()?;
        let origin = self.origin_ip().ok();
        if with_geolocation && self.location.is_none() && origin.is_some() {
            if let Err(e) = self.trace() {
                warn!(error = %e, "Report will not include geolocation");
            }
        }

        let body = self.body.as_ref().ok_or(ForensicError::NoMessageLoaded)?;
        let input = ReportInput {
            headers: &headers,
            body,
            origin,
            location: if with_geolocation {
                self.location.as_ref()
            } else {
                None
            },
        };
        report::write_report(dir, &input, Local::now().naive_local())
    }

    /// Write a map of the last geolocated origin into `dir`.
    pub fn write_map(&mut self, dir: &Path) -> Result<PathBuf> {
        if self.location.is_none() {
            let ip = self.origin_ip()?;
            return Err(ForensicError::geo(ip, "origin has not been geolocated"));
        }
        let location = self.location.as_ref().ok_or(ForensicError::NoMessageLoaded)?;
        report::write_map(dir, location, Local::now().naive_local())
    }
}
