//! Standalone Leaflet map centered on a geolocated origin.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::model::evidence::GeoLocation;

use super::{write_artifact, MAP_PREFIX};

const LEAFLET_VERSION: &str = "1.9.4";
const ZOOM: u8 = 10;

/// Render a map document with one marker labelled "City, Country".
pub fn render_map(location: &GeoLocation) -> String {
    // HTML-escaped for the popup, then a JSON string literal for the script;
    // `</` is broken up so the label cannot close the script element.
    let popup = html_escape::encode_text(&location.label()).into_owned();
    let popup = serde_json::to_string(&popup)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/");
    let (lat, lon) = (location.latitude, location.longitude);
    let title = html_escape::encode_text(&location.ip.to_string()).into_owned();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>IP Trace Map: {title}</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.js"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map('map').setView([{lat}, {lon}], {ZOOM});
L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
    maxZoom: 19,
    attribution: '&copy; OpenStreetMap contributors'
}}).addTo(map);
L.marker([{lat}, {lon}]).addTo(map).bindPopup({popup});
</script>
</body>
</html>
"#
    )
}

/// Render and write `ip_trace_map_<stamp>.html` into `dir`.
pub fn write_map(dir: &Path, location: &GeoLocation, stamp: NaiveDateTime) -> Result<PathBuf> {
    write_artifact(dir, MAP_PREFIX, stamp, &render_map(location))
}
