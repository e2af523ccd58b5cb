//! Leaflet map document builder
//!
//! This module provides the map primitives the renderer draws with:
//! - A base map view with a fixed center and zoom
//! - Colored circle markers with popup text
//! - Colored polylines between two positions
//! - HTML fragments pinned to the top-left corner
//! - Serialization to one self-contained HTML file

use crate::classify::MarkerColor;
use crate::config::MapConfig;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl Serialize for LatLon {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.lat, self.lon].serialize(serializer)
    }
}

/// Positioned, colored marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: LatLon,
    /// Plain-text popup; newlines become line breaks
    pub popup: String,
    pub color: MarkerColor,
}

/// Colored line segment between two positions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub from: LatLon,
    pub to: LatLon,
    pub color: MarkerColor,
    pub weight: f64,
    pub opacity: f64,
}

/// Map view accumulating layers until it is serialized
#[derive(Debug, Clone)]
pub struct MapView {
    center: LatLon,
    zoom: u8,
    tiles_url: String,
    attribution: String,
    markers: Vec<Marker>,
    polylines: Vec<Polyline>,
    overlays: Vec<String>,
}

#[derive(Serialize)]
struct ScriptMarker<'a> {
    position: LatLon,
    popup: String,
    color: &'a str,
}

#[derive(Serialize)]
struct ScriptLine<'a> {
    points: [LatLon; 2],
    color: &'a str,
    weight: f64,
    opacity: f64,
}

#[derive(Serialize)]
struct ScriptData<'a> {
    center: LatLon,
    zoom: u8,
    tiles: &'a str,
    attribution: &'a str,
    markers: Vec<ScriptMarker<'a>>,
    lines: Vec<ScriptLine<'a>>,
}

impl MapView {
    /// Create an empty view using the configured center, zoom and tiles
    pub fn new(settings: &MapConfig) -> Self {
        Self {
            center: LatLon::new(settings.center_lat, settings.center_lon),
            zoom: settings.zoom,
            tiles_url: settings.tiles_url.clone(),
            attribution: settings.attribution.clone(),
            markers: Vec::new(),
            polylines: Vec::new(),
            overlays: Vec::new(),
        }
    }

    pub fn add_marker(&mut self, position: LatLon, popup: impl Into<String>, color: MarkerColor) {
        self.markers.push(Marker {
            position,
            popup: popup.into(),
            color,
        });
    }

    pub fn add_polyline(
        &mut self,
        from: LatLon,
        to: LatLon,
        color: MarkerColor,
        weight: f64,
        opacity: f64,
    ) {
        self.polylines.push(Polyline {
            from,
            to,
            color,
            weight,
            opacity,
        });
    }

    /// Pin a raw HTML fragment to the top-left corner of the page
    ///
    /// The fragment is inserted verbatim; callers escape any text they embed.
    pub fn add_html_overlay(&mut self, html: impl Into<String>) {
        self.overlays.push(html.into());
    }

    pub fn center(&self) -> LatLon {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn polylines(&self) -> &[Polyline] {
        &self.polylines
    }

    pub fn overlays(&self) -> &[String] {
        &self.overlays
    }

    /// Render the complete HTML document
    pub fn to_html(&self) -> serde_json::Result<String> {
        let data = ScriptData {
            center: self.center,
            zoom: self.zoom,
            tiles: &self.tiles_url,
            attribution: &self.attribution,
            markers: self
                .markers
                .iter()
                .map(|m| ScriptMarker {
                    position: m.position,
                    popup: escape_html(&m.popup).replace('\n', "<br>"),
                    color: m.color.css(),
                })
                .collect(),
            lines: self
                .polylines
                .iter()
                .map(|l| ScriptLine {
                    points: [l.from, l.to],
                    color: l.color.css(),
                    weight: l.weight,
                    opacity: l.opacity,
                })
                .collect(),
        };
        let json = serde_json::to_string(&data)?.replace("</", "<\\/");

        let mut html = String::with_capacity(4096 + json.len());
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("<meta charset=\"utf-8\" />\n");
        html.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n",
        );
        html.push_str("<title>Meshtastic Node Map</title>\n");
        let _ = writeln!(html, "<link rel=\"stylesheet\" href=\"{}\" />", LEAFLET_CSS);
        let _ = writeln!(html, "<script src=\"{}\"></script>", LEAFLET_JS);
        html.push_str(
            "<style>\n\
             html, body { width: 100%; height: 100%; margin: 0; padding: 0; }\n\
             #map { position: absolute; top: 0; bottom: 0; left: 0; right: 0; }\n\
             .map-overlay { position: fixed; top: 10px; left: 50px; z-index: 1000; \
             background: white; padding: 8px 12px; border: 2px solid grey; \
             border-radius: 6px; font: 13px/1.4 sans-serif; }\n\
             </style>\n",
        );
        html.push_str("</head>\n<body>\n<div id=\"map\"></div>\n");
        for overlay in &self.overlays {
            let _ = writeln!(html, "<div class=\"map-overlay\">{}</div>", overlay);
        }
        html.push_str("<script>\n");
        let _ = writeln!(html, "const data = {};", json);
        html.push_str(
            "const map = L.map('map').setView(data.center, data.zoom);\n\
             L.tileLayer(data.tiles, { maxZoom: 19, attribution: data.attribution }).addTo(map);\n\
             for (const m of data.markers) {\n\
             \x20 L.circleMarker(m.position, { radius: 8, color: m.color, fillColor: m.color, fillOpacity: 0.9 })\n\
             \x20   .bindPopup(m.popup)\n\
             \x20   .addTo(map);\n\
             }\n\
             for (const l of data.lines) {\n\
             \x20 L.polyline(l.points, { color: l.color, weight: l.weight, opacity: l.opacity }).addTo(map);\n\
             }\n",
        );
        html.push_str("</script>\n</body>\n</html>\n");
        Ok(html)
    }

    /// Write the document to `path`, replacing any previous file
    ///
    /// The document goes to a temporary file next to `path` first and is then
    /// renamed over it, so a failed write never leaves a truncated map behind.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let html = self.to_html()?;

        // Stage in the target directory so the rename stays on one filesystem
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(html.as_bytes())?;
        staged.as_file().sync_all()?;

        // Swap it in
        staged.persist(path)?;
        debug!(path = %path.display(), bytes = html.len(), "Map document written");
        Ok(())
    }
}

/// Escape text for inclusion in HTML content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_empty_view_renders_base_map() {
        let view = MapView::new(&MapConfig::default());
        let html = view.to_html().unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(LEAFLET_JS));
        assert!(html.contains("\"center\":[48.4704,9.2013]"));
        assert!(html.contains("\"zoom\":10"));
        assert!(html.contains("\"markers\":[]"));
        assert!(html.contains("\"lines\":[]"));
        assert!(!html.contains("class=\"map-overlay\""));
    }

    #[test]
    fn test_layers_are_embedded() {
        let mut view = MapView::new(&MapConfig::default());
        view.add_marker(LatLon::new(1.5, 2.5), "a\n<b>", MarkerColor::Orange);
        view.add_polyline(
            LatLon::new(1.5, 2.5),
            LatLon::new(3.0, 4.0),
            MarkerColor::LightGreen,
            3.0,
            0.8,
        );
        view.add_html_overlay("<b>panel</b>");

        let html = view.to_html().unwrap();
        assert!(html.contains(r#"{"position":[1.5,2.5],"popup":"a<br>&lt;b&gt;","color":"orange"}"#));
        assert!(html.contains(
            r#"{"points":[[1.5,2.5],[3.0,4.0]],"color":"lightgreen","weight":3.0,"opacity":0.8}"#
        ));
        assert!(html.contains("<div class=\"map-overlay\"><b>panel</b></div>"));
    }

    #[test]
    fn test_script_data_cannot_close_script_tag() {
        let mut view = MapView::new(&MapConfig::default());
        view.add_marker(LatLon::new(1.0, 1.0), "x", MarkerColor::Black);
        let mut settings = MapConfig::default();
        settings.attribution = "</script><script>alert(1)</script>".to_string();
        let view = MapView {
            attribution: settings.attribution,
            ..view
        };

        let html = view.to_html().unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
    }

    #[test]
    fn test_save_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.html");

        MapView::new(&MapConfig::default()).save(&path).unwrap();
        MapView::new(&MapConfig::default()).save(&path).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("map.html")]);
    }

    #[test]
    fn test_failed_save_keeps_previous_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.html");
        fs::write(&path, "previous").unwrap();

        // A directory in place of the target makes the final rename fail
        let blocked = dir.path().join("blocked.html");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "x").unwrap();
        assert!(MapView::new(&MapConfig::default()).save(&blocked).is_err());

        assert!(MapView::new(&MapConfig::default())
            .save(&dir.path().join("missing").join("map.html"))
            .is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.html");
        fs::write(&path, "stale").unwrap();

        MapView::new(&MapConfig::default()).save(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));
        assert!(!written.contains("stale"));
    }
}
