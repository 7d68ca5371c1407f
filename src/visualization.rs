/// Visualization module: interactive extruded globe.
///
/// Produces a self-contained HTML page that handles:
/// - One extruded region per country, height and color from the active metric
/// - Metric, year, continent and language controls
/// - Dimming of countries outside the active filters
/// - Tooltips on hover
///
/// Rendering is done client-side by globe.js on top of deck.gl. This module
/// serializes the dataset and the initial frame to JSON and emits the HTML
/// shell around them.
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{GlobeError, Result};
use crate::record::Dataset;
use crate::view::{compute_frame, ExtrusionConfig, Frame, Metric, ViewState};

const GLOBE_JS: &str = include_str!("globe.js");

pub const DEFAULT_DECK_URL: &str = "https://unpkg.com/deck.gl@9.1.0/dist.min.js";

// ── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the globe page.
#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    /// Page heading and `<title>`
    pub title: String,
    /// Script URL (or relative path) of the deck.gl bundle
    pub deck_script_url: String,
    /// Local deck.gl bundle inlined into the page; takes precedence over
    /// `deck_script_url` and makes the page work offline
    pub deck_bundle: Option<PathBuf>,
    pub extrusion: ExtrusionConfig,
    /// Initial camera position
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            title: "World Globe".to_string(),
            deck_script_url: DEFAULT_DECK_URL.to_string(),
            deck_bundle: None,
            extrusion: ExtrusionConfig::default(),
            latitude: 15.0,
            longitude: 0.0,
            zoom: 1.2,
        }
    }
}

// ── Embedded payload ────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CameraState {
    latitude: f64,
    longitude: f64,
    zoom: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewerOptions<'a> {
    initial_state: &'a ViewState,
    initial_frame: &'a Frame,
    extrusion: &'a ExtrusionConfig,
    view_state: CameraState,
    years: BTreeMap<Metric, Vec<i32>>,
    labels: BTreeMap<Metric, &'static str>,
}

const METRICS: [Metric; 3] = [Metric::Population, Metric::GdpPerCapita, Metric::LanguageCount];

// ── HTML generation ─────────────────────────────────────────────────────────

/// Main entry point: generates a self-contained HTML page.
///
/// The initial frame is computed here from `state`, so the first paint does
/// not depend on the script's own computation.
pub fn generate_globe_html(
    dataset: &Dataset,
    state: &ViewState,
    config: &VisualizationConfig,
) -> Result<String> {
    let frame = compute_frame(dataset, state, &config.extrusion);

    let years: BTreeMap<Metric, Vec<i32>> = METRICS
        .iter()
        .filter(|m| m.is_yearly())
        .map(|m| (*m, dataset.available_years(*m).into_iter().collect()))
        .collect();
    let all_years: Vec<i32> = years.values().flatten().copied().collect();
    let year_min = all_years.iter().min().copied().unwrap_or(state.selected_year);
    let year_max = all_years.iter().max().copied().unwrap_or(state.selected_year);

    let options = ViewerOptions {
        initial_state: state,
        initial_frame: &frame,
        extrusion: &config.extrusion,
        view_state: CameraState {
            latitude: config.latitude,
            longitude: config.longitude,
            zoom: config.zoom,
        },
        years,
        labels: METRICS.iter().map(|m| (*m, m.label())).collect(),
    };

    let deck_script = deck_script_tag(config)?;
    let records_json = script_safe(&dataset.to_json()?);
    let options_json = script_safe(&serde_json::to_string(&options)?);

    let html = format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  html, body {{ margin: 0; height: 100%; background: #0b1020; font-family: sans-serif; }}
  #wg-globe {{ position: absolute; inset: 0; }}
  #wg-controls {{ position: absolute; top: 8px; left: 8px; z-index: 1; padding: 6px 10px;
    background: rgba(255,255,255,0.92); border-radius: 4px; font-size: 12px; color: #495057;
    display: flex; align-items: center; gap: 8px; flex-wrap: wrap; }}
  #wg-controls label {{ display: flex; align-items: center; gap: 4px; }}
  #wg-status {{ color: #868e96; font-size: 11px; }}
</style>
{deck_script}
</head>
<body>
<div id="wg-controls">
  <span style="font-weight:600;">{title}</span>
  <label>Metric <select id="wg-metric">{metric_options}</select></label>
  <label>Year <input id="wg-year" type="range" min="{year_min}" max="{year_max}" step="1">
    <span id="wg-year-label"></span></label>
  <label>Continent <select id="wg-continent"><option value="">All</option>{continent_options}</select></label>
  <label>Language <select id="wg-language"><option value="">All</option>{language_options}</select></label>
  <span id="wg-status"></span>
</div>
<div id="wg-globe"></div>
<script type="application/json" id="wg-records">{records_json}</script>
<script type="application/json" id="wg-options">{options_json}</script>
<script>
{globe_js}
(function () {{
  var opts = JSON.parse(document.getElementById("wg-options").textContent);
  opts.records = JSON.parse(document.getElementById("wg-records").textContent);
  WorldGlobe.create(opts);
}})();
</script>
</body>
</html>
"##,
        title = escape_html(&config.title),
        deck_script = deck_script,
        metric_options = metric_options(),
        year_min = year_min,
        year_max = year_max,
        continent_options = select_options(dataset.continents()),
        language_options = select_options(dataset.languages()),
        records_json = records_json,
        options_json = options_json,
        globe_js = GLOBE_JS,
    );

    Ok(html)
}

// ── Markup helpers ──────────────────────────────────────────────────────────

fn deck_script_tag(config: &VisualizationConfig) -> Result<String> {
    let Some(path) = &config.deck_bundle else {
        return Ok(format!(
            r#"<script src="{}"></script>"#,
            escape_html(&config.deck_script_url)
        ));
    };
    if !path.is_file() {
        return Err(GlobeError::MissingAsset {
            path: path.display().to_string(),
        });
    }
    let bundle = fs::read_to_string(path)?;
    Ok(format!(
        "<script>\n{}\n</script>",
        bundle.replace("</script", "<\\/script")
    ))
}

fn metric_options() -> String {
    let mut s = String::new();
    for m in METRICS {
        let value = serde_json::to_value(m)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(s, r#"<option value="{}">{}</option>"#, value, escape_html(m.label())).unwrap();
    }
    s
}

fn select_options<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    let mut s = String::new();
    for v in values {
        let v = escape_html(v);
        write!(s, r#"<option value="{v}">{v}</option>"#).unwrap();
    }
    s
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// JSON is embedded inside `<script>`; a literal `</` would end the element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}
