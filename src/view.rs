//! The globe's interaction model: view state, extrusion mapping, dimming and
//! tooltips.
//!
//! The embedded viewer script implements the same mapping for live input;
//! this module computes the initial frame written into the artifact and is
//! the reference the script follows.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::record::{CountryRecord, Dataset};

/// Metric encoded by extrusion height.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Population,
    #[value(name = "gdp-per-capita", alias = "gdp_pc")]
    GdpPerCapita,
    LanguageCount,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Population => "Population",
            Self::GdpPerCapita => "GDP per capita (US$)",
            Self::LanguageCount => "Languages spoken",
        }
    }

    /// Whether values are looked up per year.
    pub fn is_yearly(&self) -> bool {
        !matches!(self, Self::LanguageCount)
    }

    /// Log scale compresses the skew of population and GDP.
    pub fn default_scale(&self) -> ScaleKind {
        match self {
            Self::Population | Self::GdpPerCapita => ScaleKind::Log,
            Self::LanguageCount => ScaleKind::Linear,
        }
    }

    pub fn format_value(&self, value: f64) -> String {
        match self {
            Self::Population | Self::LanguageCount => group_thousands(value.round() as u64),
            Self::GdpPerCapita => {
                let whole = value.trunc() as u64;
                let cents = ((value - value.trunc()) * 100.0).round() as u64;
                // 0.999 rounds up into the next whole unit
                let (whole, cents) = if cents == 100 {
                    (whole + 1, 0)
                } else {
                    (whole, cents)
                };
                format!("{}.{cents:02}", group_thousands(whole))
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum ScaleKind {
    Linear,
    Log,
}

impl ScaleKind {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Self::Linear => value,
            Self::Log => (value + 1.0).log10(),
        }
    }
}

/// A categorical filter; `All` passes every country.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(untagged)]
pub enum Filter {
    #[default]
    All,
    Only(String),
}

impl Filter {
    /// "all" (any case) or an empty string mean no filter.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Only(raw.to_string())
        }
    }

    fn matches_one(&self, value: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(want) => value == Some(want.as_str()),
        }
    }
}

/// A metric value and the year it came from (after lookback).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricValue {
    pub value: f64,
    pub year: Option<i32>,
}

/// Value of `metric` for `record` at `year`, falling back to the nearest
/// earlier year. Never reads a later year.
pub fn lookup(record: &CountryRecord, metric: Metric, year: i32) -> Option<MetricValue> {
    match metric {
        Metric::Population => record
            .population_by_year
            .range(..=year)
            .next_back()
            .map(|(y, v)| MetricValue {
                value: *v as f64,
                year: Some(*y),
            }),
        Metric::GdpPerCapita => record
            .gdp_per_capita_by_year
            .range(..=year)
            .next_back()
            .map(|(y, v)| MetricValue {
                value: *v,
                year: Some(*y),
            }),
        Metric::LanguageCount => (!record.languages.is_empty()).then(|| MetricValue {
            value: record.languages.len() as f64,
            year: None,
        }),
    }
}

/// Renderer-owned view parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub selected_metric: Metric,
    pub selected_year: i32,
    pub continent_filter: Filter,
    pub language_filter: Filter,
}

impl ViewState {
    /// Initial state, with the year snapped to one the dataset has.
    pub fn new(dataset: &Dataset, metric: Metric, year: i32) -> Self {
        let mut state = Self {
            selected_metric: metric,
            selected_year: year,
            continent_filter: Filter::All,
            language_filter: Filter::All,
        };
        state.snap_year(dataset, year);
        state
    }

    pub fn passes_filters(&self, record: &CountryRecord) -> bool {
        let continent_ok = self.continent_filter.matches_one(record.continent.as_deref());
        let language_ok = match &self.language_filter {
            Filter::All => true,
            Filter::Only(lang) => record.languages.contains(lang),
        };
        continent_ok && language_ok
    }

    /// Keep `requested` if some country has data for it, else move to the
    /// nearest available year (the earlier one on a tie).
    fn snap_year(&mut self, dataset: &Dataset, requested: i32) {
        if !self.selected_metric.is_yearly() {
            self.selected_year = requested;
            return;
        }
        let years = dataset.available_years(self.selected_metric);
        self.selected_year = nearest_year(&years, requested).unwrap_or(requested);
    }
}

pub(crate) fn nearest_year(years: &BTreeSet<i32>, requested: i32) -> Option<i32> {
    let before = years.range(..=requested).next_back().copied();
    let after = years.range(requested..).next().copied();
    match (before, after) {
        (Some(b), Some(a)) => Some(if requested - b <= a - requested { b } else { a }),
        (b, a) => b.or(a),
    }
}

/// Scale and style parameters for the extrusion mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtrusionConfig {
    /// Height of the tallest active country, in meters.
    pub elevation_scale: f64,
    /// Height of the lowest active country, as a fraction of `elevation_scale`.
    /// Countries without data sit at zero.
    pub min_fraction: f64,
    /// Overrides each metric's default scale.
    pub scale: Option<ScaleKind>,
}

impl Default for ExtrusionConfig {
    fn default() -> Self {
        Self {
            elevation_scale: 250_000.0,
            min_fraction: 0.04,
            scale: None,
        }
    }
}

pub const NO_DATA_COLOR: [u8; 4] = [120, 120, 120, 70];
pub const DIMMED_ALPHA: u8 = 40;

/// Color ramp from cool blue (t = 0) to warm red (t = 1).
pub fn ramp_color(t: f64) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    [
        (40.0 + 200.0 * t) as u8,
        (90.0 + 60.0 * (1.0 - t)) as u8,
        (220.0 - 150.0 * t) as u8,
        190,
    ]
}

/// Desaturate to gray and fade.
pub fn dim_color(color: [u8; 4]) -> [u8; 4] {
    let gray = ((color[0] as u16 + color[1] as u16 + color[2] as u16) / 3) as u8;
    [gray, gray, gray, DIMMED_ALPHA]
}

/// Visual assignment for one country in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryVisual {
    pub identifier: String,
    pub value: Option<MetricValue>,
    pub dimmed: bool,
    pub no_data: bool,
    pub elevation: f64,
    pub fill_color: [u8; 4],
}

/// A complete visual assignment for every country.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub state: ViewState,
    /// Scaled value range of the active countries, if any had data.
    pub domain: Option<(f64, f64)>,
    pub countries: Vec<CountryVisual>,
}

impl Frame {
    pub fn get(&self, identifier: &str) -> Option<&CountryVisual> {
        self.countries.iter().find(|c| c.identifier == identifier)
    }

    pub fn active_count(&self) -> usize {
        self.countries.iter().filter(|c| !c.dimmed).count()
    }
}

/// Compute a full frame. Dimmed countries do not contribute to the domain.
pub fn compute_frame(dataset: &Dataset, state: &ViewState, config: &ExtrusionConfig) -> Frame {
    let metric = state.selected_metric;
    let scale = config.scale.unwrap_or_else(|| metric.default_scale());

    let staged: Vec<(bool, Option<MetricValue>)> = dataset
        .records()
        .iter()
        .map(|r| {
            (
                state.passes_filters(r),
                lookup(r, metric, state.selected_year),
            )
        })
        .collect();

    let domain = staged
        .iter()
        .filter(|(active, _)| *active)
        .filter_map(|(_, v)| v.map(|v| scale.apply(v.value)))
        .fold(None, |acc: Option<(f64, f64)>, s| match acc {
            None => Some((s, s)),
            Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
        });

    let countries = dataset
        .records()
        .iter()
        .zip(staged)
        .map(|(record, (active, value))| {
            let (elevation, fill_color) = match (active, value, domain) {
                (true, Some(v), Some((lo, hi))) => {
                    let t = normalize(scale.apply(v.value), lo, hi);
                    let height = config.elevation_scale * (config.min_fraction * (1.0 - t) + t);
                    (height, ramp_color(t))
                }
                (true, _, _) => (0.0, NO_DATA_COLOR),
                (false, Some(v), Some((lo, hi))) => {
                    let t = normalize(scale.apply(v.value), lo, hi);
                    (0.0, dim_color(ramp_color(t)))
                }
                (false, _, _) => (0.0, dim_color(NO_DATA_COLOR)),
            };
            CountryVisual {
                identifier: record.identifier.clone(),
                value,
                dimmed: !active,
                no_data: value.is_none(),
                elevation,
                fill_color,
            }
        })
        .collect();

    Frame {
        state: state.clone(),
        domain,
        countries,
    }
}

/// Position of `s` in `[lo, hi]`; a degenerate range maps to the top.
fn normalize(s: f64, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return 1.0;
    }
    ((s - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Hover text for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tooltip {
    pub display_name: String,
    pub metric_line: String,
    pub continent: String,
}

pub fn tooltip(record: &CountryRecord, state: &ViewState) -> Tooltip {
    let metric = state.selected_metric;
    let value = match lookup(record, metric, state.selected_year) {
        Some(MetricValue {
            value,
            year: Some(year),
        }) => format!("{} ({year})", metric.format_value(value)),
        Some(MetricValue { value, year: None }) => metric.format_value(value),
        None => "no data".to_string(),
    };
    Tooltip {
        display_name: record.display_name.clone(),
        metric_line: format!("{}: {value}", metric.label()),
        continent: record
            .continent
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// User input that mutates the view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    SelectMetric(Metric),
    SelectYear(i32),
    FilterContinent(Filter),
    FilterLanguage(Filter),
}

/// Owns the view state and the current frame over an immutable dataset.
///
/// Every event recomputes the whole frame before replacing the current one,
/// so a reader never sees a half-updated assignment.
pub struct Renderer {
    dataset: Arc<Dataset>,
    config: ExtrusionConfig,
    state: ViewState,
    frame: Frame,
}

impl Renderer {
    pub fn new(dataset: Arc<Dataset>, state: ViewState, config: ExtrusionConfig) -> Self {
        let frame = compute_frame(&dataset, &state, &config);
        Self {
            dataset,
            config,
            state,
            frame,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn apply(&mut self, event: ViewEvent) -> &Frame {
        let mut next = self.state.clone();
        match event {
            ViewEvent::SelectMetric(metric) => {
                next.selected_metric = metric;
                let year = self.state.selected_year;
                next.snap_year(&self.dataset, year);
            }
            ViewEvent::SelectYear(year) => next.snap_year(&self.dataset, year),
            ViewEvent::FilterContinent(filter) => next.continent_filter = filter,
            ViewEvent::FilterLanguage(filter) => next.language_filter = filter,
        }
        let frame = compute_frame(&self.dataset, &next, &self.config);
        self.state = next;
        self.frame = frame;
        &self.frame
    }

    /// Tooltip for a hovered country; `None` for an unknown identifier.
    pub fn hover(&self, identifier: &str) -> Option<Tooltip> {
        self.dataset
            .get(identifier)
            .map(|record| tooltip(record, &self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;

    fn five_countries() -> Arc<Dataset> {
        let mut records = Vec::new();
        for (id, continent, pop, langs) in [
            ("NGA", "Africa", 200_000_000u64, &["English", "Hausa"][..]),
            ("KEN", "Africa", 50_000_000, &["English", "Swahili"][..]),
            ("FRA", "Europe", 67_000_000, &["French"][..]),
            ("JPN", "Asia", 125_000_000, &["Japanese"][..]),
            ("BRA", "Americas", 210_000_000, &["Portuguese"][..]),
        ] {
            let mut r = record(id, Some(continent));
            r.population_by_year.insert(2020, pop);
            r.languages = langs.iter().map(|s| s.to_string()).collect();
            records.push(r);
        }
        Arc::new(Dataset::new(records))
    }

    #[test]
    fn test_lookback_uses_earlier_year_only() {
        let mut a = record("AAA", None);
        a.population_by_year.insert(2020, 100);
        a.population_by_year.insert(2022, 300);

        let v = lookup(&a, Metric::Population, 2021).unwrap();
        assert_eq!(v.value, 100.0);
        assert_eq!(v.year, Some(2020));
        assert_eq!(lookup(&a, Metric::Population, 2019), None);
    }

    #[test]
    fn test_lookback_in_three_country_frame() {
        let mut a = record("AAA", None);
        a.population_by_year.insert(2020, 1_000);
        a.population_by_year.insert(2022, 9_999);
        let mut b = record("BBB", None);
        b.population_by_year.insert(2021, 500);
        let c = record("CCC", None);
        let ds = Dataset::new(vec![a, b, c]);

        let state = ViewState::new(&ds, Metric::Population, 2021);
        assert_eq!(state.selected_year, 2021);
        let frame = compute_frame(&ds, &state, &ExtrusionConfig::default());

        let a = frame.get("AAA").unwrap();
        assert_eq!(a.value.unwrap().value, 1_000.0);
        assert_eq!(a.value.unwrap().year, Some(2020));
        assert!(!a.no_data);

        let c = frame.get("CCC").unwrap();
        assert!(c.no_data);
        assert_eq!(c.elevation, 0.0);
        assert_eq!(c.fill_color, NO_DATA_COLOR);
    }

    #[test]
    fn test_continent_filter_normalizes_over_active_set() {
        let ds = five_countries();
        let mut state = ViewState::new(&ds, Metric::Population, 2020);
        state.continent_filter = Filter::parse("Africa");
        let config = ExtrusionConfig {
            scale: Some(ScaleKind::Linear),
            ..Default::default()
        };
        let frame = compute_frame(&ds, &state, &config);

        assert_eq!(frame.active_count(), 2);
        assert_eq!(frame.domain, Some((50_000_000.0, 200_000_000.0)));

        let nga = frame.get("NGA").unwrap();
        let ken = frame.get("KEN").unwrap();
        assert_eq!(nga.elevation, config.elevation_scale);
        assert_eq!(ken.elevation, config.elevation_scale * config.min_fraction);

        for id in ["FRA", "JPN", "BRA"] {
            let c = frame.get(id).unwrap();
            assert!(c.dimmed);
            assert_eq!(c.fill_color[3], DIMMED_ALPHA);
            assert_eq!(c.elevation, 0.0);
        }
        // underlying data is untouched
        assert_eq!(frame.get("BRA").unwrap().value.unwrap().value, 210_000_000.0);
        assert_eq!(ds.get("BRA").unwrap().population_by_year[&2020], 210_000_000);
    }

    #[test]
    fn test_language_filter_without_match_dims_everything() {
        let ds = five_countries();
        let mut renderer = Renderer::new(
            ds.clone(),
            ViewState::new(&ds, Metric::Population, 2020),
            ExtrusionConfig::default(),
        );
        let frame = renderer.apply(ViewEvent::FilterLanguage(Filter::parse("Klingon")));
        assert_eq!(frame.active_count(), 0);
        assert_eq!(frame.domain, None);
        assert!(frame.countries.iter().all(|c| c.dimmed));
    }

    #[test]
    fn test_language_filter_and_language_count_metric() {
        let ds = five_countries();
        let mut renderer = Renderer::new(
            ds.clone(),
            ViewState::new(&ds, Metric::Population, 2020),
            ExtrusionConfig::default(),
        );
        renderer.apply(ViewEvent::FilterLanguage(Filter::Only("English".into())));
        let frame = renderer.apply(ViewEvent::SelectMetric(Metric::LanguageCount));
        assert_eq!(frame.active_count(), 2);
        // both English speakers list two languages: degenerate range maps to the top
        assert_eq!(frame.get("NGA").unwrap().elevation, 250_000.0);
        assert_eq!(frame.get("KEN").unwrap().value.unwrap().value, 2.0);
        assert_eq!(renderer.state().selected_year, 2020);
    }

    #[test]
    fn test_year_snaps_to_available_year() {
        let ds = five_countries();
        let mut renderer = Renderer::new(
            ds.clone(),
            ViewState::new(&ds, Metric::Population, 1990),
            ExtrusionConfig::default(),
        );
        assert_eq!(renderer.state().selected_year, 2020);
        renderer.apply(ViewEvent::SelectYear(2023));
        assert_eq!(renderer.state().selected_year, 2020);
    }

    #[test]
    fn test_nearest_year_prefers_earlier_on_tie() {
        let years = BTreeSet::from([2000, 2004]);
        assert_eq!(nearest_year(&years, 2002), Some(2000));
        assert_eq!(nearest_year(&years, 2003), Some(2004));
        assert_eq!(nearest_year(&years, 2004), Some(2004));
        assert_eq!(nearest_year(&BTreeSet::new(), 2004), None);
    }

    #[test]
    fn test_gdp_metric_without_data_is_no_data_not_crash() {
        let ds = five_countries();
        let state = ViewState::new(&ds, Metric::GdpPerCapita, 2020);
        let frame = compute_frame(&ds, &state, &ExtrusionConfig::default());
        assert!(frame.countries.iter().all(|c| c.no_data && !c.dimmed));
        assert_eq!(frame.domain, None);
    }

    #[test]
    fn test_tooltip() {
        let ds = five_countries();
        let renderer = Renderer::new(
            ds.clone(),
            ViewState::new(&ds, Metric::Population, 2021),
            ExtrusionConfig::default(),
        );
        let tip = renderer.hover("NGA").unwrap();
        assert_eq!(tip.display_name, "NGA land");
        assert_eq!(tip.metric_line, "Population: 200,000,000 (2020)");
        assert_eq!(tip.continent, "Africa");

        let mut no_continent = record("XXX", None);
        no_continent.gdp_per_capita_by_year.insert(2020, 1234.567);
        let state = ViewState::new(&ds, Metric::GdpPerCapita, 2020);
        let tip = tooltip(&no_continent, &state);
        assert_eq!(tip.metric_line, "GDP per capita (US$): 1,234.57 (2020)");
        assert_eq!(tip.continent, "unknown");

        let state = ViewState::new(&ds, Metric::LanguageCount, 2020);
        assert_eq!(tooltip(&no_continent, &state).metric_line, "Languages spoken: no data");
        assert!(renderer.hover("ZZZ").is_none());
    }

    #[test]
    fn test_log_scale_and_colors() {
        assert_eq!(ramp_color(0.0), [40, 150, 220, 190]);
        assert_eq!(ramp_color(1.0), [240, 90, 70, 190]);
        assert_eq!(dim_color([30, 60, 90, 190]), [60, 60, 60, DIMMED_ALPHA]);
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(Filter::parse("All"), Filter::All);
        assert_eq!(Filter::parse(""), Filter::All);
        assert_eq!(Filter::parse(" Asia "), Filter::Only("Asia".into()));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(Metric::Population.format_value(1234567.0), "1,234,567");
        assert_eq!(Metric::Population.format_value(999.0), "999");
        assert_eq!(Metric::GdpPerCapita.format_value(0.999), "1.00");
    }

    #[test]
    fn test_viewer_script_matches_frame_rules() {
        let js = include_str!("globe.js");
        let [r, g, b, a] = NO_DATA_COLOR;
        assert!(js.contains(&format!("var NO_DATA_COLOR = [{r}, {g}, {b}, {a}];")));
        assert!(js.contains(&format!("var DIMMED_ALPHA = {DIMMED_ALPHA};")));

        let cold = ramp_color(0.0);
        let hot = ramp_color(1.0);
        assert!(js.contains(&format!("Math.trunc({} + {} * t)", cold[0], hot[0] - cold[0])));
        assert!(js.contains(&format!(
            "Math.trunc({} + {} * (1 - t))",
            hot[1],
            cold[1] - hot[1]
        )));
        assert!(js.contains(&format!("Math.trunc({} - {} * t)", cold[2], cold[2] - hot[2])));
        assert!(js.contains(&format!("      {},\n    ];", ramp_color(0.5)[3])));

        assert!(js.contains("Math.log10(v + 1)"));
        assert_eq!(normalize(3.0, 3.0, 3.0), 1.0);
        assert!(js.contains("if (hi <= lo) return 1;"));
        assert!(js.contains("requested - before <= after - requested ? before : after"));

        let cfg = serde_json::to_value(ExtrusionConfig::default()).unwrap();
        for key in cfg.as_object().unwrap().keys() {
            assert!(js.contains(&format!("cfg.{key}")), "viewer ignores {key}");
        }
        assert!(js.contains("cfg.elevationScale * (cfg.minFraction * (1 - t) + t)"));
    }
}
