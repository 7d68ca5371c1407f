//! # world-globe CLI Entry Point
//!
//! Reconciles the input tables and writes the interactive globe page.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use world_globe::{
    BuildOptions, ExtrusionConfig, Filter, GlobeModel, InputPaths, Metric, ScaleKind,
    VisualizationConfig, DEFAULT_DECK_URL,
};

/// Build a 3D globe of countries extruded by population, GDP per capita or
/// number of spoken languages.
#[derive(Parser, Debug)]
#[command(name = "world-globe", version, about)]
struct Cli {
    /// Wide population table (one column per year).
    #[arg(
        long,
        env = "WORLD_GLOBE_POPULATION",
        default_value = "data/World Population 1960-2023 by Country.csv"
    )]
    population: PathBuf,

    /// Wide GDP per capita table in World Bank layout.
    #[arg(
        long,
        env = "WORLD_GLOBE_GDP",
        default_value = "data/API_NY.GDP.PCAP.CD_DS2_en_csv_v2_2.csv"
    )]
    gdp: PathBuf,

    /// Preamble lines before the GDP header row.
    #[arg(long, env = "WORLD_GLOBE_GDP_SKIP_ROWS", default_value_t = 4)]
    gdp_skip_rows: usize,

    /// ISO reference table with continent assignments.
    #[arg(long, env = "WORLD_GLOBE_CONTINENTS", default_value = "data/continents2.csv")]
    continents: PathBuf,

    /// Long table of (country, language) pairs.
    #[arg(long, env = "WORLD_GLOBE_LANGUAGES", default_value = "data/languages.csv")]
    languages: PathBuf,

    /// Country boundaries as a GeoJSON FeatureCollection.
    #[arg(
        long,
        env = "WORLD_GLOBE_GEOJSON",
        default_value = "data/ne_110m_admin_0_countries.geojson"
    )]
    geojson: PathBuf,

    /// Output HTML file.
    #[arg(long, env = "WORLD_GLOBE_OUT", default_value = "globe.html")]
    out: PathBuf,

    /// Also write the reconciled dataset as JSON.
    #[arg(long, env = "WORLD_GLOBE_DATASET_JSON")]
    dataset_json: Option<PathBuf>,

    /// Also write dropped rows and cell issues as JSON.
    #[arg(long, env = "WORLD_GLOBE_DROPPED_REPORT")]
    dropped_report: Option<PathBuf>,

    /// Initial metric.
    #[arg(long, env = "WORLD_GLOBE_METRIC", value_enum, default_value_t = Metric::Population)]
    metric: Metric,

    /// Initial year; snapped to the nearest year with data.
    #[arg(long, env = "WORLD_GLOBE_YEAR", default_value_t = 2023)]
    year: i32,

    /// Initial continent filter ("all" for none).
    #[arg(long, env = "WORLD_GLOBE_CONTINENT", default_value = "all")]
    continent: String,

    /// Initial language filter ("all" for none).
    #[arg(long, env = "WORLD_GLOBE_LANGUAGE", default_value = "all")]
    language: String,

    /// Value scale; defaults to log for population and GDP, linear otherwise.
    #[arg(long, env = "WORLD_GLOBE_SCALE", value_enum)]
    scale: Option<ScaleKind>,

    /// Height of the tallest country, in meters.
    #[arg(long, env = "WORLD_GLOBE_ELEV", default_value_t = 250_000.0)]
    elev: f64,

    /// Page title.
    #[arg(long, env = "WORLD_GLOBE_TITLE", default_value = "World Globe")]
    title: String,

    /// URL or relative path of the deck.gl bundle.
    #[arg(long, env = "WORLD_GLOBE_DECK_URL", default_value = DEFAULT_DECK_URL)]
    deck_url: String,

    /// Local deck.gl bundle to inline instead of loading `--deck-url`.
    #[arg(long, env = "WORLD_GLOBE_DECK_BUNDLE")]
    deck_bundle: Option<PathBuf>,
}

impl Cli {
    fn input_paths(&self) -> InputPaths {
        InputPaths {
            population: self.population.clone(),
            gdp: self.gdp.clone(),
            continents: self.continents.clone(),
            languages: self.languages.clone(),
            geojson: self.geojson.clone(),
            gdp_skip_rows: self.gdp_skip_rows,
        }
    }

    fn build_options(&self) -> anyhow::Result<BuildOptions> {
        if !(self.elev.is_finite() && self.elev > 0.0) {
            anyhow::bail!("--elev must be a positive number, got {}", self.elev);
        }
        Ok(BuildOptions {
            out: self.out.clone(),
            dataset_json: self.dataset_json.clone(),
            dropped_report: self.dropped_report.clone(),
            metric: self.metric,
            year: self.year,
            continent: Filter::parse(&self.continent),
            language: Filter::parse(&self.language),
            visualization: VisualizationConfig {
                title: self.title.clone(),
                deck_script_url: self.deck_url.clone(),
                deck_bundle: self.deck_bundle.clone(),
                extrusion: ExtrusionConfig {
                    elevation_scale: self.elev,
                    scale: self.scale,
                    ..ExtrusionConfig::default()
                },
                ..VisualizationConfig::default()
            },
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = cli.build_options()?;
    let summary = GlobeModel::new(cli.input_paths())
        .build(&options)
        .context("failed to build the globe")?;

    tracing::info!(
        records = summary.records,
        dropped = summary.dropped,
        cell_issues = summary.cell_issues,
        "done: {}",
        summary.out.display()
    );
    Ok(())
}
