use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::{GlobeError, Result, TableError};
use crate::geometry::GeometrySource;
use crate::reconcile::reconcile_sources;
use crate::record::{Dataset, Reconciliation};
use crate::schema::geometry;
use crate::tables::{InputPaths, SourceTables};
use crate::view::{Filter, Metric, ViewState};
use crate::visualization::{self, VisualizationConfig};

/// Output locations and initial view for one batch run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub out: PathBuf,
    /// Also write the serialized dataset alone.
    pub dataset_json: Option<PathBuf>,
    /// Also write dropped rows and cell issues.
    pub dropped_report: Option<PathBuf>,
    pub metric: Metric,
    pub year: i32,
    pub continent: Filter,
    pub language: Filter,
    pub visualization: VisualizationConfig,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            out: PathBuf::from("globe.html"),
            dataset_json: None,
            dropped_report: None,
            metric: Metric::Population,
            year: 2023,
            continent: Filter::All,
            language: Filter::All,
            visualization: VisualizationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub records: usize,
    pub dropped: usize,
    pub cell_issues: usize,
    pub out: PathBuf,
}

/// Loads the inputs and joins them. Holds nothing mutable beyond the run.
pub struct GlobeModel {
    paths: InputPaths,
}

impl GlobeModel {
    pub fn new(paths: InputPaths) -> Self {
        Self { paths }
    }

    /// Load all tables and the geometry source. Every failing input is
    /// reported together.
    pub fn load(&self) -> Result<(SourceTables, GeometrySource)> {
        let tables = SourceTables::load(&self.paths);
        let geometry = GeometrySource::load(&self.paths.geojson);

        match (tables, geometry) {
            (Ok(tables), Ok(geometry)) => Ok((tables, geometry)),
            (tables, geometry) => {
                let mut errors = match tables {
                    Err(GlobeError::Tables(errors)) => errors,
                    Err(other) => vec![TableError {
                        table: "input".to_string(),
                        error: other,
                    }],
                    Ok(_) => Vec::new(),
                };
                if let Err(error) = geometry {
                    errors.push(TableError {
                        table: geometry::TABLE.to_string(),
                        error,
                    });
                }
                Err(GlobeError::Tables(errors))
            }
        }
    }

    pub fn reconcile(&self) -> Result<Reconciliation> {
        let (tables, geometry) = self.load()?;
        Ok(reconcile_sources(&tables, &geometry))
    }

    /// Full batch run: reconcile, then write the artifact and optional side
    /// outputs.
    pub fn build(&self, opts: &BuildOptions) -> Result<BuildSummary> {
        let reconciliation = self.reconcile()?;
        if let Some(path) = &opts.dropped_report {
            fs::write(path, reconciliation.report_json()?)?;
            info!(path = %path.display(), "wrote drop report");
        }

        let summary = BuildSummary {
            records: reconciliation.records.len(),
            dropped: reconciliation.dropped.len(),
            cell_issues: reconciliation.cell_issues.len(),
            out: opts.out.clone(),
        };
        if summary.records == 0 {
            return Err(GlobeError::Validation(
                "no country matched both the continent table and the geometry source".into(),
            ));
        }

        let dataset = Arc::new(reconciliation.into_dataset());
        if let Some(path) = &opts.dataset_json {
            fs::write(path, dataset.to_json()?)?;
            info!(path = %path.display(), "wrote dataset");
        }

        let state = initial_state(&dataset, opts);
        let html = visualization::generate_globe_html(&dataset, &state, &opts.visualization)?;
        fs::write(&opts.out, html)?;
        info!(
            path = %opts.out.display(),
            records = summary.records,
            metric = %state.selected_metric,
            year = state.selected_year,
            "wrote globe"
        );
        Ok(summary)
    }
}

fn initial_state(dataset: &Dataset, opts: &BuildOptions) -> ViewState {
    let mut state = ViewState::new(dataset, opts.metric, opts.year);
    state.continent_filter = opts.continent.clone();
    state.language_filter = opts.language.clone();
    state
}
