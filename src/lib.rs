mod error;
mod model;
mod schema;
mod visualization;

pub mod geometry;
pub mod matching;
pub mod reconcile;
pub mod record;
pub mod tables;
pub mod view;

pub use error::{GlobeError, Result, TableError};
pub use geometry::GeometrySource;
pub use model::{BuildOptions, BuildSummary, GlobeModel};
pub use reconcile::{reconcile, reconcile_sources};
pub use record::{CountryRecord, Dataset, Reconciliation};
pub use tables::{InputPaths, SourceTables};
pub use view::{
    compute_frame, ExtrusionConfig, Filter, Frame, Metric, Renderer, ScaleKind, ViewEvent,
    ViewState,
};
pub use visualization::{generate_globe_html, VisualizationConfig, DEFAULT_DECK_URL};
