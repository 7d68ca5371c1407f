//! Joined per-country records and the bookkeeping produced while building them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::view::Metric;

/// One reconciled country. Immutable once the pipeline has produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRecord {
    pub identifier: String,
    pub display_name: String,
    pub continent: Option<String>,
    #[serde(rename = "population")]
    pub population_by_year: BTreeMap<i32, u64>,
    #[serde(rename = "gdpPerCapita")]
    pub gdp_per_capita_by_year: BTreeMap<i32, f64>,
    pub languages: BTreeSet<String>,
    pub geometry: serde_json::Value,
}

/// Input a row or feature came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTable {
    Population,
    Gdp,
    Continents,
    Languages,
    Geometry,
}

impl SourceTable {
    pub fn name(&self) -> &'static str {
        use crate::schema;
        match self {
            Self::Population => schema::population::TABLE,
            Self::Gdp => schema::gdp::TABLE,
            Self::Continents => schema::continents::TABLE,
            Self::Languages => schema::languages::TABLE,
            Self::Geometry => schema::geometry::TABLE,
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropReason {
    /// No matching strategy resolved the key.
    Unmatched,
    /// The key cell was blank.
    MissingKey,
    /// Anchor country without a border shape.
    NoGeometry,
    /// A second shape resolved to a country that already has one.
    DuplicateGeometry,
}

/// A row excluded from the dataset, kept so drops are never silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedEntry {
    pub source: SourceTable,
    pub raw_key: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellIssueKind {
    Unparseable,
    Negative,
    Blank,
}

/// A recoverable cell problem. The cell is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellIssue {
    pub source: SourceTable,
    pub identifier: String,
    pub column: String,
    pub raw: String,
    pub kind: CellIssueKind,
}

/// Full pipeline output.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub records: Vec<CountryRecord>,
    pub dropped: Vec<DroppedEntry>,
    pub cell_issues: Vec<CellIssue>,
}

#[derive(Serialize)]
struct Report<'a> {
    dropped: &'a [DroppedEntry],
    cell_issues: &'a [CellIssue],
}

impl Reconciliation {
    /// Dropped rows and cell issues as pretty JSON.
    pub fn report_json(&self) -> crate::Result<String> {
        let report = Report {
            dropped: &self.dropped,
            cell_issues: &self.cell_issues,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    pub fn into_dataset(self) -> Dataset {
        Dataset::new(self.records)
    }
}

/// The loaded dataset handed to the renderer. Never mutated after load.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Vec<CountryRecord>,
}

impl Dataset {
    pub fn new(records: Vec<CountryRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CountryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&CountryRecord> {
        self.records.iter().find(|r| r.identifier == identifier)
    }

    /// Years with a value for at least one country. Empty for metrics that
    /// are not keyed by year.
    pub fn available_years(&self, metric: Metric) -> BTreeSet<i32> {
        let mut years = BTreeSet::new();
        for record in &self.records {
            match metric {
                Metric::Population => years.extend(record.population_by_year.keys()),
                Metric::GdpPerCapita => years.extend(record.gdp_per_capita_by_year.keys()),
                Metric::LanguageCount => {}
            }
        }
        years
    }

    pub fn continents(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .filter_map(|r| r.continent.as_deref())
            .collect()
    }

    pub fn languages(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .flat_map(|r| r.languages.iter().map(String::as_str))
            .collect()
    }

    /// Serialized record sequence, as embedded in the artifact.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(&self.records)?)
    }
}
