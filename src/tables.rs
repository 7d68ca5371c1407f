//! Typed loaders for the four input tables.
//!
//! Every CSV is read with all columns as strings, then validated against an
//! explicit schema: the key columns must exist or the load fails naming the
//! missing column. Numeric parsing happens per cell in the reconciliation
//! step so bad cells can be recorded instead of coerced.

use std::path::{Path, PathBuf};

use chrono::Datelike;
use polars::prelude::*;
use tracing::debug;

use crate::error::{GlobeError, Result, TableError};
use crate::schema::*;

/// A wide time-series table: one row per raw country key, one column per year.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub years: Vec<i32>,
    pub rows: Vec<WideRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub code: Option<String>,
    pub name: Option<String>,
    /// Raw cell text per entry of [`WideTable::years`]; `None` for blank cells.
    pub cells: Vec<Option<String>>,
}

impl WideRow {
    /// Key candidates for matching, code first.
    pub fn keys(&self) -> Vec<&str> {
        self.code
            .iter()
            .chain(self.name.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Anchor table row: the ISO reference used to canonicalize every other key.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinentRow {
    pub name: Option<String>,
    pub iso2: Option<String>,
    pub iso3: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageRow {
    pub country: Option<String>,
    pub language: Option<String>,
}

/// Paths and layout options for the input tables.
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub population: PathBuf,
    pub gdp: PathBuf,
    pub continents: PathBuf,
    pub languages: PathBuf,
    pub geojson: PathBuf,
    pub gdp_skip_rows: usize,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            population: PathBuf::from("data/World Population 1960-2023 by Country.csv"),
            gdp: PathBuf::from("data/API_NY.GDP.PCAP.CD_DS2_en_csv_v2_2.csv"),
            continents: PathBuf::from("data/continents2.csv"),
            languages: PathBuf::from("data/languages.csv"),
            geojson: PathBuf::from("data/ne_110m_admin_0_countries.geojson"),
            gdp_skip_rows: gdp::DEFAULT_SKIP_ROWS,
        }
    }
}

/// All four tables, loaded and validated.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub population: WideTable,
    pub gdp: WideTable,
    pub continents: Vec<ContinentRow>,
    pub languages: Vec<LanguageRow>,
}

impl SourceTables {
    /// Load every table, collecting failures so the error names each broken
    /// table rather than only the first.
    pub fn load(paths: &InputPaths) -> Result<Self> {
        let mut errors = Vec::new();

        let population = collect(
            population::TABLE,
            load_wide(
                population::TABLE,
                &paths.population,
                0,
                population::COUNTRY_CODE,
                population::COUNTRY_NAME,
            ),
            &mut errors,
        );
        let gdp = collect(
            gdp::TABLE,
            load_wide(
                gdp::TABLE,
                &paths.gdp,
                paths.gdp_skip_rows,
                gdp::COUNTRY_CODE,
                gdp::COUNTRY_NAME,
            ),
            &mut errors,
        );
        let continents = collect(
            continents::TABLE,
            load_continents(&paths.continents),
            &mut errors,
        );
        let languages = collect(
            languages::TABLE,
            load_languages(&paths.languages),
            &mut errors,
        );

        match (population, gdp, continents, languages) {
            (Some(population), Some(gdp), Some(continents), Some(languages)) => Ok(Self {
                population,
                gdp,
                continents,
                languages,
            }),
            _ => Err(GlobeError::Tables(errors)),
        }
    }
}

fn collect<T>(table: &str, result: Result<T>, errors: &mut Vec<TableError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(error) => {
            errors.push(TableError {
                table: table.to_string(),
                error,
            });
            None
        }
    }
}

// ── Table loaders ───────────────────────────────────────────────────────────

/// Load a wide year table. The code column is required; the name column is
/// optional and only used as a fallback matching key.
pub fn load_wide(
    table: &str,
    path: &Path,
    skip_rows: usize,
    code_col: &str,
    name_col: &str,
) -> Result<WideTable> {
    let df = read_csv_as_strings(table, path, skip_rows)?;
    require_columns(table, &df, &[code_col])?;
    let df = strip_columns(df, &[code_col, name_col])?;

    let max_year = chrono::Utc::now().year();
    let mut years = Vec::new();
    let mut year_cols = Vec::new();
    for name in df.get_column_names_str() {
        if let Some(year) = parse_year_header(name, max_year) {
            years.push(year);
            year_cols.push(df.column(name)?.str()?);
        }
    }
    debug!(table, years = years.len(), rows = df.height(), "loaded wide table");

    let codes = df.column(code_col)?.str()?;
    let names = optional_str_column(&df, name_col)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(WideRow {
            code: non_blank(codes.get(i)),
            name: names.and_then(|n| non_blank(n.get(i))),
            cells: year_cols.iter().map(|c| non_blank(c.get(i))).collect(),
        });
    }
    Ok(WideTable { years, rows })
}

pub fn load_continents(path: &Path) -> Result<Vec<ContinentRow>> {
    let table = continents::TABLE;
    let df = read_csv_as_strings(table, path, 0)?;
    require_columns(
        table,
        &df,
        &[continents::ISO3, continents::NAME, continents::ISO2, continents::REGION],
    )?;
    let df = strip_columns(
        df,
        &[continents::ISO3, continents::NAME, continents::ISO2, continents::REGION],
    )?;

    let names = df.column(continents::NAME)?.str()?;
    let iso2 = df.column(continents::ISO2)?.str()?;
    let iso3 = df.column(continents::ISO3)?.str()?;
    let regions = df.column(continents::REGION)?.str()?;

    Ok((0..df.height())
        .map(|i| ContinentRow {
            name: non_blank(names.get(i)),
            iso2: non_blank(iso2.get(i)),
            iso3: non_blank(iso3.get(i)),
            region: non_blank(regions.get(i)),
        })
        .collect())
}

pub fn load_languages(path: &Path) -> Result<Vec<LanguageRow>> {
    let table = languages::TABLE;
    let df = read_csv_as_strings(table, path, 0)?;
    require_columns(table, &df, &[languages::COUNTRY, languages::LANGUAGE])?;
    let df = strip_columns(df, &[languages::COUNTRY, languages::LANGUAGE])?;

    let countries = df.column(languages::COUNTRY)?.str()?;
    let langs = df.column(languages::LANGUAGE)?.str()?;

    Ok((0..df.height())
        .map(|i| LanguageRow {
            country: non_blank(countries.get(i)),
            language: non_blank(langs.get(i)),
        })
        .collect())
}

// ── Private helpers ─────────────────────────────────────────────────────────

/// Read a CSV file with all columns as String dtype.
/// Drops `skip_lines` raw preamble lines and trims whitespace from column names.
fn read_csv_as_strings(table: &str, path: &Path, skip_lines: usize) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(GlobeError::MissingFile {
            table: table.to_string(),
            path: path.display().to_string(),
        });
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .with_skip_lines(skip_lines)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

fn require_columns(table: &str, df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(GlobeError::MissingColumn {
                table: table.to_string(),
                column: col_name.to_string(),
            });
        }
    }
    Ok(())
}

/// Strip surrounding whitespace from the given columns when present.
fn strip_columns(df: DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let present: Vec<Expr> = columns
        .iter()
        .filter(|c| df.column(c).is_ok())
        .map(|c| col(*c).str().strip_chars(lit(" \t\r\n")))
        .collect();
    if present.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(present).collect()?)
}

fn optional_str_column<'a>(df: &'a DataFrame, name: &str) -> Result<Option<&'a StringChunked>> {
    match df.column(name) {
        Ok(c) => Ok(Some(c.str()?)),
        Err(_) => Ok(None),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// A header names a year column when it is all digits and within range.
pub(crate) fn parse_year_header(header: &str, max_year: i32) -> Option<i32> {
    let header = header.trim();
    if header.is_empty() || !header.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = header.parse().ok()?;
    (years::MIN_YEAR..=max_year).contains(&year).then_some(year)
}
