//! Joins the source tables into one record per country.
//!
//! The continent table is the anchor: it defines the canonical identifiers,
//! display names and output order. Every other source is resolved against it
//! through [`CountryMatcher`]; whatever does not resolve is recorded as a
//! [`DroppedEntry`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::geometry::GeometrySource;
use crate::matching::{AnchorCountry, CountryMatcher};
use crate::record::{
    CellIssue, CellIssueKind, CountryRecord, DropReason, DroppedEntry, Reconciliation, SourceTable,
};
use crate::tables::{ContinentRow, LanguageRow, SourceTables, WideTable};

/// Accumulates per-country attributes while the sources are merged.
#[derive(Debug, Default)]
struct Builder {
    display_name: String,
    continent: Option<String>,
    population: BTreeMap<i32, u64>,
    gdp: BTreeMap<i32, f64>,
    languages: BTreeSet<String>,
    geometry: Option<Value>,
}

/// Run the whole join. See the module docs for the matching policy.
pub fn reconcile(
    population: &WideTable,
    gdp: &WideTable,
    continents: &[ContinentRow],
    languages: &[LanguageRow],
    geometry: &GeometrySource,
) -> Reconciliation {
    let mut out = Reconciliation::default();

    let (order, mut builders, anchors) = build_anchor(continents, &mut out.dropped);
    let matcher = CountryMatcher::new(&anchors);

    merge_wide(
        SourceTable::Population,
        population,
        &matcher,
        &mut builders,
        &mut out,
        parse_population,
        |b, year, v| {
            b.population.insert(year, v);
        },
    );
    merge_wide(
        SourceTable::Gdp,
        gdp,
        &matcher,
        &mut builders,
        &mut out,
        parse_gdp,
        |b, year, v| {
            b.gdp.insert(year, v);
        },
    );
    merge_languages(languages, &matcher, &mut builders, &mut out);
    merge_geometry(geometry, &matcher, &mut builders, &mut out.dropped);

    for identifier in order {
        let Some(b) = builders.remove(&identifier) else {
            continue;
        };
        let Some(geometry) = b.geometry else {
            warn!(identifier = %identifier, "dropping country without geometry");
            out.dropped.push(DroppedEntry {
                source: SourceTable::Continents,
                raw_key: identifier,
                reason: DropReason::NoGeometry,
            });
            continue;
        };
        out.records.push(CountryRecord {
            identifier,
            display_name: b.display_name,
            continent: b.continent,
            population_by_year: b.population,
            gdp_per_capita_by_year: b.gdp,
            languages: b.languages,
            geometry,
        });
    }

    info!(
        records = out.records.len(),
        dropped = out.dropped.len(),
        cell_issues = out.cell_issues.len(),
        "reconciliation finished"
    );
    out
}

/// Convenience wrapper over [`reconcile`] for loaded tables.
pub fn reconcile_sources(tables: &SourceTables, geometry: &GeometrySource) -> Reconciliation {
    reconcile(
        &tables.population,
        &tables.gdp,
        &tables.continents,
        &tables.languages,
        geometry,
    )
}

// ── Anchor ──────────────────────────────────────────────────────────────────

/// Canonical identifiers in first-seen order, with one builder each.
fn build_anchor(
    continents: &[ContinentRow],
    dropped: &mut Vec<DroppedEntry>,
) -> (Vec<String>, HashMap<String, Builder>, Vec<AnchorCountry>) {
    let mut order = Vec::new();
    let mut builders: HashMap<String, Builder> = HashMap::new();
    let mut anchors = Vec::new();

    for row in continents {
        let Some(iso3) = row.iso3.as_deref().map(str::to_uppercase) else {
            let raw_key = row.name.clone().unwrap_or_default();
            warn!(raw_key = %raw_key, "continent row without ISO3 code");
            dropped.push(DroppedEntry {
                source: SourceTable::Continents,
                raw_key,
                reason: DropReason::MissingKey,
            });
            continue;
        };

        match builders.get_mut(&iso3) {
            Some(existing) => {
                let outcome =
                    merge_duplicate_continent(&mut existing.continent, row.region.as_ref());
                warn!(
                    identifier = %iso3,
                    incoming = ?row.region,
                    kept = ?existing.continent,
                    ?outcome,
                    "duplicate continent row"
                );
            }
            None => {
                let name = row.name.clone().unwrap_or_else(|| iso3.clone());
                anchors.push(AnchorCountry {
                    iso3: iso3.clone(),
                    iso2: row.iso2.clone(),
                    name: name.clone(),
                });
                builders.insert(
                    iso3.clone(),
                    Builder {
                        display_name: name,
                        continent: row.region.clone(),
                        ..Default::default()
                    },
                );
                order.push(iso3);
            }
        }
    }
    (order, builders, anchors)
}

/// What a repeated anchor row did to the stored continent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DuplicateContinent {
    Replaced,
    KeptPrevious,
}

/// The last non-empty region wins; a blank repeat keeps what is there.
fn merge_duplicate_continent(
    current: &mut Option<String>,
    incoming: Option<&String>,
) -> DuplicateContinent {
    match incoming {
        Some(region) => {
            *current = Some(region.clone());
            DuplicateContinent::Replaced
        }
        None => DuplicateContinent::KeptPrevious,
    }
}

// ── Wide tables ─────────────────────────────────────────────────────────────

fn merge_wide<T>(
    source: SourceTable,
    table: &WideTable,
    matcher: &CountryMatcher,
    builders: &mut HashMap<String, Builder>,
    out: &mut Reconciliation,
    parse: fn(&str) -> Result<T, CellIssueKind>,
    mut insert: impl FnMut(&mut Builder, i32, T),
) {
    for row in &table.rows {
        let keys = row.keys();
        if keys.is_empty() {
            drop_row(&mut out.dropped, source, String::new(), DropReason::MissingKey);
            continue;
        }
        let Some(hit) = matcher.resolve(&keys) else {
            drop_row(&mut out.dropped, source, keys[0].to_string(), DropReason::Unmatched);
            continue;
        };
        let Some(builder) = builders.get_mut(&hit.identifier) else {
            continue;
        };

        for (year, cell) in table.years.iter().zip(&row.cells) {
            let Some(raw) = cell else {
                continue;
            };
            match parse(raw) {
                Ok(v) => insert(&mut *builder, *year, v),
                Err(kind) => {
                    debug!(
                        %source,
                        identifier = %hit.identifier,
                        year,
                        raw = %raw,
                        ?kind,
                        "bad cell"
                    );
                    out.cell_issues.push(CellIssue {
                        source,
                        identifier: hit.identifier.clone(),
                        column: year.to_string(),
                        raw: raw.clone(),
                        kind,
                    });
                }
            }
        }
    }
}

/// Population counts: integer text, or integral float text such as "1234.0".
pub(crate) fn parse_population(raw: &str) -> Result<u64, CellIssueKind> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<u64>() {
        return Ok(v);
    }
    let v: f64 = raw.parse().map_err(|_| CellIssueKind::Unparseable)?;
    if !v.is_finite() || v.fract() != 0.0 || v > u64::MAX as f64 {
        return Err(CellIssueKind::Unparseable);
    }
    if v < 0.0 {
        return Err(CellIssueKind::Negative);
    }
    Ok(v as u64)
}

pub(crate) fn parse_gdp(raw: &str) -> Result<f64, CellIssueKind> {
    let v: f64 = raw.trim().parse().map_err(|_| CellIssueKind::Unparseable)?;
    if !v.is_finite() {
        return Err(CellIssueKind::Unparseable);
    }
    if v < 0.0 {
        return Err(CellIssueKind::Negative);
    }
    Ok(v)
}

// ── Languages ───────────────────────────────────────────────────────────────

fn merge_languages(
    rows: &[LanguageRow],
    matcher: &CountryMatcher,
    builders: &mut HashMap<String, Builder>,
    out: &mut Reconciliation,
) {
    let source = SourceTable::Languages;
    for row in rows {
        let Some(country) = row.country.as_deref() else {
            drop_row(&mut out.dropped, source, String::new(), DropReason::MissingKey);
            continue;
        };
        let Some(hit) = matcher.resolve(&[country]) else {
            drop_row(&mut out.dropped, source, country.to_string(), DropReason::Unmatched);
            continue;
        };
        let Some(language) = row.language.clone() else {
            out.cell_issues.push(CellIssue {
                source,
                identifier: hit.identifier,
                column: crate::schema::languages::LANGUAGE.to_string(),
                raw: String::new(),
                kind: CellIssueKind::Blank,
            });
            continue;
        };
        if let Some(b) = builders.get_mut(&hit.identifier) {
            b.languages.insert(language);
        }
    }
}

// ── Geometry ────────────────────────────────────────────────────────────────

fn merge_geometry(
    source: &GeometrySource,
    matcher: &CountryMatcher,
    builders: &mut HashMap<String, Builder>,
    dropped: &mut Vec<DroppedEntry>,
) {
    for feature in &source.features {
        let keys = feature.key_refs();
        if keys.is_empty() {
            drop_row(dropped, SourceTable::Geometry, String::new(), DropReason::MissingKey);
            continue;
        }
        let Some(hit) = matcher.resolve(&keys) else {
            drop_row(dropped, SourceTable::Geometry, feature.label(), DropReason::Unmatched);
            continue;
        };
        let Some(b) = builders.get_mut(&hit.identifier) else {
            continue;
        };
        if b.geometry.is_some() {
            drop_row(
                dropped,
                SourceTable::Geometry,
                feature.label(),
                DropReason::DuplicateGeometry,
            );
            continue;
        }
        b.geometry = Some(feature.geometry.clone());
    }
}

fn drop_row(
    dropped: &mut Vec<DroppedEntry>,
    source: SourceTable,
    raw_key: String,
    reason: DropReason,
) {
    warn!(%source, raw_key = %raw_key, ?reason, "dropping row");
    dropped.push(DroppedEntry {
        source,
        raw_key,
        reason,
    });
}
