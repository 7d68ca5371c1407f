//! Country border shapes from a GeoJSON FeatureCollection.
//!
//! Geometry is opaque to the pipeline: each feature contributes its key
//! candidates and its `geometry` object, which is passed through unchanged.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{GlobeError, Result};
use crate::schema::geometry;

/// One border feature with the keys it can be matched on.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryFeature {
    pub keys: Vec<String>,
    pub geometry: Value,
}

impl GeometryFeature {
    pub fn key_refs(&self) -> Vec<&str> {
        self.keys.iter().map(String::as_str).collect()
    }

    /// First key, used when reporting a drop.
    pub fn label(&self) -> String {
        self.keys.first().cloned().unwrap_or_default()
    }
}

/// All border features, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometrySource {
    pub features: Vec<GeometryFeature>,
}

impl GeometrySource {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(GlobeError::MissingFile {
                table: geometry::TABLE.to_string(),
                path: path.display().to_string(),
            });
        }
        let text = fs::read_to_string(path)?;
        Self::from_geojson_str(&text)
    }

    /// Parse a FeatureCollection. Features without a geometry are skipped; a
    /// collection that yields no usable feature is an error.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        if root.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return Err(GlobeError::InvalidData(
                "geometry source must be a GeoJSON FeatureCollection".to_string(),
            ));
        }
        let raw_features = root
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                GlobeError::InvalidData("FeatureCollection has no features array".into())
            })?;

        let mut features = Vec::with_capacity(raw_features.len());
        for (i, feature) in raw_features.iter().enumerate() {
            let Some(geom) = feature.get("geometry").filter(|g| !g.is_null()) else {
                debug!(index = i, "skipping feature without geometry");
                continue;
            };
            features.push(GeometryFeature {
                keys: feature_keys(feature),
                geometry: geom.clone(),
            });
        }

        if features.is_empty() {
            return Err(GlobeError::Validation(
                "geometry source contains no features".to_string(),
            ));
        }
        Ok(Self { features })
    }
}

/// Key candidates in priority order. Natural Earth marks unknown codes "-99".
fn feature_keys(feature: &Value) -> Vec<String> {
    let props = feature.get("properties");
    let mut keys: Vec<String> = geometry::KEY_PROPERTIES
        .iter()
        .filter_map(|name| props.and_then(|p| p.get(*name)).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "-99")
        .map(str::to_string)
        .collect();

    match feature.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => keys.push(id.trim().to_string()),
        _ => {}
    }
    keys
}
