/// Column-name constants for the world-globe input tables and output dataset.
/// Single source of truth for the loaders and the serialized record layout.

// ── Population columns (wide, one column per year) ──────────────────────────
pub mod population {
    pub const TABLE: &str = "population";
    pub const COUNTRY_CODE: &str = "Country Code";
    pub const COUNTRY_NAME: &str = "Country Name";
}

// ── GDP per capita columns (World Bank wide layout) ─────────────────────────
pub mod gdp {
    pub const TABLE: &str = "gdp";
    pub const COUNTRY_CODE: &str = "Country Code";
    pub const COUNTRY_NAME: &str = "Country Name";
    /// Preamble lines before the header row in World Bank exports.
    pub const DEFAULT_SKIP_ROWS: usize = 4;
}

// ── Continent / ISO reference columns ───────────────────────────────────────
pub mod continents {
    pub const TABLE: &str = "continents";
    pub const NAME: &str = "name";
    pub const ISO2: &str = "alpha-2";
    pub const ISO3: &str = "alpha-3";
    pub const REGION: &str = "region";
}

// ── Language pair columns (long format) ─────────────────────────────────────
pub mod languages {
    pub const TABLE: &str = "languages";
    pub const COUNTRY: &str = "country";
    pub const LANGUAGE: &str = "language";
}

// ── GeoJSON feature properties, in lookup priority order ────────────────────
pub mod geometry {
    pub const TABLE: &str = "geometry";
    pub const KEY_PROPERTIES: [&str; 5] = ["ADM0_A3", "ISO_A3", "ISO_A2", "NAME", "ADMIN"];
}

// ── Year columns ────────────────────────────────────────────────────────────
pub mod years {
    /// Earliest year column accepted from the wide tables.
    pub const MIN_YEAR: i32 = 1800;
}
