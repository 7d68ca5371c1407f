//! Country identifier reconciliation.
//!
//! Raw keys from every source are resolved against the anchor (continent/ISO)
//! table by an ordered list of strategies. The first strategy that resolves
//! any of a row's key candidates wins.

use std::collections::HashMap;

/// Matching strategies in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStrategy {
    Iso3,
    Iso2,
    Name,
    Alias,
}

impl MatchStrategy {
    pub const ORDER: [MatchStrategy; 4] = [Self::Iso3, Self::Iso2, Self::Name, Self::Alias];
}

/// Known naming discrepancies between sources, as `(alias, iso3)`.
///
/// Aliases are compared after [`fold_name`]. Codes listed here are Natural
/// Earth `ADM0_A3` values that differ from ISO 3166-1.
pub const ALIASES: &[(&str, &str)] = &[
    // World Bank spellings
    ("congo, dem. rep.", "COD"),
    ("congo, rep.", "COG"),
    ("egypt, arab rep.", "EGY"),
    ("iran, islamic rep.", "IRN"),
    ("korea, rep.", "KOR"),
    ("korea, dem. people's rep.", "PRK"),
    ("venezuela, rb", "VEN"),
    ("yemen, rep.", "YEM"),
    ("gambia, the", "GMB"),
    ("bahamas, the", "BHS"),
    ("lao pdr", "LAO"),
    ("kyrgyz republic", "KGZ"),
    ("slovak republic", "SVK"),
    ("micronesia, fed. sts.", "FSM"),
    ("st. lucia", "LCA"),
    ("st. kitts and nevis", "KNA"),
    ("st. vincent and the grenadines", "VCT"),
    ("hong kong sar, china", "HKG"),
    ("macao sar, china", "MAC"),
    ("west bank and gaza", "PSE"),
    ("turkiye", "TUR"),
    ("viet nam", "VNM"),
    // Common short and historical forms
    ("democratic republic of the congo", "COD"),
    ("dem. rep. congo", "COD"),
    ("republic of the congo", "COG"),
    ("russia", "RUS"),
    ("russian federation", "RUS"),
    ("iran", "IRN"),
    ("south korea", "KOR"),
    ("north korea", "PRK"),
    ("venezuela", "VEN"),
    ("laos", "LAO"),
    ("syria", "SYR"),
    ("syrian arab republic", "SYR"),
    ("turkey", "TUR"),
    ("türkiye", "TUR"),
    ("vietnam", "VNM"),
    ("czech republic", "CZE"),
    ("czechia", "CZE"),
    ("united states of america", "USA"),
    ("united states", "USA"),
    ("united kingdom of great britain and northern ireland", "GBR"),
    ("bolivia (plurinational state of)", "BOL"),
    ("tanzania", "TZA"),
    ("united republic of tanzania", "TZA"),
    ("cote d'ivoire", "CIV"),
    ("côte d'ivoire", "CIV"),
    ("ivory coast", "CIV"),
    ("palestine", "PSE"),
    ("swaziland", "SWZ"),
    ("eswatini", "SWZ"),
    ("macedonia", "MKD"),
    ("north macedonia", "MKD"),
    ("burma", "MMR"),
    ("cape verde", "CPV"),
    ("cabo verde", "CPV"),
    ("east timor", "TLS"),
    ("timor-leste", "TLS"),
    ("brunei", "BRN"),
    ("brunei darussalam", "BRN"),
    ("moldova", "MDA"),
    ("s. sudan", "SSD"),
    ("central african rep.", "CAF"),
    ("eq. guinea", "GNQ"),
    ("bosnia and herz.", "BIH"),
    ("dominican rep.", "DOM"),
    ("solomon is.", "SLB"),
    ("w. sahara", "ESH"),
    // Natural Earth ADM0_A3 codes
    ("sds", "SSD"),
    ("sah", "ESH"),
    ("psx", "PSE"),
];

/// Lowercase, trim and collapse internal whitespace.
pub fn fold_name(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One anchor country as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorCountry {
    pub iso3: String,
    pub iso2: Option<String>,
    pub name: String,
}

/// A resolved key: the canonical identifier and the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub identifier: String,
    pub strategy: MatchStrategy,
}

/// Lookup indexes built once from the anchor table.
pub struct CountryMatcher {
    by_iso3: HashMap<String, String>,
    by_iso2: HashMap<String, String>,
    by_name: HashMap<String, String>,
    by_alias: HashMap<String, String>,
}

impl CountryMatcher {
    /// Build the indexes. Earlier anchors win on conflicting ISO2 codes or names.
    pub fn new(anchors: &[AnchorCountry]) -> Self {
        let mut by_iso3 = HashMap::new();
        let mut by_iso2 = HashMap::new();
        let mut by_name = HashMap::new();

        for anchor in anchors {
            let iso3 = anchor.iso3.to_uppercase();
            by_iso3.entry(iso3.clone()).or_insert_with(|| iso3.clone());
            if let Some(iso2) = &anchor.iso2 {
                by_iso2
                    .entry(iso2.to_uppercase())
                    .or_insert_with(|| iso3.clone());
            }
            by_name
                .entry(fold_name(&anchor.name))
                .or_insert_with(|| iso3.clone());
        }

        // Aliases only count when their target is a known anchor.
        let by_alias = ALIASES
            .iter()
            .filter(|(_, iso3)| by_iso3.contains_key(*iso3))
            .map(|(alias, iso3)| (fold_name(alias), iso3.to_string()))
            .collect();

        Self {
            by_iso3,
            by_iso2,
            by_name,
            by_alias,
        }
    }

    /// Try one strategy against one raw key.
    pub fn match_with(&self, strategy: MatchStrategy, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let found = match strategy {
            MatchStrategy::Iso3 => self.by_iso3.get(&raw.to_uppercase()),
            MatchStrategy::Iso2 => self.by_iso2.get(&raw.to_uppercase()),
            MatchStrategy::Name => self.by_name.get(&fold_name(raw)),
            MatchStrategy::Alias => self.by_alias.get(&fold_name(raw)),
        };
        found.cloned()
    }

    /// Resolve a row given its key candidates (e.g. code column, then name).
    ///
    /// Strategies are the outer loop: an ISO3 hit on the second candidate
    /// beats a name hit on the first.
    pub fn resolve(&self, candidates: &[&str]) -> Option<Match> {
        for strategy in MatchStrategy::ORDER {
            for raw in candidates {
                if let Some(identifier) = self.match_with(strategy, raw) {
                    return Some(Match {
                        identifier,
                        strategy,
                    });
                }
            }
        }
        None
    }
}
