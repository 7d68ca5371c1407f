use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use world_globe::{
    BuildOptions, Filter, GlobeError, GlobeModel, InputPaths, Metric, ViewEvent, ViewState,
};

const POPULATION: &str = "\
Country Name,Country Code,2019,2020,2021
France,FRA,67000000,67300000,67500000
Kenya,KEN,52000000,53000000,
Nigeria,NGA,200000000,206000000,211000000
World,WLD,7700000000,7800000000,7900000000
";

const GDP: &str = "\
\"Data Source\",\"World Development Indicators\",

\"Last Updated Date\",\"2024-06-28\",

\"Country Name\",\"Country Code\",\"Indicator Name\",\"Indicator Code\",\"2020\",\"2021\",
\"France\",\"FRA\",\"GDP per capita (current US$)\",\"NY.GDP.PCAP.CD\",\"39055.28\",\"43658.98\",
\"Kenya\",\"KEN\",\"GDP per capita (current US$)\",\"NY.GDP.PCAP.CD\",\"1936.25\",\"2081.80\",
\"Nigeria\",\"NGA\",\"GDP per capita (current US$)\",\"NY.GDP.PCAP.CD\",\"..\",\"2065.75\",
";

const CONTINENTS: &str = "\
name,alpha-2,alpha-3,country-code,region
France,FR,FRA,250,Europe
Kenya,KE,KEN,404,Africa
Nigeria,NG,NGA,566,Africa
Antarctica,AQ,ATA,10,
";

const LANGUAGES: &str = "\
country,language
France,French
KE,English
KE,Swahili
Nigeria,English
Nigeria,Hausa
Nigeria,Yoruba
";

const GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"ADM0_A3": "FRA", "NAME": "France"},
     "geometry": {"type": "Polygon", "coordinates": [[[2,46],[3,46],[3,47],[2,46]]]}},
    {"type": "Feature", "properties": {"ADM0_A3": "KEN", "NAME": "Kenya"},
     "geometry": {"type": "Polygon", "coordinates": [[[37,0],[38,0],[38,1],[37,0]]]}},
    {"type": "Feature", "properties": {"ADM0_A3": "NGA", "NAME": "Nigeria"},
     "geometry": {"type": "Polygon", "coordinates": [[[8,9],[9,9],[9,10],[8,9]]]}}
  ]
}"#;

struct Fixture {
    dir: TempDir,
    paths: InputPaths,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let write = |name: &str, body: &str| -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    };
    let paths = InputPaths {
        population: write("population.csv", POPULATION),
        gdp: write("gdp.csv", GDP),
        continents: write("continents.csv", CONTINENTS),
        languages: write("languages.csv", LANGUAGES),
        geojson: write("world.geojson", GEOJSON),
        gdp_skip_rows: 4,
    };
    Fixture { dir, paths }
}

fn options(out: &Path) -> BuildOptions {
    BuildOptions {
        out: out.to_path_buf(),
        ..BuildOptions::default()
    }
}

#[test]
fn test_every_record_has_geometry() {
    let fx = fixture();
    let reconciliation = GlobeModel::new(fx.paths.clone()).reconcile().unwrap();

    let ids: Vec<&str> = reconciliation
        .records
        .iter()
        .map(|r| r.identifier.as_str())
        .collect();
    assert_eq!(ids, vec!["FRA", "KEN", "NGA"]);
    assert!(reconciliation.records.iter().all(|r| !r.geometry.is_null()));

    let kenya = &reconciliation.records[1];
    assert_eq!(kenya.continent.as_deref(), Some("Africa"));
    assert_eq!(kenya.population_by_year.get(&2021), None);
    assert_eq!(kenya.languages.len(), 2);

    // WLD has no anchor; ATA has no shape
    assert_eq!(reconciliation.dropped.len(), 2);
    // Nigeria's ".." GDP cell
    assert_eq!(reconciliation.cell_issues.len(), 1);
}

#[test]
fn test_pipeline_is_deterministic() {
    let fx = fixture();
    let model = GlobeModel::new(fx.paths.clone());
    let first = model.reconcile().unwrap().into_dataset().to_json().unwrap();
    let second = model.reconcile().unwrap().into_dataset().to_json().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_dataset_json_round_trips_values() {
    let fx = fixture();
    let json_path = fx.dir.path().join("dataset.json");
    let opts = BuildOptions {
        dataset_json: Some(json_path.clone()),
        ..options(&fx.dir.path().join("globe.html"))
    };
    GlobeModel::new(fx.paths.clone()).build(&opts).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
    let nigeria = &value[2];
    assert_eq!(nigeria["identifier"], "NGA");
    assert_eq!(nigeria["population"]["2020"], 206000000);
    assert_eq!(nigeria["gdpPerCapita"]["2021"], 2065.75);
    assert_eq!(nigeria["gdpPerCapita"].get("2020"), None);
    assert_eq!(nigeria["languages"], serde_json::json!(["English", "Hausa", "Yoruba"]));
}

#[test]
fn test_build_writes_html_and_report() {
    let fx = fixture();
    let out = fx.dir.path().join("globe.html");
    let report = fx.dir.path().join("dropped.json");
    let opts = BuildOptions {
        dropped_report: Some(report.clone()),
        continent: Filter::Only("Africa".into()),
        ..options(&out)
    };
    let summary = GlobeModel::new(fx.paths.clone()).build(&opts).unwrap();
    assert_eq!(summary.records, 3);
    assert_eq!(summary.dropped, 2);

    let html = fs::read_to_string(&out).unwrap();
    assert!(html.contains("WorldGlobe.create(opts)"));
    assert!(html.contains(r#""continentFilter":"Africa""#));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
    let reasons: Vec<&str> = report["dropped"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["reason"].as_str().unwrap())
        .collect();
    assert_eq!(reasons, vec!["unmatched", "no-geometry"]);
}

#[test]
fn test_renderer_over_reconciled_data() {
    let fx = fixture();
    let dataset = std::sync::Arc::new(
        GlobeModel::new(fx.paths.clone())
            .reconcile()
            .unwrap()
            .into_dataset(),
    );
    let state = ViewState::new(&dataset, Metric::Population, 2021);
    let mut renderer = world_globe::Renderer::new(dataset, state, Default::default());

    // Kenya has no 2021 value and falls back to 2020
    let kenya = renderer.frame().get("KEN").unwrap();
    assert_eq!(kenya.value.map(|v| v.year), Some(Some(2020)));

    let frame = renderer.apply(ViewEvent::FilterLanguage(Filter::Only("Klingon".into())));
    assert_eq!(frame.active_count(), 0);
    assert!(frame.countries.iter().all(|c| c.elevation == 0.0));
}

#[test]
fn test_missing_geometry_is_reported_with_tables() {
    let mut fx = fixture();
    fx.paths.geojson = fx.dir.path().join("absent.geojson");
    let err = GlobeModel::new(fx.paths.clone()).reconcile().unwrap_err();
    match err {
        GlobeError::Tables(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].table, "geometry");
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn cli(fx: &Fixture, out: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_world-globe"));
    cmd.arg("--population")
        .arg(&fx.paths.population)
        .arg("--gdp")
        .arg(&fx.paths.gdp)
        .arg("--continents")
        .arg(&fx.paths.continents)
        .arg("--languages")
        .arg(&fx.paths.languages)
        .arg("--geojson")
        .arg(&fx.paths.geojson)
        .arg("--out")
        .arg(out)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_writes_globe() {
    let fx = fixture();
    let out = fx.dir.path().join("cli.html");
    let output = cli(&fx, &out)
        .args(["--metric", "gdp-per-capita", "--year", "2021", "--scale", "linear"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let html = fs::read_to_string(out).unwrap();
    assert!(html.contains(r#""selectedMetric":"gdpPerCapita""#));
    assert!(html.contains(r#""scale":"linear""#));
}

#[test]
fn test_cli_fails_naming_table_without_key_column() {
    let fx = fixture();
    fs::write(&fx.paths.population, "Country Name,2020\nFrance,1\n").unwrap();
    let out = fx.dir.path().join("never.html");
    let output = cli(&fx, &out).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("population"), "stderr: {stderr}");
    assert!(stderr.contains("Country Code"), "stderr: {stderr}");
    assert!(!out.exists());
}

#[test]
fn test_cli_inlines_local_deck_bundle() {
    let fx = fixture();
    let bundle = fx.dir.path().join("deck.min.js");
    fs::write(&bundle, "var deck = {};").unwrap();
    let out = fx.dir.path().join("offline.html");
    let output = cli(&fx, &out)
        .arg("--deck-bundle")
        .arg(&bundle)
        .output()
        .unwrap();
    assert!(output.status.success());
    let html = fs::read_to_string(&out).unwrap();
    assert!(html.contains("var deck = {};"));
    assert!(!html.contains("src="));

    let missing = fx.dir.path().join("missing.html");
    let output = cli(&fx, &missing)
        .arg("--deck-bundle")
        .arg(fx.dir.path().join("absent.js"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.js"));
    assert!(!missing.exists());
}
