#[allow(dead_code)]
mod common;

use std::fs;
use std::path::PathBuf;

use common::{draw_band, light_scan};
use root_morph_rust_lib::config::{Config, RootType};
use root_morph_rust_lib::features::csv_header;
use root_morph_rust_lib::output::{resolve_csv_path, write_features_csv, FeatureRow};
use root_morph_rust_lib::pipeline::analyze_region;

fn temp_csv(tag: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "root_morph_batch_{}_{}.csv",
        tag,
        std::process::id()
    ));
    let _ = fs::remove_file(&path);
    path
}

#[test]
fn broken_root_batch_writes_one_row_per_region() {
    let mut scan = light_scan(90, 20);
    draw_band(&mut scan, 5, 85, 8, 10);
    let blank = light_scan(90, 20);

    let config = Config::default();
    let measured = analyze_region(&scan, "plate1", &config).unwrap();
    let unmeasured = analyze_region(&blank, "plate1", &config).unwrap();

    let rows = vec![
        FeatureRow {
            filename: "scan.png".to_string(),
            region: measured.region.clone(),
            features: measured.features,
        },
        FeatureRow {
            filename: "blank.png".to_string(),
            region: unmeasured.region.clone(),
            features: unmeasured.features,
        },
    ];

    let path = temp_csv("rows");
    write_features_csv(&path, &rows, &config).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with(
        "File.Name,Region.of.Interest,Number.of.Root.Tips,Number.of.Branch.Points,Total.Root.Length.px"
    ));
    assert!(lines[0].contains("Root.Length.Diameter.Range.1.px"));
    assert!(lines[0].ends_with("Volume.Diameter.Range.3.px3"));

    // Two tips, no branches, 80 px of length, 243 px2 of area
    assert!(
        lines[1].starts_with("scan.png,plate1,2,0,80,0,243,"),
        "unexpected row: {}",
        lines[1]
    );

    // A blank image keeps its row, every value NA
    assert_eq!(lines[2], format!("blank.png,plate1{}", ",NA".repeat(24)));

    let _ = fs::remove_file(&path);
}

#[test]
fn headers_carry_unit_suffixes() {
    let pixel = csv_header(RootType::Broken, false, 3);
    assert_eq!(pixel.len(), 2 + 12 + 12);
    assert!(pixel.contains(&"Total.Root.Length.px".to_string()));
    assert!(pixel.contains(&"Branching.frequency.per.px".to_string()));
    assert!(pixel.contains(&"Surface.Area.px2".to_string()));

    let converted = csv_header(RootType::Whole, true, 3);
    assert_eq!(converted.len(), 2 + 24 + 12);
    assert!(converted.contains(&"Depth.mm".to_string()));
    assert!(converted.contains(&"Network.Area.mm2".to_string()));
    assert!(converted.contains(&"Volume.mm3".to_string()));
    assert!(converted.contains(&"Computation.Time.s".to_string()));
    assert!(converted.contains(&"Volume.Diameter.Range.3.mm3".to_string()));
}

#[test]
fn csv_lands_in_the_configured_output_directory() {
    let dir = std::env::temp_dir().join(format!("root_morph_outdir_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let mut config = Config::default();
    config.output_path = dir.to_string_lossy().to_string();
    config.output_file = "batch.csv".to_string();

    let path = resolve_csv_path(&config);
    assert_eq!(path, dir.join("batch.csv"));

    let mut scan = light_scan(40, 20);
    draw_band(&mut scan, 5, 35, 8, 10);
    let analysis = analyze_region(&scan, "Full", &config).unwrap();
    let rows = vec![FeatureRow {
        filename: "scan.png".to_string(),
        region: analysis.region.clone(),
        features: analysis.features,
    }];

    write_features_csv(&path, &rows, &config).unwrap();
    assert!(path.exists());

    let _ = fs::remove_dir_all(&dir);
}
