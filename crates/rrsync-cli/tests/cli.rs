use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};

#[derive(Deserialize)]
struct Summary {
    key: String,
    samples: usize,
    mean_hr_bpm: Option<f64>,
}

#[derive(Deserialize)]
struct Pair {
    name_a: String,
    name_b: String,
}

#[derive(Deserialize)]
struct Discovery {
    pairs: Vec<Pair>,
    unmatched: Vec<String>,
}

#[derive(Deserialize)]
struct Chunk {
    samples: usize,
}

#[derive(Deserialize)]
struct Scored {
    corr: f64,
    shift_diff_ms: i64,
}

#[derive(Debug, Deserialize)]
struct Row {
    name_a: String,
    name_b: String,
    corr: Option<f64>,
    shift_a_ms: Option<i64>,
    shift_diff_ms: Option<i64>,
    group_label: String,
}

#[test]
fn summary_reports_heart_rate() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("rrsync")
        .args(["summary", "--input", &sample_path("5ox1 2023-08-22 22-00-00.txt")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Summary = serde_json::from_slice(&output)?;
    assert_eq!(summary.key, "5ox1_0");
    assert_eq!(summary.samples, 6);
    assert_close(summary.mean_hr_bpm.expect("heart rate"), 60_000.0 / (5600.0 / 6.0), 1e-9);
    Ok(())
}

#[test]
fn filter_replaces_ectopic_beat() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("rrsync")
        .args(["filter", "--input", &sample_path("5ox1 2023-08-22 22-00-00.txt")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let values: Vec<f64> = String::from_utf8(output)?
        .lines()
        .map(|l| l.parse())
        .collect::<Result<_, _>>()?;
    assert_eq!(values.len(), 6);
    assert!(values.iter().all(|v| *v > 700.0 && *v < 900.0));
    Ok(())
}

#[test]
fn split_keeps_contiguous_recording_whole() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("rrsync")
        .args(["split", "--input", &sample_path("2om2 2023-08-22 22-05-27.txt")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let chunks: Vec<Chunk> = serde_json::from_slice(&output)?;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].samples, 300);
    Ok(())
}

#[test]
fn pairs_lists_matches_and_leftovers() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("rrsync")
        .args(["pairs", "--dir", &test_data_dir()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let discovery: Discovery = serde_json::from_slice(&output)?;
    let names: Vec<(&str, &str)> = discovery
        .pairs
        .iter()
        .map(|p| (p.name_a.as_str(), p.name_b.as_str()))
        .collect();
    assert_eq!(names, vec![("2om2", "2ok2"), ("4om1", "4ok1")]);
    assert_eq!(discovery.unmatched, vec!["5ox1"]);
    Ok(())
}

#[test]
fn correlate_prints_result_or_null() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("rrsync")
        .args([
            "correlate",
            "--a",
            &sample_path("2om2 2023-08-22 22-05-27.txt"),
            "--b",
            &sample_path("2ok2 2023-08-22 22-05-26.txt"),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let result: Scored = serde_json::from_slice(&output)?;
    assert!(result.corr.abs() < 0.9);
    assert_eq!(result.shift_diff_ms, 0);

    let output = cargo_bin_cmd!("rrsync")
        .args([
            "correlate",
            "--a",
            &sample_path("4om1 2023-08-22 23-10-00.txt"),
            "--b",
            &sample_path("4ok1 2023-08-22 23-10-01.txt"),
            "--split",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(output)?.trim(), "null");
    Ok(())
}

#[test]
fn search_finds_the_lag_and_writes_csv() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("results.csv");
    let output = cargo_bin_cmd!("rrsync")
        .args([
            "search",
            "--dir",
            &test_data_dir(),
            "--start-ms",
            "0",
            "--end-ms",
            "10000000",
            "--group-label",
            "night",
            "--out",
            out.to_str().expect("utf8 path"),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: Vec<Row> = String::from_utf8(output)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].name_a.as_str(), rows[0].name_b.as_str()), ("2om2", "2ok2"));
    assert!(rows[0].corr.expect("scored pair") > 0.999);
    assert_eq!(rows[0].shift_a_ms, Some(3000));
    assert_eq!(rows[0].shift_diff_ms, Some(3000));
    assert_eq!(rows[1].name_a, "4om1");
    assert_eq!(rows[1].corr, None);
    assert!(rows.iter().all(|r| r.group_label == "night"));

    let mut reader = csv::Reader::from_path(&out)?;
    let from_csv: Vec<Row> = reader.deserialize().collect::<Result<_, _>>()?;
    assert_eq!(from_csv.len(), 2);
    assert_eq!(from_csv[0].shift_diff_ms, Some(3000));
    assert_eq!(from_csv[1].corr, None);
    Ok(())
}

#[test]
fn search_reads_window_from_config() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("rrsync.toml");
    fs::write(
        &config,
        "group_label = \"from-config\"\n\n[window]\nstart_ms = 0.0\nend_ms = 10000000.0\n\n[search]\nshifts_ms = [3000]\n",
    )?;
    let output = cargo_bin_cmd!("rrsync")
        .args([
            "search",
            "--dir",
            &test_data_dir(),
            "--config",
            config.to_str().expect("utf8 path"),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: Vec<Row> = String::from_utf8(output)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(rows[0].shift_diff_ms, Some(3000));
    assert_eq!(rows[0].group_label, "from-config");
    Ok(())
}

#[test]
fn search_merges_split_recordings_on_request() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let head = vec![800.0; 3];
    let tail: Vec<f64> = (0..200)
        .map(|i| (800.0 + 60.0 * (i as f64 * 0.4).sin()).round())
        .collect();
    for name in ["3om1", "3ok1"] {
        write_rr(&dir.path().join(format!("{name} 2023-08-22 22-00-00.txt")), &head)?;
        write_rr(&dir.path().join(format!("{name} 2023-08-22 22-00-10.txt")), &tail)?;
    }
    let search = |merge: bool| -> Result<Vec<Row>, Box<dyn Error>> {
        let mut cmd = cargo_bin_cmd!("rrsync");
        cmd.args(["search", "--dir"])
            .arg(dir.path())
            .args(["--start-ms", "0", "--end-ms", "10000000"]);
        if merge {
            cmd.arg("--merge");
        }
        let output = cmd.assert().success().get_output().stdout.clone();
        let rows: Vec<Row> = String::from_utf8(output)?
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        Ok(rows)
    };

    // the first pieces alone are too short to score
    let unmerged = search(false)?;
    assert_eq!(unmerged.len(), 1);
    assert_eq!(unmerged[0].corr, None);

    let merged = search(true)?;
    assert_eq!(merged.len(), 1);
    assert_eq!((merged[0].name_a.as_str(), merged[0].name_b.as_str()), ("3om1", "3ok1"));
    assert!(merged[0].corr.expect("merged pair is scored") > 0.99);
    assert_eq!(merged[0].shift_diff_ms, Some(0));
    Ok(())
}

#[test]
fn search_without_window_fails() {
    cargo_bin_cmd!("rrsync")
        .args(["search", "--dir", &test_data_dir(), "--start-ms", "0"])
        .assert()
        .failure();
}

fn write_rr(path: &Path, intervals: &[f64]) -> std::io::Result<()> {
    let body: String = intervals.iter().map(|v| format!("{v}\n")).collect();
    fs::write(path, body)
}

fn assert_close(a: f64, b: f64, tol: f64) {
    let diff = (a - b).abs();
    assert!(
        diff <= tol,
        "diff {} exceeded tol {} ({} vs {})",
        diff,
        tol,
        a,
        b
    );
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn test_data_dir() -> String {
    workspace_root()
        .join("test_data")
        .to_string_lossy()
        .to_string()
}

fn sample_path(file: &str) -> String {
    workspace_root()
        .join("test_data")
        .join(file)
        .to_string_lossy()
        .to_string()
}
