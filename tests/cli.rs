use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const NO_LANDMARKS: &str = "-1 -1 -1 -1 -1 -1 -1 -1 -1 -1";
const LANDMARKS: &str = "40 40 60 40 50 55 42 70 58 70";

/// A `detvote` invocation isolated from the user's settings and log filter.
fn detvote(dir: &Path) -> Command {
    let settings = dir.join("settings.toml");
    if !settings.exists() {
        fs::write(&settings, "").unwrap();
    }
    let mut cmd = Command::cargo_bin("detvote").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("DETVOTE_SETTINGS")
        .arg("--settings")
        .arg(&settings);
    cmd
}

fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// Two detectors that found the same face; only the second one has landmarks.
fn two_detector_logs(dir: &Path) -> (PathBuf, PathBuf) {
    let a = write(
        dir,
        "logs/retina/out.txt",
        &format!(
            "/data/set/img.jpg 2 $d 0.9 10 10 110 110 {NO_LANDMARKS} 0.3 300 300 340 340 {NO_LANDMARKS}\n\
             /data/set/empty.jpg 0 $d\n"
        ),
    );
    let b = write(
        dir,
        "logs/yolo/out.txt",
        &format!("/data/set/img.jpg 1 $d 0.6 12 12 112 112 {LANDMARKS}\n"),
    );
    (a, b)
}

#[test]
fn aggregate_prefers_landmark_detection_among_voters() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = two_detector_logs(tmp.path());

    let output = detvote(tmp.path())
        .args(["aggregate", "--min-votes", "2", "--save-format", "log", "--stdout"])
        .args(["-i", "/data/set", "-p", "/data/set"])
        .arg(&a)
        .arg(&b)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    insta::assert_snapshot!(stdout.trim_end(), @r"
    empty.jpg 0 $d
    img.jpg 1 $d 0.6 12 12 112 112 40 40 60 40 50 55 42 70 58 70
    ");
}

#[test]
fn aggregate_writes_dataset_named_after_dataset_path() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = two_detector_logs(tmp.path());
    let out_dir = tmp.path().join("results");

    detvote(tmp.path())
        .args(["aggregate", "-i", "/data/set/", "-o"])
        .arg(&out_dir)
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("Aggregated:"))
        .stdout(predicate::str::contains("detections = 3 -> 2"));

    let written = fs::read_to_string(out_dir.join("set.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    let img = value["/data/set/img.jpg"].as_array().unwrap();
    assert_eq!(img.len(), 2);
    assert_eq!(img[0]["score"], 0.6);
    assert_eq!(img[0]["box"], serde_json::json!([12, 12, 112, 112]));
    assert_eq!(img[1]["score"], 0.3);
    assert_eq!(value["/data/set/empty.jpg"], serde_json::json!([]));
}

#[test]
fn aggregate_discovers_logs_in_directory() {
    let tmp = TempDir::new().unwrap();
    two_detector_logs(tmp.path());
    write(tmp.path(), "logs/notes.md", "not a log");

    let output = detvote(tmp.path())
        .args(["aggregate", "--min-votes", "2", "--save-format", "log", "--stdout"])
        .arg("--logs-dir")
        .arg(tmp.path().join("logs"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("/data/set/img.jpg 1 $d 0.6 12 12 112 112"));
}

#[test]
fn aggregate_runs_every_cascade_stage() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = two_detector_logs(tmp.path());

    // Stage two needs three votes, which only one box pair can never reach.
    detvote(tmp.path())
        .args(["aggregate", "--thresh-iou", "0.5,0.5", "--min-votes", "1,3"])
        .args(["--save-format", "log", "--stdout"])
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("/data/set/img.jpg 0 $d"));
}

#[test]
fn aggregate_result_does_not_depend_on_jobs() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = two_detector_logs(tmp.path());
    let run = |jobs: &str| {
        detvote(tmp.path())
            .args(["aggregate", "--stdout", "-j", jobs])
            .arg(&a)
            .arg(&b)
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run("1"), run("3"));
}

#[test]
fn convert_log_to_dataset_and_back() {
    let tmp = TempDir::new().unwrap();
    let log = write(
        tmp.path(),
        "faces.txt",
        &format!("b.jpg 1 $d 0.75 1 2 30 40 {LANDMARKS}\na.jpg 0 $d\n"),
    );
    let out_dir = tmp.path().join("converted");

    detvote(tmp.path())
        .arg("convert")
        .arg(&log)
        .arg("-o")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Converted:"));
    let json = out_dir.join("faces.json");
    assert!(json.is_file());

    let output = detvote(tmp.path())
        .arg("convert")
        .arg(&json)
        .arg("--stdout")
        .output()
        .unwrap();
    assert!(output.status.success());
    let back = String::from_utf8(output.stdout).unwrap();
    insta::assert_snapshot!(back.trim_end(), @r"
    a.jpg 0 $d
    b.jpg 1 $d 0.75 1 2 30 40 40 40 60 40 50 55 42 70 58 70
    ");
}

#[test]
fn filter_drops_low_confidence_detections() {
    let tmp = TempDir::new().unwrap();
    let input = write(
        tmp.path(),
        "faces.json",
        r#"{"a.jpg":[{"box":[0,0,10,10],"score":0.2},{"box":[5,5,20,20],"score":0.8}],"b.jpg":[{"box":[0,0,4,4],"score":0.1}]}"#,
    );
    let out_dir = tmp.path().join("filtered");

    detvote(tmp.path())
        .arg("filter")
        .arg(&input)
        .args(["-t", "0.5", "-o"])
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 -> 1 detections"));

    let written = fs::read_to_string(out_dir.join("faces_filtered_0.5.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["a.jpg"].as_array().unwrap().len(), 1);
    assert_eq!(value["a.jpg"][0]["score"], 0.8);
    assert_eq!(value["b.jpg"], serde_json::json!([]));
}

#[test]
fn schema_describes_dataset_records() {
    let tmp = TempDir::new().unwrap();
    detvote(tmp.path())
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"DatasetRecord\""))
        .stdout(predicate::str::contains("\"box\""))
        .stdout(predicate::str::contains("\"landmarks\""));
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("detvote").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("aggregate"))
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("filter"))
        .stdout(predicate::str::contains("schema"));
}
