use std::hash::Hasher;
use std::process::Command;
use twox_hash::XxHash64;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "crawler-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn digest(path: &std::path::Path) -> u64 {
    let bytes = std::fs::read(path).expect("read snapshot");
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    hasher.finish()
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_crawler-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("population"));
    std::fs::remove_file(output_path).expect("cleanup");
}

#[test]
fn cli_runs_scenarios_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_crawler-tester");
    let output_path = temp_path("run");
    let output = Command::new(exe)
        .args([
            "--report",
            "json",
            "--scenarios",
            "smoke,determinism",
            "--iterations",
            "1",
            "--hours",
            "3",
            "--seeds",
            "1,2",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Crawler Automated Tester"));

    let content = std::fs::read_to_string(&output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let scenarios = report["scenarios"].as_array().expect("scenario list");
    assert_eq!(scenarios.len(), 4);
    assert!(scenarios.iter().all(|s| s["passed"] == true));
    std::fs::remove_file(output_path).expect("cleanup");
}

#[test]
fn cli_arena_writes_csv_rows() {
    let exe = env!("CARGO_BIN_EXE_crawler-tester");
    let output_path = temp_path("arena");
    let output = Command::new(exe)
        .args([
            "--mode",
            "arena",
            "--archetypes",
            "bandit,mercenary",
            "--hours",
            "12",
            "--seeds",
            "7",
            "--report",
            "csv",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    let bouts = content.lines().filter(|line| line.starts_with("bout,")).count();
    assert_eq!(bouts, 2);
    std::fs::remove_file(output_path).expect("cleanup");
}

#[test]
fn cli_rejects_bad_seeds() {
    let exe = env!("CARGO_BIN_EXE_crawler-tester");
    let output = Command::new(exe)
        .args(["--seeds", "not-a-seed"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized seed token"));
}

#[test]
fn cli_snapshots_are_reproducible() {
    let exe = env!("CARGO_BIN_EXE_crawler-tester");
    let mut digests = Vec::new();
    for run in ["first", "second"] {
        let dir = temp_path(run);
        let status = Command::new(exe)
            .args(["--scenarios", "smoke", "--iterations", "1", "--hours", "4", "--seeds", "21"])
            .arg("--snapshot-dir")
            .arg(&dir)
            .arg("--output")
            .arg(dir.with_extension("txt"))
            .status()
            .expect("run cli");
        assert!(status.success());
        digests.push(digest(&dir.join("seed-21.json")));
        std::fs::remove_dir_all(&dir).expect("cleanup");
        std::fs::remove_file(dir.with_extension("txt")).expect("cleanup");
    }
    assert_eq!(digests[0], digests[1]);
}
