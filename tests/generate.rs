use std::path::Path;
use std::process::{Command, Output};

use git2::{Commit, Oid, Repository, Signature, Time};

const JAN_10: i64 = 1_578_614_400;
const MAR_01: i64 = 1_583_020_800;
const APR_01: i64 = 1_585_699_200;
const MAY_01: i64 = 1_588_291_200;

const TICKETS: &str = r#"[
  {
    "key": "AVRO-1",
    "created": "2020-01-05T10:00:00.000+0000",
    "resolved": "2020-03-05T10:00:00.000+0000",
    "affectedVersions": ["v1.0"]
  }
]"#;

fn snapshot(put_revisions: u32) -> String {
    format!(
        r#"[
  {{"identity": "Store.put", "signature": "put()", "filepath": "src/Store.java",
    "span": {{"start": 1, "end": 5}},
    "features": {{"CyclomaticComplexity": 3, "NR": {put_revisions}}}}},
  {{"identity": "Store.get", "signature": "get()", "filepath": "src/Store.java",
    "span": {{"start": 6, "end": 10}},
    "features": {{"CyclomaticComplexity": 2}}}}
]"#
    )
}

fn commit(repo: &Repository, path: &str, content: &str, message: &str, seconds: i64) -> Oid {
    let file = repo.workdir().unwrap().join(path);
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let sig = Signature::new("dev", "dev@example.com", &Time::new(seconds, 0)).unwrap();
    let parents: Vec<Commit<'_>> = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok())
        .into_iter()
        .collect();
    let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap()
}

fn tag(repo: &Repository, name: &str, oid: Oid) {
    let object = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight(name, &object, false).unwrap();
}

fn store_source(line_three: &str) -> String {
    (1..=10)
        .map(|i| if i == 3 { line_three.to_string() } else { format!("line {i}") })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

/// Repo with tags v1.0, v1.1, v1.2; AVRO-1 is fixed between v1.0 and v1.1.
/// Snapshots exist for v1.0 and v1.1 only.
fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo_dir = dir.path().join("repo");
    let repo = Repository::init(&repo_dir).unwrap();

    let first = commit(&repo, "src/Store.java", &store_source("line 3"), "initial import", JAN_10);
    tag(&repo, "v1.0", first);
    commit(&repo, "src/Store.java", &store_source("line 3 fixed"), "AVRO-1: guard put", MAR_01);
    let second = commit(&repo, "README.md", "store\n", "release notes", APR_01);
    tag(&repo, "v1.1", second);
    let third = commit(&repo, "README.md", "store v3\n", "more notes", MAY_01);
    tag(&repo, "v1.2", third);

    std::fs::write(dir.path().join("tickets.json"), TICKETS).unwrap();
    let metrics = dir.path().join("metrics");
    std::fs::create_dir_all(&metrics).unwrap();
    std::fs::write(metrics.join("v1.0.json"), snapshot(2)).unwrap();
    std::fs::write(metrics.join("v1.1.json"), snapshot(1)).unwrap();

    let config = r#"
[project]
name = "avro"
repo = "repo"
tickets = "tickets.json"
metrics_dir = "metrics"

[dataset]
cutoff_fraction = 1.0
output = "out/avro"
formats = ["csv", "arff"]
"#;
    std::fs::write(dir.path().join(".faultline.toml"), config).unwrap();
    dir
}

fn faultline(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_faultline"))
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

#[test]
fn generate_writes_labeled_dataset() {
    let dir = project();
    let output = faultline(dir.path(), &["generate"]);
    assert!(output.status.success(), "generate failed: {}", String::from_utf8_lossy(&output.stderr));

    let csv = std::fs::read_to_string(dir.path().join("out/avro.csv")).unwrap();
    let expected = "\
\"Project\",\"MethodName\",\"Release\",\"CyclomaticComplexity\",\"NR\",\"IsBuggy\"
\"avro\",\"src/Store.java/put()\",\"v1.0\",\"3\",\"2\",\"yes\"
\"avro\",\"src/Store.java/get()\",\"v1.0\",\"2\",\"0\",\"no\"
\"avro\",\"src/Store.java/put()\",\"v1.1\",\"3\",\"1\",\"no\"
\"avro\",\"src/Store.java/get()\",\"v1.1\",\"2\",\"0\",\"no\"
";
    assert_eq!(csv, expected);

    let arff = std::fs::read_to_string(dir.path().join("out/avro.arff")).unwrap();
    assert!(arff.starts_with("@relation 'avro'"));
    assert!(arff.contains("@attribute 'IsBuggy' {yes,no}"));
    assert!(arff.contains("'avro','src/Store.java/put()','v1.0',3,2,yes"));
}

#[test]
fn generate_reports_json_summary() {
    let dir = project();
    let output = faultline(dir.path(), &["generate", "--format", "json", "--output", "json/avro"]);
    assert!(output.status.success(), "generate failed: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["project"], "avro");
    assert_eq!(report["fixCommits"], 1);
    assert_eq!(report["proportion"], 1.0);
    assert_eq!(report["assembly"]["rows"], 4);
    assert_eq!(report["assembly"]["buggyRows"], 1);
    assert_eq!(report["assembly"]["releasesSkipped"], serde_json::json!(["v1.2"]));
    assert!(report["droppedColumns"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("CodeSmells")));
    assert!(dir.path().join("json/avro.csv").exists());
}

#[test]
fn cutoff_limits_analyzed_releases() {
    let dir = project();
    let output = faultline(dir.path(), &["generate", "--cutoff", "0.3", "--format", "json"]);
    assert!(output.status.success(), "generate failed: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["assembly"]["releasesAnalyzed"], 1);
    assert_eq!(report["assembly"]["rows"], 2);
}

#[test]
fn out_of_range_cutoff_is_rejected() {
    let dir = project();
    let output = faultline(dir.path(), &["generate", "--cutoff", "1.5"]);
    assert!(!output.status.success());
    assert!(!dir.path().join("out/avro.csv").exists());
}

#[test]
fn missing_tickets_fail_with_project_context() {
    let dir = project();
    std::fs::remove_file(dir.path().join("tickets.json")).unwrap();
    let output = faultline(dir.path(), &["generate"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("avro"));
}

#[test]
fn proportion_prints_coefficient() {
    let dir = project();
    let output = faultline(dir.path(), &["proportion"]);
    assert!(output.status.success(), "proportion failed: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("avro: proportion 1.00 from 1 of 1 tickets"), "{stdout}");
}
