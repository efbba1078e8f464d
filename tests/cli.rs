use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const CORPUS: &str = "low lower lowest newer newest wider widest\nlow low lower newest newest\n";

fn temp_workspace() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn run_command(cmd: &mut Command) {
    cmd.assert().success();
}

fn train_command(workspace: &TempDir, vocab_size: &str, extra: &[&str]) -> Command {
    fs::write(workspace.path().join("corpus.txt"), CORPUS).expect("write corpus");
    let mut train = Command::cargo_bin("tinybpe").expect("binary exists");
    train.current_dir(workspace.path()).args([
        "--quiet",
        "train",
        "corpus.txt",
        "--vocab-size",
        vocab_size,
        "--no-progress",
        "--vocab-out",
        "vocab.txt",
        "-o",
        "model.json",
    ]);
    train.args(extra);
    train
}

fn train_model(workspace: &TempDir, vocab_size: &str) {
    run_command(&mut train_command(workspace, vocab_size, &[]));
}

#[test]
fn train_encode_decode_round_trip() {
    let workspace = temp_workspace();
    train_model(&workspace, "40");
    assert!(workspace.path().join("model.json").exists());
    assert!(workspace.path().join("vocab.txt").exists());

    let mut encode = Command::cargo_bin("tinybpe").expect("binary exists");
    let encode_output = encode
        .current_dir(workspace.path())
        .args(["--quiet", "encode", "-m", "model.json", "corpus.txt", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let encoded: Value =
        serde_json::from_slice(&encode_output).expect("encoded output is valid JSON");
    assert_eq!(encoded["unknown"], 0);
    let tokens = encoded["tokens"]
        .as_array()
        .expect("tokens array")
        .iter()
        .map(|v| v.as_u64().expect("u64 token"))
        .collect::<Vec<_>>();
    assert!(!tokens.is_empty(), "some tokens produced");
    assert!(tokens.len() < CORPUS.len(), "merges shortened the sequence");

    let mut args = vec![
        "--quiet".to_string(),
        "decode".to_string(),
        "-m".to_string(),
        "model.json".to_string(),
        "--output".to_string(),
        "decoded.txt".to_string(),
    ];
    args.extend(tokens.iter().map(|tok| tok.to_string()));
    let mut decode = Command::cargo_bin("tinybpe").expect("binary exists");
    decode.current_dir(workspace.path()).args(args);
    run_command(&mut decode);

    let decoded = fs::read_to_string(workspace.path().join("decoded.txt")).expect("read decoded");
    assert_eq!(decoded, CORPUS);
}

#[test]
fn info_reports_summary() {
    let workspace = temp_workspace();
    train_model(&workspace, "30");

    let mut info = Command::cargo_bin("tinybpe").expect("binary exists");
    let info_output = info
        .current_dir(workspace.path())
        .args(["--quiet", "info", "-m", "model.json", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&info_output).expect("info output is JSON");
    assert_eq!(summary["summary"]["vocab_size"], 30);
    let distinct = summary["summary"]["distinct_bytes"].as_u64().expect("distinct");
    assert_eq!(summary["summary"]["merges"].as_u64(), Some(30 - distinct));
}

#[test]
fn decode_rejects_unknown_ids() {
    let workspace = temp_workspace();
    train_model(&workspace, "30");

    let mut decode = Command::cargo_bin("tinybpe").expect("binary exists");
    decode
        .current_dir(workspace.path())
        .args(["--quiet", "decode", "-m", "model.json", "0", "999999"])
        .assert()
        .failure();
}

#[test]
fn encode_text_flags_unseen_bytes() {
    let workspace = temp_workspace();
    run_command(&mut train_command(
        &workspace,
        "40",
        &["--strict", "--split-lines"],
    ));

    let mut encode = Command::cargo_bin("tinybpe").expect("binary exists");
    let output = encode
        .current_dir(workspace.path())
        .args([
            "--quiet", "encode", "-m", "model.json", "--text", "lowz", "--text", "low", "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let records = String::from_utf8(output).expect("utf8 output");
    let records: Vec<Value> = records
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["source"], "text[0]");
    // 'z' never occurs in the training corpus.
    assert_eq!(records[0]["unknown"], 1);
    assert_eq!(records[1]["unknown"], 0);
}

#[test]
fn strict_training_rejects_small_vocab() {
    let workspace = temp_workspace();
    train_command(&workspace, "4", &["--strict"])
        .assert()
        .failure();
    assert!(!workspace.path().join("model.json").exists());
}

#[test]
fn decode_json_keeps_sequence_boundaries() {
    let workspace = temp_workspace();
    train_model(&workspace, "40");

    let mut encode = Command::cargo_bin("tinybpe").expect("binary exists");
    let encoded = encode
        .current_dir(workspace.path())
        .args([
            "--quiet", "encode", "-m", "model.json", "--text", "low\nlow", "--text", "wider",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    fs::write(workspace.path().join("ids.txt"), encoded).expect("write ids");

    let mut decode = Command::cargo_bin("tinybpe").expect("binary exists");
    let decoded = decode
        .current_dir(workspace.path())
        .args(["--quiet", "decode", "-m", "model.json", "--input", "ids.txt", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let texts: Vec<String> = serde_json::from_slice(&decoded).expect("json array");
    assert_eq!(texts, vec!["low\nlow".to_string(), "wider".to_string()]);
}
