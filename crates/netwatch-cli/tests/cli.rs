use assert_cmd::Command;
use etherparse::PacketBuilder;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use std::io::Write;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("netwatch"))
}

/// Ethernet/IPv4/TCP SYN frame from `192.168.0.10:4444` to `192.168.0.20:443`.
fn tcp_frame() -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
        .ipv4([192, 168, 0, 10], [192, 168, 0, 20], 64)
        .tcp(4444, 443, 0, 1024)
        .syn();
    let payload = [];
    let mut packet = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, &payload).unwrap();
    packet
}

/// Ethernet/IPv4/UDP DNS-ish frame from `192.168.0.10:40000` to `8.8.8.8:53`.
fn udp_frame() -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
        .ipv4([192, 168, 0, 10], [8, 8, 8, 8], 64)
        .udp(40000, 53);
    let payload = [0u8; 8];
    let mut packet = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, &payload).unwrap();
    packet
}

/// Writes a minimal little-endian classic pcap file (LINKTYPE_ETHERNET)
/// with one record per frame, one microsecond apart.
fn write_pcap(path: &std::path::Path, frames: &[Vec<u8>]) {
    let mut out = Vec::new();
    out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());

    for (i, frame) in frames.iter().enumerate() {
        out.extend_from_slice(&(i as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(frame);
    }

    let mut file = std::fs::File::create(path).expect("create pcap");
    file.write_all(&out).expect("write pcap");
}

fn sample_capture(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("capture.pcap");
    write_pcap(&path, &[tcp_frame(), udp_frame(), tcp_frame()]);
    path
}

#[test]
fn help_supports_analyze_and_analyse_aliases() {
    cmd().arg("analyze").arg("--help").assert().success();
    cmd().arg("analyse").arg("--help").assert().success();
}

#[test]
fn version_includes_commit() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("commit").and(contains("built")));
}

#[test]
fn missing_input_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("missing.pcap");
    let report = temp.path().join("report.json");

    cmd()
        .arg("analyze")
        .arg(&missing)
        .arg("-o")
        .arg(&report)
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn stdout_outputs_json() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let assert = cmd().arg("analyze").arg(&input).arg("--stdout").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let _: Value = serde_json::from_str(&stdout).expect("valid json");
}

#[test]
fn stdout_and_report_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("report.json");

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("--stdout")
        .arg("-o")
        .arg(&report)
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn pretty_and_compact_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("report.json");

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .arg("--pretty")
        .arg("--compact")
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn quiet_suppresses_ok_message() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("report.json");

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .arg("--quiet")
        .assert()
        .success()
        .stderr(contains("OK:").not());
}

#[test]
fn report_written_to_file_is_valid_json() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("report.json");

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .assert()
        .success()
        .stderr(contains("OK: report written"));

    let content = std::fs::read_to_string(&report).expect("read report");
    let json: Value = serde_json::from_str(&content).expect("valid json");
    assert!(json.get("statistics").is_some());
    assert!(json.get("threats").is_some());
}

#[test]
fn list_threats_runs_without_error() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("report.json");

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .arg("--list-threats")
        .assert()
        .success();
}

#[test]
fn report_path_equal_to_input_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("must differ from input")));
}

#[test]
fn glob_no_match_errors() {
    let temp = TempDir::new().expect("tempdir");
    let pattern = temp.path().join("*.pcap");
    let report = temp.path().join("report.json");

    cmd()
        .arg("analyze")
        .arg(pattern.to_string_lossy().to_string())
        .arg("-o")
        .arg(&report)
        .assert()
        .failure()
        .stderr(contains("error: no files match pattern").and(contains("hint:")));
}

#[test]
fn glob_multiple_matches_errors() {
    let temp = TempDir::new().expect("tempdir");
    write_pcap(&temp.path().join("a.pcap"), &[tcp_frame()]);
    write_pcap(&temp.path().join("b.pcap"), &[tcp_frame()]);

    let report = temp.path().join("report.json");
    let pattern = temp.path().join("*.pcap");

    cmd()
        .arg("analyze")
        .arg(pattern.to_string_lossy().to_string())
        .arg("-o")
        .arg(&report)
        .assert()
        .failure()
        .stderr(contains("error: multiple files match pattern").and(contains("hint:")));
}

#[test]
fn glob_single_match_is_used() {
    let temp = TempDir::new().expect("tempdir");
    write_pcap(&temp.path().join("capture.pcap"), &[tcp_frame()]);

    let report = temp.path().join("report.json");
    let pattern = temp.path().join("*.pcap");

    cmd()
        .arg("analyze")
        .arg(pattern.to_string_lossy().to_string())
        .arg("-o")
        .arg(&report)
        .assert()
        .success();
}

#[test]
fn invalid_extension_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("capture.txt");
    std::fs::write(&input, "dummy").expect("write file");
    let report = temp.path().join("report.json");

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .assert()
        .failure()
        .stderr(contains("error: unsupported input format").and(contains("hint: expected")));
}

#[test]
fn config_overrides_apply() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("report.json");
    let config = temp.path().join("netwatch.toml");
    std::fs::write(&config, "port_scan_threshold = 1\n").expect("write config");

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
}

#[test]
fn invalid_config_file_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("report.json");
    let config = temp.path().join("netwatch.toml");
    std::fs::write(&config, "port_scan_threshold = \"not a number\"\n").expect("write config");

    cmd()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("invalid config file"));
}

#[test]
fn follow_writes_report_in_two_iterations() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("out.json");

    cmd()
        .arg("follow")
        .arg(&input)
        .arg("--report")
        .arg(&report)
        .arg("--interval-ms")
        .arg("0")
        .arg("--max-iterations")
        .arg("2")
        .assert()
        .success();

    let content = std::fs::read_to_string(&report).expect("read report");
    let json: Value = serde_json::from_str(&content).expect("valid json");
    assert!(json.get("statistics").is_some());
}

#[test]
fn follow_glob_errors_match_analyze_semantics() {
    let temp = TempDir::new().expect("tempdir");
    let report = temp.path().join("report.json");
    let pattern = temp.path().join("*.pcap");

    cmd()
        .arg("follow")
        .arg(pattern.to_string_lossy().to_string())
        .arg("--report")
        .arg(&report)
        .arg("--max-iterations")
        .arg("1")
        .assert()
        .failure()
        .stderr(contains("error: no files match pattern").and(contains("hint:")));
}

#[test]
fn follow_no_change_is_a_noop_iteration() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());
    let report = temp.path().join("out.json");

    cmd()
        .arg("follow")
        .arg(&input)
        .arg("--report")
        .arg(&report)
        .arg("--interval-ms")
        .arg("0")
        .arg("--max-iterations")
        .arg("3")
        .assert()
        .success()
        .stderr(contains("follow: no change"));
}

#[test]
fn info_outputs_path_and_packets() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());

    let assert = cmd().arg("info").arg(&input).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines.len() >= 7);
    assert!(lines[0].starts_with("file: "));
    assert!(lines[1].starts_with("format: "));
    assert!(lines[2].starts_with("bytes: "));
    assert!(lines[3].starts_with("packets: "));
    assert!(stdout.contains("packets: 3"));
}

#[test]
fn info_json_outputs_valid_json() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(temp.path());

    let assert = cmd().arg("info").arg(&input).arg("--json").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let json: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["packets"], 3);
}

#[test]
fn info_rejects_invalid_extension() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("capture.txt");
    std::fs::write(&input, "dummy").expect("write file");

    cmd()
        .arg("info")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("error: unsupported input format").and(contains("hint: expected")));
}
