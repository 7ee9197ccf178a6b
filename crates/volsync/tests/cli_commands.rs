#![cfg(all(unix, feature = "cli"))]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use volsync::transport::UnixDomainSocket;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "volsync-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn volsync(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_volsync"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("volsync should run")
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !UnixDomainSocket::is_socket(path) {
        if start.elapsed() >= timeout {
            panic!("socket {} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("child status should be readable") {
            return status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("child did not exit in time");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn encode_heartbeat_as_json() {
    let output = volsync(&["--format", "json", "encode", r#"{"kind":"Heartbeat"}"#]);
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be json");
    assert_eq!(value["kind"], "Heartbeat");
    assert_eq!(value["frame"], "020700");
    assert_eq!(value["length"], 3);
}

#[test]
fn encode_update_volume_pretty_prints_hex() {
    let output = volsync(&[
        "--format",
        "pretty",
        "encode",
        r#"{"kind":"UpdateVolume","id":7,"volume":45}"#,
    ]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "0304070101022d01010100"
    );
}

#[test]
fn encode_rejects_invalid_json() {
    let output = volsync(&["encode", "not json"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid message JSON"));
}

#[test]
fn run_without_endpoint_is_usage_error() {
    let output = volsync(&["run"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn probe_reports_missing_endpoint() {
    let dir = unique_temp_dir("probe");
    let missing = dir.join("absent.sock");
    let output = volsync(&[
        "--format",
        "json",
        "probe",
        "--endpoint",
        missing.to_str().expect("utf-8 path"),
    ]);

    assert_eq!(output.status.code(), Some(3));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be json");
    assert_eq!(value["candidates"][0]["present"], false);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = volsync(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("volsync {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn simulator_receives_announcements_from_run() {
    let dir = unique_temp_dir("sim");
    let sock = dir.join("surface.sock");
    let fixture = dir.join("fixture.json");
    std::fs::write(
        &fixture,
        r#"{ "devices": [{ "id": 1, "name": "Speakers", "volume": 50 }] }"#,
    )
    .expect("fixture should be writable");

    let mut simulator = Command::new(env!("CARGO_BIN_EXE_volsync"))
        .args(["--log-level", "error", "--format", "json", "simulate"])
        .arg(&sock)
        .args(["--count", "2"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("simulate should start");
    wait_for_socket(&sock, Duration::from_secs(5));

    let mut host = Command::new(env!("CARGO_BIN_EXE_volsync"))
        .args(["--log-level", "error", "run", "--endpoint"])
        .arg(&sock)
        .arg("--fixture")
        .arg(&fixture)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("run should start");

    let status = wait_for_exit(&mut simulator, Duration::from_secs(10));
    let _ = host.kill();
    let _ = host.wait();
    assert!(status.success());

    let mut stdout = String::new();
    simulator
        .stdout
        .take()
        .expect("stdout should be piped")
        .read_to_string(&mut stdout)
        .expect("stdout should be readable");
    let messages: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["kind"], "AddItem");
    assert_eq!(messages[0]["display_name"], "Speakers");
    assert_eq!(messages[0]["is_device"], true);
    assert_eq!(messages[1]["kind"], "Settings");
    let _ = std::fs::remove_dir_all(&dir);
}
