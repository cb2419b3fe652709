use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;

fn create_test_file(name: &str, content: &str) -> PathBuf {
    let tmp_dir = PathBuf::from("tmp");
    fs::create_dir_all(&tmp_dir).ok();
    let path = tmp_dir.join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

fn run_gpiofsk(args: &[&str]) -> (Output, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_gpiofsk"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute gpiofsk");

    let text =
        String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout);
    (output, text)
}

#[test]
fn test_loopback_default_credential_authenticates() {
    let (output, text) = run_gpiofsk(&["loopback"]);

    assert!(output.status.success(), "loopback failed: {}", text);
    assert!(text.contains("[AUTHENTICATED]"), "Expected authentication but got: {}", text);
    assert!(text.contains("Decoded message: x4ef"), "Unexpected output: {}", text);
}

#[test]
fn test_loopback_wrong_credential_rejected() {
    let (output, text) = run_gpiofsk(&["loopback", "--message", "nope"]);

    assert!(output.status.success(), "loopback failed: {}", text);
    assert!(
        text.contains("[FAIL] Received password: nope"),
        "Expected rejection but got: {}",
        text
    );
}

#[test]
fn test_loopback_custom_credential() {
    let (output, text) = run_gpiofsk(&["--credential", "abc", "loopback", "--message", "abc"]);

    assert!(output.status.success(), "loopback failed: {}", text);
    assert!(text.contains("[AUTHENTICATED]"), "Unexpected output: {}", text);
}

#[test]
fn test_loopback_character_mode() {
    let (output, text) = run_gpiofsk(&["loopback", "--mode", "character", "--message", "Hi5"]);

    assert!(output.status.success(), "loopback failed: {}", text);
    assert!(text.contains("Received string: Hi5"), "Missing decoder log: {}", text);
    assert!(text.contains("Decoded message: Hi5"), "Unexpected output: {}", text);
}

#[test]
fn test_config_file_applied() {
    let config = create_test_file(
        "gpiofsk_character.json",
        r#"{ "mode": "character", "bit_ms": 20, "credential": "Go" }"#,
    );

    let (output, text) = run_gpiofsk(&["--config", config.to_str().unwrap(), "loopback"]);

    assert!(output.status.success(), "loopback failed: {}", text);
    assert!(text.contains("Decoded message: Go"), "Unexpected output: {}", text);
    assert!(text.contains("[AUTHENTICATED]"), "Unexpected output: {}", text);
}

#[test]
fn test_malformed_config_file_rejected() {
    let config = create_test_file("gpiofsk_bad.json", r#"{ "baud": 9600 }"#);

    let (output, text) = run_gpiofsk(&["--config", config.to_str().unwrap(), "loopback"]);

    assert!(!output.status.success(), "Expected failure but got: {}", text);
    assert!(text.contains("Config"), "Expected config error but got: {}", text);
}

#[test]
fn test_overlapping_tolerance_rejected() {
    let (output, text) = run_gpiofsk(&["--tolerance", "80", "loopback"]);

    assert!(!output.status.success(), "Expected failure but got: {}", text);
    assert!(text.contains("InvalidConfig"), "Expected config error but got: {}", text);
}

#[test]
fn test_unknown_mode_rejected() {
    let (output, text) = run_gpiofsk(&["--mode", "morse", "loopback"]);

    assert!(!output.status.success(), "Expected failure but got: {}", text);
    assert!(text.contains("morse"), "Unexpected output: {}", text);
}

#[test]
fn test_transmit_without_daemon_fails() {
    let (output, text) = run_gpiofsk(&["--pigpio", "127.0.0.1:1", "transmit", "--message", "x4ef"]);

    assert!(!output.status.success(), "Expected failure but got: {}", text);
    assert!(
        text.contains("cannot reach pigpio daemon"),
        "Expected connection error but got: {}",
        text
    );
}

/// Answer every pigpio command with 0 until the client hangs up
fn serve_commands(mut stream: TcpStream) {
    let mut header = [0u8; 16];
    while stream.read_exact(&mut header).is_ok() {
        let ext_len = u32::from_le_bytes([header[12], header[13], header[14], header[15]]);
        let mut ext = vec![0u8; ext_len as usize];
        if stream.read_exact(&mut ext).is_err() {
            break;
        }
        header[12..16].copy_from_slice(&0i32.to_le_bytes());
        if stream.write_all(&header).is_err() {
            break;
        }
    }
}

#[test]
fn test_link_fails_before_receiving_when_output_unreachable() {
    // accept the receiver's control and notification connections, then stop listening
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let daemon = thread::spawn(move || {
        let mut workers = Vec::new();
        for _ in 0..2 {
            let (stream, _) = listener.accept().unwrap();
            workers.push(thread::spawn(move || serve_commands(stream)));
        }
        drop(listener);
        for worker in workers {
            worker.join().unwrap();
        }
    });

    let output = Command::new(env!("CARGO_BIN_EXE_gpiofsk"))
        .args(["--pigpio", &addr, "link"])
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute gpiofsk");
    let text =
        String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "Expected failure but got: {}", text);
    assert!(
        !text.contains("Receiver started"),
        "Receive loop ran before startup finished: {}",
        text
    );
    daemon.join().unwrap();
}
