//! Loading, writing and validating configuration files on disk.
use rfc2217_bridge::config::Config;
use rfc2217_bridge::serial::{BootProfile, LineOp};
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn load_full_file() {
    let file = write_config(
        r#"
[serial]
default_baud = 115200
read_timeout_ms = 50
write_max_attempts = 20
write_retry_delay_ms = 5

[telnet]
bind_address = "0.0.0.0"
max_command_len = 512

[boot]
profile = "usb-jtag"

[logging]
level = "debug"
file = "bridge.log"
"#,
    );
    let config = Config::load(file.path().to_str().unwrap()).await.unwrap();
    tokio_test::assert_ok!(config.validate());
    assert_eq!(config.serial.read_timeout_ms, 50);
    assert_eq!(config.serial.write_policy().max_attempts, 20);
    assert_eq!(config.telnet.bind_address, "0.0.0.0");
    assert_eq!(config.telnet.max_command_len, 512);
    assert_eq!(config.boot.profile, BootProfile::UsbJtag);
    assert_eq!(config.logging.file.as_deref(), Some("bridge.log"));
}

#[tokio::test]
async fn load_custom_boot_sequence() {
    let file = write_config(
        r#"
[boot.custom]
normal = [{ dtr = false }, { rts = false }]
bootloader = [{ rts = true }, { dtr = true }, { delay_ms = 20 }, { rts = false }, { dtr = false }]
reset = [{ rts = true }, { delay_ms = 20 }, { rts = false }]
"#,
    );
    let config = Config::load(file.path().to_str().unwrap()).await.unwrap();
    tokio_test::assert_ok!(config.validate());
    let seq = config.boot.sequences();
    assert_eq!(seq.reset, vec![LineOp::Rts(true), LineOp::DelayMs(20), LineOp::Rts(false)]);
    assert_eq!(seq.bootloader.len(), 5);
}

#[tokio::test]
async fn create_default_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.toml");
    let path = path.to_str().unwrap();

    tokio_test::assert_ok!(Config::create_default(path).await);
    let config = Config::load(path).await.unwrap();
    tokio_test::assert_ok!(config.validate());
    assert_eq!(config.serial.default_baud, 115_200);
    assert_eq!(config.boot.profile, BootProfile::Transistor);
    assert!(config.boot.custom.is_none());
}

#[tokio::test]
async fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    tokio_test::assert_err!(Config::load(path.to_str().unwrap()).await);
}

#[tokio::test]
async fn malformed_file_is_an_error() {
    let file = write_config("[serial]\ndefault_baud = \"fast\"\n");
    let err = Config::load(file.path().to_str().unwrap()).await.unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[tokio::test]
async fn unknown_profile_is_rejected_on_load() {
    let file = write_config("[boot]\nprofile = \"relay\"\n");
    tokio_test::assert_err!(Config::load(file.path().to_str().unwrap()).await);
}

#[tokio::test]
async fn validation_catches_empty_custom_sequence() {
    let file = write_config(
        r#"
[boot.custom]
normal = []
bootloader = [{ dtr = true }]
reset = [{ rts = true }]
"#,
    );
    let config = Config::load(file.path().to_str().unwrap()).await.unwrap();
    tokio_test::assert_err!(config.validate());
}
