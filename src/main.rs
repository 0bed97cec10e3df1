//! Binary entrypoint for the bridge.
//!
//! ```text
//! rfc2217-bridge <serial device> <tcp port> [-c bridge.toml] [-v|-vv] [--boot-profile usb-jtag]
//! rfc2217-bridge --write-config bridge.toml
//! ```
//!
//! See the library crate docs for module-level details: `rfc2217_bridge::`.
use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info};

use rfc2217_bridge::bridge::Bridge;
use rfc2217_bridge::config::{log_level, Config};
use rfc2217_bridge::serial::BootProfile;

#[derive(Parser)]
#[command(name = "rfc2217-bridge")]
#[command(about = "Telnet/RFC 2217 to serial bridge with ESP32 boot-mode control")]
#[command(version)]
struct Cli {
    /// Serial device (e.g., /dev/ttyUSB0)
    #[arg(required_unless_present = "write_config")]
    device: Option<String>,

    /// TCP port to listen on
    #[arg(required_unless_present = "write_config")]
    port: Option<u16>,

    /// Write a default configuration file to this path and exit
    #[arg(long, value_name = "PATH", conflicts_with = "config")]
    write_config: Option<String>,

    /// Configuration file path; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Boot-mode line profile: transistor or usb-jtag (overrides the config file)
    #[arg(long)]
    boot_profile: Option<BootProfile>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Some(path) = &cli.write_config {
        Config::create_default(path).await?;
        println!("Configuration file created at {}", path);
        return Ok(());
    }
    let (Some(device), Some(port)) = (cli.device, cli.port) else {
        anyhow::bail!("a serial device and a TCP port are required");
    };

    let mut config = match &cli.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    if let Some(profile) = cli.boot_profile {
        config.boot.profile = profile;
        config.boot.custom = None;
    }
    config.validate()?;

    init_logging(&config, cli.verbose);
    info!("Starting rfc2217-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Serial device {} (boot profile {})",
        device,
        if config.boot.custom.is_some() {
            "custom"
        } else {
            config.boot.profile.name()
        }
    );

    let bridge = Bridge::bind(&config, &device, port).await?;
    if let Err(e) = bridge.run().await {
        error!("Bridge stopped: {}", e);
        return Err(e.into());
    }
    info!("Bridge stopped");
    Ok(())
}

fn init_logging(config: &Config, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides config
    let base_level = match verbosity {
        0 => log_level(&config.logging.level).unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.logging.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground runs still see the log on the console
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
