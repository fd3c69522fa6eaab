//! serial_term: minimal terminal over a serialwire connection.
//!
//! Prints what the port sends (lines, or hex chunks with `--hex`) and
//! forwards each stdin line to the port.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncBufReadExt as _;

use serialwire::settings::{default_profile_path, load_profile, save_profile};
use serialwire::{BaudRate, ModePreset, Parity, SerialConnection, SerialProfile};

#[derive(Parser)]
#[command(author, version, about = "Talk to a serial port through serialwire")]
struct Cli {
    /// Profile to start from (defaults to <config dir>/serialwire/profile.toml)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Device path, e.g. /dev/ttyUSB0
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate for both directions
    #[arg(short, long, value_parser = parse_baud)]
    baud: Option<BaudRate>,

    /// none, even or odd
    #[arg(long, value_parser = parse_parity)]
    parity: Option<Parity>,

    /// receive, transmit or receive_and_transmit
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<ModePreset>,

    /// Print raw chunks as hex instead of lines
    #[arg(long)]
    hex: bool,

    /// Line ending appended to each stdin line
    #[arg(long, default_value = "\n")]
    eol: String,

    /// Write the effective profile back before connecting
    #[arg(long)]
    save: bool,

    /// Also log to a timestamped file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Keep log output off stderr
    #[arg(short, long)]
    quiet: bool,
}

fn parse_baud(s: &str) -> Result<BaudRate, String> {
    let rate: u32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    BaudRate::try_from(rate)
}

fn parse_parity(s: &str) -> Result<Parity, String> {
    match s.to_ascii_lowercase().as_str() {
        "none" | "n" => Ok(Parity::None),
        "even" | "e" => Ok(Parity::Even),
        "odd" | "o" => Ok(Parity::Odd),
        _ => Err(format!("unknown parity '{}'", s)),
    }
}

fn parse_mode(s: &str) -> Result<ModePreset, String> {
    match s {
        "receive" | "rx" => Ok(ModePreset::Receive),
        "transmit" | "tx" => Ok(ModePreset::Transmit),
        "receive_and_transmit" | "rxtx" => Ok(ModePreset::ReceiveAndTransmit),
        _ => Err(format!("unknown mode '{}'", s)),
    }
}

fn effective_profile(cli: &Cli) -> Result<SerialProfile, String> {
    let profile_path = match &cli.profile {
        Some(path) => path.clone(),
        None => default_profile_path()?,
    };
    let mut profile = load_profile(&profile_path)?;

    if let Some(port) = &cli.port {
        profile.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        profile.settings.receive_rate = baud;
        profile.settings.transmit_rate = baud;
    }
    if let Some(parity) = cli.parity {
        profile.settings.parity = parity;
    }
    if let Some(mode) = cli.mode {
        profile.mode = mode;
    }

    if cli.save {
        save_profile(&profile_path, &profile)?;
        eprintln!("Saved profile to {}", profile_path.display());
    }
    Ok(profile)
}

async fn print_lines(conn: &SerialConnection) -> Result<(), String> {
    let lines = conn.lines().map_err(|e| e.to_string())?;
    while let Some(line) = lines.next().await {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(line.as_bytes());
        let _ = stdout.flush();
    }
    Ok(())
}

async fn print_hex(conn: &SerialConnection) -> Result<(), String> {
    let chunks = conn.raw_chunks().map_err(|e| e.to_string())?;
    while let Some(chunk) = chunks.next().await {
        println!("{}", hex::encode(&chunk));
    }
    Ok(())
}

async fn forward_stdin(conn: Arc<SerialConnection>, profile: &SerialProfile, eol: &str) -> Result<(), String> {
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = stdin.next_line().await.map_err(|e| format!("stdin: {}", e))? {
        let text = format!("{}{}", line, eol);
        let encoding = profile.encoding;
        let conn = conn.clone();

        // Writes block until the port drains or times out
        tokio::task::spawn_blocking(move || conn.write_string(&text, encoding))
            .await
            .map_err(|e| format!("writer task failed: {}", e))?
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    if cli.quiet {
        serialwire::logging::set_stderr_logging(false);
    }
    if let Some(dir) = &cli.log_dir {
        serialwire::logging::init_file_logging(dir)?;
    }

    let profile = effective_profile(&cli)?;
    let mode = profile.mode.open_mode();

    let conn = Arc::new(SerialConnection::new(&profile.port));
    conn.open(mode)
        .map_err(|e| format!("{}: {}", profile.port, e))?;
    conn.set_settings(&profile.settings)
        .map_err(|e| format!("{}: {}", profile.port, e))?;

    eprintln!("Connected to {} at {}", profile.port, profile.settings.summary());

    let reader = if mode.access.can_read() {
        let conn = conn.clone();
        let hex = cli.hex;
        Some(tokio::spawn(async move {
            if hex {
                print_hex(&conn).await
            } else {
                print_lines(&conn).await
            }
        }))
    } else {
        None
    };

    let result = if mode.access.can_write() {
        forward_stdin(conn.clone(), &profile, &cli.eol).await
    } else if let Some(reader) = reader {
        // Receive-only: run until the process is interrupted
        reader.await.map_err(|e| format!("reader task failed: {}", e))?
    } else {
        Ok(())
    };

    conn.close();
    serialwire::logging::stop_file_logging();
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("serial_term: {}", e);
        std::process::exit(1);
    }
}
