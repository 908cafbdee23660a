//! Writes one message line into the notification daemon's intake pipe.

use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send one message to the notification daemon", long_about = None)]
struct Cli {
    /// Raw message line: a control literal such as "pause", a JSON
    /// notification object, or a legacy identifier such as "level:5".
    message: String,

    /// Intake pipe path (defaults to ~/.notiq.fifo).
    #[arg(long, value_name = "PATH")]
    pipe: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.message.contains('\n') {
        bail!("message must be a single line");
    }

    let pipe = match cli.pipe {
        Some(path) => path,
        None => dirs::home_dir()
            .context("cannot locate home directory")?
            .join(".notiq.fifo"),
    };

    // Non-blocking write-only open fails with ENXIO instead of hanging when
    // no reader holds the pipe.
    let mut fifo = std::fs::OpenOptions::new()
        .write(true)
        .custom_flags(nix::fcntl::OFlag::O_NONBLOCK.bits())
        .open(&pipe)
        .with_context(|| format!("opening {} (is the daemon running?)", pipe.display()))?;
    writeln!(fifo, "{}", cli.message)
        .with_context(|| format!("writing to {}", pipe.display()))?;

    Ok(())
}
