use std::path::PathBuf;

use clap::Parser;
use retrohost_vfs::ContentPath;
use tracing::Level;

/// Headless libretro host
#[derive(Parser, Debug)]
#[command(name = "retrohost", author, version, about, long_about = None)]
pub struct Args {
    /// Core library, or an addon directory containing addon.xml
    #[arg(required = true)]
    pub core: PathBuf,

    /// Game to load. Archive members are written as zip://<archive>#<entry>
    #[arg(required = true)]
    pub game: ContentPath,

    /// Number of frames to run
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Frames to rewind once the run is over
    #[arg(long)]
    pub rewind: Option<usize>,

    /// Seconds of rewind history to keep
    #[arg(long, default_value_t = retrohost_runtime::DEFAULT_REWIND_SECONDS)]
    pub rewind_seconds: f64,

    /// Try in-memory loading before handing the core a path
    #[arg(long)]
    pub prefer_vfs: bool,

    /// Keep "zip" in the core's extension list
    #[arg(long)]
    pub allow_zip: bool,

    /// Run frames back to back instead of at the core's frame rate
    #[arg(long)]
    pub unpaced: bool,

    /// Directory answered to GET_SYSTEM_DIRECTORY
    #[arg(long)]
    pub system_dir: Option<PathBuf>,

    /// Core option, may be repeated
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: Level,
}

fn parse_variable(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
