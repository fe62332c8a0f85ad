//! Orogen Run - executes a compiled terrain script artifact.
//!
//! Loads a precompiled `.ogn` artifact, resolves its declared arguments
//! against `--arg` overrides, runs one generation, and writes every output
//! map as a 16-bit PGM file.

use std::cell::RefCell;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orogen_foundation::{Height, Size2D};
use orogen_runtime::{
    decode_script, ArgValue, Generator, GeneratorConfig, MapConsumer, ProgressSink, ScriptArg,
    ScriptArgKind,
};

#[derive(Parser, Debug)]
#[command(name = "orogen-run")]
#[command(about = "Run a compiled Orogen terrain script and write its maps to disk")]
struct Cli {
    /// Path to a compiled script artifact (.ogn)
    artifact: PathBuf,

    /// Seed for the generation's random stream
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Evaluate the graph in tiles of this size (WxH) instead of whole-map
    #[arg(long, value_parser = parse_size)]
    tile: Option<Size2D>,

    /// Fail the run if the script's map exceeds this size (WxH)
    #[arg(long, value_parser = parse_size)]
    max_size: Option<Size2D>,

    /// Fail the run if the script creates more maps than this
    #[arg(long)]
    max_count: Option<u32>,

    /// Directory to write output maps into
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Script argument override, NAME=VALUE; repeatable
    #[arg(long = "arg", value_parser = parse_override)]
    args: Vec<(String, String)>,
}

/// Parse a `WxH` dimension pair.
fn parse_size(text: &str) -> Result<Size2D, String> {
    let (w, h) = text
        .split_once('x')
        .ok_or_else(|| format!("expected WxH, got {text:?}"))?;
    let width: u32 = w.parse().map_err(|_| format!("bad width {w:?}"))?;
    let height: u32 = h.parse().map_err(|_| format!("bad height {h:?}"))?;
    if width == 0 || height == 0 {
        return Err(format!("dimensions must be positive, got {text:?}"));
    }
    Ok(Size2D::new(width, height))
}

/// Parse a `NAME=VALUE` argument override.
fn parse_override(text: &str) -> Result<(String, String), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {text:?}"))?;
    if name.is_empty() {
        return Err(format!("empty argument name in {text:?}"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Match `--arg` overrides against the script's declared argument list.
///
/// Declared arguments missing an override fall back to their defaults;
/// overrides naming no declared argument are an error.
fn resolve_overrides(
    declared: &[ScriptArg],
    supplied: &[(String, String)],
) -> Result<Vec<ArgValue>, String> {
    for (name, _) in supplied {
        if !declared.iter().any(|arg| &arg.name == name) {
            let known: Vec<&str> = declared.iter().map(|arg| arg.name.as_str()).collect();
            return Err(format!(
                "script declares no argument {name:?} (declared: {known:?})"
            ));
        }
    }
    declared
        .iter()
        .map(|arg| {
            let supplied = supplied
                .iter()
                .find(|(name, _)| name == &arg.name)
                .map(|(_, value)| value.as_str());
            match (&arg.kind, supplied) {
                (ScriptArgKind::Number { default, .. }, None) => Ok(ArgValue::Number(*default)),
                (ScriptArgKind::Number { .. }, Some(text)) => text
                    .parse()
                    .map(ArgValue::Number)
                    .map_err(|_| format!("argument {:?} expects a number, got {text:?}", arg.name)),
                (ScriptArgKind::Boolean { default }, None) => Ok(ArgValue::Boolean(*default)),
                (ScriptArgKind::Boolean { .. }, Some(text)) => match text {
                    "true" => Ok(ArgValue::Boolean(true)),
                    "false" => Ok(ArgValue::Boolean(false)),
                    _ => Err(format!(
                        "argument {:?} expects true or false, got {text:?}",
                        arg.name
                    )),
                },
            }
        })
        .collect()
}

/// Encode one height map as a binary 16-bit PGM (P5, maxval 65535).
///
/// Heights are biased by 32768 so the full signed range maps onto the
/// format's unsigned gray scale.
fn pgm_bytes(cells: &[Height], width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(cells.len() * 2 + 32);
    write!(bytes, "P5\n{width} {height}\n65535\n").expect("writing to a Vec cannot fail");
    for &cell in cells {
        let gray = (cell as i32 + 32768) as u16;
        bytes.extend_from_slice(&gray.to_be_bytes());
    }
    bytes
}

/// Map consumer writing each finished output as `<dir>/<name>.pgm`.
struct PgmWriter {
    dir: PathBuf,
    written: u32,
    failures: u32,
}

impl PgmWriter {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            written: 0,
            failures: 0,
        }
    }
}

impl MapConsumer for PgmWriter {
    fn map_ready(&mut self, name: &str, cells: &[Height], width: u32, height: u32) {
        let path = self.dir.join(format!("{name}.pgm"));
        match fs::write(&path, pgm_bytes(cells, width, height)) {
            Ok(()) => {
                info!("wrote {} ({width}x{height})", path.display());
                self.written += 1;
            }
            Err(e) => {
                error!("failed to write {}: {e}", path.display());
                self.failures += 1;
            }
        }
    }
}

/// Progress sink logging step completion at debug level.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&mut self, current: u32, max: u32) {
        debug!(current, max, "render progress");
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orogen_run=info,orogen_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Loading artifact from: {}", cli.artifact.display());
    let bytes = match fs::read(&cli.artifact) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read {}: {e}", cli.artifact.display());
            std::process::exit(1);
        }
    };
    let artifact = match decode_script(&bytes) {
        Ok(artifact) => artifact,
        Err(e) => {
            error!("Failed to decode artifact: {e}");
            std::process::exit(1);
        }
    };

    let mut generator = Generator::new(GeneratorConfig {
        max_map_size: cli.max_size,
        max_map_count: cli.max_count,
        tile_size: cli.tile,
    });
    generator.set_seed(cli.seed);
    generator.set_progress_sink(Box::new(LogProgress));
    let writer = Rc::new(RefCell::new(PgmWriter::new(&cli.out)));
    generator.set_map_consumer(Box::new(writer.clone()));

    generator.load_script(artifact);
    let declared = match generator.load_args() {
        Ok(Some(declared)) => declared.to_vec(),
        Ok(None) => {
            error!("Script has no \"args\" entry point and cannot be generated");
            std::process::exit(1);
        }
        Err(_) => {
            // Already reported through the message sink with its location.
            std::process::exit(1);
        }
    };

    let values = match resolve_overrides(&declared, &cli.args) {
        Ok(values) => values,
        Err(message) => {
            error!("{message}");
            std::process::exit(1);
        }
    };

    info!("Generating (seed {})", cli.seed);
    if generator.generate(&values).is_err() {
        std::process::exit(1);
    }

    let writer = writer.borrow();
    info!("Done: {} map(s) written to {}", writer.written, cli.out.display());
    if writer.failures > 0 {
        std::process::exit(1);
    }
}
