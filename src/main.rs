use anyhow::Context;
use sonora::audio::{self, FileOpener};
use sonora::config::{self, ConfigPaths};
use sonora::controller::ControllerOptions;
use sonora::shell::{Shell, ShellOptions};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Default)]
struct CliArgs {
    music: Option<PathBuf>,
    config: Option<PathBuf>,
    silent: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sonora=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let paths = match args.config {
        Some(root) => {
            fs::create_dir_all(&root)
                .with_context(|| format!("failed to create {}", root.display()))?;
            ConfigPaths::new(root)
        }
        None => ConfigPaths::resolve()?,
    };
    let music_root = args
        .music
        .or_else(config::default_music_dir)
        .context("no music folder found, pass --music <dir>")?;
    if !music_root.is_dir() {
        anyhow::bail!("music folder {} does not exist", music_root.display());
    }

    let mut shell = Shell::new(
        ShellOptions {
            music_root,
            paths,
            controller: ControllerOptions::default(),
        },
        Arc::new(FileOpener),
        audio::select_backend(args.silent),
    )?;
    shell.run(io::stdin().lock(), io::stdout())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--music" => {
                index += 1;
                out.music = Some(path_value(&args, index, "--music")?);
            }
            "--config" => {
                index += 1;
                out.config = Some(path_value(&args, index, "--config")?);
            }
            "--silent" => out.silent = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn path_value(args: &[String], index: usize, flag: &str) -> anyhow::Result<PathBuf> {
    let Some(value) = args.get(index) else {
        anyhow::bail!("{flag} requires a directory");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(PathBuf::from(value.trim()))
}

fn print_help() {
    println!("sonora");
    println!("  --music <dir>     Folder scanned for .mp3 files (default ~/Music)");
    println!("  --config <dir>    Settings and play counts (default ~/.config/sonora)");
    println!("  --silent          Play without an audio device");
    println!("  RUST_LOG          Log filter, e.g. sonora=debug");
}
