use std::env;

use anyhow::{anyhow, Context, Result};
use fansite::config::{ensure_workspace_structure, load_or_default, save};

fn main() -> Result<()> {
    let args = CliArgs::parse()?;
    let paths = ensure_workspace_structure()?;
    let config_path = paths.config_file();
    let mut config = load_or_default(&config_path)?;
    let mut changed = !config_path.exists();

    if let Some(port) = args.port {
        changed |= replace(&mut config.server.port, port);
    }
    if let Some(bind) = args.bind {
        changed |= replace(&mut config.server.bind_address, bind);
    }
    if let Some(limit) = args.max_image_bytes {
        changed |= replace(&mut config.uploads.max_image_bytes, limit);
    }

    if changed {
        save(&config, &config_path)?;
        println!("Site settings recorded at {}", config_path.display());
    } else {
        println!("Site settings already configured.");
    }
    println!(
        "Serving on {}:{}, media under {}",
        config.server.bind_address,
        config.server.port,
        paths.media_dir.display()
    );

    Ok(())
}

struct CliArgs {
    port: Option<u16>,
    bind: Option<String>,
    max_image_bytes: Option<usize>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut port = None;
        let mut bind = None;
        let mut max_image_bytes = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--port" => {
                    let value = args.next().context("Expected a port number after --port")?;
                    port = Some(
                        value
                            .parse()
                            .with_context(|| format!("Invalid port '{value}'"))?,
                    );
                }
                "--bind" => {
                    let value = args.next().context("Expected an address after --bind")?;
                    bind = Some(value);
                }
                "--max-image-bytes" => {
                    let value = args
                        .next()
                        .context("Expected a byte count after --max-image-bytes")?;
                    max_image_bytes = Some(
                        value
                            .parse()
                            .with_context(|| format!("Invalid byte count '{value}'"))?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument '{other}'. Run with --help for usage instructions."
                    ));
                }
            }
        }
        Ok(Self {
            port,
            bind,
            max_image_bytes,
        })
    }
}

fn print_usage() {
    println!("Fansite setup");
    println!("Creates the site directories and records settings in config.toml.");
    println!("Usage: cargo run --bin setup -- [options]");
    println!("Options:");
    println!("  --port <number>            Listen port (default: 8000)");
    println!("  --bind <address>           Listen address (default: 127.0.0.1)");
    println!("  --max-image-bytes <bytes>  Largest accepted profile photo (default: 5242880)");
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
