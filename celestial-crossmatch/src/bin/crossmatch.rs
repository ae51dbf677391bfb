use anyhow::Context;
use celestial_catalog::{Registry, ScsClient};
use celestial_crossmatch::{write_fits, write_plot, Crossmatch, CrossmatchConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const PREVIEW_ROWS: usize = 5;

#[derive(Parser)]
#[command(name = "crossmatch")]
#[command(about = "Cross-match sky catalogues around a cone by nearest neighbour")]
#[command(version, allow_negative_numbers = true)]
struct Cli {
    /// Cone centre right ascension in degrees
    ra: Option<f64>,
    /// Cone centre declination in degrees
    dec: Option<f64>,
    /// Cone radius in degrees
    radius: Option<f64>,

    /// Reference catalogue
    #[arg(long = "ref-catalogue")]
    ref_catalogue: Option<String>,

    /// Candidate catalogue(s) to match against the reference
    #[arg(long = "match-catalogue", num_args = 1..)]
    match_catalogue: Vec<String>,

    /// Maximum separation in degrees for every candidate
    #[arg(long)]
    max_separation: Option<f64>,

    /// Maximum separation for one candidate, as NAME=DEG
    #[arg(long = "max-separation-for", value_parser = parse_override)]
    max_separation_for: Vec<(String, f64)>,

    /// Output FITS file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a diagnostic plot
    #[arg(short, long)]
    plot: bool,

    /// Path of the diagnostic plot
    #[arg(long)]
    plot_path: Option<PathBuf>,

    /// JSON configuration file; command-line values take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file of extra or replacement catalogue definitions
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Per-query timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Query catalogues concurrently
    #[arg(long)]
    parallel: bool,

    /// Drop candidate catalogues with no sources instead of failing
    #[arg(long)]
    skip_empty: bool,

    /// List known catalogues and exit
    #[arg(long)]
    list_catalogues: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_override(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=DEG, got '{}'", s))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid separation '{}': {}", value, e))?;
    Ok((name.trim().to_string(), value))
}

impl Cli {
    fn apply(self, config: &mut CrossmatchConfig) {
        if let Some(ra) = self.ra {
            config.ra_deg = ra;
        }
        if let Some(dec) = self.dec {
            config.dec_deg = dec;
        }
        if let Some(radius) = self.radius {
            config.radius_deg = radius;
        }
        if let Some(reference) = self.ref_catalogue {
            config.reference = reference;
        }
        if !self.match_catalogue.is_empty() {
            config.candidates = self.match_catalogue;
        }
        if let Some(max_sep) = self.max_separation {
            config.max_separation_deg = max_sep;
        }
        config.max_separation_overrides.extend(self.max_separation_for);
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(plot_path) = self.plot_path {
            config.plot_path = plot_path;
            config.plot = true;
        }
        if let Some(registry) = self.registry {
            config.registry = Some(registry);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        config.plot |= self.plot;
        config.parallel_queries |= self.parallel;
        config.skip_empty_candidates |= self.skip_empty;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => CrossmatchConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => CrossmatchConfig::default(),
    };
    let list_catalogues = cli.list_catalogues;
    cli.apply(&mut config);

    let mut registry = Registry::builtin();
    if let Some(path) = &config.registry {
        let extra = Registry::load(path).with_context(|| format!("Failed to load registry {:?}", path))?;
        registry.extend(extra);
    }

    if list_catalogues {
        for catalogue in registry.iter() {
            println!(
                "{:<12} {}  (RA={}, Dec={})",
                catalogue.name, catalogue.endpoint, catalogue.ra_column, catalogue.dec_column
            );
        }
        return Ok(());
    }

    let crossmatch = Crossmatch::new(config, registry)?;
    let config = crossmatch.config();
    let client = ScsClient::with_timeout(Duration::from_secs(config.timeout_secs))?;

    let start = Instant::now();
    let run = crossmatch.run(&client)?;
    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "queries and matching finished");

    write_fits(&run.filtered.table, &config.output)
        .with_context(|| format!("Failed to write {:?}", config.output))?;

    println!(
        "Matched {} of {} {} sources within the separation limits",
        run.filtered.len(),
        run.joined.len(),
        config.reference
    );
    for name in &run.skipped {
        println!("Skipped {}: no sources in the cone", name);
    }
    println!();
    println!("{}", run.filtered.table.preview(PREVIEW_ROWS));
    println!();
    println!("Columns: {}", run.filtered.table.column_names().join(", "));
    println!("Wrote {}", config.output.display());

    if config.plot {
        write_plot(&run.filtered, &config.plot_path)
            .with_context(|| format!("Failed to write plot {:?}", config.plot_path))?;
        println!("Wrote {}", config.plot_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_override() {
        assert_eq!(parse_override("GAIA_DR3=0.001").unwrap(), ("GAIA_DR3".to_string(), 0.001));
        assert!(parse_override("GAIA_DR3").is_err());
        assert!(parse_override("GAIA_DR3=abc").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "crossmatch",
            "10.5",
            "-30",
            "0.2",
            "--match-catalogue",
            "GAIA_DR3",
            "2MASS",
            "--max-separation-for",
            "2MASS=0.002",
            "-p",
        ])
        .unwrap();
        let mut config = CrossmatchConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.ra_deg, 10.5);
        assert_eq!(config.dec_deg, -30.0);
        assert_eq!(config.radius_deg, 0.2);
        assert_eq!(config.candidates, vec!["GAIA_DR3", "2MASS"]);
        assert_eq!(config.thresholds()["2MASS"], 0.002);
        assert!(config.plot);
        assert_eq!(config.reference, "LOTSS_DR2");
    }

    #[test]
    fn test_cli_defaults_leave_config_alone() {
        let cli = Cli::try_parse_from(["crossmatch"]).unwrap();
        let mut config = CrossmatchConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, CrossmatchConfig::default());
    }
}
