use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rank_core::catalog::record_from_json;
use rank_core::persist::{load_catalog, save_catalog, save_meta, CatalogPaths, MetaFile, SNAPSHOT_VERSION};
use rank_core::{CatalogRecord, FilterCriteria, RankingOptions, RankingPipeline, ScoredRecord, WeightVector};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ranker")]
#[command(about = "Build catalog snapshots and rank them against weighted preferences", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a catalog snapshot from JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output snapshot directory
        #[arg(long)]
        output: String,
    },
    /// Rank a catalog snapshot
    Rank {
        /// Snapshot directory
        #[arg(long, default_value = "./catalog")]
        catalog: String,
        /// JSON file with a weight vector
        #[arg(long)]
        weights: Option<PathBuf>,
        /// Override one weight, e.g. `--weight battery=9` or `--weight price=10`
        #[arg(long = "weight", value_parser = parse_weight)]
        weight_overrides: Vec<(String, f64)>,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        /// Allowed brand (repeatable)
        #[arg(long = "brand")]
        brands: Vec<String>,
        /// Allowed display size bucket in inches (repeatable)
        #[arg(long = "display-size")]
        display_sizes: Vec<u32>,
        /// GPU substring, case-insensitive (repeatable)
        #[arg(long = "gpu")]
        gpus: Vec<String>,
        /// Treat price as a filter only, never as a scored dimension
        #[arg(long, default_value_t = false)]
        exclude_price: bool,
        /// Round catalog price bounds outward to whole hundreds
        #[arg(long, default_value_t = false)]
        round_price_bounds: bool,
        /// Show at most this many results
        #[arg(long, default_value_t = 20)]
        top: usize,
        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print brands, GPU families and price bounds of a snapshot as JSON
    Facets {
        #[arg(long, default_value = "./catalog")]
        catalog: String,
        #[arg(long, default_value_t = false)]
        round_price_bounds: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => build_snapshot(&input, &output),
        Commands::Rank {
            catalog,
            weights,
            weight_overrides,
            min_price,
            max_price,
            brands,
            display_sizes,
            gpus,
            exclude_price,
            round_price_bounds,
            top,
            json,
        } => {
            let records = load_catalog(&CatalogPaths::new(&catalog))?;
            let weights = load_weights(weights.as_deref(), &weight_overrides)?;
            let options = RankingOptions { include_price: !exclude_price, round_price_bounds };
            let pipeline = RankingPipeline::new(options);

            let mut filters = FilterCriteria::new();
            if min_price.is_some() || max_price.is_some() {
                let bounds = pipeline.facets(&records).price;
                let lo = min_price.or(bounds.map(|b| b.min)).unwrap_or(0.0);
                let hi = max_price.or(bounds.map(|b| b.max)).unwrap_or(f64::MAX);
                filters = filters.with_price(lo, hi);
            }
            filters.brands.extend(brands);
            filters.display_sizes.extend(display_sizes);
            filters.gpus.extend(gpus);

            let ranked = pipeline.rank(&records, &weights, &filters);
            tracing::info!(matched = ranked.len(), catalog = records.len(), "ranked");
            let shown = &ranked[..ranked.len().min(top)];
            if json {
                println!("{}", serde_json::to_string_pretty(shown)?);
            } else {
                print_table(shown);
            }
            Ok(())
        }
        Commands::Facets { catalog, round_price_bounds } => {
            let records = load_catalog(&CatalogPaths::new(&catalog))?;
            let options = RankingOptions { round_price_bounds, ..RankingOptions::default() };
            let facets = RankingPipeline::new(options).facets(&records);
            println!("{}", serde_json::to_string_pretty(&facets)?);
            Ok(())
        }
    }
}

fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s.split_once('=').ok_or_else(|| format!("expected name=value, got {s:?}"))?;
    let value: f64 = value.trim().parse().map_err(|e| format!("bad weight {value:?}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn load_weights(file: Option<&Path>, overrides: &[(String, f64)]) -> Result<WeightVector> {
    let mut weights = match file {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            serde_json::from_reader(BufReader::new(f))?
        }
        None => WeightVector::neutral(),
    };
    for (name, value) in overrides {
        weights.set_named(name, *value)?;
    }
    weights.validate()?;
    Ok(weights)
}

fn print_table(ranked: &[ScoredRecord<'_>]) {
    println!("{:>4}  {:>7}  {:>6}  {:>9}  {:<12}  {}", "#", "score", "value", "price", "brand", "name");
    for (i, s) in ranked.iter().enumerate() {
        let name = if s.record.name.is_empty() { &s.record.id } else { &s.record.name };
        println!(
            "{:>4}  {:>7.2}  {:>6.2}  {:>9.2}  {:<12}  {}",
            i + 1,
            s.weighted_score,
            s.price_score,
            s.record.price,
            s.record.brand,
            name
        );
    }
}

fn build_snapshot(input: &str, output: &str) -> Result<()> {
    let input_path = Path::new(input);
    let out_paths = CatalogPaths::new(output);
    fs::create_dir_all(&out_paths.root)?;
    let ingested_at = OffsetDateTime::now_utc();

    let files = collect_inputs(input_path);
    if files.is_empty() {
        bail!("no .json or .jsonl input found at {input}");
    }

    let mut records: Vec<CatalogRecord> = Vec::new();
    for file in files {
        let ext = file.extension().and_then(|s| s.to_str());
        let before = records.len();
        if ext == Some("jsonl") {
            ingest_jsonl(&file, ingested_at, &mut records)?;
        } else {
            ingest_json(&file, ingested_at, &mut records)?;
        }
        tracing::debug!(file = %file.display(), records = records.len() - before, "ingested file");
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for r in &records {
        if !seen.insert(r.id.as_str()) {
            bail!("duplicate record id {}", r.id);
        }
    }

    save_catalog(&out_paths, &records)?;
    let meta = MetaFile {
        num_records: u32::try_from(records.len()).context("too many records for one snapshot")?,
        created_at: ingested_at.format(&Rfc3339)?,
        version: SNAPSHOT_VERSION,
    };
    save_meta(&out_paths, &meta)?;

    tracing::info!(output, num_records = records.len(), "snapshot build complete");
    Ok(())
}

/// Input files in a stable order so the catalog order, and with it tie-breaks, is reproducible.
fn collect_inputs(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

fn ingest_jsonl(file: &Path, ingested_at: OffsetDateTime, records: &mut Vec<CatalogRecord>) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let value: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        records.push(record_from_json(value, ingested_at).with_context(|| format!("{}:{}", file.display(), lineno + 1))?);
    }
    Ok(())
}

fn ingest_json(file: &Path, ingested_at: OffsetDateTime, records: &mut Vec<CatalogRecord>) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                records.push(record_from_json(v, ingested_at).with_context(|| file.display().to_string())?);
            }
        }
        serde_json::Value::Object(_) => {
            records.push(record_from_json(json, ingested_at).with_context(|| file.display().to_string())?);
        }
        _ => tracing::warn!(file = %file.display(), "skipping non-object JSON input"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rank_core::persist::load_snapshot;
    use tempfile::tempdir;

    #[test]
    fn parses_weight_overrides() {
        assert_eq!(parse_weight("battery=9").unwrap(), ("battery".to_string(), 9.0));
        assert!(parse_weight("battery").is_err());
        assert!(parse_weight("battery=lots").is_err());
    }

    #[test]
    fn weights_from_overrides_are_validated() {
        let w = load_weights(None, &[("price".into(), 10.0)]).unwrap();
        assert_eq!(w.price, Some(10.0));
        assert!(load_weights(None, &[("audio".into(), 12.0)]).is_err());
    }

    #[test]
    fn builds_snapshot_from_mixed_inputs() {
        let input = tempdir().unwrap();
        fs::write(
            input.path().join("a.json"),
            r#"[{"id":"a1","brand":"Dell","price":999,"scores":{"performance":7}},
                {"id":"a2","brand":"HP","price":1299,"last_updated":"2024-05-01T10:00:00Z"}]"#,
        )
        .unwrap();
        fs::write(
            input.path().join("b.jsonl"),
            "{\"id\":\"b1\",\"brand\":\"Asus\",\"price\":1599,\"last_updated\":{\"seconds\":1700000000,\"nanoseconds\":0}}\n\n",
        )
        .unwrap();
        let out = tempdir().unwrap();
        build_snapshot(input.path().to_str().unwrap(), out.path().to_str().unwrap()).unwrap();

        let (records, meta) = load_snapshot(&CatalogPaths::new(out.path())).unwrap();
        assert_eq!(meta.num_records, 3);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1"]);
        assert!(records.iter().all(|r| r.last_updated.is_some()));
        assert!(time::OffsetDateTime::parse(&meta.created_at, &Rfc3339).is_ok());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let input = tempdir().unwrap();
        fs::write(
            input.path().join("dup.json"),
            r#"[{"id":"x","brand":"Dell","price":1},{"id":"x","brand":"HP","price":2}]"#,
        )
        .unwrap();
        let out = tempdir().unwrap();
        assert!(build_snapshot(input.path().to_str().unwrap(), out.path().to_str().unwrap()).is_err());
    }
}
