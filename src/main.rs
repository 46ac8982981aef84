//! PDF Unredaction CLI Application.
//!
//! Removes redaction overlays from a PDF, or from every PDF in a directory,
//! and writes the rebuilt documents with a JSON report of the recovered text.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use unredactor::{
    collect_pdfs, write_summary_csv, FileOutcome, StatisticsRow, UnredactOptions, UnredactResult, Unredactor,
};

/// Name of the batch summary written next to the outputs.
const SUMMARY_FILE: &str = "summary_of_changes.csv";

/// PDF Unredaction Tool
///
/// Strips opaque redaction boxes and reports the text hidden beneath them.
/// Use the 'scan' subcommand to analyse a document without writing output.
#[derive(Parser)]
#[command(name = "unredactor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input PDF file or directory of PDFs
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Output file name (single-file input only)
    #[arg(short, long, value_name = "NAME")]
    name: Option<String>,

    /// Remove redaction boxes and annotations (1) or re-render unchanged (0)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    bbox: u8,

    /// Draw recovered text in red (1) or in its own color (0)
    #[arg(long, alias = "hl", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    highlight: u8,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the recovered-text report and statistics of a PDF as JSON
    Scan {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

/// Unredaction command handler.
struct UnredactHandler {
    engine: Unredactor,
    verbose: bool,
}

impl UnredactHandler {
    fn new(options: UnredactOptions, verbose: bool) -> Self {
        Self {
            engine: Unredactor::new(options),
            verbose,
        }
    }

    /// Processes a file or a directory and writes the batch summary.
    fn run(&self, input: &Path, output_dir: &Path) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input path does not exist: {}", input.display());
        }

        if self.verbose {
            println!("Input:  {}", input.display());
            println!("Output: {}", output_dir.display());
        }

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

        let rows = if input.is_dir() {
            self.run_directory(input, output_dir)?
        } else {
            let outcome = self
                .engine
                .process_file(input, output_dir)
                .with_context(|| format!("Unredaction failed for {}", input.display()))?;
            self.print_outcome(&outcome);
            vec![row(&outcome)]
        };

        if !rows.is_empty() {
            let csv_path = output_dir.join(SUMMARY_FILE);
            let file = File::create(&csv_path)
                .with_context(|| format!("Failed to create {}", csv_path.display()))?;
            write_summary_csv(BufWriter::new(file), &rows)
                .with_context(|| format!("Failed to write {}", csv_path.display()))?;
            println!("Summary CSV saved to {}", csv_path.display());
        }
        Ok(())
    }

    fn run_directory(&self, dir: &Path, output_dir: &Path) -> Result<Vec<StatisticsRow>> {
        let inputs = collect_pdfs(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
        if inputs.is_empty() {
            println!("⚠ No PDF files found in {}", dir.display());
            return Ok(Vec::new());
        }

        let results: Vec<UnredactResult<FileOutcome>> = self.engine.process_batch(&inputs, output_dir);
        let mut rows = Vec::new();
        for (input, result) in inputs.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    self.print_outcome(&outcome);
                    rows.push(row(&outcome));
                }
                Err(e) => println!("✗ Error processing {}: {}", input.display(), e),
            }
        }
        Ok(rows)
    }

    fn print_outcome(&self, outcome: &FileOutcome) {
        let s = &outcome.statistics;
        println!(
            "[SUMMARY] {}: removed {} BlackImg, {} WhiteImg, {} BlackVec, {} WhiteVec, {} Annots",
            outcome.filename(),
            s.black_img,
            s.white_img,
            s.black_vec,
            s.white_vec,
            s.annots
        );
        if self.verbose {
            println!("  Pages processed:     {}", s.pages);
            println!("  Unreadable pages:    {}", s.unreadable_pages);
            println!("  Undecodable images:  {}", s.undecodable_images);
            println!("  Incomplete pages:    {}", s.incomplete_content);
            for failure in &outcome.failures {
                println!("  - {}", failure);
            }
        }
        println!("✓ Saved to {}", outcome.output.display());
        println!("✓ {} span(s) saved to {}", outcome.spans, outcome.report_path.display());
    }

    /// Prints the analysis of one document as JSON.
    fn scan(&self, input: &Path) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }
        let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let analysis = self
            .engine
            .analyze(&name, &bytes)
            .with_context(|| "Analysis failed")?;
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        Ok(())
    }
}

fn row(outcome: &FileOutcome) -> StatisticsRow {
    StatisticsRow {
        filename: outcome.filename(),
        statistics: outcome.statistics,
    }
}

/// Builds engine options from the mode flags.
fn build_options(bbox: u8, highlight: u8, name: Option<&str>) -> UnredactOptions {
    let options = UnredactOptions::default()
        .with_remove_redactions(bbox == 1)
        .with_highlight_recovered(highlight == 1);
    match name {
        Some(name) => options.with_output_name(name),
        None => options,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Some(Commands::Scan { input }) => {
            let handler = UnredactHandler::new(build_options(cli.bbox, cli.highlight, None), cli.verbose);
            handler.scan(input)?;
        }
        None => {
            let input = cli
                .input
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--input is required"))?;
            let output = cli
                .output
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--output is required"))?;

            let options = build_options(cli.bbox, cli.highlight, cli.name.as_deref());
            let handler = UnredactHandler::new(options, cli.verbose);
            handler.run(input, output)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_building() {
        let options = build_options(1, 1, None);
        assert!(options.remove_redactions);
        assert!(options.highlight_recovered);
        assert_eq!(options.output_name, None);

        let options = build_options(0, 0, Some("clean"));
        assert!(!options.remove_redactions);
        assert!(!options.highlight_recovered);
        assert_eq!(options.output_name.as_deref(), Some("clean"));
    }

    #[test]
    fn test_cli_parses_legacy_flags() {
        let cli = Cli::try_parse_from(["unredactor", "-i", "a.pdf", "-o", "out", "-b", "0", "--hl", "0"]).unwrap();
        assert_eq!(cli.bbox, 0);
        assert_eq!(cli.highlight, 0);
        assert!(Cli::try_parse_from(["unredactor", "-b", "2"]).is_err());
    }
}
