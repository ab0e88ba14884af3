//! # consultation-report CLI
//!
//! ```bash
//! # Render a record with a local logo into ./out
//! consultation-report render record.json --logo brand.png --out-dir out --verify
//!
//! # Fixed cover date and accent seed for reproducible output
//! consultation-report render record.json --date 2024-03-09 --seed 7
//!
//! # Print the filename a client name maps to
//! consultation-report filename "A. Test User"
//! ```

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use consultation_report::{
    FileLogoSource, HttpLogoSource, LogoSource, ReportError, ReportRecord, ReportRenderer,
    report_filename, verify_report,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "consultation-report")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a JSON record into a PDF report
    Render {
        /// Record file (camelCase JSON)
        record: PathBuf,

        /// Logo image on disk
        #[arg(long, value_name = "FILE", conflicts_with = "logo_url")]
        logo: Option<PathBuf>,

        /// Logo image URL
        #[arg(long, value_name = "URL")]
        logo_url: Option<String>,

        /// Known logo width/height, used when the logo cannot be decoded
        #[arg(long)]
        logo_ratio: Option<f32>,

        /// Directory the PDF is written to
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Seed for the highlight accent bars
        #[arg(long)]
        seed: Option<u64>,

        /// Cover date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Write a JSON-lines layout trace
        #[arg(long, value_name = "FILE")]
        trace: Option<PathBuf>,

        /// Parse the written PDF back and check its page count and title
        #[arg(long)]
        verify: bool,
    },
    /// Print the output filename for a client name
    Filename { name: String },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ReportError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Filename { name } => {
            println!("{}", report_filename(&name));
            Ok(())
        }
        Commands::Render {
            record,
            logo,
            logo_url,
            logo_ratio,
            out_dir,
            seed,
            date,
            trace,
            verify,
        } => {
            let record = ReportRecord::from_json_slice(&std::fs::read(&record)?)?;

            let mut builder = ReportRenderer::builder();
            if let Some(raw) = date {
                let parsed = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|err| {
                    ReportError::InvalidConfiguration(format!("invalid --date '{raw}': {err}"))
                })?;
                builder = builder.report_date(parsed);
            }
            if let Some(seed) = seed {
                builder = builder.accent_seed(seed);
            }
            if let Some(path) = trace {
                builder = builder.layout_trace(path);
            }
            let renderer = builder.build()?;

            let source: Option<Box<dyn LogoSource>> = match (logo, logo_url) {
                (Some(path), _) => Some(Box::new(FileLogoSource::new(path).with_cached_ratio(logo_ratio))),
                (None, Some(url)) => Some(Box::new(HttpLogoSource::new(url)?.with_cached_ratio(logo_ratio))),
                (None, None) => None,
            };
            let report = match source {
                Some(source) => renderer.render_with_logo_source(&record, source.as_ref()).await?,
                None => renderer.render(&record, None)?,
            };

            std::fs::create_dir_all(&out_dir)?;
            let path = report.save_to(&out_dir)?;
            if verify {
                let summary = verify_report(&report)?;
                println!("verified: PDF {} with {} pages", summary.version, summary.page_count);
            }
            println!("{}", path.display());
            println!("pages: {}", report.page_count);
            println!("bytes: {}", report.bytes.len());
            Ok(())
        }
    }
}
