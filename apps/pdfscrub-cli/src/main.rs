//! pdfscrub binary
//!
//! Flattens blur, erase and text edits into a PDF from the command line.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pdfscrub_cli::{check_edits, document_info, export, load_config, parse_font_arg, ExportRequest};

#[derive(Parser, Debug)]
#[command(name = "pdfscrub")]
#[command(version, about = "Blur, erase and overlay text on PDF pages")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show page count and page sizes
    Info {
        /// PDF to inspect
        input: PathBuf,
    },

    /// Check an edit log against a document without rendering
    CheckEdits {
        input: PathBuf,

        /// Edit log JSON, as saved by the editor
        #[arg(short, long)]
        edits: PathBuf,
    },

    /// Write a flattened copy with the edits burned in
    Export {
        input: PathBuf,

        /// Edit log JSON, as saved by the editor
        #[arg(short, long)]
        edits: Option<PathBuf>,

        /// Output path (default: <name>_edited.pdf next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Zoom the edits were made at; export never renders below 1.5
        #[arg(short, long)]
        zoom: Option<f64>,

        /// Extra font for text edits, as FAMILY=PATH (repeatable)
        #[arg(long = "font", value_parser = parse_font_arg)]
        fonts: Vec<(String, PathBuf)>,

        /// Directory containing the PDFium library
        #[arg(long)]
        pdfium_dir: Option<String>,

        /// Draw the edits over blank pages instead of the page content
        #[arg(long)]
        blank_pages: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { input } => {
            let info = document_info(&config, &input)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::CheckEdits { input, edits } => {
            let summary = check_edits(&config, &input, &edits)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Export {
            input,
            edits,
            output,
            zoom,
            fonts,
            pdfium_dir,
            blank_pages,
        } => {
            let request = ExportRequest {
                input,
                edits,
                output,
                zoom,
                fonts,
                pdfium_dir,
                blank_pages,
            };
            let output = export(&config, &request, &mut |done, total| {
                tracing::info!("Flattened page {}/{}", done, total);
            })
            .await?;
            println!("{}", output.display());
        }
    }

    Ok(())
}
