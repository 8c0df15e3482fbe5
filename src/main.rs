// src/main.rs
use anyhow::Context;
use clap::Parser;
use hwpx_report::assembler::ContentMode;
use hwpx_report::lineseg;
use hwpx_report::packager::{self, SECTION_PATH};
use hwpx_report::{load_report, NamespaceSet, ReportAssembler};
use log::{info, warn};
use std::path::PathBuf;

/// Assemble a structured report payload into a .hwpx document using a
/// template package.
#[derive(Parser)]
#[command(name = "hwpx-report", version)]
struct Cli {
    /// Report payload JSON produced by the upstream extraction service
    #[arg(long)]
    payload: PathBuf,

    /// Template HWPX package directory (unzipped)
    #[arg(long)]
    template: PathBuf,

    /// Final .hwpx output path
    #[arg(long)]
    output: PathBuf,

    /// Which optional content blocks to emit
    #[arg(long, value_enum, default_value_t = ContentMode::None)]
    mode: ContentMode,

    /// Maximum visual line width in characters
    #[arg(long, default_value_t = lineseg::DEFAULT_MAX_WIDTH)]
    max_width: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    // Payload problems are fatal before anything is staged or written.
    let report = load_report(&cli.payload)?;
    info!(
        "loaded report '{}' with {} topics",
        report.title,
        report.topics.len()
    );

    let staging_root = std::env::temp_dir();
    let staged = packager::stage_package(&cli.template, &staging_root)?;

    let run = || -> anyhow::Result<()> {
        let section_path = staged.join(SECTION_PATH);
        if !section_path.is_file() {
            anyhow::bail!(
                "template package has no {} ({})",
                SECTION_PATH,
                section_path.display()
            );
        }

        let assembler = ReportAssembler::new(NamespaceSet::default(), cli.max_width);
        assembler.assemble_section_file(&section_path, &report, cli.mode)?;
        packager::pack_hwpx(&staged, &cli.output)
            .with_context(|| format!("failed to pack {}", cli.output.display()))
    };

    let result = run();
    if let Err(e) = std::fs::remove_dir_all(&staged) {
        warn!("failed to remove staging directory {}: {}", staged.display(), e);
    }
    result?;

    info!("report written to {}", cli.output.display());
    Ok(())
}
