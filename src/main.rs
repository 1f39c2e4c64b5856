use anyhow::{anyhow, Context, Result};
use cli::Cli;
use config::Configuration;
use highlight::{Highlighter, SyntectHighlighter};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::process::ExitCode;

mod archive;
mod blocks;
mod cli;
mod config;
mod error;
mod highlight;
mod logger;
mod process;
mod styles;

fn main() -> ExitCode {
    if let Err(e) = try_main() {
        eprintln!("{}: {e:#}", console::style("Error").red());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    use clap::Parser;
    let cli = Cli::parse();
    logger::init(logger::level(cli.verbose, cli.quiet));

    let highlighter = SyntectHighlighter::new();
    if cli.list_styles {
        for style in highlighter.styles() {
            println!("{style}");
        }
        return Ok(());
    }

    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        return Err(anyhow!("Both an input and an output path are required"));
    };
    if !input.exists() {
        return Err(anyhow!("Input not found: {}", input.display()));
    }

    let mut config = match &cli.config {
        Some(path) => Configuration::load(path)?,
        None => Configuration::default(),
    };
    if let Some(style) = cli.style {
        config.style = style;
    }
    if !highlighter.has_style(&config.style) {
        return Err(anyhow!(
            "Unknown style `{}` (see --list-styles for the available styles)",
            config.style
        ));
    }
    // fail on a broken style before touching the book rather than after highlighting it
    highlighter
        .stylesheet(&config.style)
        .with_context(|| format!("Failed to generate CSS for style `{}`", config.style))?;

    let documents = archive::DocumentMatcher::new(&config.document_extensions)
        .with_context(|| "Invalid document extensions in configuration")?;
    let options = process::ProcessOptionsBuilder::default()
        .input(input)
        .output(output)
        .style(config.style)
        .documents(documents)
        .stylesheet_name(config.stylesheet_name)
        .build()
        .with_context(|| "Failed to assemble processing options")?;

    let progress = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("can parse progress style")
            .progress_chars("#>-"),
    );

    info!("Processing {}...", options.input.display());
    let report = process::process(&options, &highlighter, &progress)
        .with_context(|| format!("Failed to process {}", options.input.display()))?;

    if report.blocks_highlighted == 0 {
        println!("No Python code blocks needed highlighting.");
    } else {
        println!(
            "Highlighted {} Python block(s) in {} file(s)",
            report.blocks_highlighted, report.documents_changed
        );
    }
    if report.blocks_skipped > 0 {
        println!(
            "  Skipped {} block(s) which were already highlighted",
            report.blocks_skipped
        );
    }
    if let Some(stylesheet) = &report.stylesheet {
        if report.stylesheet_created {
            println!(
                "  Stylesheet:  {} (new, linked from {} document(s))",
                stylesheet.display(),
                report.documents_linked
            );
        } else {
            println!("  Stylesheet:  {}", stylesheet.display());
        }
    }

    let size = std::fs::metadata(&options.output)
        .map(|m| {
            byte_unit::Byte::from_u64(m.len())
                .get_appropriate_unit(byte_unit::UnitType::Binary)
                .to_string()
        })
        .unwrap_or_default();
    println!("  Output:      {} ({size})", options.output.display());

    Ok(())
}
