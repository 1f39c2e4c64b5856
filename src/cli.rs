use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// The EPUB to read
    #[clap(required_unless_present = "list_styles")]
    pub input: Option<PathBuf>,

    /// Where to write the highlighted EPUB
    #[clap(required_unless_present = "list_styles")]
    pub output: Option<PathBuf>,

    /// Highlighting style [default: InspiredGitHub]
    #[clap(short, long)]
    pub style: Option<String>,

    /// Load settings from a TOML file
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// List the available highlighting styles and exit
    #[clap(long)]
    pub list_styles: bool,

    /// Log more detail (repeat for even more)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[clap(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
