/*
    Validate alignment files before scoring or concatenation
        fasta only: every sequence follows a ">" header
        no blank line between a header and its sequence
        every sequence of a file has the same length

    Exit status 1 if any file fails
*/

use std::path::PathBuf;
use clap::Parser;
use log::{debug, error, info};
use alignment_matrix::check_alignment;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to alignment file stored in fasta format
    #[arg(short='i', long="infile", required=true, action=clap::ArgAction::Append)]
    input_alignment: Vec<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    debug!("Parsing commandline arguments");
    let mut failed = 0usize;
    for file in &cli.input_alignment {
        match check_alignment(file) {
            Ok(alignment) => info!("Alignment complies requirements {:?}: {} sequences of length {}",
                                   file, alignment.len(), alignment.width()),
            Err(e) => {
                error!("Alignment failed {:?}: {}", file, e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        error!("{} of {} alignments failed", failed, cli.input_alignment.len());
        std::process::exit(1);
    }
}
