/*
Comparative genomics helpers for a set of fungal genomes
    + expand IQ-TREE distance matrices over duplicate sequences
    + conservation score per alignment column
        + gaps excluded from the column total unless asked otherwise
        + optionally mapped onto the residues of one accession
    + concatenate gene alignments into a supermatrix with partitions
    + tree distances, relabelling and pruning
    + filters between stages: accessions, BUSCO completeness, InterPro hits
    + compare two distance matrices: pairs in range, correlation

Implement clap to parse cli, one subcommand per step
*/

mod bin_utils;
use clap::Parser;
use log::{debug, error};
use bin_utils::get_args::Cli;
use bin_utils::run_commands::run;

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    debug!("Parsing commandline arguments");
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
