// One function per subcommand; each reads its inputs, calls into the library and writes outputs

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use alignment_matrix::lib_utils::alphafold::AlphaFoldJob;
use alignment_matrix::lib_utils::annotation::{annotate, write_colorstrip, PhylumMap};
use alignment_matrix::lib_utils::distance_matrix::read_matrix;
use alignment_matrix::lib_utils::duplicates::{map_by_sequence, read_unique_phylip};
use alignment_matrix::lib_utils::filters::{
    collect_busco, filter_busco, filter_fasta, filter_taxa, interpro_missing, read_accession_list,
    write_busco_csv,
};
use alignment_matrix::lib_utils::pairs::{filter_pairs, pearson, write_pairs};
use alignment_matrix::lib_utils::struct_helper::FileBufferHelper;
use alignment_matrix::{
    build_from_dir, expand_distance_matrix, read_fasta, read_mldist, MatrixError, Result, Tree,
};
use super::calculate_conservation::{report_conservation, ConservationJob};
use super::get_args::{Cli, Command};

pub fn run(cli: Cli) -> Result<()> {
    let nproc = cli.nproc;
    match cli.command {
        Command::ExpandDuplicates { in_fasta, unique, mldist, output } =>
            expand_duplicates(&in_fasta, &unique, &mldist, &output),
        Command::Conservation { input_alignment, gaps, accession, outdir } => {
            let job = ConservationJob { policy: gaps.into(), accession, outdir };
            let failed = report_conservation(&input_alignment, job, nproc)?;
            if failed == input_alignment.len() {
                return Err(MatrixError::InvalidInput("no alignment could be scored".to_string()));
            }
            Ok(())
        }
        Command::Supermatrix { input, output, suffix, missing } => {
            if !missing.is_ascii() {
                return Err(MatrixError::InvalidInput(format!("missing character {} is not ASCII", missing)));
            }
            let matrix = build_from_dir(&input, &suffix, missing as u8, nproc)?;
            info!("Supermatrix of {} taxa and {} columns from {} genes",
                  matrix.taxa.len(), matrix.width(), matrix.partitions.len());
            matrix.write_all(&output)
        }
        Command::TreeDistances { tree, output, truncate } => {
            let mut tree = Tree::read(&tree)?;
            if truncate {
                tree.truncate_names();
            }
            let matrix = tree.patristic_matrix();
            info!("Distances between {} leaves", matrix.len());
            matrix.write_labelled(&output)
        }
        Command::RelabelTree { tree, output, phyla, annotation } =>
            relabel_tree(&tree, &output, phyla.as_deref(), annotation.as_deref()),
        Command::PruneTree { tree, output, outliers } => prune_tree(&tree, &output, &outliers),
        Command::FilterFasta { input_fasta, accessions, column, outdir, output_suffix, remaining } =>
            filter_fasta_files(&input_fasta, &accessions, &column, &outdir, &output_suffix, remaining.as_deref()),
        Command::BuscoSummary { input, output } => {
            let summaries = collect_busco(&input)?;
            write_busco_csv(File::create(&output)?, &summaries)
        }
        Command::FilterBusco { input, output, min_complete } => {
            filter_busco(File::open(&input)?, File::create(&output)?, min_complete)?;
            Ok(())
        }
        Command::FilterTaxa { taxa, busco, column, output } => {
            let organisms = read_accession_list(&busco, "organism")?;
            filter_taxa(File::open(&taxa)?, File::create(&output)?, &column, &organisms)?;
            Ok(())
        }
        Command::InterproMissing { input, queries, min_hits, output } => {
            let missing = interpro_missing(File::open(&input)?, &queries, min_hits)?;
            info!("{} accessions lack annotations matching {:?}", missing.len(), queries);
            write_lines(&output, missing.iter())
        }
        Command::FilterPairs { dm1, dm2, dm1_range, dm2_range, output } => {
            let pairs = filter_pairs(&read_matrix(&dm1)?, &read_matrix(&dm2)?, dm1_range, dm2_range)?;
            let mut writer = BufWriter::new(File::create(&output)?);
            write_pairs(&mut writer, &pairs)?;
            writer.flush()?;
            Ok(())
        }
        Command::Correlate { dm1, dm2 } => {
            let correlation = pearson(&read_matrix(&dm1)?, &read_matrix(&dm2)?)?;
            println!("Pearson correlation coefficient: {}", correlation.coefficient);
            println!("P-value: {:.2e}", correlation.p_value);
            Ok(())
        }
        Command::AfJson { fasta, output, name } => {
            let records = read_fasta(&fasta)?;
            let job = AlphaFoldJob::from_records(&name, &records);
            let mut writer = BufWriter::new(File::create(&output)?);
            job.write(&mut writer)?;
            writer.flush()?;
            Ok(())
        }
    }
}

fn expand_duplicates(in_fasta: &Path, unique: &Path, mldist: &Path, output: &Path) -> Result<()> {
    let original = read_fasta(in_fasta)?;
    let duplicates = map_by_sequence(&original, &read_unique_phylip(unique)?)?;
    let unique_matrix = read_mldist(mldist)?;
    info!("{} sequences, {} unique", original.len(), unique_matrix.len());
    let ids: Vec<String> = original.iter().map(|r| r.id.clone()).collect();
    let full = expand_distance_matrix(&unique_matrix, &duplicates, &ids)?;
    full.validate()?;
    full.write_labelled(output)
}

fn relabel_tree(tree: &Path, output: &Path, phyla: Option<&Path>, annotation: Option<&Path>) -> Result<()> {
    let mut tree = Tree::read(tree)?;
    tree.truncate_names();
    tree.write(output)?;
    if let (Some(phyla), Some(annotation)) = (phyla, annotation) {
        let labels = annotate(&tree.leaf_names(), &PhylumMap::read(phyla)?);
        let mut writer = BufWriter::new(File::create(annotation)?);
        write_colorstrip(&mut writer, &labels)?;
        writer.flush()?;
    }
    Ok(())
}

// one leaf name per line, blank lines ignored
fn read_name_list(path: &Path) -> Result<Vec<String>> {
    let mut file = FileBufferHelper::new(path)?;
    let mut names = Vec::new();
    while file.next_line()? {
        let name = file.line.trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn prune_tree(tree: &Path, output: &Path, outliers: &Path) -> Result<()> {
    let mut tree = Tree::read(tree)?;
    let names = read_name_list(outliers)?;
    let before = tree.leaves().len();
    let not_found = tree.prune_leaves(&names);
    for name in &not_found {
        warn!("Outlier {} not found in tree", name);
    }
    info!("Pruned {} of {} leaves", before - tree.leaves().len(), before);
    tree.write(output)
}

fn filter_fasta_files(inputs: &[PathBuf], accessions: &Path, column: &str, outdir: &Path,
                      output_suffix: &str, remaining: Option<&Path>) -> Result<()> {
    let keep: HashSet<String> = read_accession_list(accessions, column)?.into_iter().collect();
    fs::create_dir_all(outdir)?;
    let mut present_everywhere: BTreeSet<String> = keep.iter().cloned().collect();
    for input in inputs {
        let stem = input.file_stem().and_then(|s| s.to_str())
            .ok_or_else(|| MatrixError::InvalidInput(format!("no file name in {:?}", input)))?;
        let output = outdir.join(format!("{}{}.fasta", stem, output_suffix));
        debug!("Filtering {:?} into {:?}", input, output);
        let missing = filter_fasta(input, &keep, &output)?;
        present_everywhere.retain(|id| !missing.contains(id));
    }
    info!("{} of {} accessions present in all {} files", present_everywhere.len(), keep.len(), inputs.len());
    if let Some(remaining) = remaining {
        write_lines(remaining, present_everywhere.iter())?;
    }
    Ok(())
}

fn write_lines<'a>(path: &Path, lines: impl Iterator<Item = &'a String>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}
