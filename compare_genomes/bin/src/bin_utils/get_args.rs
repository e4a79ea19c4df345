use clap::{Parser, Subcommand, ValueEnum};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use alignment_matrix::GapPolicy;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Number of threads for per-file work. Default: 16
    #[arg(short='n', long="threads", default_value_t=16, global=true)]
    pub nproc: usize,
}

#[derive(Subcommand)]
pub enum Command {
    /// Expand an IQ-TREE distance matrix over unique sequences onto every sequence of the input FASTA
    ExpandDuplicates {
        /// FASTA file with every sequence, duplicates included
        #[arg(short='i', long="fasta")]
        in_fasta: PathBuf,
        /// IQ-TREE .uniqueseq.phy file
        #[arg(short='u', long="unique")]
        unique: PathBuf,
        /// IQ-TREE .mldist file computed over the unique sequences
        #[arg(short='d', long="mldist")]
        mldist: PathBuf,
        /// Output matrix, space separated with a header row
        #[arg(short='o', long="output")]
        output: PathBuf,
    },
    /// Per-column conservation scores of protein alignments
    Conservation {
        /// Path to alignment file stored in fasta format
        #[arg(short='i', long="infile", required=true, action=clap::ArgAction::Append)]
        input_alignment: Vec<PathBuf>,
        /// 'Exclude' gaps from the column total or 'Include' them. Recommended: 'Exclude'
        #[arg(short='g', long="gaps", value_enum, default_value_t=GapMode::Exclude)]
        gaps: GapMode,
        /// Map scores onto the residues of the sequence whose id contains this accession
        #[arg(short='a', long="accession")]
        accession: Option<String>,
        /// Directory to store the score tables
        #[arg(short='o', long="outdir")]
        outdir: PathBuf,
    },
    /// Concatenate per-gene alignments into a supermatrix with a partition file
    Supermatrix {
        /// Directory containing alignment files
        #[arg(short='i', long="input")]
        input: PathBuf,
        /// Output prefix for supermatrix files
        #[arg(short='o', long="output")]
        output: PathBuf,
        /// Alignment file suffix. Default: ".aln"
        #[arg(short='s', long="suffix", default_value_t=String::from(".aln"))]
        suffix: String,
        /// Missing data character. Default: '?'
        #[arg(short='m', long="missing", default_value_t='?')]
        missing: char,
    },
    /// Pairwise patristic distances between the leaves of a Newick tree
    TreeDistances {
        /// Newick tree, plain or gzipped
        #[arg(short='i', long="tree")]
        tree: PathBuf,
        /// Output matrix, space separated with a header row
        #[arg(short='o', long="output")]
        output: PathBuf,
        /// Truncate leaf names to accession keys
        #[arg(short='t', long="truncate")]
        truncate: bool,
    },
    /// Truncate node names to accession keys, optionally writing an iTOL phylum colour strip
    RelabelTree {
        #[arg(short='i', long="tree")]
        tree: PathBuf,
        #[arg(short='o', long="output")]
        output: PathBuf,
        /// CSV with accession and phylum columns
        #[arg(short='p', long="phyla", requires="annotation")]
        phyla: Option<PathBuf>,
        /// iTOL DATASET_COLORSTRIP output
        #[arg(long="annotation", requires="phyla")]
        annotation: Option<PathBuf>,
    },
    /// Remove outlier leaves from a tree
    PruneTree {
        #[arg(short='i', long="tree")]
        tree: PathBuf,
        #[arg(short='o', long="output")]
        output: PathBuf,
        /// File with one leaf name per line
        #[arg(short='r', long="outliers")]
        outliers: PathBuf,
    },
    /// Keep only the listed accessions in each FASTA file
    FilterFasta {
        #[arg(short='i', long="infile", required=true, action=clap::ArgAction::Append)]
        input_fasta: Vec<PathBuf>,
        /// CSV listing the accessions to keep
        #[arg(short='a', long="accessions")]
        accessions: PathBuf,
        /// Accession column of the CSV. Default: "Accession"
        #[arg(short='c', long="column", default_value_t=String::from("Accession"))]
        column: String,
        /// Directory for the filtered files
        #[arg(short='o', long="outdir")]
        outdir: PathBuf,
        /// Suffix appended to each file stem. Default: "_filtered"
        #[arg(short='s', long="output-suffix", default_value_t=String::from("_filtered"))]
        output_suffix: String,
        /// Write the accessions present in every FASTA file here
        #[arg(short='r', long="remaining")]
        remaining: Option<PathBuf>,
    },
    /// Collect BUSCO JSON summaries from one directory per genome into a CSV
    BuscoSummary {
        #[arg(short='i', long="input")]
        input: PathBuf,
        #[arg(short='o', long="output")]
        output: PathBuf,
    },
    /// Keep genomes with enough complete BUSCOs
    FilterBusco {
        #[arg(short='i', long="input")]
        input: PathBuf,
        #[arg(short='o', long="output")]
        output: PathBuf,
        /// Minimum number of complete BUSCOs. Default: 600
        #[arg(short='m', long="min-complete", default_value_t=600.0)]
        min_complete: f64,
    },
    /// Keep taxa whose accession passed the BUSCO filter
    FilterTaxa {
        /// Taxa CSV
        #[arg(short='i', long="taxa")]
        taxa: PathBuf,
        /// BUSCO CSV after filter-busco
        #[arg(short='b', long="busco")]
        busco: PathBuf,
        /// Accession column of the taxa CSV. Default: "Accession"
        #[arg(short='c', long="column", default_value_t=String::from("Accession"))]
        column: String,
        #[arg(short='o', long="output")]
        output: PathBuf,
    },
    /// Accessions whose InterPro annotations do not mention the expected family
    InterproMissing {
        /// InterPro TSV output
        #[arg(short='i', long="input")]
        input: PathBuf,
        /// Case-insensitive term to look for (InterPro id, family name, ...)
        #[arg(short='q', long="query", required=true, action=clap::ArgAction::Append)]
        queries: Vec<String>,
        /// Minimum number of matching rows per accession. Default: 1
        #[arg(short='m', long="min-hits", default_value_t=1)]
        min_hits: usize,
        #[arg(short='o', long="output")]
        output: PathBuf,
    },
    /// Accession pairs whose distances fall in a range in both matrices
    FilterPairs {
        #[arg(long="dm1")]
        dm1: PathBuf,
        #[arg(long="dm2")]
        dm2: PathBuf,
        /// Inclusive range for the first matrix, as min:max
        #[arg(long="dm1-range", value_parser=validate_range)]
        dm1_range: RangeInclusive<f64>,
        /// Inclusive range for the second matrix, as min:max
        #[arg(long="dm2-range", value_parser=validate_range)]
        dm2_range: RangeInclusive<f64>,
        #[arg(short='o', long="output")]
        output: PathBuf,
    },
    /// Pearson correlation between two distance matrices
    Correlate {
        #[arg(long="dm1")]
        dm1: PathBuf,
        #[arg(long="dm2")]
        dm2: PathBuf,
    },
    /// AlphaFold3 job JSON from a FASTA file
    AfJson {
        #[arg(short='i', long="fasta")]
        fasta: PathBuf,
        #[arg(short='o', long="output")]
        output: PathBuf,
        /// Job name
        #[arg(long="name")]
        name: String,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum GapMode {
    Exclude,
    Include
}

impl From<GapMode> for GapPolicy {
    fn from(mode: GapMode) -> Self {
        match mode {
            GapMode::Exclude => GapPolicy::Exclude,
            GapMode::Include => GapPolicy::Include,
        }
    }
}

fn validate_range(input_str: &str) -> Result<RangeInclusive<f64>, String> {
    let (start, end) = input_str
        .split_once(':')
        .ok_or_else(|| format!("Range {} is not in the form min:max", input_str))?;
    let start: f64 = start.trim().parse().map_err(|e| format!("Invalid range start {}: {}", start, e))?;
    let end: f64 = end.trim().parse().map_err(|e| format!("Invalid range end {}: {}", end, e))?;
    if start <= end {
        Ok(start..=end)
    } else {
        Err(
            format!("Range start {} is greater than end {}", start, end)
        )
    }
}
