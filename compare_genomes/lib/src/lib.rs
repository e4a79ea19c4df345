/*
    Distance matrices and alignments for comparative genomics
        duplicates: expand a de-duplicated distance matrix onto every original sequence
        conservation: per-column conservation of protein alignments
        supermatrix: concatenate per-gene alignments with partitions
        newick: patristic distances, relabelling and pruning of trees
        filters / pairs / annotation / alphafold: file-to-file helpers between stages
*/

pub mod lib_utils;

pub use lib_utils::accession::truncate_accession;
pub use lib_utils::conservation::{alignment_conservation, column_conservation, GapPolicy};
pub use lib_utils::distance_matrix::{read_labelled, read_mldist, DistanceMatrix};
pub use lib_utils::duplicates::{expand_distance_matrix, DuplicateMap};
pub use lib_utils::error::{MatrixError, Result};
pub use lib_utils::fasta::{check_alignment, read_fasta, Alignment, SequenceRecord};
pub use lib_utils::newick::Tree;
pub use lib_utils::supermatrix::{build_from_dir, Supermatrix};
