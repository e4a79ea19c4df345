pub mod accession;
pub mod alphafold;
pub mod annotation;
pub mod conservation;
pub mod distance_matrix;
pub mod duplicates;
pub mod error;
pub mod fasta;
pub mod filters;
pub mod newick;
pub mod pairs;
pub mod struct_helper;
pub mod supermatrix;
