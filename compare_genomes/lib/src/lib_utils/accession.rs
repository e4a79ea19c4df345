// Accession keys: the first 15 characters of a genome identifier,
// e.g. "GCA_000146045.2_Saccharomyces" -> "GCA_000146045.2".
// Matrices, trees and metadata tables are joined on this key.

pub const ACCESSION_KEY_LEN: usize = 15;

pub fn truncate_accession(id: &str) -> &str {
    match id.char_indices().nth(ACCESSION_KEY_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}
