/*
    Expand a distance matrix computed over de-duplicated sequences
    back onto the full, original set of identifiers.

    IQ-TREE drops identical sequences before inference and writes
        tree.uniqueseq.phy  : the kept sequences
        tree.mldist         : distances between kept sequences only
    Every original identifier is resolved to its representative in the
    unique set, and distances are copied from the representatives' cells.
*/

use std::collections::HashMap;
use std::path::Path;
use log::{debug, info, warn};
use super::distance_matrix::DistanceMatrix;
use super::error::{MatrixError, Result};
use super::fasta::SequenceRecord;
use super::struct_helper::FileBufferHelper;

// duplicate identifier -> representative identifier in the unique set
#[derive(Debug, Clone, Default)]
pub struct DuplicateMap {
    representatives: HashMap<String, String>,
}

impl DuplicateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, duplicate: impl Into<String>, representative: impl Into<String>) {
        self.representatives.insert(duplicate.into(), representative.into());
    }

    pub fn representative(&self, id: &str) -> Option<&str> {
        self.representatives.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.representatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DuplicateMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = DuplicateMap::new();
        for (duplicate, representative) in iter {
            map.insert(duplicate, representative);
        }
        map
    }
}

pub fn clean_sequence(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().copied().filter(|&c| c != b'-' && c != b'X').collect()
}

// Resolve every identifier to its row in the unique matrix
fn resolve_positions(unique: &DistanceMatrix, duplicates: &DuplicateMap, ids: &[String]) -> Result<Vec<usize>> {
    let unique_index: HashMap<&str, usize> = unique.ids().iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    ids.iter().map(|id| {
        let representative = match unique_index.get(id.as_str()) {
            Some(&pos) => return Ok(pos),
            None => duplicates.representative(id),
        };
        representative
            .and_then(|rep| unique_index.get(rep).copied())
            .ok_or_else(|| MatrixError::MissingMapping { id: id.clone() })
    }).collect()
}

pub fn expand_distance_matrix(unique: &DistanceMatrix, duplicates: &DuplicateMap, ids: &[String]) -> Result<DistanceMatrix> {
    let positions = resolve_positions(unique, duplicates, ids)?;
    let mut full = DistanceMatrix::zeros(ids.to_vec());
    // lower triangle, mirrored
    for i in 0..ids.len() {
        for j in 0..i {
            full.set_symmetric(i, j, unique.get(positions[i], positions[j]));
        }
    }
    info!("Expanded {}x{} matrix to {}x{}", unique.len(), unique.len(), full.len(), full.len());
    Ok(full)
}

// IQ-TREE .uniqueseq.phy: header line, then "<id> <sequence>"
pub fn read_unique_phylip(path: &Path) -> Result<Vec<SequenceRecord>> {
    let mut file = FileBufferHelper::new(path)?;
    let mut records = Vec::new();
    let mut header_seen = false;
    while file.next_line()? {
        if file.line.trim().is_empty() {
            continue;
        }
        if !header_seen {
            header_seen = true;
            continue;
        }
        let mut fields = file.line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(id), Some(sequence)) => records.push(SequenceRecord::new(id, sequence.as_bytes())),
            _ => return Err(file.parse_error("expected '<id> <sequence>'")),
        }
    }
    debug!("Read {} unique sequences from {:?}", records.len(), path);
    Ok(records)
}

// Map every original record to the first unique record with the same
// cleaned sequence
pub fn map_by_sequence(original: &[SequenceRecord], unique: &[SequenceRecord]) -> Result<DuplicateMap> {
    let mut by_sequence: HashMap<Vec<u8>, &str> = HashMap::new();
    for record in unique {
        by_sequence.entry(clean_sequence(&record.sequence)).or_insert(record.id.as_str());
    }
    let mut map = DuplicateMap::new();
    for record in original {
        match by_sequence.get(&clean_sequence(&record.sequence)) {
            Some(&representative) => {
                if representative != record.id {
                    debug!("{} is a duplicate of {}", record.id, representative);
                }
                map.insert(record.id.clone(), representative);
            }
            None => {
                let preview: String = record.sequence_str().chars().take(50).collect();
                warn!("No unique match for {}: {}...", record.id, preview);
                return Err(MatrixError::MissingMapping { id: record.id.clone() });
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn unique_pair() -> DistanceMatrix {
        DistanceMatrix::new(ids(&["X1", "X2"]), vec![0.0, 5.0, 5.0, 0.0]).unwrap()
    }

    #[test]
    fn expands_single_duplicate() {
        let duplicates: DuplicateMap = [("Y", "X1")].into_iter().collect();
        let full = expand_distance_matrix(&unique_pair(), &duplicates, &ids(&["X1", "X2", "Y"])).unwrap();
        assert_eq!(full.values(), &[
            0.0, 5.0, 0.0,
            5.0, 0.0, 5.0,
            0.0, 5.0, 0.0,
        ]);
        assert!(full.validate().is_ok());
    }

    #[test]
    fn duplicate_rows_copy_representative_rows() {
        let unique = DistanceMatrix::new(ids(&["A", "B", "C"]),
            vec![0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 2.0, 3.0, 0.0]).unwrap();
        let duplicates: DuplicateMap = [("A2", "A"), ("C2", "C"), ("C3", "C")].into_iter().collect();
        let full_ids = ids(&["C3", "A", "A2", "B", "C", "C2"]);
        let full = expand_distance_matrix(&unique, &duplicates, &full_ids).unwrap();
        assert_eq!(full.get(2, 3), unique.get(0, 1));
        assert_eq!(full.get(0, 3), unique.get(2, 1));
        assert_eq!(full.get(0, 5), 0.0);
        assert_eq!(full.get(2, 5), 2.0);
        for i in 0..full.len() {
            assert_eq!(full.get(i, i), 0.0);
        }
        assert!(full.validate().is_ok());
    }

    #[test]
    fn unresolvable_identifier_is_missing_mapping() {
        let duplicates: DuplicateMap = [("Y", "X1")].into_iter().collect();
        let err = expand_distance_matrix(&unique_pair(), &duplicates, &ids(&["X1", "Z"])).unwrap_err();
        assert!(matches!(err, MatrixError::MissingMapping { id } if id == "Z"));
    }

    #[test]
    fn representative_outside_unique_set_is_missing_mapping() {
        let duplicates: DuplicateMap = [("Y", "Q")].into_iter().collect();
        let err = expand_distance_matrix(&unique_pair(), &duplicates, &ids(&["Y"])).unwrap_err();
        assert!(matches!(err, MatrixError::MissingMapping { id } if id == "Y"));
    }

    #[test]
    fn maps_by_cleaned_sequence() {
        let original = vec![
            SequenceRecord::new("a", "MK-LV"),
            SequenceRecord::new("b", "MKLVX"),
            SequenceRecord::new("c", "MRR"),
        ];
        let unique = vec![SequenceRecord::new("a", "MKLV"), SequenceRecord::new("c", "M-RR")];
        let map = map_by_sequence(&original, &unique).unwrap();
        assert_eq!(map.representative("a"), Some("a"));
        assert_eq!(map.representative("b"), Some("a"));
        assert_eq!(map.representative("c"), Some("c"));
    }

    #[test]
    fn unmatched_sequence_is_missing_mapping() {
        let original = vec![SequenceRecord::new("a", "MK"), SequenceRecord::new("b", "WW")];
        let unique = vec![SequenceRecord::new("a", "MK")];
        assert!(matches!(map_by_sequence(&original, &unique),
            Err(MatrixError::MissingMapping { id }) if id == "b"));
    }
}
