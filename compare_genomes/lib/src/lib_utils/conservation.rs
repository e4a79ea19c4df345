/*
    Conservation score at every column of a protein alignment
        count the occurrence of each residue A-Z in the column (X is unknown)
        score = count of the most frequent residue / column total

    If GapPolicy::Exclude
        column total counts residues only
    Else if GapPolicy::Include
        column total counts every sequence, gaps included
*/

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use log::{debug, info};
use super::error::{MatrixError, Result};
use super::fasta::Alignment;

const RESIDUE_SLOTS: usize = 26;
const UNKNOWN_RESIDUE: u8 = b'X';

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GapPolicy {
    #[default]
    Exclude,
    Include,
}

fn residue_slot(c: u8) -> Option<usize> {
    let upper = c.to_ascii_uppercase();
    if upper.is_ascii_uppercase() && upper != UNKNOWN_RESIDUE {
        Some((upper - b'A') as usize)
    } else {
        None
    }
}

pub fn column_conservation(column: impl IntoIterator<Item = u8>, policy: GapPolicy) -> f64 {
    let mut counts = [0u32; RESIDUE_SLOTS];
    let mut residues = 0u32;
    let mut sequences = 0u32;
    for c in column {
        sequences += 1;
        if let Some(slot) = residue_slot(c) {
            counts[slot] += 1;
            residues += 1;
        }
    }
    let total = match policy {
        GapPolicy::Exclude => residues,
        GapPolicy::Include => sequences,
    };
    if total == 0 {
        return 0.0;
    }
    let max = counts.iter().copied().max().unwrap_or(0);
    f64::from(max) / f64::from(total)
}

pub fn alignment_conservation(alignment: &Alignment, policy: GapPolicy) -> Vec<f64> {
    debug!("Scoring {} columns of {} sequences", alignment.width(), alignment.len());
    (0..alignment.width())
        .map(|idx| column_conservation(alignment.column(idx), policy))
        .collect()
}

// 1-based residue position of the reference sequence -> score of its column
pub fn project_onto(alignment: &Alignment, scores: &[f64], accession: &str) -> Result<BTreeMap<usize, f64>> {
    let reference = alignment.find(accession)
        .ok_or_else(|| MatrixError::AccessionNotFound(accession.to_string()))?;
    if scores.len() != reference.sequence.len() {
        return Err(MatrixError::Dimension(format!(
            "{} scores for an alignment of width {}", scores.len(), reference.sequence.len())));
    }
    let mut residue_position = 0usize;
    let mut position_map = BTreeMap::new();
    for (&residue, &score) in reference.sequence.iter().zip(scores) {
        // letters (X included) are residues, every other character is a gap
        if residue.is_ascii_alphabetic() {
            residue_position += 1;
            position_map.insert(residue_position, score);
        }
    }
    info!("{} residues of {} mapped to conservation scores", position_map.len(), reference.id);
    Ok(position_map)
}

pub fn write_score_table<W: Write>(writer: &mut W, name: &str, accession: &str, scores: &BTreeMap<usize, f64>) -> Result<()> {
    writeln!(writer, "# Conservation scores for {}, accession {}", name, accession)?;
    writeln!(writer, "# Position\tConservation_Score")?;
    for (pos, score) in scores {
        writeln!(writer, "{}\t{:.4}", pos, score)?;
    }
    Ok(())
}

// UCSF Chimera attribute assignment file
pub fn write_defattr<W: Write>(writer: &mut W, name: &str, scores: &BTreeMap<usize, f64>) -> Result<()> {
    writeln!(writer, "# Chimera attribute definition for {} conservation scores", name)?;
    writeln!(writer, "attribute: conservation")?;
    writeln!(writer, "match mode: 1-to-1")?;
    writeln!(writer, "recipient: residues")?;
    for (pos, score) in scores {
        writeln!(writer, "\t:{}\t{:.4}", pos, score)?;
    }
    Ok(())
}

// {"<residue>": score} for the 3Dmol.js and Mol* viewers
pub fn write_viewer_json<W: Write>(writer: &mut W, scores: &BTreeMap<usize, f64>) -> Result<()> {
    let object: serde_json::Map<String, serde_json::Value> = scores.iter()
        .map(|(pos, &score)| (pos.to_string(), serde_json::Value::from(score)))
        .collect();
    serde_json::to_writer_pretty(&mut *writer, &object)?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_column_scores(path: &Path, scores: &[f64]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "Position\tConservation_Score")?;
    for (idx, score) in scores.iter().enumerate() {
        writeln!(writer, "{}\t{:.4}", idx + 1, score)?;
    }
    writer.flush()?;
    Ok(())
}
