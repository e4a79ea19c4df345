// AlphaFold3 job description built from FASTA records

use std::io::Write;
use serde::{Deserialize, Serialize};
use super::error::Result;
use super::fasta::SequenceRecord;

const MODEL_SEEDS: [u32; 2] = [1, 2];
const DIALECT: &str = "alphafold3";
const DIALECT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protein {
    pub sequence: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub protein: Protein,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlphaFoldJob {
    pub name: String,
    pub model_seeds: Vec<u32>,
    pub sequences: Vec<SequenceEntry>,
    pub dialect: String,
    pub version: u32,
}

impl AlphaFoldJob {
    pub fn from_records(name: &str, records: &[SequenceRecord]) -> Self {
        let sequences = records.iter()
            .map(|r| SequenceEntry {
                protein: Protein {
                    sequence: r.sequence_str().into_owned(),
                    name: r.id.clone(),
                    description: r.description.clone(),
                },
            })
            .collect();
        Self {
            name: name.to_string(),
            model_seeds: MODEL_SEEDS.to_vec(),
            sequences,
            dialect: DIALECT.to_string(),
            version: DIALECT_VERSION,
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}
