/*
    Read and write FASTA records
    Check if a file is a valid alignment
        Sequences only after a header
        No header without a sequence
        Sequences not interrupted by empty lines
        Every sequence of the same length
*/

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use log::{debug, info, trace};
use super::error::{MatrixError, Result};
use super::struct_helper::FileBufferHelper;

const FASTA_LINE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub description: String,
    pub sequence: Vec<u8>,
}

impl SequenceRecord {
    pub fn new(id: impl Into<String>, sequence: impl Into<Vec<u8>>) -> Self {
        let id = id.into();
        Self {
            description: id.clone(),
            id,
            sequence: sequence.into(),
        }
    }

    fn from_header(header: &str) -> Self {
        let description = header.trim().to_string();
        let id = description.split_whitespace().next().unwrap_or("").to_string();
        Self {
            id,
            description,
            sequence: Vec::new(),
        }
    }

    pub fn sequence_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.sequence)
    }
}

// Lenient reader: blank lines are skipped, empty records are kept
pub fn parse_fasta<R: BufRead>(file: &mut FileBufferHelper<R>) -> Result<Vec<SequenceRecord>> {
    let mut records: Vec<SequenceRecord> = Vec::new();
    while file.next_line()? {
        let line = file.line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            trace!("Processing {}", header);
            records.push(SequenceRecord::from_header(header));
        } else {
            match records.last_mut() {
                Some(record) => record.sequence.extend(line.bytes().filter(|b| !b.is_ascii_whitespace())),
                None => return Err(file.parse_error("Encountered sequences before header")),
            }
        }
    }
    debug!("Read {} records from {:?}", records.len(), file.path);
    Ok(records)
}

pub fn read_fasta(path: &Path) -> Result<Vec<SequenceRecord>> {
    let mut file = FileBufferHelper::new(path)?;
    parse_fasta(&mut file)
}

pub fn write_records<W: Write>(writer: &mut W, records: &[SequenceRecord]) -> Result<()> {
    for record in records {
        writeln!(writer, ">{}", record.description)?;
        for chunk in record.sequence.chunks(FASTA_LINE_WIDTH) {
            writer.write_all(chunk)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub fn write_fasta(path: &Path, records: &[SequenceRecord]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_records(&mut writer, records)?;
    writer.flush()?;
    info!("Wrote {} records to {:?}", records.len(), path);
    Ok(())
}

// A set of records of identical, non-zero length
#[derive(Debug, Clone)]
pub struct Alignment {
    records: Vec<SequenceRecord>,
    width: usize,
}

impl Alignment {
    pub fn new(records: Vec<SequenceRecord>) -> Result<Self> {
        let first = records.first()
            .ok_or_else(|| MatrixError::Alignment("alignment contains no sequences".to_string()))?;
        let width = first.sequence.len();
        if width == 0 {
            return Err(MatrixError::Alignment(format!("{} has an empty sequence", first.id)));
        }
        if let Some(bad) = records.iter().find(|r| r.sequence.len() != width) {
            return Err(MatrixError::Alignment(format!(
                "{} has length {} but alignment length is {}", bad.id, bad.sequence.len(), width)));
        }
        Ok(Self { records, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = u8> + '_ {
        self.records.iter().map(move |r| r.sequence[idx])
    }

    // first record whose id contains the accession
    pub fn find(&self, accession: &str) -> Option<&SequenceRecord> {
        self.records.iter().find(|r| r.id.contains(accession))
    }
}

// Strict reader for alignments
pub fn check_alignment_reader<R: BufRead>(file: &mut FileBufferHelper<R>) -> Result<Alignment> {
    let mut records: Vec<SequenceRecord> = Vec::new();
    let mut found_header = false;
    let mut interruption = false;
    let mut alignment_length = 0usize;

    while file.next_line()? {
        let line = file.line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            if found_header {
                // header right after a header
                let previous = records.last().map(|r| r.id.clone()).unwrap_or_default();
                return Err(MatrixError::Alignment(format!(
                    "No sequence encountered for {}. Remove headers without any sequence and try again.", previous)));
            }
            if let Some(previous) = records.last() {
                check_length(previous, &mut alignment_length)?;
            }
            records.push(SequenceRecord::from_header(header));
            found_header = true;
            interruption = false;
        } else if line.trim().is_empty() {
            if found_header {
                return Err(file.parse_error("Header interrupted by newline before encountering sequence"));
            }
            // either between records or in the middle of a sequence
            interruption = true;
        } else {
            match records.last_mut() {
                None => return Err(file.parse_error("Encountered sequences before header")),
                Some(_) if interruption => {
                    return Err(file.parse_error("Sequence interrupted by newline"))
                }
                Some(record) => {
                    record.sequence.extend(line.bytes().filter(|b| !b.is_ascii_whitespace()));
                    found_header = false;
                }
            }
        }
    }
    if found_header {
        let last = records.last().map(|r| r.id.clone()).unwrap_or_default();
        return Err(MatrixError::Alignment(format!("No sequence encountered for {}", last)));
    }
    if let Some(last) = records.last() {
        check_length(last, &mut alignment_length)?;
    }
    info!("Alignment {:?}: {} sequences of length {}", file.path, records.len(), alignment_length);
    Alignment::new(records)
}

pub fn check_alignment(path: &Path) -> Result<Alignment> {
    let mut file = FileBufferHelper::new(path)?;
    check_alignment_reader(&mut file)
}

fn check_length(record: &SequenceRecord, alignment_length: &mut usize) -> Result<()> {
    let length = record.sequence.len();
    if *alignment_length == 0 {
        debug!("Alignment length set as {}", length);
        *alignment_length = length;
    } else if *alignment_length != length {
        return Err(MatrixError::Alignment(format!(
            "{} does not match alignment length ({} != {})", record.id, length, alignment_length)));
    }
    Ok(())
}
