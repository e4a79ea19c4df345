/*
    Concatenate per-gene alignments into one supermatrix
        read every alignment file in the directory on a thread pool
        taxa = sorted union of sequence ids across genes
        taxa absent from a gene are filled with the missing character
        one partition per gene, 1-based inclusive columns
*/

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use threadpool::ThreadPool;
use log::{debug, error, info, warn};
use super::error::{MatrixError, Result};
use super::fasta::{check_alignment, write_records, Alignment, SequenceRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub gene: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct GeneAlignment {
    pub gene: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone)]
pub struct Supermatrix {
    pub taxa: Vec<String>,
    pub sequences: Vec<Vec<u8>>,
    pub partitions: Vec<Partition>,
}

pub fn list_alignment_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MatrixError::InvalidInput(format!("input directory {:?} not found", dir)));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.ends_with(suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!("{} alignment files with suffix {} in {:?}", files.len(), suffix, dir);
    Ok(files)
}

fn gene_name(path: &Path, suffix: &str) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.strip_suffix(suffix).unwrap_or(name).to_string()
}

// Read alignment files in parallel; files failing validation are logged and skipped.
// Results keep the order of `files`.
pub fn load_alignments(files: &[PathBuf], suffix: &str, nproc: usize) -> Vec<GeneAlignment> {
    let pool = ThreadPool::new(nproc.max(1));
    let (tx, rx) = mpsc::channel();
    for (idx, file) in files.iter().enumerate() {
        let tx = tx.clone();
        let file = file.clone();
        pool.execute(move || {
            let result = check_alignment(&file);
            // receiver outlives the pool
            let _ = tx.send((idx, file, result));
        });
    }
    drop(tx);
    let mut loaded: Vec<(usize, GeneAlignment)> = Vec::with_capacity(files.len());
    for (idx, file, result) in rx.iter() {
        match result {
            Ok(alignment) => {
                debug!("Loaded {:?}: {} sequences, {} columns", file, alignment.len(), alignment.width());
                loaded.push((idx, GeneAlignment { gene: gene_name(&file, suffix), alignment }));
            }
            Err(e) => error!("Skipping {:?}: {}", file, e),
        }
    }
    pool.join();
    info!("Threadpool jobs complete");
    loaded.sort_by_key(|(idx, _)| *idx);
    loaded.into_iter().map(|(_, gene)| gene).collect()
}

pub fn build_supermatrix(genes: &[GeneAlignment], missing: u8) -> Result<Supermatrix> {
    if genes.is_empty() {
        return Err(MatrixError::InvalidInput("no alignments to concatenate".to_string()));
    }
    let taxa: Vec<String> = genes.iter()
        .flat_map(|g| g.alignment.records().iter().map(|r| r.id.clone()))
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();
    info!("Found {} taxa", taxa.len());

    let mut sequences: Vec<Vec<u8>> = vec![Vec::new(); taxa.len()];
    let mut partitions = Vec::with_capacity(genes.len());
    let mut start = 1usize;
    for gene in genes {
        let width = gene.alignment.width();
        let mut by_taxon: HashMap<&str, &[u8]> = HashMap::new();
        for record in gene.alignment.records() {
            if by_taxon.insert(record.id.as_str(), &record.sequence).is_some() {
                warn!("{} appears more than once in {}, keeping the last copy", record.id, gene.gene);
            }
        }
        for (taxon, sequence) in taxa.iter().zip(sequences.iter_mut()) {
            match by_taxon.get(taxon.as_str()) {
                Some(residues) => sequence.extend_from_slice(residues),
                None => sequence.extend(std::iter::repeat(missing).take(width)),
            }
        }
        partitions.push(Partition { gene: gene.gene.clone(), start, end: start + width - 1 });
        start += width;
    }
    let supermatrix = Supermatrix { taxa, sequences, partitions };
    info!("Supermatrix length: {} positions", supermatrix.width());
    info!("Number of partitions: {}", supermatrix.partitions.len());
    Ok(supermatrix)
}

pub fn build_from_dir(dir: &Path, suffix: &str, missing: u8, nproc: usize) -> Result<Supermatrix> {
    let files = list_alignment_files(dir, suffix)?;
    let genes = load_alignments(&files, suffix, nproc);
    build_supermatrix(&genes, missing)
}

impl Supermatrix {
    pub fn width(&self) -> usize {
        self.sequences.first().map_or(0, Vec::len)
    }

    pub fn records(&self) -> Vec<SequenceRecord> {
        self.taxa.iter()
            .zip(&self.sequences)
            .map(|(taxon, sequence)| SequenceRecord::new(taxon.clone(), sequence.clone()))
            .collect()
    }

    pub fn write_fasta_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_records(writer, &self.records())
    }

    // relaxed PHYLIP: names padded to the longest name
    pub fn write_phylip_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let name_width = self.taxa.iter().map(|t| t.len()).max().unwrap_or(0);
        writeln!(writer, " {} {}", self.taxa.len(), self.width())?;
        for (taxon, sequence) in self.taxa.iter().zip(&self.sequences) {
            write!(writer, "{:<width$} ", taxon, width = name_width)?;
            writer.write_all(sequence)?;
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn write_partitions_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for p in &self.partitions {
            writeln!(writer, "{} = {}-{};", p.gene, p.start, p.end)?;
        }
        Ok(())
    }

    // <prefix>, <prefix>.phylip, <prefix>.partitions
    pub fn write_all(&self, prefix: &Path) -> Result<()> {
        let prefix_str = prefix.to_string_lossy();
        write_file(prefix, |w| self.write_fasta_to(w))?;
        write_file(&PathBuf::from(format!("{}.phylip", prefix_str)), |w| self.write_phylip_to(w))?;
        write_file(&PathBuf::from(format!("{}.partitions", prefix_str)), |w| self.write_partitions_to(w))?;
        Ok(())
    }
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    writer.flush()?;
    info!("Wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gene(name: &str, rows: &[(&str, &str)]) -> GeneAlignment {
        GeneAlignment {
            gene: name.to_string(),
            alignment: Alignment::new(rows.iter()
                .map(|(id, seq)| SequenceRecord::new(*id, seq.as_bytes()))
                .collect()).unwrap(),
        }
    }

    #[test]
    fn fills_missing_taxa_and_numbers_partitions() {
        let genes = vec![
            gene("ACO2", &[("t2", "MKV"), ("t1", "MRV")]),
            gene("LYS1", &[("t3", "WW"), ("t1", "W-")]),
        ];
        let matrix = build_supermatrix(&genes, b'?').unwrap();
        assert_eq!(matrix.taxa, vec!["t1", "t2", "t3"]);
        assert_eq!(matrix.sequences, vec![
            b"MRVW-".to_vec(),
            b"MKV??".to_vec(),
            b"???WW".to_vec(),
        ]);
        assert_eq!(matrix.partitions, vec![
            Partition { gene: "ACO2".to_string(), start: 1, end: 3 },
            Partition { gene: "LYS1".to_string(), start: 4, end: 5 },
        ]);
    }

    #[test]
    fn writes_phylip_and_partitions() {
        let matrix = build_supermatrix(&[gene("g", &[("long_name", "AC"), ("s", "A-")])], b'?').unwrap();
        let mut phylip = Vec::new();
        matrix.write_phylip_to(&mut phylip).unwrap();
        assert_eq!(String::from_utf8(phylip).unwrap(), " 2 2\nlong_name AC\ns         A-\n");
        let mut partitions = Vec::new();
        matrix.write_partitions_to(&mut partitions).unwrap();
        assert_eq!(String::from_utf8(partitions).unwrap(), "g = 1-2;\n");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(build_supermatrix(&[], b'?').is_err());
    }
}
