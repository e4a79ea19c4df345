/*
    Accession-level filters between pipeline stages
        FASTA: keep records whose id is in the accession list
        BUSCO: collect per-genome summaries, keep genomes above a completeness threshold
        taxa: keep rows of the taxa table whose accession key passed the BUSCO filter
        InterPro: accessions without enough annotation hits for the expected family
*/

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use super::accession::truncate_accession;
use super::error::{MatrixError, Result};
use super::fasta::{read_fasta, write_fasta};

pub const DEFAULT_MIN_COMPLETE_BUSCOS: f64 = 600.0;
const COMPLETE_BUSCOS_COLUMN: &str = "complete_buscos";

// accession column of a CSV table
pub fn read_accession_list(path: &Path, column: &str) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let idx = rdr.headers()?.iter()
        .position(|h| h == column)
        .ok_or_else(|| MatrixError::InvalidInput(format!("column {} not found in {:?}", column, path)))?;
    let mut accessions = Vec::new();
    for record in rdr.records() {
        if let Some(value) = record?.get(idx) {
            accessions.push(value.to_string());
        }
    }
    debug!("{} accessions listed in {:?}", accessions.len(), path);
    Ok(accessions)
}

// Write the records of `input` whose id is listed; returns listed ids absent from the file
pub fn filter_fasta(input: &Path, keep: &HashSet<String>, output: &Path) -> Result<BTreeSet<String>> {
    let records = read_fasta(input)?;
    let kept: Vec<_> = records.into_iter().filter(|r| keep.contains(&r.id)).collect();
    let found: HashSet<&str> = kept.iter().map(|r| r.id.as_str()).collect();
    let missing: BTreeSet<String> = keep.iter()
        .filter(|id| !found.contains(id.as_str()))
        .cloned()
        .collect();
    write_fasta(output, &kept)?;
    if !missing.is_empty() {
        warn!("{} listed sequences missing from {:?}", missing.len(), input);
        for id in &missing {
            debug!("- {}", id);
        }
    }
    Ok(missing)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuscoSummary {
    pub organism: String,
    pub complete_buscos: u64,
    pub single_copy_buscos: u64,
    pub fragmented_buscos: u64,
    pub missing_buscos: u64,
}

#[derive(Debug, Default, Deserialize)]
struct BuscoResults {
    #[serde(rename = "Complete BUSCOs", default)]
    complete: u64,
    #[serde(rename = "Single copy BUSCOs", default)]
    single_copy: u64,
    #[serde(rename = "Fragmented BUSCOs", default)]
    fragmented: u64,
    #[serde(rename = "Missing BUSCOs", default)]
    missing: u64,
}

#[derive(Debug, Deserialize)]
struct BuscoReport {
    #[serde(default)]
    results: BuscoResults,
}

pub fn parse_busco_json<R: Read>(organism: &str, reader: R) -> Result<BuscoSummary> {
    let report: BuscoReport = serde_json::from_reader(reader)?;
    Ok(BuscoSummary {
        organism: organism.to_string(),
        complete_buscos: report.results.complete,
        single_copy_buscos: report.results.single_copy,
        fragmented_buscos: report.results.fragmented,
        missing_buscos: report.results.missing,
    })
}

// One summary per immediate sub-directory holding exactly one .json file
pub fn collect_busco(base_dir: &Path) -> Result<Vec<BuscoSummary>> {
    let mut dirs: Vec<_> = fs::read_dir(base_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    let mut summaries = Vec::new();
    for dir in dirs {
        let json_files: Vec<_> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        if json_files.len() != 1 {
            warn!("{:?} contains {} json files", dir, json_files.len());
            continue;
        }
        let organism = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match File::open(&json_files[0]).map_err(MatrixError::from)
            .and_then(|f| parse_busco_json(&organism, f)) {
            Ok(summary) => summaries.push(summary),
            Err(e) => warn!("Skipping {:?}: {}", json_files[0], e),
        }
    }
    info!("Collected {} BUSCO summaries from {:?}", summaries.len(), base_dir);
    Ok(summaries)
}

pub fn write_busco_csv<W: Write>(writer: W, summaries: &[BuscoSummary]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for summary in summaries {
        wtr.serialize(summary)?;
    }
    wtr.flush()?;
    Ok(())
}

// Keep rows whose complete_buscos >= min_complete; other columns pass through unchanged.
// Returns (rows read, rows kept).
pub fn filter_busco<R: Read, W: Write>(reader: R, writer: W, min_complete: f64) -> Result<(usize, usize)> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let idx = headers.iter()
        .position(|h| h == COMPLETE_BUSCOS_COLUMN)
        .ok_or_else(|| MatrixError::InvalidInput(format!("column {} not found", COMPLETE_BUSCOS_COLUMN)))?;
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&headers)?;
    let mut total = 0usize;
    let mut kept = 0usize;
    for record in rdr.records() {
        let record = record?;
        total += 1;
        let value = record.get(idx).unwrap_or("");
        let complete: f64 = value.trim().parse().map_err(|_| MatrixError::InvalidInput(format!(
            "invalid {} value '{}' on row {}", COMPLETE_BUSCOS_COLUMN, value, total)))?;
        if complete >= min_complete {
            wtr.write_record(&record)?;
            kept += 1;
        }
    }
    wtr.flush()?;
    info!("Kept {} of {} genomes with at least {} complete BUSCOs", kept, total, min_complete);
    Ok((total, kept))
}

// Keep taxa rows whose `column` value shares its accession key with one of `organisms`.
// Returns (rows read, rows kept).
pub fn filter_taxa<R: Read, W: Write>(taxa: R, writer: W, column: &str, organisms: &[String]) -> Result<(usize, usize)> {
    let keys: HashSet<&str> = organisms.iter().map(|o| truncate_accession(o)).collect();
    let mut rdr = csv::Reader::from_reader(taxa);
    let headers = rdr.headers()?.clone();
    let idx = headers.iter()
        .position(|h| h == column)
        .ok_or_else(|| MatrixError::InvalidInput(format!("column {} not found", column)))?;
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&headers)?;
    let mut total = 0usize;
    let mut kept = 0usize;
    for record in rdr.records() {
        let record = record?;
        total += 1;
        if record.get(idx).map_or(false, |acc| keys.contains(truncate_accession(acc.trim()))) {
            wtr.write_record(&record)?;
            kept += 1;
        }
    }
    wtr.flush()?;
    info!("Original taxa count: {}, filtered taxa count: {}", total, kept);
    Ok((total, kept))
}

// Accessions (first column) with fewer than `min_hits` rows mentioning any query,
// compared case-insensitively against every column.
pub fn interpro_missing<R: Read>(reader: R, queries: &[String], min_hits: usize) -> Result<BTreeSet<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);
    let queries: Vec<String> = queries.iter().map(|q| q.to_lowercase()).collect();
    let mut hits: HashMap<String, usize> = HashMap::new();
    for record in rdr.records() {
        let record = record?;
        let accession = match record.get(0) {
            Some(a) => a.to_string(),
            None => continue,
        };
        let row = record.iter().collect::<Vec<&str>>().join(" ").to_lowercase();
        let count = hits.entry(accession).or_insert(0);
        if queries.iter().any(|q| row.contains(q.as_str())) {
            *count += 1;
        }
    }
    let missing: BTreeSet<String> = hits.into_iter()
        .filter(|(_, count)| *count < min_hits)
        .map(|(accession, _)| accession)
        .collect();
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn busco_json_defaults_missing_counts() {
        let json = r#"{"results": {"Complete BUSCOs": 742, "Missing BUSCOs": 16}}"#;
        let summary = parse_busco_json("GCA_1", json.as_bytes()).unwrap();
        assert_eq!(summary, BuscoSummary {
            organism: "GCA_1".to_string(),
            complete_buscos: 742,
            single_copy_buscos: 0,
            fragmented_buscos: 0,
            missing_buscos: 16,
        });
    }

    #[test]
    fn busco_threshold_keeps_other_columns() {
        let input = "organism,complete_buscos,missing_buscos\nA,600,10\nB,599,11\nC,758,0\n";
        let mut out = Vec::new();
        let (total, kept) = filter_busco(input.as_bytes(), &mut out, DEFAULT_MIN_COMPLETE_BUSCOS).unwrap();
        assert_eq!((total, kept), (3, 2));
        assert_eq!(String::from_utf8(out).unwrap(),
            "organism,complete_buscos,missing_buscos\nA,600,10\nC,758,0\n");
    }

    #[test]
    fn busco_threshold_needs_column() {
        let mut out = Vec::new();
        assert!(filter_busco("organism,score\nA,1\n".as_bytes(), &mut out, 1.0).is_err());
    }

    #[test]
    fn taxa_filtered_by_busco_organisms() {
        let taxa = "Accession,Phylum\nGCA_000146045.2,Ascomycota\nGCA_000002655.1,Ascomycota\nGCF_000001.1,Mucoromycota\n";
        let organisms = vec!["GCA_000146045.2_R64_genomic".to_string(), "GCF_000001.1".to_string()];
        let mut out = Vec::new();
        let (total, kept) = filter_taxa(taxa.as_bytes(), &mut out, "Accession", &organisms).unwrap();
        assert_eq!((total, kept), (3, 2));
        assert_eq!(String::from_utf8(out).unwrap(),
            "Accession,Phylum\nGCA_000146045.2,Ascomycota\nGCF_000001.1,Mucoromycota\n");
    }

    #[test]
    fn interpro_counts_hits_per_accession() {
        let tsv = "acc\tdb\tdesc\n\
                   GCA_1\tPfam\tAconitase family\n\
                   GCA_2\tPfam\tunrelated\n\
                   GCA_3\tIPR050926\tx\n\
                   GCA_3\tPfam\tACONITASE C-term\n";
        let queries = vec!["IPR050926".to_string(), "aconitase".to_string()];
        let missing = interpro_missing(tsv.as_bytes(), &queries, 1).unwrap();
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["GCA_2"]);
        let missing = interpro_missing(tsv.as_bytes(), &queries, 2).unwrap();
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["GCA_1", "GCA_2"]);
    }
}
