/*
    Score every alignment given on the command line
        validate the alignment (equal lengths, fasta only)
        conservation score at every column, gaps handled by GapPolicy
        write <stem>_conservation.tsv to the output directory

    If an accession is given
        map column scores onto the residues of that sequence
        write the score table, Chimera defattr and viewer JSON
*/

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use threadpool::ThreadPool;
use log::{debug, error, info};
use alignment_matrix::lib_utils::conservation::{
    project_onto, write_column_scores, write_defattr, write_score_table, write_viewer_json,
};
use alignment_matrix::{alignment_conservation, check_alignment, GapPolicy, MatrixError, Result};

pub struct ConservationJob {
    pub policy: GapPolicy,
    pub accession: Option<String>,
    pub outdir: PathBuf,
}

// Returns the number of alignments that could not be scored
pub fn report_conservation(files: &[PathBuf], job: ConservationJob, nproc: usize) -> Result<usize> {
    fs::create_dir_all(&job.outdir)?;
    let pool = ThreadPool::new(nproc.max(1));
    let (tx, rx) = mpsc::channel();
    for file in files {
        let tx = tx.clone();
        let file = file.clone();
        let policy = job.policy;
        let accession = job.accession.clone();
        let outdir = job.outdir.clone();
        pool.execute(move || {
            let result = score_file(&file, policy, accession.as_deref(), &outdir);
            let _ = tx.send((file, result));
        });
    }
    drop(tx);
    let mut failed = 0usize;
    for (file, result) in rx.iter() {
        match result {
            Ok(out) => info!("Conservation scores for {:?} written to {:?}", file, out),
            Err(e) => {
                error!("Skipping {:?}: {}", file, e);
                failed += 1;
            }
        }
    }
    pool.join();
    info!("Threadpool jobs complete");
    Ok(failed)
}

fn file_stem(file: &Path) -> Result<String> {
    file.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| MatrixError::InvalidInput(format!("no file name in {:?}", file)))
}

fn score_file(file: &Path, policy: GapPolicy, accession: Option<&str>, outdir: &Path) -> Result<PathBuf> {
    let alignment = check_alignment(file)?;
    info!("Alignment complies requirements {:?}", file);
    let scores = alignment_conservation(&alignment, policy);
    let stem = file_stem(file)?;
    let out = outdir.join(format!("{}_conservation.tsv", stem));
    write_column_scores(&out, &scores)?;

    if let Some(accession) = accession {
        let mapped = project_onto(&alignment, &scores, accession)?;
        debug!("Writing residue level scores of {} for {}", accession, stem);
        let mut table = BufWriter::new(File::create(outdir.join(format!("{}_{}_scores.txt", stem, accession)))?);
        write_score_table(&mut table, &stem, accession, &mapped)?;
        table.flush()?;
        let mut defattr = BufWriter::new(File::create(outdir.join(format!("{}_{}.defattr", stem, accession)))?);
        write_defattr(&mut defattr, &stem, &mapped)?;
        defattr.flush()?;
        let mut viewer = BufWriter::new(File::create(outdir.join(format!("{}_{}_3dmol.json", stem, accession)))?);
        write_viewer_json(&mut viewer, &mapped)?;
        viewer.flush()?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_valid_files_and_skips_broken_ones() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("LYS1.aln");
        fs::write(&good, ">GCA_1\nMK-V\n>GCA_2\nMKLV\n>GCA_3\nMRLV\n").unwrap();
        let bad = dir.path().join("broken.aln");
        fs::write(&bad, ">GCA_1\nMK\n>GCA_2\nM\n").unwrap();
        let outdir = dir.path().join("scores");

        let job = ConservationJob { policy: GapPolicy::Exclude, accession: Some("GCA_1".to_string()), outdir: outdir.clone() };
        let failed = report_conservation(&[good, bad], job, 2).unwrap();
        assert_eq!(failed, 1);

        let table = fs::read_to_string(outdir.join("LYS1_conservation.tsv")).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Position\tConservation_Score");
        assert_eq!(lines[2], "2\t0.6667");
        assert_eq!(lines[3], "3\t1.0000");
        let residues = fs::read_to_string(outdir.join("LYS1_GCA_1_scores.txt")).unwrap();
        assert!(residues.ends_with("3\t1.0000\n"));
        assert!(outdir.join("LYS1_GCA_1.defattr").exists());
        assert!(outdir.join("LYS1_GCA_1_3dmol.json").exists());
    }
}
