// Integration tests running each stage against files on disk

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use alignment_matrix::lib_utils::distance_matrix::{read_labelled, read_matrix};
use alignment_matrix::lib_utils::duplicates::{map_by_sequence, read_unique_phylip};
use alignment_matrix::lib_utils::filters::{collect_busco, filter_fasta, read_accession_list};
use alignment_matrix::{
    build_from_dir, check_alignment, expand_distance_matrix, read_fasta, read_mldist,
    MatrixError, Tree,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_expand_iqtree_duplicates() {
    let dir = TempDir::new().unwrap();
    let fasta = write(&dir, "ACO2.fasta",
        ">GCA_000000001.1\nMKL-V\n>GCA_000000002.1\nMRRV\n>GCA_000000003.1\nMKLV\n");
    let unique = write(&dir, "tree.uniqueseq.phy",
        "2 4\nGCA_000000001.1 MKLV\nGCA_000000002.1 MRRV\n");
    let mldist = write(&dir, "tree.mldist",
        "2\nGCA_000000001.1 0.000000 0.421000\nGCA_000000002.1 0.421000 0.000000\n");

    let original = read_fasta(&fasta).unwrap();
    let duplicates = map_by_sequence(&original, &read_unique_phylip(&unique).unwrap()).unwrap();
    let ids: Vec<String> = original.iter().map(|r| r.id.clone()).collect();
    let full = expand_distance_matrix(&read_mldist(&mldist).unwrap(), &duplicates, &ids).unwrap();

    let out = dir.path().join("full_mat_ACO2.csv");
    full.write_labelled(&out).unwrap();
    let reread = read_labelled(&out).unwrap();
    assert_eq!(reread, read_matrix(&out).unwrap());
    assert_eq!(read_matrix(&mldist).unwrap().len(), 2);
    let full_mldist = dir.path().join("full_mat_ACO2.mldist");
    full.write_mldist(&full_mldist).unwrap();
    assert_eq!(read_matrix(&full_mldist).unwrap(), reread);
    assert_eq!(reread.ids(), ids.as_slice());
    assert_eq!(reread.values(), &[
        0.0, 0.421, 0.0,
        0.421, 0.0, 0.421,
        0.0, 0.421, 0.0,
    ]);
}

#[test]
fn test_supermatrix_from_directory() {
    let dir = TempDir::new().unwrap();
    write(&dir, "LYS1.aln", ">t1\nMK\n>t2\nMR\n");
    write(&dir, "ACO2.aln", ">t2\nWWW\n>t3\nW-W\n");
    write(&dir, "broken.aln", ">t1\nMK\n>t2\nM\n");
    write(&dir, "notes.txt", "ignored");

    let matrix = build_from_dir(dir.path(), ".aln", b'?', 2).unwrap();
    assert_eq!(matrix.taxa, vec!["t1", "t2", "t3"]);
    assert_eq!(matrix.width(), 5);

    let prefix = dir.path().join("supermatrix.fasta");
    matrix.write_all(&prefix).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("supermatrix.fasta.partitions")).unwrap(),
        "ACO2 = 1-3;\nLYS1 = 4-5;\n");
    let written = check_alignment(&prefix).unwrap();
    let rows: Vec<String> = written.records().iter().map(|r| r.sequence_str().into_owned()).collect();
    assert_eq!(rows, vec!["???MK", "WWWMR", "W-W??"]);
    let phylip = fs::read_to_string(dir.path().join("supermatrix.fasta.phylip")).unwrap();
    assert!(phylip.starts_with(" 3 5\nt1 ???MK\n"));
}

#[test]
fn test_supermatrix_missing_directory() {
    let dir = TempDir::new().unwrap();
    let err = build_from_dir(&dir.path().join("absent"), ".aln", b'?', 1).unwrap_err();
    assert!(matches!(err, MatrixError::InvalidInput(_)));
}

#[test]
fn test_gzipped_tree_distances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tree.treefile.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(b"((A:0.1,B:0.2):0.3,C:0.4);\n").unwrap();
    encoder.finish().unwrap();

    let tree = Tree::read(&path).unwrap();
    let m = tree.patristic_matrix();
    assert!((m.get(0, 1) - 0.3).abs() < 1e-12);
    assert!((m.get(0, 2) - 0.8).abs() < 1e-12);
}

#[test]
fn test_filter_fasta_by_accession_table() {
    let dir = TempDir::new().unwrap();
    let table = write(&dir, "taxa.csv", "Accession,Phylum\nGCA_1,Ascomycota\nGCA_3,Mucoromycota\n");
    let fasta = write(&dir, "LYS2.fasta", ">GCA_1\nMK\n>GCA_2\nMR\n");
    let keep: HashSet<String> = read_accession_list(&table, "Accession").unwrap().into_iter().collect();

    let out = dir.path().join("LYS2_filtered.fasta");
    let missing = filter_fasta(&fasta, &keep, &out).unwrap();
    assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["GCA_3"]);
    let kept = read_fasta(&out).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, "GCA_1");
}

#[test]
fn test_collect_busco_skips_ambiguous_directories() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("GCA_1")).unwrap();
    fs::write(dir.path().join("GCA_1").join("short_summary.json"),
        r#"{"results": {"Complete BUSCOs": 700, "Single copy BUSCOs": 690, "Fragmented BUSCOs": 3, "Missing BUSCOs": 5}}"#).unwrap();
    fs::create_dir(dir.path().join("GCA_2")).unwrap();
    fs::create_dir(dir.path().join("GCA_3")).unwrap();
    fs::write(dir.path().join("GCA_3").join("a.json"), "{}").unwrap();
    fs::write(dir.path().join("GCA_3").join("b.json"), "{}").unwrap();

    let summaries = collect_busco(dir.path()).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].organism, "GCA_1");
    assert_eq!(summaries[0].complete_buscos, 700);
    assert_eq!(summaries[0].single_copy_buscos, 690);
}
