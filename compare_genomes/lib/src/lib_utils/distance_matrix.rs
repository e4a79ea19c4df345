/*
    Square matrix of pairwise distances indexed by sequence identifiers
        mldist: IQ-TREE output, first line is the count, then "<id> <d1> ... <dn>"
        labelled: header "" id1 ... idn, then "<id> <d1> ... <dn>"
*/

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use log::{debug, info, warn};
use super::accession::truncate_accession;
use super::error::{MatrixError, Result};
use super::struct_helper::FileBufferHelper;

const SYMMETRY_TOLERANCE: f64 = 1e-9;
const PREALLOCATED_ROWS: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    ids: Vec<String>,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(ids: Vec<String>, values: Vec<f64>) -> Result<Self> {
        let n = ids.len();
        if values.len() != n * n {
            return Err(MatrixError::Dimension(format!(
                "{} identifiers need {} values, got {}", n, n * n, values.len())));
        }
        Ok(Self { ids, values })
    }

    pub fn zeros(ids: Vec<String>) -> Self {
        let n = ids.len();
        Self { ids, values: vec![0.0; n * n] }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.len() + j]
    }

    pub fn set_symmetric(&mut self, i: usize, j: usize, distance: f64) {
        let n = self.len();
        self.values[i * n + j] = distance;
        self.values[j * n + i] = distance;
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.len();
        &self.values[i * n..(i + 1) * n]
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|x| x == id)
    }

    pub fn truncate_ids(&mut self) {
        for id in self.ids.iter_mut() {
            let key = truncate_accession(id).to_string();
            *id = key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        for i in 0..self.len() {
            if self.get(i, i) != 0.0 {
                return Err(MatrixError::Dimension(format!(
                    "non-zero diagonal for {}: {}", self.ids[i], self.get(i, i))));
            }
            for j in 0..i {
                if (self.get(i, j) - self.get(j, i)).abs() > SYMMETRY_TOLERANCE {
                    return Err(MatrixError::Dimension(format!(
                        "asymmetric distances between {} and {}", self.ids[i], self.ids[j])));
                }
            }
        }
        Ok(())
    }

    // new matrix over the given row positions, in that order
    pub fn select(&self, positions: &[usize]) -> DistanceMatrix {
        let ids = positions.iter().map(|&p| self.ids[p].clone()).collect();
        let values = positions.iter()
            .flat_map(|&i| positions.iter().map(move |&j| (i, j)))
            .map(|(i, j)| self.get(i, j))
            .collect();
        DistanceMatrix { ids, values }
    }

    // (i, j, distance) for every i < j
    pub fn upper_triangle(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let n = self.len();
        (0..n).flat_map(move |i| (i + 1..n).map(move |j| (i, j, self.get(i, j))))
    }

    pub fn write_mldist_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{}", self.len())?;
        for (i, id) in self.ids.iter().enumerate() {
            write!(writer, "{}", id)?;
            for d in self.row(i) {
                write!(writer, " {}", d)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn write_labelled_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write!(writer, "\"\"")?;
        for id in &self.ids {
            write!(writer, " {}", id)?;
        }
        writeln!(writer)?;
        for (i, id) in self.ids.iter().enumerate() {
            write!(writer, "{}", id)?;
            for d in self.row(i) {
                write!(writer, " {}", d)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn write_mldist(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_mldist_to(&mut writer)?;
        writer.flush()?;
        info!("Wrote {}x{} matrix to {:?}", self.len(), self.len(), path);
        Ok(())
    }

    pub fn write_labelled(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_labelled_to(&mut writer)?;
        writer.flush()?;
        info!("Wrote {}x{} matrix to {:?}", self.len(), self.len(), path);
        Ok(())
    }
}

fn parse_row<R: BufRead>(file: &FileBufferHelper<R>, expected: usize) -> Result<(String, Vec<f64>)> {
    let mut fields = file.line.split_whitespace();
    let id = fields.next()
        .ok_or_else(|| file.parse_error("missing identifier"))?
        .to_string();
    let row = fields
        .map(|field| field.parse::<f64>()
            .map_err(|e| file.parse_error(format!("invalid distance '{}': {}", field, e))))
        .collect::<Result<Vec<f64>>>()?;
    if row.len() != expected {
        return Err(file.parse_error(format!(
            "{} has {} distances, expected {}", id, row.len(), expected)));
    }
    Ok((id, row))
}

pub fn parse_mldist<R: BufRead>(file: &mut FileBufferHelper<R>) -> Result<DistanceMatrix> {
    let mut count: Option<usize> = None;
    while file.next_line()? {
        if !file.line.trim().is_empty() {
            let n = file.line.trim().parse::<usize>()
                .map_err(|e| file.parse_error(format!("invalid sequence count: {}", e)))?;
            count = Some(n);
            break;
        }
    }
    let n = count.ok_or_else(|| file.parse_error("empty distance matrix file"))?;
    let cells = n.checked_mul(n)
        .ok_or_else(|| file.parse_error(format!("sequence count {} too large", n)))?;
    // the count is untrusted until the rows are read
    let mut ids = Vec::with_capacity(n.min(PREALLOCATED_ROWS));
    let mut values = Vec::with_capacity(cells.min(PREALLOCATED_ROWS));
    while file.next_line()? {
        if file.line.trim().is_empty() {
            continue;
        }
        if ids.len() == n {
            return Err(file.parse_error(format!("more than {} rows", n)));
        }
        let (id, row) = parse_row(file, n)?;
        ids.push(id);
        values.extend(row);
    }
    if ids.len() != n {
        return Err(file.parse_error(format!("expected {} rows, found {}", n, ids.len())));
    }
    debug!("Parsed {}x{} distance matrix from {:?}", n, n, file.path);
    DistanceMatrix::new(ids, values)
}

pub fn parse_labelled<R: BufRead>(file: &mut FileBufferHelper<R>) -> Result<DistanceMatrix> {
    let mut header: Option<Vec<String>> = None;
    while file.next_line()? {
        if !file.line.trim().is_empty() {
            header = Some(file.line.split_whitespace().skip(1).map(String::from).collect());
            break;
        }
    }
    let columns = header.ok_or_else(|| file.parse_error("empty distance matrix file"))?;
    let n = columns.len();
    let mut ids = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n * n);
    while file.next_line()? {
        if file.line.trim().is_empty() {
            continue;
        }
        let (id, row) = parse_row(file, n)?;
        if ids.len() < n && columns[ids.len()] != id {
            warn!("Row {} does not match column {} in {:?}", id, columns[ids.len()], file.path);
        }
        ids.push(id);
        values.extend(row);
    }
    if ids.len() != n {
        return Err(file.parse_error(format!("expected {} rows, found {}", n, ids.len())));
    }
    DistanceMatrix::new(ids, values)
}

pub fn read_mldist(path: &Path) -> Result<DistanceMatrix> {
    let mut file = FileBufferHelper::new(path)?;
    parse_mldist(&mut file)
}

pub fn read_labelled(path: &Path) -> Result<DistanceMatrix> {
    let mut file = FileBufferHelper::new(path)?;
    parse_labelled(&mut file)
}

// mldist when the first non-empty line is a bare count, labelled otherwise
pub fn read_matrix(path: &Path) -> Result<DistanceMatrix> {
    let mut file = FileBufferHelper::new(path)?;
    let mut is_mldist = false;
    while file.next_line()? {
        let first = file.line.trim();
        if !first.is_empty() {
            is_mldist = first.parse::<usize>().is_ok();
            break;
        }
    }
    file.buffer_reset()?;
    if is_mldist {
        parse_mldist(&mut file)
    } else {
        parse_labelled(&mut file)
    }
}

// Restrict both matrices to the accessions they share, ordered as in `a`.
// Identifiers are compared after truncation to accession keys.
pub fn align_common(a: &DistanceMatrix, b: &DistanceMatrix) -> Result<(DistanceMatrix, DistanceMatrix)> {
    let mut a = a.clone();
    let mut b = b.clone();
    a.truncate_ids();
    b.truncate_ids();
    let b_index: HashMap<&str, usize> = b.ids.iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut seen = HashSet::new();
    let mut a_positions = Vec::new();
    let mut b_positions = Vec::new();
    for (i, id) in a.ids.iter().enumerate() {
        if let Some(&j) = b_index.get(id.as_str()) {
            if seen.insert(id.as_str()) {
                a_positions.push(i);
                b_positions.push(j);
            } else {
                warn!("Duplicate accession key {} ignored", id);
            }
        }
    }
    if a_positions.is_empty() {
        return Err(MatrixError::InvalidInput("distance matrices share no accessions".to_string()));
    }
    info!("{} accessions shared ({} and {} in the inputs)", a_positions.len(), a.len(), b.len());
    Ok((a.select(&a_positions), b.select(&b_positions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn helper(text: &str) -> FileBufferHelper<Cursor<&str>> {
        FileBufferHelper::from_reader(Path::new("test.mldist"), Cursor::new(text))
    }

    fn matrix(ids: &[&str], values: &[f64]) -> DistanceMatrix {
        DistanceMatrix::new(ids.iter().map(|s| s.to_string()).collect(), values.to_vec()).unwrap()
    }

    #[test]
    fn parse_mldist_rows() {
        let m = parse_mldist(&mut helper("3\nA 0 1.5 2\nB 1.5 0 3\nC 2 3 0\n")).unwrap();
        assert_eq!(m.ids(), &["A", "B", "C"]);
        assert_eq!(m.get(1, 2), 3.0);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn parse_mldist_reports_ragged_row() {
        let err = parse_mldist(&mut helper("2\nA 0 1\nB 1\n")).unwrap_err();
        assert!(matches!(err, MatrixError::Parse { line: 3, .. }));
    }

    #[test]
    fn parse_mldist_rejects_oversized_count() {
        let err = parse_mldist(&mut helper("5000000000\nA 0\n")).unwrap_err();
        assert!(matches!(err, MatrixError::Parse { .. }));
        let err = parse_mldist(&mut helper(&format!("{}\nA 0\n", usize::MAX))).unwrap_err();
        assert!(matches!(err, MatrixError::Parse { line: 1, .. }));
    }

    #[test]
    fn mldist_written_then_parsed() {
        let m = matrix(&["GCA_1", "GCA_2", "GCA_3"], &[0.0, 0.5, 1.25, 0.5, 0.0, 2.0, 1.25, 2.0, 0.0]);
        let mut out = Vec::new();
        m.write_mldist_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("3\nGCA_1 0 0.5 1.25\n"));
        let parsed = parse_mldist(&mut helper(&text)).unwrap();
        assert_eq!(parsed, m);
        assert_eq!(parsed.position("GCA_3"), Some(2));
        assert_eq!(parsed.position("GCA_4"), None);
    }

    #[test]
    fn parse_mldist_reports_missing_rows() {
        assert!(parse_mldist(&mut helper("3\nA 0 1 2\nB 1 0 3\n")).is_err());
    }

    #[test]
    fn labelled_round_trip_through_text() {
        let m = matrix(&["X1", "X2"], &[0.0, 0.25, 0.25, 0.0]);
        let mut out = Vec::new();
        m.write_labelled_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "\"\" X1 X2\nX1 0 0.25\nX2 0.25 0\n");
        let parsed = parse_labelled(&mut helper(&text)).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn validate_flags_asymmetry() {
        let m = matrix(&["A", "B"], &[0.0, 1.0, 2.0, 0.0]);
        assert!(m.validate().is_err());
    }

    #[test]
    fn upper_triangle_skips_diagonal() {
        let m = matrix(&["A", "B", "C"], &[0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 2.0, 3.0, 0.0]);
        let pairs: Vec<(usize, usize, f64)> = m.upper_triangle().collect();
        assert_eq!(pairs, vec![(0, 1, 1.0), (0, 2, 2.0), (1, 2, 3.0)]);
    }

    #[test]
    fn align_common_reorders_second_matrix() {
        let a = matrix(&["GCA_000000001.1_x", "GCA_000000002.1_y", "GCA_000000003.1"],
            &[0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 2.0, 3.0, 0.0]);
        let b = matrix(&["GCA_000000002.1", "GCA_000000001.1"], &[0.0, 7.0, 7.0, 0.0]);
        let (a2, b2) = align_common(&a, &b).unwrap();
        assert_eq!(a2.ids(), &["GCA_000000001.1", "GCA_000000002.1"]);
        assert_eq!(b2.ids(), a2.ids());
        assert_eq!(a2.get(0, 1), 1.0);
        assert_eq!(b2.get(0, 1), 7.0);
    }

    #[test]
    fn align_common_without_overlap_fails() {
        let a = matrix(&["A"], &[0.0]);
        let b = matrix(&["B"], &[0.0]);
        assert!(align_common(&a, &b).is_err());
    }
}
