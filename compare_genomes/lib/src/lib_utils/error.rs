// error type shared by every reader, writer and matrix operation

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error in {path:?} at line {line}: {msg}")]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("No unique representative for identifier {id}")]
    MissingMapping { id: String },

    #[error("Accession {0} not found in alignment")]
    AccessionNotFound(String),

    #[error("Newick error: {0}")]
    Newick(String),

    #[error("Dimension mismatch: {0}")]
    Dimension(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, MatrixError>;

impl MatrixError {
    pub fn parse(path: &std::path::Path, line: usize, msg: impl Into<String>) -> Self {
        MatrixError::Parse {
            path: path.to_path_buf(),
            line,
            msg: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_display() {
        let missing = MatrixError::MissingMapping { id: "GCA_000001".to_string() };
        assert_eq!(format!("{}", missing), "No unique representative for identifier GCA_000001");

        let parse = MatrixError::parse(Path::new("tree.mldist"), 3, "expected 4 values");
        assert_eq!(format!("{}", parse), "Parsing error in \"tree.mldist\" at line 3: expected 4 values");

        let not_found = MatrixError::AccessionNotFound("GCF_000146045.2".to_string());
        assert_eq!(format!("{}", not_found), "Accession GCF_000146045.2 not found in alignment");
    }
}
