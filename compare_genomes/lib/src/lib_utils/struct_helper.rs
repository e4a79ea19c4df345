
// struct to handle file buffers


use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use log::debug;
use super::error::{MatrixError, Result};

pub struct FileBufferHelper<R: BufRead = BufReader<File>> {
    pub path: PathBuf,
    pub buffer_reader: R,
    pub line: String,
    pub line_number: usize,
}

impl FileBufferHelper {
    pub fn new(file: &Path) -> Result<FileBufferHelper> {
        // initialise instance of FileBufferHelper
        debug!("FileHelper created for: {:?}", file);
        let file_open = File::open(file)?;
        Ok(Self::from_reader(file, BufReader::new(file_open)))
    }

    pub fn buffer_reset(&mut self) -> Result<()> {
        // reset buffer to position 0
        self.buffer_reader.seek(SeekFrom::Start(0))?;
        self.line.clear();
        self.line_number = 0;
        Ok(())
    }
}

impl<R: BufRead> FileBufferHelper<R> {
    pub fn from_reader(label: &Path, reader: R) -> Self {
        Self {
            path: label.to_path_buf(),
            buffer_reader: reader,
            line: String::new(),
            line_number: 0,
        }
    }

    // read the next line into self.line, trailing newline removed
    // returns false at EOF
    pub fn next_line(&mut self) -> Result<bool> {
        self.line.clear();
        let read = self.buffer_reader.read_line(&mut self.line)?;
        if read == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        let trimmed_len = self.line.trim_end_matches(['\n', '\r']).len();
        self.line.truncate(trimmed_len);
        Ok(true)
    }

    pub fn parse_error(&self, msg: impl Into<String>) -> MatrixError {
        MatrixError::parse(&self.path, self.line_number, msg)
    }
}
