//! Sequential reader over a flat file of fixed-length records.

use std::path::{Path, PathBuf};

use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use netsort_core::{Record, RecordLayout};

use crate::error::{Result, ShuffleError};

/// Yields whole records from offset 0. A trailing partial record is dropped.
pub struct RecordReader<R = BufReader<File>> {
    reader: R,
    layout: RecordLayout,
    path: PathBuf,
    buf: BytesMut,
    records: u64,
}

impl RecordReader {
    pub async fn open(path: &Path, layout: RecordLayout) -> Result<Self> {
        let file = File::open(path).await.map_err(|source| ShuffleError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file), layout, path))
    }
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    pub fn from_reader(reader: R, layout: RecordLayout, path: &Path) -> Self {
        Self {
            reader,
            layout,
            path: path.to_path_buf(),
            buf: BytesMut::with_capacity(layout.record_len * 64),
            records: 0,
        }
    }

    /// Records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Next full record, or `None` at end of input.
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        let len = self.layout.record_len;
        self.buf.resize(len, 0);

        let mut filled = 0;
        while filled < len {
            let n = self
                .reader
                .read(&mut self.buf[filled..len])
                .await
                .map_err(|source| ShuffleError::Input {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < len {
            if filled > 0 {
                tracing::debug!(
                    path = %self.path.display(),
                    bytes = filled,
                    "discarding trailing partial record"
                );
            }
            self.buf.clear();
            return Ok(None);
        }

        self.records += 1;
        Ok(Some(Record::new(self.buf.split_to(len).freeze())))
    }
}
