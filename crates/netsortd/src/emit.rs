//! Sort & emit — order the sealed record set and write it out.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use netsort_core::{Record, RecordLayout};

use crate::error::{Result, ShuffleError};
use crate::shuffle::OwnedSet;

/// Sort `owned` and write it to `path`, truncating any existing file.
/// Returns the number of records written.
pub async fn sort_and_emit(owned: OwnedSet, layout: &RecordLayout, path: &Path) -> Result<u64> {
    let records = owned.into_sorted(layout);

    let output_err = |source| ShuffleError::Output {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).await.map_err(output_err)?;
    let written = write_records(BufWriter::new(file), &records)
        .await
        .map_err(output_err)?;

    tracing::info!(path = %path.display(), records = written, "output written");
    Ok(written)
}

/// Flat concatenation of raw records; no header, no delimiters.
pub async fn write_records<W>(mut writer: W, records: &[Record]) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    for record in records {
        writer.write_all(record.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(records.len() as u64)
}
