//! Streaming content store: write a byte source to disk while hashing it.
//!
//! The source is consumed in fixed-size chunks; each chunk is fed to the
//! digest and written out before the next one is read, so memory use does
//! not grow with the payload. The digest algorithm is a type parameter;
//! [`store_sha256`] and [`hash_file_sha256`] cover the common case.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::naming;

/// Read/write chunk size (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Failure while streaming content to the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The peer went away before the payload was complete. Not a server fault.
    #[error("Client disconnected during transfer: {0}")]
    ClientDisconnected(#[source] std::io::Error),

    /// Any other I/O failure while reading, writing or syncing.
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful [`store`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// Generated filename inside the destination directory.
    pub storage_filename: String,
    /// Exact number of bytes written.
    pub size_bytes: u64,
    /// Lower-case hex digest of the written bytes.
    pub hash_hex: String,
}

impl StoredContent {
    /// Full path of the stored file under `destination_dir`.
    pub fn path_in(&self, destination_dir: &Path) -> PathBuf {
        destination_dir.join(&self.storage_filename)
    }
}

/// Classify a read-side error: connection teardown is a client disconnect.
fn classify_read_error(err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => StoreError::ClientDisconnected(err),
        _ => StoreError::Io(err),
    }
}

/// Copy `reader` into `writer` chunk by chunk, hashing along the way.
///
/// Returns the byte count and the lower-case hex digest.
async fn copy_hashed<D, R, W>(reader: &mut R, writer: &mut W) -> Result<(u64, String), StoreError>
where
    D: Digest,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut hasher = D::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await.map_err(classify_read_error)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    writer.flush().await?;

    Ok((total, hex::encode(hasher.finalize())))
}

/// Stream `reader` into a new file in `destination_dir`, hashing with `D`.
///
/// The filename is generated (see [`naming::storage_filename`]) and keeps the
/// extension of `original_name`. On failure the partially written file is
/// removed on a best-effort basis and the error is returned.
pub async fn store<D, R>(
    mut reader: R,
    destination_dir: &Path,
    original_name: Option<&str>,
) -> Result<StoredContent, StoreError>
where
    D: Digest,
    R: AsyncRead + Unpin,
{
    tokio::fs::create_dir_all(destination_dir).await?;

    let storage_filename = naming::storage_filename(original_name);
    let target = destination_dir.join(&storage_filename);
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .await?;

    let copied = match copy_hashed::<D, _, _>(&mut reader, &mut file).await {
        Ok(copied) => file.sync_all().await.map(|_| copied).map_err(StoreError::from),
        Err(e) => Err(e),
    };
    drop(file);

    match copied {
        Ok((size_bytes, hash_hex)) => Ok(StoredContent {
            storage_filename,
            size_bytes,
            hash_hex,
        }),
        Err(e) => {
            let _ = tokio::fs::remove_file(&target).await;
            Err(e)
        }
    }
}

/// [`store`] with SHA-256.
pub async fn store_sha256<R>(
    reader: R,
    destination_dir: &Path,
    original_name: Option<&str>,
) -> Result<StoredContent, StoreError>
where
    R: AsyncRead + Unpin,
{
    store::<Sha256, R>(reader, destination_dir, original_name).await
}

/// Hash an existing file with `D`, streaming it in [`CHUNK_SIZE`] chunks.
///
/// Returns the file size in bytes and the lower-case hex digest.
pub async fn hash_file<D: Digest>(path: &Path) -> Result<(u64, String), StoreError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut sink = tokio::io::sink();
    // Reading a local file never means a client went away.
    copy_hashed::<D, _, _>(&mut file, &mut sink)
        .await
        .map_err(|e| match e {
            StoreError::ClientDisconnected(io) => StoreError::Io(io),
            other => other,
        })
}

/// [`hash_file`] with SHA-256.
pub async fn hash_file_sha256(path: &Path) -> Result<(u64, String), StoreError> {
    hash_file::<Sha256>(path).await
}

/// SHA-256 hex digest of an in-memory buffer.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
