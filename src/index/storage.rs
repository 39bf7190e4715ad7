//! Binary storage for the article index.
//!
//! File layout (little-endian):
//!
//! Header (51 bytes):
//! - magic: b"NQIX" (4 bytes)
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of the embedding model name)
//! - dimensions: u16
//! - entry_count: u64
//! - checksum: u32 (CRC32 of the header fields before checksum)
//!
//! Entries (repeated):
//! - source_url: u32 length + UTF-8 bytes
//! - sequence_index: u32
//! - text: u32 length + UTF-8 bytes
//! - embedding: [f32; dimensions]

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::chunker::Chunk;
use crate::index::VectorIndex;

const MAGIC: &[u8; 4] = b"NQIX";

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Upper bound on serialized string fields, to catch corrupt length words
/// before they turn into huge allocations.
const MAX_FIELD_LEN: u32 = 16 * 1024 * 1024;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no index file at {0}")]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: index was built with a different embedding model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,
}

/// Header stats for an existing index file.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub entry_count: u64,
    pub dimensions: u16,
    /// Whether the file was built with the currently configured model
    pub model_matches: bool,
}

struct Header {
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
}

/// Storage manager for the serialized index.
pub struct IndexStorage {
    path: PathBuf,
}

impl IndexStorage {
    /// Create a new storage manager for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the index to storage.
    ///
    /// Uses atomic write: temp file -> fsync -> rename. The target file is
    /// only replaced once the whole index has been written successfully.
    pub fn save(&self, index: &VectorIndex, model_id: &[u8; 32]) -> Result<(), StorageError> {
        let temp_path = self.path.with_extension("tmp");

        let result = self.write_to_file(&temp_path, index, model_id);

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Load the index from storage.
    ///
    /// A missing file is the distinguished [`StorageError::NotFound`] so the
    /// caller can report "index not yet built" instead of a generic error.
    pub fn load(&self, expected_model_id: &[u8; 32]) -> Result<VectorIndex, StorageError> {
        let file = self.open()?;
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader)?;
        if header.model_id != *expected_model_id {
            return Err(StorageError::ModelMismatch);
        }

        let dimensions = header.dimensions as usize;
        let mut index = VectorIndex::with_capacity(dimensions, header.entry_count as usize);

        for _ in 0..header.entry_count {
            let (embedding, chunk) = read_entry(&mut reader, dimensions)?;
            index
                .insert(embedding, chunk)
                .map_err(|e| StorageError::InvalidFormat(e.to_string()))?;
        }

        Ok(index)
    }

    /// Read only the header of an existing index file.
    pub fn stat(&self, expected_model_id: &[u8; 32]) -> Result<IndexStats, StorageError> {
        let file = self.open()?;
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader)?;
        Ok(IndexStats {
            entry_count: header.entry_count,
            dimensions: header.dimensions,
            model_matches: header.model_id == *expected_model_id,
        })
    }

    fn open(&self) -> Result<File, StorageError> {
        File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(self.path.clone())
            } else {
                StorageError::Io(e)
            }
        })
    }

    fn write_to_file(
        &self,
        path: &Path,
        index: &VectorIndex,
        model_id: &[u8; 32],
    ) -> Result<(), StorageError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // header fields, then CRC32 over them
        let mut header = Vec::with_capacity(47);
        header.extend_from_slice(MAGIC);
        header.push(FORMAT_VERSION);
        header.extend_from_slice(model_id);
        header.extend_from_slice(&(index.dimensions() as u16).to_le_bytes());
        header.extend_from_slice(&(index.len() as u64).to_le_bytes());
        let checksum = crc32fast::hash(&header);

        writer.write_all(&header)?;
        writer.write_all(&checksum.to_le_bytes())?;

        for entry in index.entries() {
            write_string(&mut writer, &entry.chunk.source_url)?;
            writer.write_all(&entry.chunk.sequence_index.to_le_bytes())?;
            write_string(&mut writer, &entry.chunk.text)?;
            for value in &entry.embedding {
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<(), StorageError> {
    writer.write_all(&(s.len() as u32).to_le_bytes())?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header, StorageError> {
    let raw = read_bytes(reader, 47)?;

    if &raw[0..4] != MAGIC {
        return Err(StorageError::InvalidFormat(
            "missing magic bytes".to_string(),
        ));
    }

    let checksum = read_u32(reader)?;
    if checksum != crc32fast::hash(&raw) {
        return Err(StorageError::ChecksumMismatch);
    }

    let version = raw[4];
    if version != FORMAT_VERSION {
        return Err(StorageError::VersionMismatch(version, FORMAT_VERSION));
    }

    let mut model_id = [0u8; 32];
    model_id.copy_from_slice(&raw[5..37]);

    let dimensions = u16::from_le_bytes([raw[37], raw[38]]);
    let entry_count = u64::from_le_bytes(raw[39..47].try_into().expect("8 header bytes"));

    Ok(Header {
        model_id,
        dimensions,
        entry_count,
    })
}

fn read_entry<R: Read>(
    reader: &mut R,
    dimensions: usize,
) -> Result<(Vec<f32>, Chunk), StorageError> {
    let source_url = read_string(reader)?;
    let sequence_index = read_u32(reader)?;
    let text = read_string(reader)?;

    let raw = read_bytes(reader, dimensions * 4)?;
    let embedding = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok((
        embedding,
        Chunk {
            text,
            source_url,
            sequence_index,
        },
    ))
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, StorageError> {
    let len = read_u32(reader)?;
    if len > MAX_FIELD_LEN {
        return Err(StorageError::InvalidFormat(format!(
            "string field of {len} bytes exceeds limit"
        )));
    }
    let raw = read_bytes(reader, len as usize)?;
    String::from_utf8(raw).map_err(|_| StorageError::InvalidFormat("invalid UTF-8".to_string()))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, StorageError> {
    let raw = read_bytes(reader, 4)?;
    Ok(u32::from_le_bytes(raw.try_into().expect("4 bytes")))
}

fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, StorageError> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            StorageError::InvalidFormat("unexpected end of file".to_string())
        } else {
            StorageError::Io(e)
        }
    })?;
    Ok(buf)
}
