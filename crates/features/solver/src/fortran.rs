//! Fortran unformatted sequential files holding a single `f32` record.

use crate::error::{SolverError, SolverErrorExt};
use std::fs;
use std::path::{Path, PathBuf};

const MARKER: usize = 4;

/// `proc{iproc:06}_{key}{suffix}.bin` inside `dir`.
#[must_use]
pub fn slice_path(dir: &Path, iproc: usize, key: &str, suffix: &str) -> PathBuf {
    dir.join(format!("proc{iproc:06}_{key}{suffix}.bin"))
}

/// Reads one slice. A leading marker equal to the payload size marks a framed record;
/// anything else is read as bare values.
///
/// # Errors
///
/// Returns [`SolverError::Io`] if the file cannot be read and [`SolverError::Slice`] if
/// its payload is not a whole number of values.
pub fn read_slice(path: &Path) -> Result<Vec<f32>, SolverError> {
    let bytes = fs::read(path).context(format!("Reading {}", path.display()))?;
    decode(&bytes).map_err(|message| SolverError::Slice {
        path: path.to_path_buf(),
        message: message.into(),
        context: None,
    })
}

/// Writes one framed slice.
///
/// # Errors
///
/// Returns [`SolverError::Io`] if the file cannot be written and [`SolverError::Slice`] if
/// the record is too large for a 32-bit marker.
pub fn write_slice(path: &Path, values: &[f32]) -> Result<(), SolverError> {
    let bytes = encode(values).ok_or_else(|| SolverError::Slice {
        path: path.to_path_buf(),
        message: format!("{} values do not fit one record", values.len()).into(),
        context: None,
    })?;
    fs::write(path, bytes).context(format!("Writing {}", path.display()))
}

fn encode(values: &[f32]) -> Option<Vec<u8>> {
    let marker = i32::try_from(values.len().checked_mul(MARKER)?).ok()?.to_le_bytes();
    let mut bytes = Vec::with_capacity(values.len() * MARKER + 2 * MARKER);
    bytes.extend_from_slice(&marker);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend_from_slice(&marker);
    Some(bytes)
}

fn decode(bytes: &[u8]) -> Result<Vec<f32>, String> {
    let framed = bytes.len() >= 2 * MARKER
        && bytes
            .first_chunk::<MARKER>()
            .and_then(|head| usize::try_from(i32::from_le_bytes(*head)).ok())
            .is_some_and(|n| n == bytes.len() - 2 * MARKER);
    let payload = if framed { &bytes[MARKER..bytes.len() - MARKER] } else { bytes };

    let chunks = payload.chunks_exact(MARKER);
    if !chunks.remainder().is_empty() {
        return Err(format!("{} bytes is not a multiple of {MARKER}", payload.len()));
    }
    Ok(chunks
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
