// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::fs;
use std::path::Path;

use tracing::error;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// Reads a whole file into memory.
///
/// A missing path, a path that is not a regular file, or a failed read all
/// yield an empty buffer; the condition is logged and callers that need the
/// content treat empty as failure.
pub fn read_file(path: impl AsRef<Path>) -> Vec<u8> {
    let path = path.as_ref();

    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => {
            error!("file {} does not exist", path.display());
            return Vec::new();
        }
    };
    if !meta.is_file() {
        error!("path {} is not a regular file", path.display());
        return Vec::new();
    }

    match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to read {}: {e}", path.display());
            Vec::new()
        }
    }
}
