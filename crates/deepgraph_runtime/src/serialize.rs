//! Store snapshots in `MessagePack`.
//!
//! A snapshot holds the stored entities, values and edges but not the
//! schema: loading one needs the registry it is to be checked against.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use deepgraph_foundation::{Error, ErrorKind, Result};
use deepgraph_storage::{SchemaRegistry, World};

/// Serializes a world's stored state to `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(world: &World) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(&world.snapshot())
        .map_err(|e| Error::new(ErrorKind::Serialization(e.to_string())))
}

/// Rebuilds a world from `MessagePack` bytes under `registry`.
///
/// # Errors
///
/// Returns an error if the bytes are not a snapshot, or the snapshot holds
/// entities of types `registry` does not declare.
pub fn from_bytes(registry: Arc<SchemaRegistry>, bytes: &[u8]) -> Result<World> {
    let snapshot = rmp_serde::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::Serialization(e.to_string())))?;
    World::restore(registry, snapshot)
}

/// Saves a world's stored state to a file, replacing it if it exists.
///
/// # Errors
///
/// Returns an error if the file cannot be written or serialization fails.
pub fn save_to_file<P: AsRef<Path>>(world: &World, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| io_error("create", path, &e))?;
    let bytes = to_bytes(world)?;

    let mut writer = BufWriter::new(file);
    writer
        .write_all(&bytes)
        .map_err(|e| io_error("write to", path, &e))?;
    writer.flush().map_err(|e| io_error("flush", path, &e))
}

/// Loads a world saved by [`save_to_file`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid snapshot
/// for `registry`.
pub fn load_from_file<P: AsRef<Path>>(registry: Arc<SchemaRegistry>, path: P) -> Result<World> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io_error("open", path, &e))?;

    let mut bytes = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut bytes)
        .map_err(|e| io_error("read", path, &e))?;
    from_bytes(registry, &bytes)
}

fn io_error(action: &str, path: &Path, error: &std::io::Error) -> Error {
    Error::new(ErrorKind::Io(format!(
        "failed to {action} file '{}': {error}",
        path.display()
    )))
}
