//! JSON documents on disk, shared by the shelf and the content cache.

use std::path::Path;

use crate::error::PersistenceError;

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let bytes = std::fs::read(path).map_err(|err| PersistenceError::io("read", path, err))?;
    serde_json::from_slice(&bytes).map_err(|err| PersistenceError::json("parse", path, err))
}

/// Writes a uniquely named sibling and renames it over `path`, so readers
/// see either the old document or the new one. Concurrent writers of the
/// same path resolve to the last rename.
pub(crate) fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data =
        serde_json::to_vec_pretty(value).map_err(|err| PersistenceError::json("serialize", path, err))?;
    std::fs::write(&tmp_path, &data).map_err(|err| PersistenceError::io("write", &tmp_path, err))?;
    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(PersistenceError::io("rename", path, err));
    }
    Ok(())
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<(), PersistenceError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(PersistenceError::io("remove", path, err)),
    }
}
