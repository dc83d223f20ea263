// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::{self, Result};
use log::debug;
use snafu::ResultExt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// `Datastore` is the local metadata directory: one JSON file per role, holding the last metadata
/// that was accepted as trusted.
#[derive(Debug, Clone)]
pub(crate) struct Datastore {
    path: PathBuf,
}

impl Datastore {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Get contents of a file in the datastore, or `None` if it does not exist.
    pub(crate) async fn bytes(&self, file: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path.join(file);
        match tokio::fs::read(&path).await {
            Ok(file) => Ok(Some(file)),
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Ok(None),
                _ => Err(err).context(error::DatastoreReadSnafu { path: &path }),
            },
        }
    }

    /// Writes `bytes` to a file in the datastore. The file is replaced atomically, so a reader
    /// sees either the old or the new contents.
    pub(crate) fn persist(&self, file: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path.join(file);
        debug!("persisting '{}'", path.display());
        let mut temp =
            NamedTempFile::new_in(&self.path).context(error::PersistSnafu { path: &path })?;
        temp.write_all(bytes)
            .context(error::PersistSnafu { path: &path })?;
        temp.persist(&path)
            .map_err(|e| e.error)
            .context(error::PersistSnafu { path: &path })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let datastore = Datastore::new(dir.path().to_owned());
        assert_eq!(datastore.bytes("timestamp.json").await.unwrap(), None);

        datastore.persist("timestamp.json", b"first").unwrap();
        datastore.persist("timestamp.json", b"second").unwrap();
        assert_eq!(
            datastore.bytes("timestamp.json").await.unwrap().unwrap(),
            b"second"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn persist_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let datastore = Datastore::new(dir.path().join("missing"));
        let err = datastore.persist("root.json", b"{}").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Persist);
    }
}
