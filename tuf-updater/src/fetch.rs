// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downloads metadata and targets through a [`Transport`], enforcing a maximum length while the
//! data streams in.

use crate::error::{self, Result};
use crate::io::max_size_adapter;
use crate::transport::{IntoVec, Transport, TransportStream};
use futures::StreamExt;
use log::trace;
use snafu::ResultExt;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Downloads files with a [`Transport`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    transport: Box<dyn Transport>,
}

impl Fetcher {
    /// Creates a fetcher that downloads with `transport`.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn fetch_max_size(
        &self,
        url: &Url,
        max_size: u64,
        specifier: &'static str,
    ) -> Result<TransportStream> {
        trace!("fetching '{}' (at most {} bytes)", url, max_size);
        let stream = self
            .transport
            .fetch(url.clone())
            .await
            .context(error::TransportSnafu { url: url.clone() })?;
        Ok(max_size_adapter(stream, url.clone(), max_size, specifier))
    }

    /// Downloads `url` into memory. Fails as soon as more than `max_length` bytes arrive.
    pub async fn download_bytes(&self, url: &Url, max_length: u64) -> Result<Vec<u8>> {
        self.fetch_max_size(url, max_length, "download")
            .await?
            .into_vec()
            .await
            .context(error::TransportSnafu { url: url.clone() })
    }

    /// Downloads `url` into a temporary file and passes its path to `handler`. The file is removed
    /// once `handler` returns. Fails as soon as more than `max_length` bytes arrive.
    pub async fn download_file<T, F>(
        &self,
        url: &Url,
        max_length: u64,
        temp_dir: &Path,
        handler: F,
    ) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let mut stream = self.fetch_max_size(url, max_length, "download").await?;

        let temp = NamedTempFile::new_in(temp_dir)
            .context(error::DownloadTempFileSnafu { path: temp_dir })?;
        let mut file = tokio::fs::File::from_std(
            temp.reopen()
                .context(error::DownloadTempFileSnafu { path: temp.path() })?,
        );
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context(error::TransportSnafu { url: url.clone() })?;
            file.write_all(&chunk)
                .await
                .context(error::DownloadWriteSnafu { path: temp.path() })?;
        }
        file.flush()
            .await
            .context(error::DownloadWriteSnafu { path: temp.path() })?;
        drop(file);

        handler(temp.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::FilesystemTransport;

    fn fixture(contents: &[u8]) -> (tempfile::TempDir, Url) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        std::fs::write(&path, contents).unwrap();
        let url = Url::from_file_path(path).unwrap();
        (dir, url)
    }

    #[tokio::test]
    async fn download_bytes_within_limit() {
        let (_dir, url) = fixture(b"0123456789");
        let fetcher = Fetcher::new(Box::new(FilesystemTransport));
        assert_eq!(
            fetcher.download_bytes(&url, 10).await.unwrap(),
            b"0123456789"
        );
        let err = fetcher.download_bytes(&url, 9).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DownloadLengthMismatch);
    }

    #[tokio::test]
    async fn download_file_passes_temp_path() {
        let (dir, url) = fixture(b"target contents");
        let fetcher = Fetcher::new(Box::new(FilesystemTransport));
        let (read, temp_path) = fetcher
            .download_file(&url, 100, dir.path(), |path| {
                Ok((std::fs::read(path).unwrap(), path.to_owned()))
            })
            .await
            .unwrap();
        assert_eq!(read, b"target contents");
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("nope")).unwrap();
        let fetcher = Fetcher::new(Box::new(FilesystemTransport));
        let err = fetcher.download_bytes(&url, 10).await.unwrap_err();
        assert!(err.is_file_not_found());
        assert_eq!(err.kind(), ErrorKind::Download);
    }
}
