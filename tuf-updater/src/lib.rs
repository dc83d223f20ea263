// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tuf-updater` is a client library for [TUF repositories].
//!
//! The client keeps a directory of metadata it trusts and, on each refresh, walks the TUF client
//! workflow against a remote repository: it rotates root one version at a time, then loads
//! timestamp, snapshot and targets, checking signatures, versions, hashes and expiry against
//! what it already trusts. Targets are then looked up through the delegation graph, downloaded,
//! and verified before they are handed to the caller.
//!
//! [TUF repositories]: https://theupdateframework.github.io/
//!
//! # Example
//!
//! ```no_run
//! # use tuf_updater::{UpdaterLoader, Result};
//! # use url::Url;
//! # async fn example() -> Result<()> {
//! let mut updater = UpdaterLoader::new(
//!     "/var/lib/my-app/metadata",
//!     Url::parse("https://example.com/metadata/").unwrap(),
//! )
//! .target_dir("/var/lib/my-app/targets")
//! .target_base_url(Url::parse("https://example.com/targets/").unwrap())
//! .load()
//! .await?;
//!
//! updater.refresh().await?;
//! if let Some(target) = updater.get_target_info("app.tar.gz").await? {
//!     let path = match updater.find_cached_target(&target, None)? {
//!         Some(path) => path,
//!         None => updater.download_target(&target, None, None).await?,
//!     };
//!     println!("verified target at {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Unit tests are run in the usual manner: `cargo test`. Tests that exercise the HTTP transport
//! need the `http` feature: `cargo test --features http`.

#![forbid(missing_debug_implementations)]
#![deny(rust_2018_idioms)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

mod datastore;
pub mod error;
mod fetch;
#[cfg(feature = "http")]
pub mod http;
mod io;
pub mod schema;
pub mod sign;
mod transport;
mod trusted;
mod updater;
mod urlpath;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::fetch::Fetcher;
#[cfg(feature = "http")]
pub use crate::http::{HttpTransport, HttpTransportBuilder};
pub use crate::transport::{
    DefaultTransport, FilesystemTransport, IntoVec, Transport, TransportError, TransportErrorKind,
    TransportStream,
};
pub use crate::trusted::TrustedMetadataSet;
pub use crate::updater::{Updater, UpdaterConfig, UpdaterLoader};
pub use crate::urlpath::SafeUrlPath;
pub use async_trait::async_trait;
pub use bytes::Bytes;
pub use futures_core::Stream;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters escaped by `encodeURIComponent`: everything except ASCII alphanumerics and
/// `- _ . ! ~ * ' ( )`.
const CHARACTERS_TO_ESCAPE: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes a role name or target path for use as a single file name, locally or in a URL.
/// Path separators are encoded too, so `a/b` becomes `a%2Fb` and never names a subdirectory.
/// The names `.` and `..` have their dots encoded.
pub fn encode_filename<S: AsRef<str>>(name: S) -> String {
    match name.as_ref() {
        "." => "%2E".to_owned(),
        ".." => "%2E%2E".to_owned(),
        name => utf8_percent_encode(name, &CHARACTERS_TO_ESCAPE).to_string(),
    }
}

/// Appends a `/` to the path of `url` if it does not end with one, so that joining a relative
/// file name to it appends instead of replacing the last path segment.
pub(crate) fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
