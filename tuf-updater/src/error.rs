// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contains the error type for this library.

#![allow(clippy::default_trait_access)]

use crate::schema::{self, RoleType};
use crate::transport::{TransportError, TransportErrorKind};
use chrono::{DateTime, Utc};
use snafu::{Backtrace, Snafu};
use std::path::PathBuf;
use url::Url;

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category of an [`Error`], describing who is at fault and how a caller is expected to
/// react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The caller or its configuration is at fault, e.g. a missing base URL.
    Value,
    /// An operation was attempted out of order, or a fatal failure happened while loading snapshot
    /// or targets metadata.
    Runtime,
    /// A trusted metadata object that must be present is absent.
    Reference,
    /// Accepted metadata or a verified target could not be written locally.
    Persist,
    /// Remote metadata or a remote target is malformed or inconsistent.
    Repository,
    /// Remote metadata has an unacceptable version (rollback, skipped root version, or a mismatch
    /// with the version another role declares).
    BadVersion,
    /// Remote metadata has the same version as the trusted copy. Expected when nothing changed.
    EqualVersion,
    /// Metadata is expired relative to the reference time.
    ExpiredMetadata,
    /// Downloading failed.
    Download,
    /// A download exceeded its maximum length.
    DownloadLengthMismatch,
    /// A download failed with an unsuccessful HTTP status.
    DownloadHttp,
    /// Metadata is not signed by a threshold of trusted keys.
    UnsignedMetadata,
}

impl ErrorKind {
    /// `Repository`, `BadVersion` and `EqualVersion` are all repository errors.
    pub fn is_repository(self) -> bool {
        matches!(
            self,
            ErrorKind::Repository | ErrorKind::BadVersion | ErrorKind::EqualVersion
        )
    }

    /// `Download`, `DownloadLengthMismatch` and `DownloadHttp` are all download errors.
    pub fn is_download(self) -> bool {
        matches!(
            self,
            ErrorKind::Download | ErrorKind::DownloadLengthMismatch | ErrorKind::DownloadHttp
        )
    }
}

/// The error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("Failed to read cached metadata '{}': {}", path.display(), source))]
    DatastoreRead {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to create directory '{}': {}", path.display(), source))]
    DirCreate {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to create temporary file in '{}': {}", path.display(), source))]
    DownloadTempFile {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to write downloaded data to '{}': {}", path.display(), source))]
    DownloadWrite {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("New {} version {} is equal to the trusted version", role, version))]
    EqualVersion {
        role: RoleType,
        version: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("{} metadata expired at {}", role, expires))]
    ExpiredMetadata {
        role: String,
        expires: DateTime<Utc>,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to join '{}' to URL '{}': {}", path, url, source))]
    JoinUrl {
        path: String,
        url: Url,
        source: url::ParseError,
        backtrace: Backtrace,
    },

    #[snafu(display("Metadata for '{}' is invalid: {}", role, source))]
    InvalidMetadata {
        role: String,
        source: schema::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to parse keypair: {}", reason))]
    KeyRejected {
        reason: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Unrecognized private key format"))]
    KeyUnrecognized { backtrace: Backtrace },

    #[snafu(display("Length or hashes of {} do not match: {}", context, source))]
    LengthOrHashMismatch {
        context: String,
        source: schema::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to load {} metadata: {}", role, source))]
    LoadMetadata {
        role: String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "{} version {} does not match version {} declared by {}",
        role,
        found,
        expected,
        declared_by
    ))]
    MetaVersionMismatch {
        role: String,
        declared_by: RoleType,
        expected: u64,
        found: u64,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Snapshot rolls back '{}' from version {} to version {}",
        file,
        current,
        new
    ))]
    MetaVersionRollback {
        file: String,
        current: u64,
        new: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Snapshot does not list '{}'", file))]
    MissingMeta { file: String, backtrace: Backtrace },

    #[snafu(display("A target base URL is required to download targets"))]
    MissingTargetBaseUrl { backtrace: Backtrace },

    #[snafu(display("A target directory is required to resolve target paths"))]
    MissingTargetDir { backtrace: Backtrace },

    #[snafu(display("No trusted {} metadata is loaded", role))]
    MissingTrusted { role: RoleType, backtrace: Backtrace },

    #[snafu(display("Delegator '{}' of role '{}' is not trusted", delegator, role))]
    NoTrustedDelegator {
        role: String,
        delegator: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to parse {} metadata: {}", role, source))]
    ParseMetadata {
        role: String,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to parse URL '{}': {}", url, source))]
    ParseUrl {
        url: String,
        source: url::ParseError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to persist '{}': {}", path.display(), source))]
    Persist {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to read trusted root '{}': {}", path.display(), source))]
    ReadTrustedRoot {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Expected root version {}, found {}", expected, found))]
    RootVersion {
        expected: u64,
        found: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to serialize {}: {}", what, source))]
    Serialize {
        what: String,
        source: schema::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to sign message"))]
    Sign {
        source: aws_lc_rs::error::Unspecified,
        backtrace: Backtrace,
    },

    #[snafu(display("Snapshot no longer lists '{}'", file))]
    SnapshotMetaRemoved { file: String, backtrace: Backtrace },

    #[snafu(display(
        "Timestamp rolls back snapshot from version {} to version {}",
        current,
        new
    ))]
    SnapshotVersionRollback {
        current: u64,
        new: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to copy target to '{}': {}", path.display(), source))]
    TargetCopy {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to fetch {}: {}", url, source))]
    Transport {
        url: Url,
        source: TransportError,
        backtrace: Backtrace,
    },

    #[snafu(display("Cannot {}", action))]
    UpdateOrder {
        action: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Signatures for '{}' are not trusted: {}", role, source))]
    VerifySignatures {
        role: String,
        source: schema::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("New {} version {} is lower than trusted version {}", role, new, current))]
    VersionRollback {
        role: RoleType,
        current: u64,
        new: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Expected {} metadata, found '{}'", expected, found))]
    WrongMetadataType {
        expected: RoleType,
        found: String,
        backtrace: Backtrace,
    },
}

impl Error {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::JoinUrl { .. }
            | Error::KeyRejected { .. }
            | Error::KeyUnrecognized { .. }
            | Error::MissingTargetBaseUrl { .. }
            | Error::MissingTargetDir { .. }
            | Error::ParseUrl { .. }
            | Error::ReadTrustedRoot { .. }
            | Error::Serialize { .. }
            | Error::Sign { .. } => ErrorKind::Value,

            Error::LoadMetadata { .. }
            | Error::NoTrustedDelegator { .. }
            | Error::UpdateOrder { .. } => ErrorKind::Runtime,

            Error::MissingTrusted { .. } => ErrorKind::Reference,

            Error::DatastoreRead { .. }
            | Error::DirCreate { .. }
            | Error::Persist { .. }
            | Error::TargetCopy { .. } => ErrorKind::Persist,

            Error::InvalidMetadata { .. }
            | Error::LengthOrHashMismatch { .. }
            | Error::MissingMeta { .. }
            | Error::ParseMetadata { .. }
            | Error::SnapshotMetaRemoved { .. }
            | Error::WrongMetadataType { .. } => ErrorKind::Repository,

            Error::MetaVersionMismatch { .. }
            | Error::MetaVersionRollback { .. }
            | Error::RootVersion { .. }
            | Error::SnapshotVersionRollback { .. }
            | Error::VersionRollback { .. } => ErrorKind::BadVersion,

            Error::EqualVersion { .. } => ErrorKind::EqualVersion,

            Error::ExpiredMetadata { .. } => ErrorKind::ExpiredMetadata,

            Error::DownloadTempFile { .. } | Error::DownloadWrite { .. } => ErrorKind::Download,
            Error::Transport { source, .. } => match source.kind() {
                TransportErrorKind::MaxSizeExceeded => ErrorKind::DownloadLengthMismatch,
                _ if source.status().is_some() => ErrorKind::DownloadHttp,
                _ => ErrorKind::Download,
            },

            Error::VerifySignatures { .. } => ErrorKind::UnsignedMetadata,
        }
    }

    /// The kind of the innermost error, looking through the wrapping applied when snapshot or
    /// targets metadata fails to load.
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            Error::LoadMetadata { source, .. } => source.root_kind(),
            other => other.kind(),
        }
    }

    /// Whether a transport reported that the requested file does not exist.
    pub fn is_file_not_found(&self) -> bool {
        matches!(
            self,
            Error::Transport { source, .. } if matches!(source.kind(), TransportErrorKind::FileNotFound)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snafu::IntoError;

    fn transport_error(err: TransportError) -> Error {
        TransportSnafu {
            url: Url::parse("https://example.com/timestamp.json").unwrap(),
        }
        .into_error(err)
    }

    #[test]
    fn transport_errors_are_classified() {
        let url = "https://example.com/timestamp.json";
        let too_big = transport_error(TransportError::new_with_cause(
            TransportErrorKind::MaxSizeExceeded,
            url,
            "too big",
        ));
        assert_eq!(too_big.kind(), ErrorKind::DownloadLengthMismatch);

        let http = transport_error(
            TransportError::new_with_cause(TransportErrorKind::Other, url, "bad gateway")
                .with_status(502),
        );
        assert_eq!(http.kind(), ErrorKind::DownloadHttp);

        let missing = transport_error(
            TransportError::new(TransportErrorKind::FileNotFound, url).with_status(404),
        );
        assert_eq!(missing.kind(), ErrorKind::DownloadHttp);
        assert!(missing.is_file_not_found());
        assert!(missing.kind().is_download());
        assert!(!missing.kind().is_repository());
    }

    #[test]
    fn load_failures_expose_root_kind() {
        let inner = MetaVersionMismatchSnafu {
            role: "a",
            declared_by: RoleType::Snapshot,
            expected: 3u64,
            found: 2u64,
        }
        .build();
        let outer = LoadMetadataSnafu { role: "a" }.into_error(inner);
        assert_eq!(outer.kind(), ErrorKind::Runtime);
        assert_eq!(outer.root_kind(), ErrorKind::BadVersion);
        assert!(outer.root_kind().is_repository());
    }
}
