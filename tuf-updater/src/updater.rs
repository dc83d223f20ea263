// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the TUF client workflow: refreshes the trusted metadata from a remote repository, then
//! resolves, downloads and verifies targets.

use crate::datastore::Datastore;
use crate::error::{self, ErrorKind, Result};
use crate::fetch::Fetcher;
use crate::schema::{RoleType, TargetFile};
use crate::transport::{DefaultTransport, Transport};
use crate::trusted::TrustedMetadataSet;
use crate::{encode_filename, ensure_trailing_slash};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use snafu::{OptionExt, ResultExt};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// The name under which root acts as the delegator of the top-level targets role.
const ROOT: &str = "root";
/// The name of the top-level targets role.
const TARGETS: &str = "targets";

/// Limits and options for an [`Updater`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// The maximum number of root versions to step through in one refresh.
    pub max_root_rotations: u64,
    /// The maximum number of targets roles to visit when looking up a target.
    pub max_delegations: usize,
    /// The maximum size of a downloaded root file, in bytes.
    pub root_max_length: u64,
    /// The maximum size of the downloaded timestamp file, in bytes.
    pub timestamp_max_length: u64,
    /// The maximum size of the downloaded snapshot file when the timestamp does not declare its
    /// length, in bytes.
    pub snapshot_max_length: u64,
    /// The maximum size of a downloaded targets file when the snapshot does not declare its
    /// length, in bytes.
    pub targets_max_length: u64,
    /// Whether target file names are prefixed with their hash when the repository uses consistent
    /// snapshots.
    pub prefix_targets_with_hash: bool,
    /// Timeout for a complete fetch over HTTP.
    pub fetch_timeout: Duration,
    /// How many times a failed HTTP fetch is retried.
    pub fetch_retries: u32,
    /// When set, only a "file not found" error ends root rotation; any other failure while
    /// loading the next root version fails the refresh. Otherwise any failure ends rotation.
    pub strict_root_rotation: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            max_root_rotations: 32,
            max_delegations: 32,
            root_max_length: 512_000,
            timestamp_max_length: 16_384,
            snapshot_max_length: 2_000_000,
            targets_max_length: 5_000_000,
            prefix_targets_with_hash: true,
            fetch_timeout: Duration::from_millis(100_000),
            fetch_retries: 2,
            strict_root_rotation: false,
        }
    }
}

/// A builder for an [`Updater`].
///
/// The metadata directory must contain a trusted `root.json`, which is how trust in the remote
/// repository is bootstrapped. Accepted metadata is written back to the same directory.
#[derive(Debug, Clone)]
pub struct UpdaterLoader {
    metadata_dir: PathBuf,
    metadata_base_url: Url,
    target_dir: Option<PathBuf>,
    target_base_url: Option<Url>,
    transport: Option<Box<dyn Transport>>,
    config: UpdaterConfig,
    force_cache: bool,
    reference_time: Option<DateTime<Utc>>,
}

impl UpdaterLoader {
    /// Create a new `UpdaterLoader` for the metadata in `metadata_dir`, refreshed from
    /// `metadata_base_url`.
    pub fn new<P: Into<PathBuf>>(metadata_dir: P, metadata_base_url: Url) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
            metadata_base_url,
            target_dir: None,
            target_base_url: None,
            transport: None,
            config: UpdaterConfig::default(),
            force_cache: false,
            reference_time: None,
        }
    }

    /// Set the directory that verified targets are saved to.
    #[must_use]
    pub fn target_dir<P: Into<PathBuf>>(mut self, target_dir: P) -> Self {
        self.target_dir = Some(target_dir.into());
        self
    }

    /// Set the base URL that targets are downloaded from.
    #[must_use]
    pub fn target_base_url(mut self, target_base_url: Url) -> Self {
        self.target_base_url = Some(target_base_url);
        self
    }

    /// Set the transport used for downloads. Defaults to [`DefaultTransport`].
    #[must_use]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Set the limits and options of the updater.
    #[must_use]
    pub fn config(mut self, config: UpdaterConfig) -> Self {
        self.config = config;
        self
    }

    /// When set, `refresh` first tries to use only the metadata cached in the metadata directory,
    /// and goes to the remote repository only if that is incomplete or no longer valid.
    #[must_use]
    pub fn force_cache(mut self, force_cache: bool) -> Self {
        self.force_cache = force_cache;
        self
    }

    /// Set the time that metadata expiry is judged against. Defaults to the time `load` is
    /// called.
    #[must_use]
    pub fn reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    /// Reads and verifies the trusted root from the metadata directory and creates the updater.
    pub async fn load(self) -> Result<Updater> {
        let datastore = Datastore::new(self.metadata_dir);
        let root_path = datastore.path().join("root.json");
        let root = tokio::fs::read(&root_path)
            .await
            .context(error::ReadTrustedRootSnafu { path: &root_path })?;
        let trusted =
            TrustedMetadataSet::new(&root, self.reference_time.unwrap_or_else(Utc::now))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.config),
        };

        Ok(Updater {
            trusted,
            datastore,
            fetcher: Fetcher::new(transport),
            metadata_base_url: ensure_trailing_slash(self.metadata_base_url),
            target_dir: self.target_dir,
            target_base_url: self.target_base_url.map(ensure_trailing_slash),
            config: self.config,
            force_cache: self.force_cache,
        })
    }
}

#[cfg(feature = "http")]
fn default_transport(config: &UpdaterConfig) -> Box<dyn Transport> {
    let settings = crate::HttpTransportBuilder::new()
        .timeout(config.fetch_timeout)
        .tries(config.fetch_retries.saturating_add(1));
    Box::new(DefaultTransport::from_http_settings(settings))
}

#[cfg(not(feature = "http"))]
fn default_transport(_config: &UpdaterConfig) -> Box<dyn Transport> {
    Box::new(DefaultTransport::new())
}

/// Refreshes trusted metadata from a TUF repository and downloads verified targets.
///
/// An `Updater` performs one refresh; create a new one (from the same metadata directory) to
/// refresh again later. A failed refresh keeps whatever was trusted up to the failure, including
/// a rotated root, and that progress is persisted for the next attempt.
#[derive(Debug)]
pub struct Updater {
    trusted: TrustedMetadataSet,
    datastore: Datastore,
    fetcher: Fetcher,
    metadata_base_url: Url,
    target_dir: Option<PathBuf>,
    target_base_url: Option<Url>,
    config: UpdaterConfig,
    force_cache: bool,
}

impl Updater {
    /// The metadata trusted so far.
    pub fn trusted(&self) -> &TrustedMetadataSet {
        &self.trusted
    }

    /// Refreshes root, timestamp, snapshot and top-level targets, in that order. Any failure ends
    /// the refresh.
    pub async fn refresh(&mut self) -> Result<()> {
        if self.force_cache {
            match self.refresh_from_cache().await {
                Ok(()) => return Ok(()),
                Err(e) => warn!("cached metadata is not usable, refreshing from repository: {}", e),
            }
        }

        self.load_root().await?;
        self.load_timestamp().await?;
        self.load_snapshot().await?;
        self.load_targets(TARGETS, ROOT).await
    }

    /// Trusts the cached timestamp, snapshot and targets without downloading anything. The trusted
    /// set only changes if all three are valid.
    async fn refresh_from_cache(&mut self) -> Result<()> {
        let mut trusted = self.trusted.clone();
        let timestamp = self.require_cached(RoleType::Timestamp).await?;
        trusted.update_timestamp(&timestamp)?;
        let snapshot = self.require_cached(RoleType::Snapshot).await?;
        trusted.update_snapshot(&snapshot, true)?;
        let targets = self.require_cached(RoleType::Targets).await?;
        trusted.update_targets(&targets)?;

        debug!("refreshed from cached metadata");
        self.trusted = trusted;
        Ok(())
    }

    async fn require_cached(&self, role: RoleType) -> Result<Vec<u8>> {
        self.datastore
            .bytes(&format!("{role}.json"))
            .await?
            .context(error::MissingTrustedSnafu { role })
    }

    /// Reads a cached metadata file, treating an unreadable file like a missing one.
    async fn cached(&self, file: &str) -> Option<Vec<u8>> {
        match self.datastore.bytes(file).await {
            Ok(data) => data,
            Err(e) => {
                warn!("ignoring cached '{}': {}", file, e);
                None
            }
        }
    }

    fn metadata_url(&self, file: &str) -> Result<Url> {
        self.metadata_base_url
            .join(file)
            .with_context(|_| error::JoinUrlSnafu {
                path: file,
                url: self.metadata_base_url.clone(),
            })
    }

    /// Steps through newer root versions, one at a time, until one is unavailable or the rotation
    /// limit is reached. Each accepted root is persisted.
    async fn load_root(&mut self) -> Result<()> {
        let lower = self.trusted.root().signed.version.get().saturating_add(1);
        let upper = lower.saturating_add(self.config.max_root_rotations);

        for version in lower..=upper {
            let url = self.metadata_url(&format!("{version}.root.json"))?;
            let result = match self
                .fetcher
                .download_bytes(&url, self.config.root_max_length)
                .await
            {
                Ok(data) => self.trusted.update_root(&data).map(|_| data),
                Err(e) => Err(e),
            };

            match result {
                Ok(data) => self.datastore.persist("root.json", &data)?,
                Err(e) if e.is_file_not_found() => {
                    debug!("no root version {} in repository", version);
                    break;
                }
                Err(e) if self.config.strict_root_rotation => return Err(e),
                Err(e) => {
                    warn!("stopping root rotation at version {}: {}", version, e);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Loads the cached timestamp if it is still valid, then the remote one. A remote timestamp
    /// with the same version as the trusted one is not an error.
    async fn load_timestamp(&mut self) -> Result<()> {
        if let Some(data) = self.cached("timestamp.json").await {
            if let Err(e) = self.trusted.update_timestamp(&data) {
                debug!("cached timestamp is not valid: {}", e);
            }
        }

        let url = self.metadata_url("timestamp.json")?;
        let data = self
            .fetcher
            .download_bytes(&url, self.config.timestamp_max_length)
            .await?;
        match self.trusted.update_timestamp(&data) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::EqualVersion => {
                debug!("timestamp has not changed");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        self.datastore.persist("timestamp.json", &data)
    }

    /// Loads the cached snapshot if it is still valid, otherwise the remote one.
    async fn load_snapshot(&mut self) -> Result<()> {
        if let Some(data) = self.cached("snapshot.json").await {
            match self.trusted.update_snapshot(&data, true) {
                Ok(_) => {
                    debug!("cached snapshot is current");
                    return Ok(());
                }
                Err(e) => debug!("cached snapshot is not valid: {}", e),
            }
        }

        let data = self
            .load_remote_snapshot()
            .await
            .context(error::LoadMetadataSnafu {
                role: RoleType::Snapshot.to_string(),
            })?;
        self.datastore.persist("snapshot.json", &data)
    }

    async fn load_remote_snapshot(&mut self) -> Result<Vec<u8>> {
        let meta = &self
            .trusted
            .timestamp()
            .context(error::MissingTrustedSnafu {
                role: RoleType::Timestamp,
            })?
            .signed
            .snapshot_meta;
        let max_length = meta.length.unwrap_or(self.config.snapshot_max_length);
        let file = if self.trusted.root().signed.consistent_snapshot {
            format!("{}.snapshot.json", meta.version)
        } else {
            "snapshot.json".to_owned()
        };

        let url = self.metadata_url(&file)?;
        let data = self.fetcher.download_bytes(&url, max_length).await?;
        self.trusted.update_snapshot(&data, false)?;
        Ok(data)
    }

    /// Loads the targets metadata of `role`, delegated by `delegator`, unless it is already
    /// trusted. Tries the cached copy first, then the remote one.
    async fn load_targets(&mut self, role: &str, delegator: &str) -> Result<()> {
        if self.trusted.role(role).is_some() {
            return Ok(());
        }

        let file = format!("{}.json", encode_filename(role));
        if let Some(data) = self.cached(&file).await {
            match self.trusted.update_delegated_targets(&data, role, delegator) {
                Ok(_) => return Ok(()),
                Err(e) => debug!("cached '{}' is not valid: {}", role, e),
            }
        }

        let data = self
            .load_remote_targets(role, delegator, &file)
            .await
            .context(error::LoadMetadataSnafu { role })?;
        self.datastore.persist(&file, &data)
    }

    async fn load_remote_targets(
        &mut self,
        role: &str,
        delegator: &str,
        file: &str,
    ) -> Result<Vec<u8>> {
        let snapshot = self
            .trusted
            .snapshot()
            .context(error::MissingTrustedSnafu {
                role: RoleType::Snapshot,
            })?;
        let meta_file = format!("{role}.json");
        let meta = snapshot
            .signed
            .meta
            .get(&meta_file)
            .context(error::MissingMetaSnafu { file: &meta_file })?;
        let max_length = meta.length.unwrap_or(self.config.targets_max_length);
        let remote = if self.trusted.root().signed.consistent_snapshot {
            format!("{}.{}", meta.version, file)
        } else {
            file.to_owned()
        };

        let url = self.metadata_url(&remote)?;
        let data = self.fetcher.download_bytes(&url, max_length).await?;
        self.trusted
            .update_delegated_targets(&data, role, delegator)?;
        Ok(data)
    }

    /// Looks up `target_path` in the delegation graph, refreshing first if top-level targets are
    /// not trusted yet. Returns `None` if no trusted role lists the target.
    pub async fn get_target_info(&mut self, target_path: &str) -> Result<Option<TargetFile>> {
        if self.trusted.targets().is_none() {
            self.refresh().await?;
        }
        self.preorder_depth_first_walk(target_path).await
    }

    /// Visits targets roles depth first, in the order they are delegated, starting at top-level
    /// targets. The first role that lists `target_path` wins. A matching terminating delegation
    /// drops every role still waiting to be visited. At most `max_delegations` roles are visited.
    async fn preorder_depth_first_walk(&mut self, target_path: &str) -> Result<Option<TargetFile>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut to_visit = vec![(TARGETS.to_owned(), ROOT.to_owned())];

        while visited.len() <= self.config.max_delegations {
            let Some((role, delegator)) = to_visit.pop() else {
                break;
            };
            if visited.contains(&role) {
                continue;
            }

            self.load_targets(&role, &delegator).await?;
            let targets = self
                .trusted
                .role(&role)
                .context(error::MissingTrustedSnafu {
                    role: RoleType::Targets,
                })?;
            if let Some(target) = targets.signed.targets.get(target_path) {
                debug!("found '{}' in '{}'", target_path, role);
                return Ok(Some(target.clone()));
            }

            if let Some(delegations) = &targets.signed.delegations {
                let mut children = Vec::new();
                for (child, terminating) in delegations.roles_for_target(target_path) {
                    children.push((child, role.clone()));
                    if terminating {
                        to_visit.clear();
                        break;
                    }
                }
                children.reverse();
                to_visit.extend(children);
            }
            visited.insert(role);
        }

        if !to_visit.is_empty() {
            warn!(
                "{} roles left to visit, but at most {} delegations are allowed",
                to_visit.len(),
                self.config.max_delegations
            );
        }
        Ok(None)
    }

    /// The local path a target is saved to by default: its percent-encoded path in the target
    /// directory.
    fn generate_target_path(&self, target: &TargetFile) -> Result<PathBuf> {
        let target_dir = self
            .target_dir
            .as_ref()
            .context(error::MissingTargetDirSnafu)?;
        Ok(target_dir.join(encode_filename(&target.path)))
    }

    /// Returns the local path of `target` if a file there matches its length and hashes.
    /// `file_path` overrides the default path in the target directory.
    pub fn find_cached_target(
        &self,
        target: &TargetFile,
        file_path: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        let path = match file_path {
            Some(path) => path.to_owned(),
            None => self.generate_target_path(target)?,
        };
        let Ok(file) = File::open(&path) else {
            return Ok(None);
        };
        match target.verify(file) {
            Ok(()) => Ok(Some(path)),
            Err(e) => {
                debug!("cached '{}' does not match: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Downloads `target`, verifies its length and hashes, and saves it to `file_path`, or the
    /// default path in the target directory. `target_base_url` overrides the configured target
    /// base URL. Returns the path the target was saved to.
    pub async fn download_target(
        &self,
        target: &TargetFile,
        file_path: Option<&Path>,
        target_base_url: Option<&Url>,
    ) -> Result<PathBuf> {
        let path = match file_path {
            Some(path) => path.to_owned(),
            None => self.generate_target_path(target)?,
        };
        let base_url = match target_base_url {
            Some(url) => ensure_trailing_slash(url.clone()),
            None => self
                .target_base_url
                .clone()
                .context(error::MissingTargetBaseUrlSnafu)?,
        };

        let remote = self.remote_target_path(target);
        let url = base_url
            .join(&remote)
            .with_context(|_| error::JoinUrlSnafu {
                path: &remote,
                url: base_url.clone(),
            })?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .context(error::DirCreateSnafu { path: &dir })?;

        self.fetcher
            .download_file(&url, target.length, &dir, |temp| {
                let file =
                    File::open(temp).context(error::DownloadWriteSnafu { path: temp })?;
                target
                    .verify(file)
                    .context(error::LengthOrHashMismatchSnafu {
                        context: &target.path,
                    })?;
                std::fs::copy(temp, &path).context(error::TargetCopySnafu { path: &path })?;
                Ok(())
            })
            .await?;

        info!("downloaded '{}' to '{}'", target.path, path.display());
        Ok(path)
    }

    /// The target's path in the repository. With consistent snapshots, and unless disabled, the
    /// file name is prefixed with the target's first declared hash: `dir/<hash>.name`.
    fn remote_target_path(&self, target: &TargetFile) -> String {
        if !(self.trusted.root().signed.consistent_snapshot && self.config.prefix_targets_with_hash)
        {
            return target.path.clone();
        }
        let Some(hash) = target.hashes.values().next() else {
            return target.path.clone();
        };
        match target.path.rsplit_once('/') {
            Some((dir, name)) => format!("{dir}/{hash}.{name}"),
            None => format!("{hash}.{}", target.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let config = UpdaterConfig::default();
        assert_eq!(config.max_root_rotations, 32);
        assert_eq!(config.max_delegations, 32);
        assert_eq!(config.timestamp_max_length, 16_384);
        assert!(config.prefix_targets_with_hash);
        assert!(!config.strict_root_rotation);
    }

    #[tokio::test]
    async fn load_without_trusted_root() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_directory_path(dir.path()).unwrap();
        let err = UpdaterLoader::new(dir.path(), url).load().await.unwrap_err();
        assert!(matches!(err, error::Error::ReadTrustedRoot { .. }));
        assert_eq!(err.kind(), ErrorKind::Value);
    }
}
