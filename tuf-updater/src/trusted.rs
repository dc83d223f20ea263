// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The trusted metadata set: the only place where metadata becomes trusted.
//!
//! Every update runs the full set of checks against the metadata that is already trusted, in the
//! order root, timestamp, snapshot, targets, delegated targets. A failed update leaves the set
//! unchanged, except for the expiry and version checks that run after a timestamp or snapshot has
//! been installed.

use crate::error::{self, Result};
use crate::schema::{Role, RoleType, Root, Signed, Snapshot, Targets, Timestamp};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::Value;
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::HashMap;

/// The name under which root acts as the delegator of the top-level targets role.
const ROOT: &str = "root";
/// The name of the top-level targets role.
const TARGETS: &str = "targets";

/// Parses metadata of role type `T`, checking its `_type` tag and schema invariants. Signatures are
/// not checked.
pub(crate) fn parse<T: Role>(bytes: &[u8]) -> Result<Signed<T>> {
    let role = T::TYPE.to_string();
    let value: Value =
        serde_json::from_slice(bytes).context(error::ParseMetadataSnafu { role: &role })?;
    let found = value
        .get("signed")
        .and_then(|signed| signed.get("_type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    ensure!(
        found == role,
        error::WrongMetadataTypeSnafu {
            expected: T::TYPE,
            found
        }
    );
    let metadata: Signed<T> =
        serde_json::from_value(value).context(error::ParseMetadataSnafu { role: &role })?;
    metadata
        .signed
        .validate()
        .context(error::InvalidMetadataSnafu { role })?;
    Ok(metadata)
}

/// Trusted root, timestamp, snapshot and targets metadata, and every delegated targets role loaded
/// so far.
#[derive(Debug, Clone)]
pub struct TrustedMetadataSet {
    reference_time: DateTime<Utc>,
    root: Signed<Root>,
    timestamp: Option<Signed<Timestamp>>,
    snapshot: Option<Signed<Snapshot>>,
    targets: HashMap<String, Signed<Targets>>,
}

impl TrustedMetadataSet {
    /// Creates the set from the bytes of a locally trusted root. The root must be signed by a
    /// threshold of its own root keys; it may be expired, since a newer root may follow.
    ///
    /// Expiry is judged against `reference_time` for the whole life of the set.
    pub fn new(root: &[u8], reference_time: DateTime<Utc>) -> Result<Self> {
        let root = parse::<Root>(root)?;
        root.verify_self()
            .context(error::VerifySignaturesSnafu { role: ROOT })?;
        debug!("loaded trusted root version {}", root.signed.version);
        Ok(Self {
            reference_time,
            root,
            timestamp: None,
            snapshot: None,
            targets: HashMap::new(),
        })
    }

    /// The time that expiry is checked against.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    /// The trusted root.
    pub fn root(&self) -> &Signed<Root> {
        &self.root
    }

    /// The trusted timestamp, if one has been loaded.
    pub fn timestamp(&self) -> Option<&Signed<Timestamp>> {
        self.timestamp.as_ref()
    }

    /// The trusted snapshot, if one has been loaded.
    pub fn snapshot(&self) -> Option<&Signed<Snapshot>> {
        self.snapshot.as_ref()
    }

    /// The trusted top-level targets, if they have been loaded.
    pub fn targets(&self) -> Option<&Signed<Targets>> {
        self.targets.get(TARGETS)
    }

    /// The trusted targets metadata for `role`, which is `targets` or a delegated role.
    pub fn role(&self, role: &str) -> Option<&Signed<Targets>> {
        self.targets.get(role)
    }

    fn require_timestamp(&self) -> Result<&Signed<Timestamp>> {
        self.timestamp.as_ref().context(error::MissingTrustedSnafu {
            role: RoleType::Timestamp,
        })
    }

    fn require_snapshot(&self) -> Result<&Signed<Snapshot>> {
        self.snapshot.as_ref().context(error::MissingTrustedSnafu {
            role: RoleType::Snapshot,
        })
    }

    fn check_not_expired<T: Role>(&self, metadata: &Signed<T>, role: &str) -> Result<()> {
        ensure!(
            !metadata.signed.is_expired(self.reference_time),
            error::ExpiredMetadataSnafu {
                role,
                expires: metadata.signed.expires(),
            }
        );
        Ok(())
    }

    /// Verifies and installs the next version of root. Only possible before a timestamp is
    /// trusted.
    ///
    /// The new root must be signed by a threshold of the trusted root's root keys and by a
    /// threshold of its own, and its version must be exactly one more than the trusted version.
    pub fn update_root(&mut self, data: &[u8]) -> Result<&Signed<Root>> {
        ensure!(
            self.timestamp.is_none(),
            error::UpdateOrderSnafu {
                action: "update root after timestamp"
            }
        );

        let new_root = parse::<Root>(data)?;
        self.root
            .verify_delegate(ROOT, &new_root)
            .context(error::VerifySignaturesSnafu { role: ROOT })?;

        let expected = self.root.signed.version.get().saturating_add(1);
        ensure!(
            new_root.signed.version.get() == expected,
            error::RootVersionSnafu {
                expected,
                found: new_root.signed.version.get(),
            }
        );
        new_root
            .verify_self()
            .context(error::VerifySignaturesSnafu { role: ROOT })?;

        info!("updated trusted root to version {}", new_root.signed.version);
        self.root = new_root;
        Ok(&self.root)
    }

    /// Verifies and installs a timestamp. Only possible before a snapshot is trusted.
    ///
    /// A timestamp with the same version as the trusted one fails with an `EqualVersion` error and
    /// leaves the set unchanged. Once installed, an expired timestamp is still reported as an
    /// error.
    pub fn update_timestamp(&mut self, data: &[u8]) -> Result<&Signed<Timestamp>> {
        ensure!(
            self.snapshot.is_none(),
            error::UpdateOrderSnafu {
                action: "update timestamp after snapshot"
            }
        );
        self.check_not_expired(&self.root, ROOT)?;

        let new_timestamp = parse::<Timestamp>(data)?;
        self.root
            .verify_delegate(&RoleType::Timestamp.to_string(), &new_timestamp)
            .context(error::VerifySignaturesSnafu {
                role: RoleType::Timestamp.to_string(),
            })?;

        if let Some(current) = &self.timestamp {
            let (current_version, new_version) = (
                current.signed.version.get(),
                new_timestamp.signed.version.get(),
            );
            ensure!(
                new_version >= current_version,
                error::VersionRollbackSnafu {
                    role: RoleType::Timestamp,
                    current: current_version,
                    new: new_version,
                }
            );
            ensure!(
                new_version != current_version,
                error::EqualVersionSnafu {
                    role: RoleType::Timestamp,
                    version: new_version,
                }
            );
            let (current_snapshot, new_snapshot) = (
                current.signed.snapshot_meta.version.get(),
                new_timestamp.signed.snapshot_meta.version.get(),
            );
            ensure!(
                new_snapshot >= current_snapshot,
                error::SnapshotVersionRollbackSnafu {
                    current: current_snapshot,
                    new: new_snapshot,
                }
            );
        }

        debug!(
            "updated trusted timestamp to version {}",
            new_timestamp.signed.version
        );
        self.timestamp = Some(new_timestamp);
        self.check_final_timestamp()?;
        self.require_timestamp()
    }

    /// Fails unless a timestamp is trusted and not expired.
    pub fn check_final_timestamp(&self) -> Result<()> {
        let timestamp = self.require_timestamp()?;
        self.check_not_expired(timestamp, &RoleType::Timestamp.to_string())
    }

    /// Verifies and installs a snapshot. Only possible after a timestamp and before targets are
    /// trusted.
    ///
    /// Unless `trusted` is set, `data` must match the length and hashes the timestamp declares.
    /// Pass `trusted` only for a snapshot read back from the local metadata directory, which was
    /// checked when it was written. Once installed, an expired snapshot, or one whose version
    /// differs from the timestamp's, is still reported as an error.
    pub fn update_snapshot(&mut self, data: &[u8], trusted: bool) -> Result<&Signed<Snapshot>> {
        ensure!(
            self.timestamp.is_some(),
            error::UpdateOrderSnafu {
                action: "update snapshot before timestamp"
            }
        );
        ensure!(
            !self.targets.contains_key(TARGETS),
            error::UpdateOrderSnafu {
                action: "update snapshot after targets"
            }
        );
        self.check_final_timestamp()?;

        let timestamp = self.require_timestamp()?;
        if !trusted {
            timestamp
                .signed
                .snapshot_meta
                .verify(data)
                .context(error::LengthOrHashMismatchSnafu {
                    context: "snapshot metadata",
                })?;
        }

        let new_snapshot = parse::<Snapshot>(data)?;
        self.root
            .verify_delegate(&RoleType::Snapshot.to_string(), &new_snapshot)
            .context(error::VerifySignaturesSnafu {
                role: RoleType::Snapshot.to_string(),
            })?;

        if let Some(current) = &self.snapshot {
            for (file, info) in &current.signed.meta {
                let new_info = new_snapshot
                    .signed
                    .meta
                    .get(file)
                    .context(error::SnapshotMetaRemovedSnafu { file })?;
                ensure!(
                    new_info.version >= info.version,
                    error::MetaVersionRollbackSnafu {
                        file,
                        current: info.version.get(),
                        new: new_info.version.get(),
                    }
                );
            }
        }

        debug!(
            "updated trusted snapshot to version {}",
            new_snapshot.signed.version
        );
        self.snapshot = Some(new_snapshot);
        self.check_final_snapshot()?;
        self.require_snapshot()
    }

    /// Fails unless a snapshot is trusted, not expired, and has the version the trusted timestamp
    /// declares.
    pub fn check_final_snapshot(&self) -> Result<()> {
        let snapshot = self.require_snapshot()?;
        let timestamp = self.require_timestamp()?;
        self.check_not_expired(snapshot, &RoleType::Snapshot.to_string())?;

        let expected = timestamp.signed.snapshot_meta.version.get();
        ensure!(
            snapshot.signed.version.get() == expected,
            error::MetaVersionMismatchSnafu {
                role: RoleType::Snapshot.to_string(),
                declared_by: RoleType::Timestamp,
                expected,
                found: snapshot.signed.version.get(),
            }
        );
        Ok(())
    }

    /// Verifies and installs the top-level targets.
    pub fn update_targets(&mut self, data: &[u8]) -> Result<&Signed<Targets>> {
        self.update_delegated_targets(data, TARGETS, ROOT)
    }

    /// Verifies and installs targets metadata for `role`, delegated by `delegator` (`root` for the
    /// top-level targets role). The delegator must already be trusted.
    ///
    /// `data` must match the length and hashes the snapshot declares for `<role>.json`, be signed
    /// by a threshold of the keys the delegator assigns to `role`, carry exactly the version the
    /// snapshot declares, and not be expired.
    pub fn update_delegated_targets(
        &mut self,
        data: &[u8],
        role: &str,
        delegator: &str,
    ) -> Result<&Signed<Targets>> {
        ensure!(
            self.snapshot.is_some(),
            error::UpdateOrderSnafu {
                action: "update targets before snapshot"
            }
        );
        self.check_final_snapshot()?;

        ensure!(
            delegator == ROOT || self.targets.contains_key(delegator),
            error::NoTrustedDelegatorSnafu { role, delegator }
        );

        let file = format!("{role}.json");
        let meta = self
            .require_snapshot()?
            .signed
            .meta
            .get(&file)
            .context(error::MissingMetaSnafu { file: &file })?;
        meta.verify(data)
            .context(error::LengthOrHashMismatchSnafu { context: &file })?;

        let new_delegate = parse::<Targets>(data)?;
        let verified = if delegator == ROOT {
            self.root.verify_delegate(role, &new_delegate)
        } else {
            self.targets
                .get(delegator)
                .context(error::NoTrustedDelegatorSnafu { role, delegator })?
                .verify_delegate(role, &new_delegate)
        };
        verified.context(error::VerifySignaturesSnafu { role })?;

        let expected = meta.version.get();
        ensure!(
            new_delegate.signed.version.get() == expected,
            error::MetaVersionMismatchSnafu {
                role,
                declared_by: RoleType::Snapshot,
                expected,
                found: new_delegate.signed.version.get(),
            }
        );
        self.check_not_expired(&new_delegate, role)?;

        debug!(
            "updated trusted '{}' to version {}",
            role, new_delegate.signed.version
        );
        self.targets.insert(role.to_owned(), new_delegate);
        self.role(role).context(error::MissingTrustedSnafu {
            role: RoleType::Targets,
        })
    }
}
