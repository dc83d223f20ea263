#![allow(clippy::used_underscore_binding)]

//! Provides the metadata objects of The Update Framework.

mod de;
pub mod decoded;
mod error;
pub mod key;
mod spki;
mod verify;

use crate::schema::decoded::{Decoded, Hex};
pub use crate::schema::error::{Error, Result};
use crate::schema::key::Key;
pub use crate::schema::verify::{Authorization, KeyHolder};
use aws_lc_rs::digest::{digest, Algorithm, Context, SHA256, SHA512};
use chrono::{DateTime, Utc};
use globset::GlobBuilder;
use indexmap::IndexMap;
use olpc_cjson::CanonicalFormatter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::num::NonZeroU64;

/// The version of the TUF specification that metadata created by this crate conforms to.
pub const SPEC_VERSION: &str = "1.0.31";

/// The type of metadata role.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum RoleType {
    /// The root role delegates trust to specific keys trusted for all other top-level roles used in
    /// the system.
    Root,
    /// The snapshot role signs a metadata file that provides information about the latest version
    /// of all targets metadata on the repository (the top-level targets role and all delegated
    /// roles).
    Snapshot,
    /// The targets role's signature indicates which target files are trusted by clients.
    Targets,
    /// The timestamp role is used to prevent an adversary from replaying an out-of-date signed
    /// metadata file whose signature has not yet expired.
    Timestamp,
}

derive_display_from_serialize!(RoleType);
derive_fromstr_from_deserialize!(RoleType);

impl RoleType {
    /// All top-level roles.
    pub const ALL: [RoleType; 4] = [
        RoleType::Root,
        RoleType::Snapshot,
        RoleType::Targets,
        RoleType::Timestamp,
    ];

    /// Whether `name` is the name of a top-level role.
    pub fn is_top_level(name: &str) -> bool {
        name.parse::<RoleType>().is_ok()
    }
}

/// Common trait implemented by all roles.
pub trait Role: Serialize + DeserializeOwned {
    /// The type of role this object represents.
    const TYPE: RoleType;

    /// The version of the TUF specification the metadata follows.
    fn spec_version(&self) -> &str;

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    fn expires(&self) -> DateTime<Utc>;

    /// An integer that is greater than 0. Clients MUST NOT replace a metadata file with a version
    /// number less than the one currently trusted.
    fn version(&self) -> NonZeroU64;

    /// Checks invariants that serde cannot express. Called on every parsed object.
    fn validate(&self) -> Result<()> {
        check_spec_version(self.spec_version())
    }

    /// Metadata is expired once the reference time is strictly after its expiry.
    fn is_expired(&self, reference_time: DateTime<Utc>) -> bool {
        reference_time > self.expires()
    }

    /// A deterministic JSON serialization used when calculating the digest of a metadata object.
    /// [More info on canonical JSON](http://wiki.laptop.org/go/Canonical_JSON)
    fn canonical_form(&self) -> Result<Vec<u8>> {
        canonical_form(self, &Self::TYPE.to_string())
    }
}

/// Serializes `value` as canonical JSON. `what` names it in errors.
pub(crate) fn canonical_form<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut data, CanonicalFormatter::new());
    value
        .serialize(&mut ser)
        .context(error::JsonSerializationSnafu { what })?;
    Ok(data)
}

/// Only major version 1 of the TUF metadata format is supported.
fn check_spec_version(spec_version: &str) -> Result<()> {
    let mut parts = spec_version.split('.');
    let major = parts.next().unwrap_or_default();
    let rest: Vec<&str> = parts.collect();
    ensure!(
        major == "1"
            && (1..=2).contains(&rest.len())
            && rest.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())),
        error::UnsupportedSpecVersionSnafu {
            given: spec_version
        }
    );
    Ok(())
}

/// A signed metadata object.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Signed<T> {
    /// The role that is signed.
    pub signed: T,
    /// A list of signatures and their key IDs.
    pub signatures: Vec<Signature>,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl<T: Role> Signed<T> {
    /// Wraps `signed` with an empty list of signatures.
    pub fn new(signed: T) -> Self {
        Signed {
            signed,
            signatures: Vec::new(),
            _extra: HashMap::new(),
        }
    }

    /// The signature made by `keyid`, if there is one.
    pub fn signature(&self, keyid: &Decoded<Hex>) -> Option<&Signature> {
        self.signatures.iter().find(|s| &s.keyid == keyid)
    }

    /// Serializes the metadata as pretty-printed JSON, ready to be written to a file.
    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        let mut buffer =
            serde_json::to_vec_pretty(self).context(error::JsonSerializationSnafu {
                what: format!("signed {}", T::TYPE),
            })?;
        buffer.push(b'\n');
        Ok(buffer)
    }
}

/// A signature and the key ID that made it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Signature {
    /// The key ID (listed in root.json) that made this signature.
    pub keyid: Decoded<Hex>,
    /// A hex-encoded signature of the canonical JSON form of a role.
    pub sig: Decoded<Hex>,
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// TUF 4.3: The root.json file is signed by the root role's keys. It indicates which keys are
/// authorized for all top-level roles, including the root role itself. Revocation and replacement
/// of top-level role keys, including for the root role, is done by changing the keys listed for the
/// roles in this file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "root")]
pub struct Root {
    /// A string that contains the version number of the TUF specification. Its format follows the
    /// Semantic Versioning 2.0.0 (semver) specification.
    pub spec_version: String,

    /// A boolean indicating whether the repository supports consistent snapshots. When consistent
    /// snapshots is `true`, targets and certain metadata filenames are prefixed with either a
    /// a version number or digest.
    #[serde(default = "default_consistent_snapshot")]
    pub consistent_snapshot: bool,

    /// An integer that is greater than 0. Clients MUST NOT replace a metadata file with a version
    /// number less than the one currently trusted.
    pub version: NonZeroU64,

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    pub expires: DateTime<Utc>,

    /// The public keys that may sign for top-level roles, by key ID.
    #[serde(deserialize_with = "de::deserialize_keys")]
    pub keys: HashMap<Decoded<Hex>, Key>,

    /// The keys associated with each top-level role, and the threshold of signatures used for each
    /// role. All four top-level roles must be present.
    pub roles: HashMap<RoleType, RoleKeys>,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

fn default_consistent_snapshot() -> bool {
    true
}

/// Represents the key IDs used for a role and the threshold of signatures required to validate it.
/// The THRESHOLD for a role is an integer of the number of keys of that role whose signatures are
/// required in order to consider a file as being properly signed by that role.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoleKeys {
    /// The key IDs used for the role.
    pub keyids: Vec<Decoded<Hex>>,

    /// The threshold of signatures required to validate the role.
    pub threshold: NonZeroU64,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl RoleKeys {
    /// Creates role keys for `keyids` with the given threshold.
    pub fn new(keyids: Vec<Decoded<Hex>>, threshold: NonZeroU64) -> Self {
        RoleKeys {
            keyids,
            threshold,
            _extra: HashMap::new(),
        }
    }
}

fn check_unique_keyids(keyids: &[Decoded<Hex>], role: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for keyid in keyids {
        ensure!(
            seen.insert(keyid),
            error::DuplicateRoleKeyIdSnafu {
                keyid: keyid.to_string(),
                role,
            }
        );
    }
    Ok(())
}

impl Root {
    /// Create a new `Root` with no keys and no roles.
    pub fn new(version: NonZeroU64, expires: DateTime<Utc>) -> Self {
        Root {
            spec_version: SPEC_VERSION.to_owned(),
            consistent_snapshot: true,
            version,
            expires,
            keys: HashMap::new(),
            roles: HashMap::new(),
            _extra: HashMap::new(),
        }
    }

    /// An iterator over the keys for a given role.
    pub fn keys(&self, role: RoleType) -> impl Iterator<Item = &Key> {
        self.roles
            .get(&role)
            .map(|role_keys| role_keys.keyids.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|keyid| self.keys.get(keyid))
    }

    /// Adds `key` to the key map and authorizes it for `role`.
    pub fn add_key(&mut self, key: Key, role: RoleType) {
        let keyid = key.keyid.clone();
        self.keys.insert(keyid.clone(), key);
        let role_keys = self
            .roles
            .entry(role)
            .or_insert_with(|| RoleKeys::new(Vec::new(), NonZeroU64::MIN));
        if !role_keys.keyids.contains(&keyid) {
            role_keys.keyids.push(keyid);
        }
    }
}

impl Role for Root {
    const TYPE: RoleType = RoleType::Root;

    fn spec_version(&self) -> &str {
        &self.spec_version
    }

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> NonZeroU64 {
        self.version
    }

    fn validate(&self) -> Result<()> {
        check_spec_version(&self.spec_version)?;
        for role in RoleType::ALL {
            let role_keys = self.roles.get(&role).context(error::MissingRoleSnafu {
                role: role.to_string(),
            })?;
            check_unique_keyids(&role_keys.keyids, &role.to_string())?;
        }
        Ok(())
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// HASHES is a dictionary that specifies one or more hashes, including the cryptographic hash
/// function. For example: `{ "sha256": HASH, ... }`. Entries keep the order they were declared in.
pub type Hashes = IndexMap<String, Decoded<Hex>>;

fn hash_algorithm(name: &str) -> Result<&'static Algorithm> {
    match name {
        "sha256" => Ok(&SHA256),
        "sha512" => Ok(&SHA512),
        _ => error::UnsupportedHashAlgorithmSnafu { algorithm: name }.fail(),
    }
}

/// Compares the digests of `data` against every hash in `hashes`.
fn verify_hashes<R: Read>(hashes: &Hashes, mut data: R, context: &str) -> Result<u64> {
    let mut contexts = hashes
        .iter()
        .map(|(name, expected)| Ok((name, expected, Context::new(hash_algorithm(name)?))))
        .collect::<Result<Vec<_>>>()?;
    let mut length = 0u64;
    let mut buf = [0; 8 * 1024];
    loop {
        match data
            .read(&mut buf)
            .context(error::ReadSnafu { context })?
        {
            0 => break,
            n => {
                for (_, _, digest) in &mut contexts {
                    digest.update(&buf[..n]);
                }
                length += n as u64;
            }
        }
    }
    for (name, expected, digest) in contexts {
        let calculated = digest.finish();
        ensure!(
            calculated.as_ref() == &**expected,
            error::HashMismatchSnafu {
                context,
                algorithm: name.as_str(),
                calculated: hex::encode(calculated),
                expected: expected.to_string(),
            }
        );
    }
    Ok(length)
}

/// Represents a metadata file in a `snapshot.json` or `timestamp.json` file.
/// TUF 4.4: METAFILES is an object whose format is the following:
/// ```text
///  { METAPATH : {
///        "version" : VERSION,
///        ("length" : LENGTH, |
///         "hashes" : HASHES) }
///    , ...
///  }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MetaFile {
    /// LENGTH is the integer length in bytes of the metadata file at METAPATH. It is OPTIONAL and
    /// can be omitted to reduce the snapshot metadata file size. In that case the client MUST use a
    /// custom download limit for the listed metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,

    /// HASHES is OPTIONAL and can be omitted to reduce the snapshot metadata file size. In that
    /// case the repository MUST guarantee that VERSION alone unambiguously identifies the metadata
    /// at METAPATH.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashes: Option<Hashes>,

    /// An integer that is greater than 0. Clients MUST NOT replace a metadata file with a version
    /// number less than the one currently trusted.
    pub version: NonZeroU64,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl MetaFile {
    /// Creates a `MetaFile` that only names a version.
    pub fn new(version: NonZeroU64) -> Self {
        MetaFile {
            length: None,
            hashes: None,
            version,
            _extra: HashMap::new(),
        }
    }

    /// Creates a `MetaFile` describing `data` at `version`, with its length and SHA-256 digest.
    pub fn describe(version: NonZeroU64, data: &[u8]) -> Self {
        let mut hashes = Hashes::new();
        hashes.insert(
            "sha256".to_owned(),
            digest(&SHA256, data).as_ref().to_vec().into(),
        );
        MetaFile {
            length: Some(data.len() as u64),
            hashes: Some(hashes),
            version,
            _extra: HashMap::new(),
        }
    }

    /// Fails if the length or any declared hash of `data` does not match.
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        if let Some(expected) = self.length {
            ensure!(
                data.len() as u64 == expected,
                error::LengthMismatchSnafu {
                    context: "metadata file",
                    calculated: data.len() as u64,
                    expected,
                }
            );
        }
        if let Some(hashes) = &self.hashes {
            verify_hashes(hashes, data, "metadata file")?;
        }
        Ok(())
    }

    fn validate(&self, context: &str) -> Result<()> {
        if let Some(hashes) = &self.hashes {
            ensure!(!hashes.is_empty(), error::EmptyHashesSnafu { context });
        }
        Ok(())
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// Represents a `timestamp.json` file.
/// TUF 4.6: The timestamp file is signed by a timestamp key. It indicates the latest version of the
/// snapshot metadata and is frequently resigned to limit the amount of time a client can be kept
/// unaware of interference with obtaining updates.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "timestamp")]
pub struct Timestamp {
    /// A string that contains the version number of the TUF specification.
    pub spec_version: String,

    /// An integer that is greater than 0.
    pub version: NonZeroU64,

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    pub expires: DateTime<Utc>,

    /// The expected version, and optionally length and hashes, of `snapshot.json`. Serialized as
    /// the single entry of the `meta` object.
    #[serde(rename = "meta", with = "de::snapshot_meta")]
    pub snapshot_meta: MetaFile,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

impl Timestamp {
    /// Creates a new `Timestamp` object.
    pub fn new(version: NonZeroU64, expires: DateTime<Utc>, snapshot_meta: MetaFile) -> Self {
        Timestamp {
            spec_version: SPEC_VERSION.to_owned(),
            version,
            expires,
            snapshot_meta,
            _extra: HashMap::new(),
        }
    }
}

impl Role for Timestamp {
    const TYPE: RoleType = RoleType::Timestamp;

    fn spec_version(&self) -> &str {
        &self.spec_version
    }

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> NonZeroU64 {
        self.version
    }

    fn validate(&self) -> Result<()> {
        check_spec_version(&self.spec_version)?;
        self.snapshot_meta.validate("snapshot.json")
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// TUF 4.4 The snapshot.json file is signed by the snapshot role. It MUST list the version numbers
/// of the top-level targets metadata and all delegated targets metadata. It MAY also list their
/// lengths and file hashes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "snapshot")]
pub struct Snapshot {
    /// A string that contains the version number of the TUF specification.
    pub spec_version: String,

    /// An integer that is greater than 0.
    pub version: NonZeroU64,

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    pub expires: DateTime<Utc>,

    /// Maps each targets metadata file name (`targets.json`, `<role>.json`) to what the client
    /// should expect to download for it.
    pub meta: HashMap<String, MetaFile>,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

impl Snapshot {
    /// Create a new `Snapshot` object.
    pub fn new(version: NonZeroU64, expires: DateTime<Utc>) -> Self {
        Snapshot {
            spec_version: SPEC_VERSION.to_owned(),
            version,
            expires,
            meta: HashMap::new(),
            _extra: HashMap::new(),
        }
    }
}

impl Role for Snapshot {
    const TYPE: RoleType = RoleType::Snapshot;

    fn spec_version(&self) -> &str {
        &self.spec_version
    }

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> NonZeroU64 {
        self.version
    }

    fn validate(&self) -> Result<()> {
        check_spec_version(&self.spec_version)?;
        for (name, meta) in &self.meta {
            meta.validate(name)?;
        }
        Ok(())
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// Represents a `targets.json` file, or the metadata of a delegated targets role.
/// TUF 4.5:
/// The "signed" portion of targets.json is as follows:
/// ```text
/// { "_type" : "targets",
///   "spec_version" : SPEC_VERSION,
///   "version" : VERSION,
///   "expires" : EXPIRES,
///   "targets" : TARGETS,
///   ("delegations" : DELEGATIONS)
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "targets")]
pub struct Targets {
    /// A string that contains the version number of the TUF specification.
    pub spec_version: String,

    /// An integer that is greater than 0.
    pub version: NonZeroU64,

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    pub expires: DateTime<Utc>,

    /// Each key of the TARGETS object is a TARGETPATH. A TARGETPATH is a path to a file that is
    /// relative to a mirror's base URL of targets.
    #[serde(deserialize_with = "de::deserialize_targets")]
    pub targets: HashMap<String, TargetFile>,

    /// Delegations describes subsets of the targets for which responsibility is delegated to
    /// another role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegations: Option<Delegations>,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

impl Targets {
    /// Create a new `Targets` object with no targets and no delegations.
    pub fn new(version: NonZeroU64, expires: DateTime<Utc>) -> Self {
        Targets {
            spec_version: SPEC_VERSION.to_owned(),
            version,
            expires,
            targets: HashMap::new(),
            delegations: None,
            _extra: HashMap::new(),
        }
    }

    /// Add a target to targets
    pub fn add_target(&mut self, target: TargetFile) {
        self.targets.insert(target.path.clone(), target);
    }
}

impl Role for Targets {
    const TYPE: RoleType = RoleType::Targets;

    fn spec_version(&self) -> &str {
        &self.spec_version
    }

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> NonZeroU64 {
        self.version
    }

    fn validate(&self) -> Result<()> {
        check_spec_version(&self.spec_version)?;
        for target in self.targets.values() {
            ensure!(
                !target.hashes.is_empty(),
                error::EmptyHashesSnafu {
                    context: &target.path
                }
            );
        }
        if let Some(delegations) = &self.delegations {
            delegations.validate()?;
        }
        Ok(())
    }
}

/// TUF 4.5: TARGETS is an object whose format is the following:
/// ```text
/// { TARGETPATH : {
///       "length" : LENGTH,
///       "hashes" : HASHES,
///       ("custom" : { ... }) }
///   , ...
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TargetFile {
    /// The TARGETPATH this target is listed under. Filled in when metadata is parsed; not part of
    /// the target's serialized form.
    #[serde(skip)]
    pub path: String,

    /// LENGTH is the integer length in bytes of the target file at TARGETPATH.
    pub length: u64,

    /// HASHES is a dictionary that specifies one or more hashes, including the cryptographic hash
    /// function. HASH is the hexdigest of the cryptographic function computed on the target file.
    pub hashes: Hashes,

    /// Extra arguments found during deserialization, including `custom`.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl TargetFile {
    /// Describes `data` as the target at `path`, with its length and SHA-256 digest.
    pub fn describe(path: &str, data: &[u8]) -> Self {
        let mut hashes = Hashes::new();
        hashes.insert(
            "sha256".to_owned(),
            digest(&SHA256, data).as_ref().to_vec().into(),
        );
        TargetFile {
            path: path.to_owned(),
            length: data.len() as u64,
            hashes,
            _extra: HashMap::new(),
        }
    }

    /// If defined, the elements and values of "custom" are made available to the client
    /// application. The information in "custom" is opaque to the framework.
    pub fn custom(&self) -> Option<&Map<String, Value>> {
        self._extra.get("custom").and_then(Value::as_object)
    }

    /// Reads `data` to the end and fails if its length or any declared hash does not match.
    pub fn verify<R: Read>(&self, data: R) -> Result<()> {
        // Bound the read so an oversized file is detected without hashing all of it.
        let mut limited = data.take(self.length.saturating_add(1));
        let calculated = verify_hashes(&self.hashes, &mut limited, &self.path)?;
        ensure!(
            calculated == self.length,
            error::LengthMismatchSnafu {
                context: &self.path,
                calculated,
                expected: self.length,
            }
        );
        Ok(())
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// Delegations are found in a `targets.json` file.
/// TUF 4.5: DELEGATIONS is an object whose format is the following:
/// ```text
/// { "keys" : {
///       KEYID : KEY,
///       ... },
///   ("roles" : [{
///       "name": ROLENAME,
///       "keyids" : [ KEYID, ... ] ,
///       "threshold" : THRESHOLD,
///       ("path_hash_prefixes" : [ HEX_DIGEST, ... ] |
///        "paths" : [ PATHPATTERN, ... ]),
///       "terminating": TERMINATING,
///   }, ... ] |
///   "succinct_roles" : SUCCINCT_ROLES)
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Delegations {
    /// Lists the public keys to verify signatures of delegated targets roles. Revocation and
    /// replacement of delegated targets roles keys is done by changing the keys in this field in
    /// the delegating role's metadata.
    #[serde(deserialize_with = "de::deserialize_keys")]
    pub keys: HashMap<Decoded<Hex>, Key>,

    /// The list of delegated roles, in order of preference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<DelegatedRole>>,

    /// A compact description of many hash-binned delegated roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succinct_roles: Option<SuccinctRoles>,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Delegations {
    /// Creates delegations with the given keys and ordered roles.
    pub fn with_roles(keys: HashMap<Decoded<Hex>, Key>, roles: Vec<DelegatedRole>) -> Self {
        Delegations {
            keys,
            roles: Some(roles),
            succinct_roles: None,
            _extra: HashMap::new(),
        }
    }

    /// The delegated roles that are trusted for `target`, in order, with their terminating flag.
    pub fn roles_for_target(&self, target: &str) -> Vec<(String, bool)> {
        if let Some(roles) = &self.roles {
            roles
                .iter()
                .filter(|role| role.is_delegated_path(target))
                .map(|role| (role.name.clone(), role.terminating))
                .collect()
        } else if let Some(succinct) = &self.succinct_roles {
            vec![(succinct.role_for_target(target), true)]
        } else {
            Vec::new()
        }
    }

    fn validate(&self) -> Result<()> {
        match (&self.roles, &self.succinct_roles) {
            (Some(roles), None) => {
                let mut names = HashSet::new();
                for role in roles {
                    ensure!(
                        !RoleType::is_top_level(&role.name),
                        error::ReservedRoleNameSnafu { name: &role.name }
                    );
                    ensure!(
                        names.insert(role.name.as_str()),
                        error::DuplicateRoleNameSnafu { name: &role.name }
                    );
                    check_unique_keyids(&role.keyids, &role.name)?;
                }
                Ok(())
            }
            (None, Some(succinct)) => {
                ensure!(
                    (1..=32).contains(&succinct.bit_length),
                    error::InvalidBitLengthSnafu {
                        bit_length: succinct.bit_length
                    }
                );
                ensure!(
                    !RoleType::is_top_level(&succinct.name_prefix),
                    error::ReservedRoleNameSnafu {
                        name: &succinct.name_prefix
                    }
                );
                check_unique_keyids(&succinct.keyids, &succinct.name_prefix)
            }
            _ => error::DelegationsStyleSnafu.fail(),
        }
    }
}

/// Each role delegated in a targets file is considered a delegated role
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(try_from = "RawDelegatedRole")]
pub struct DelegatedRole {
    /// The name of the delegated role. For example, "projects".
    pub name: String,

    /// The key IDs used by this role.
    pub keyids: Vec<Decoded<Hex>>,

    /// The threshold of signatures required to validate the role.
    pub threshold: NonZeroU64,

    /// Indicates whether subsequent delegations should be considered.
    pub terminating: bool,

    /// The paths governed by this role.
    #[serde(flatten)]
    pub paths: PathSet,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// The serialized form of a `DelegatedRole`, before checking that exactly one kind of path set is
/// given.
#[derive(Deserialize)]
struct RawDelegatedRole {
    name: String,
    keyids: Vec<Decoded<Hex>>,
    threshold: NonZeroU64,
    terminating: bool,
    paths: Option<Vec<String>>,
    path_hash_prefixes: Option<Vec<String>>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

impl TryFrom<RawDelegatedRole> for DelegatedRole {
    type Error = Error;

    fn try_from(raw: RawDelegatedRole) -> Result<Self> {
        let paths = match (raw.paths, raw.path_hash_prefixes) {
            (Some(paths), None) => PathSet::Paths(paths),
            (None, Some(prefixes)) => PathSet::PathHashPrefixes(prefixes),
            _ => return error::PathSetStyleSnafu { name: raw.name }.fail(),
        };
        Ok(DelegatedRole {
            name: raw.name,
            keyids: raw.keyids,
            threshold: raw.threshold,
            terminating: raw.terminating,
            paths,
            _extra: raw._extra,
        })
    }
}

impl DelegatedRole {
    /// Creates a delegated role.
    pub fn new(
        name: &str,
        keyids: Vec<Decoded<Hex>>,
        threshold: NonZeroU64,
        terminating: bool,
        paths: PathSet,
    ) -> Self {
        DelegatedRole {
            name: name.to_owned(),
            keyids,
            threshold,
            terminating,
            paths,
            _extra: HashMap::new(),
        }
    }

    /// Whether this role is trusted to provide `target`.
    pub fn is_delegated_path(&self, target: &str) -> bool {
        self.paths.matched_target(target)
    }
}

/// Specifies the target paths that a delegated role controls.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum PathSet {
    /// The "paths" list describes paths that the role is trusted to provide. PATHPATTERN can
    /// include shell-style wildcards and supports the Unix filename pattern matching convention.
    /// Wildcards never match across a directory separator: the path pattern "targets/*.tgz" would
    /// match file paths "targets/foo.tgz" and "targets/bar.tgz", but not "targets/foo.txt" or
    /// "targets/sub/foo.tgz". Likewise, path pattern "foo-version-?.tgz" matches
    /// "foo-version-2.tgz" and "foo-version-a.tgz", but not "foo-version-alpha.tgz".
    #[serde(rename = "paths")]
    Paths(Vec<String>),

    /// The "path_hash_prefixes" list is used to succinctly describe a set of target paths.
    /// Each target path, when hashed with the SHA-256 hash function to produce a 64-character
    /// hexadecimal digest, must share the same prefix as one of the prefixes in
    /// "path_hash_prefixes". This is useful to split a large number of targets into separate bins
    /// identified by consistent hashing.
    #[serde(rename = "path_hash_prefixes")]
    PathHashPrefixes(Vec<String>),
}

impl PathSet {
    /// Given a target string determines if paths match
    fn matched_target(&self, target: &str) -> bool {
        match self {
            Self::Paths(paths) => paths.iter().any(|path| Self::matched_path(path, target)),
            Self::PathHashPrefixes(prefixes) => {
                let hash = hex::encode(digest(&SHA256, target.as_bytes()));
                prefixes.iter().any(|prefix| hash.starts_with(prefix.as_str()))
            }
        }
    }

    /// Matches a shell style wildcard path against a target, one path segment at a time.
    fn matched_path(wildcardpath: &str, target: &str) -> bool {
        let patterns: Vec<&str> = wildcardpath.split('/').collect();
        let segments: Vec<&str> = target.split('/').collect();
        if patterns.len() != segments.len() {
            return false;
        }
        patterns.iter().zip(segments).all(|(pattern, segment)| {
            match GlobBuilder::new(pattern).literal_separator(true).build() {
                Ok(glob) => glob.compile_matcher().is_match(segment),
                Err(_) => false,
            }
        })
    }

    /// Returns a Vec representation of the `PathSet`
    pub fn vec(&self) -> &Vec<String> {
        match self {
            PathSet::Paths(x) | PathSet::PathHashPrefixes(x) => x,
        }
    }
}

/// Succinct hash-bin delegations. Instead of listing each bin, the delegating role describes
/// `2^bit_length` roles named `<name_prefix>-<bin>` that share one set of keys; a target belongs
/// to the bin given by the leading `bit_length` bits of the SHA-256 digest of its path.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SuccinctRoles {
    /// The key IDs used by every bin role.
    pub keyids: Vec<Decoded<Hex>>,

    /// The threshold of signatures required to validate a bin role.
    pub threshold: NonZeroU64,

    /// The number of leading hash bits that select a bin.
    pub bit_length: u8,

    /// The common prefix of every bin role name.
    pub name_prefix: String,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl SuccinctRoles {
    /// The number of bins, `2^bit_length`.
    pub fn number_of_bins(&self) -> u64 {
        1u64 << self.bit_length
    }

    /// The number of hex digits in a bin name suffix.
    fn suffix_len(&self) -> usize {
        format!("{:x}", self.number_of_bins() - 1).len()
    }

    /// The name of the bin role responsible for `target`.
    pub fn role_for_target(&self, target: &str) -> String {
        let hash = digest(&SHA256, target.as_bytes());
        let mut first = [0u8; 4];
        first.copy_from_slice(&hash.as_ref()[..4]);
        let shift = 32u32.saturating_sub(u32::from(self.bit_length));
        let bin = u32::from_be_bytes(first).checked_shr(shift).unwrap_or(0);
        self.bin_name(u64::from(bin))
    }

    /// All bin role names, in bin order.
    pub fn role_names(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.number_of_bins()).map(|bin| self.bin_name(bin))
    }

    /// Whether `name` is one of the bin roles.
    pub fn is_delegated_role(&self, name: &str) -> bool {
        let Some(suffix) = name
            .strip_prefix(self.name_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
        else {
            return false;
        };
        suffix.len() == self.suffix_len()
            && u64::from_str_radix(suffix, 16).is_ok_and(|bin| bin < self.number_of_bins())
    }

    fn bin_name(&self, bin: u64) -> String {
        format!(
            "{}-{:0width$x}",
            self.name_prefix,
            bin,
            width = self.suffix_len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::Sign;
    use aws_lc_rs::rand::SystemRandom;
    use aws_lc_rs::signature::Ed25519KeyPair;
    use maplit::hashmap;
    use serde_json::json;

    fn root_json() -> Value {
        json!({
            "signatures": [{"keyid": "aa", "sig": "bb"}],
            "signed": {
                "_type": "root",
                "spec_version": "1.0.31",
                "version": 1,
                "expires": "2030-01-01T00:00:00Z",
                "consistent_snapshot": false,
                "keys": {
                    "aa": {
                        "keytype": "ed25519",
                        "scheme": "ed25519",
                        "keyval": {"public": "00"},
                        "x-key-extra": true
                    }
                },
                "roles": {
                    "root": {"keyids": ["aa"], "threshold": 1},
                    "timestamp": {"keyids": ["aa"], "threshold": 1},
                    "snapshot": {"keyids": ["aa"], "threshold": 1},
                    "targets": {"keyids": ["aa"], "threshold": 1}
                },
                "x-custom": {"nested": [1, 2, 3]}
            },
            "x-envelope": "kept"
        })
    }

    #[test]
    fn root_round_trip_keeps_unrecognized_fields() {
        let root: Signed<Root> = serde_json::from_value(root_json()).unwrap();
        root.signed.validate().unwrap();
        assert_eq!(root.signed._extra["x-custom"], json!({"nested": [1, 2, 3]}));
        assert_eq!(root._extra["x-envelope"], json!("kept"));
        assert!(!root.signed._extra.contains_key("_type"));

        let keyid = Decoded::<Hex>::from_encoded("aa").unwrap();
        assert_eq!(root.signed.keys[&keyid].keyid, keyid);

        let again: Signed<Root> =
            serde_json::from_slice(&root.to_json_vec().unwrap()).unwrap();
        assert_eq!(root, again);
        assert_eq!(
            serde_json::to_value(&again).unwrap(),
            serde_json::to_value(&root).unwrap()
        );
    }

    /// Signs the role parsed from `signed`, sends it through JSON and back, and checks that the
    /// result is equal and still carries a valid signature.
    fn signed_round_trip<T: Role + PartialEq + std::fmt::Debug>(signed: Value) -> Signed<T> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let mut metadata = Signed::new(serde_json::from_value::<T>(signed).unwrap());
        metadata.sign(&pair, &rng).unwrap();

        let again: Signed<T> = serde_json::from_slice(&metadata.to_json_vec().unwrap()).unwrap();
        assert_eq!(again, metadata);
        assert_eq!(
            serde_json::to_value(&again).unwrap(),
            serde_json::to_value(&metadata).unwrap()
        );
        Sign::tuf_key(&pair)
            .unwrap()
            .verify_signature(&again)
            .unwrap();
        again
    }

    #[test]
    fn timestamp_round_trip_keeps_unrecognized_fields() {
        let timestamp: Signed<Timestamp> = signed_round_trip(json!({
            "_type": "timestamp",
            "spec_version": "1.0.31",
            "version": 4,
            "expires": "2030-01-01T00:00:00Z",
            "meta": {
                "snapshot.json": {
                    "version": 3,
                    "length": 10,
                    "hashes": {"sha512": "bb", "sha256": "aa"},
                    "x-meta": "kept"
                }
            },
            "x-timestamp": [1, 2]
        }));
        let meta = &timestamp.signed.snapshot_meta;
        assert_eq!(meta._extra["x-meta"], json!("kept"));
        let hashes = meta.hashes.as_ref().unwrap();
        let algorithms: Vec<&str> = hashes.keys().map(String::as_str).collect();
        assert_eq!(algorithms, ["sha512", "sha256"]);
        assert_eq!(timestamp.signed._extra["x-timestamp"], json!([1, 2]));
    }

    #[test]
    fn snapshot_round_trip_keeps_unrecognized_fields() {
        let snapshot: Signed<Snapshot> = signed_round_trip(json!({
            "_type": "snapshot",
            "spec_version": "1.0.31",
            "version": 3,
            "expires": "2030-01-01T00:00:00Z",
            "meta": {
                "targets.json": {"version": 1, "x-file": {"nested": true}},
                "role.json": {"version": 2}
            },
            "x-snapshot": "kept"
        }));
        assert_eq!(
            snapshot.signed.meta["targets.json"]._extra["x-file"],
            json!({"nested": true})
        );
        assert_eq!(snapshot.signed.meta["role.json"].version.get(), 2);
        assert_eq!(snapshot.signed._extra["x-snapshot"], json!("kept"));
    }

    #[test]
    fn targets_round_trip_keeps_unrecognized_fields() {
        let targets: Signed<Targets> = signed_round_trip(json!({
            "_type": "targets",
            "spec_version": "1.0.31",
            "version": 2,
            "expires": "2030-01-01T00:00:00Z",
            "targets": {
                "a.txt": {
                    "length": 1,
                    "hashes": {"sha256": "00"},
                    "custom": {"file_permissions": "0644"},
                    "x-target": 1
                }
            },
            "delegations": {
                "keys": {},
                "roles": [{
                    "name": "r",
                    "keyids": [],
                    "threshold": 1,
                    "terminating": false,
                    "paths": ["a*"],
                    "x-role": "kept"
                }],
                "x-delegations": 2
            },
            "x-targets": "kept"
        }));
        let target = &targets.signed.targets["a.txt"];
        assert_eq!(target.path, "a.txt");
        assert_eq!(target.custom().unwrap()["file_permissions"], json!("0644"));
        assert_eq!(target._extra["x-target"], json!(1));

        let delegations = targets.signed.delegations.as_ref().unwrap();
        assert_eq!(delegations._extra["x-delegations"], json!(2));
        let role = &delegations.roles.as_ref().unwrap()[0];
        assert_eq!(role._extra["x-role"], json!("kept"));
        assert!(role.is_delegated_path("abc"));
        assert_eq!(targets.signed._extra["x-targets"], json!("kept"));
    }

    #[test]
    fn target_hashes_keep_declared_order() {
        let target: TargetFile = serde_json::from_value(json!({
            "length": 1,
            "hashes": {"sha512": "bb", "sha256": "aa"}
        }))
        .unwrap();
        assert_eq!(target.hashes.keys().next().unwrap(), "sha512");
        let value = serde_json::to_value(&target).unwrap();
        let serialized: Vec<&String> = value["hashes"].as_object().unwrap().keys().collect();
        assert_eq!(serialized, ["sha512", "sha256"]);
    }

    #[test]
    fn root_missing_role_is_invalid() {
        let mut value = root_json();
        value["signed"]["roles"]
            .as_object_mut()
            .unwrap()
            .remove("snapshot");
        let root: Signed<Root> = serde_json::from_value(value).unwrap();
        assert!(matches!(
            root.signed.validate(),
            Err(Error::MissingRole { .. })
        ));
    }

    #[test]
    fn consistent_snapshot_defaults_to_true() {
        let mut value = root_json();
        value["signed"]
            .as_object_mut()
            .unwrap()
            .remove("consistent_snapshot");
        let root: Signed<Root> = serde_json::from_value(value).unwrap();
        assert!(root.signed.consistent_snapshot);
    }

    #[test]
    fn spec_version_major_must_be_one() {
        assert!(check_spec_version("1.0.31").is_ok());
        assert!(check_spec_version("1.0").is_ok());
        assert!(check_spec_version("2.0.0").is_err());
        assert!(check_spec_version("1").is_err());
        assert!(check_spec_version("1.x.0").is_err());
    }

    #[test]
    fn expiry_is_strict() {
        let expires = "2030-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let targets = Targets::new(NonZeroU64::MIN, expires);
        assert!(!targets.is_expired(expires));
        assert!(targets.is_expired(expires + chrono::Duration::seconds(1)));
    }

    #[test]
    fn timestamp_meta_only_describes_snapshot() {
        let value = json!({
            "_type": "timestamp",
            "spec_version": "1.0.31",
            "version": 3,
            "expires": "2030-01-01T00:00:00Z",
            "meta": {"snapshot.json": {"version": 7}}
        });
        let timestamp: Timestamp = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(timestamp.snapshot_meta.version.get(), 7);
        assert_eq!(serde_json::to_value(&timestamp).unwrap(), value);

        let mut extra = value;
        extra["meta"]["targets.json"] = json!({"version": 1});
        assert!(serde_json::from_value::<Timestamp>(extra).is_err());
    }

    #[test]
    fn meta_file_verify() {
        let data = b"snapshot bytes";
        let meta = MetaFile::describe(NonZeroU64::MIN, data);
        assert!(meta.verify(data).is_ok());
        assert!(matches!(
            meta.verify(b"snapshot bytez"),
            Err(Error::HashMismatch { .. })
        ));
        assert!(matches!(
            meta.verify(b"short"),
            Err(Error::LengthMismatch { .. })
        ));
        assert!(MetaFile::new(NonZeroU64::MIN).verify(b"anything").is_ok());

        let mut unknown = MetaFile::new(NonZeroU64::MIN);
        unknown.hashes = Some(hashmap_to_hashes(hashmap! {"md5" => "00"}));
        assert!(matches!(
            unknown.verify(b"x"),
            Err(Error::UnsupportedHashAlgorithm { .. })
        ));
    }

    fn hashmap_to_hashes(map: HashMap<&str, &str>) -> Hashes {
        map.into_iter()
            .map(|(k, v)| (k.to_owned(), Decoded::from_encoded(v).unwrap()))
            .collect()
    }

    #[test]
    fn target_file_verify_and_custom() {
        let value = json!({
            "length": 5,
            "hashes": {
                "sha256": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
            },
            "custom": {"file_permissions": "0644"}
        });
        let target: TargetFile = serde_json::from_value(value).unwrap();
        assert_eq!(target.custom().unwrap()["file_permissions"], json!("0644"));
        assert_eq!(
            &*target.hashes["sha256"],
            hex_literal::hex!("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        assert!(target.verify(&b"hello"[..]).is_ok());
        assert!(target.verify(&b"hellO"[..]).is_err());
        assert!(target.verify(&b"hello!"[..]).is_err());
        assert!(target.verify(&b"hell"[..]).is_err());
    }

    #[test]
    fn targets_record_their_paths() {
        let value = json!({
            "_type": "targets",
            "spec_version": "1.0.31",
            "version": 1,
            "expires": "2030-01-01T00:00:00Z",
            "targets": {
                "a/b.txt": {"length": 1, "hashes": {"sha256": "00"}}
            }
        });
        let targets: Targets = serde_json::from_value(value).unwrap();
        assert_eq!(targets.targets["a/b.txt"].path, "a/b.txt");
    }

    fn role(name: &str, paths: PathSet, terminating: bool) -> DelegatedRole {
        DelegatedRole::new(name, Vec::new(), NonZeroU64::MIN, terminating, paths)
    }

    #[test]
    fn path_patterns_match_per_segment() {
        let role = role(
            "r",
            PathSet::Paths(vec!["targets/*.tgz".into(), "foo-version-?.tgz".into()]),
            false,
        );
        assert!(role.is_delegated_path("targets/foo.tgz"));
        assert!(!role.is_delegated_path("targets/foo.txt"));
        assert!(!role.is_delegated_path("targets/sub/foo.tgz"));
        assert!(role.is_delegated_path("foo-version-2.tgz"));
        assert!(!role.is_delegated_path("foo-version-alpha.tgz"));

        let deep = self::role("d", PathSet::Paths(vec!["*/*".into()]), false);
        assert!(deep.is_delegated_path("a/b"));
        assert!(!deep.is_delegated_path("a"));
        assert!(!deep.is_delegated_path("a/b/c"));
    }

    #[test]
    fn path_hash_prefixes_match_hex_digest() {
        // sha256("hello") = 2cf24dba...
        let role = role(
            "r",
            PathSet::PathHashPrefixes(vec!["2cf2".into()]),
            false,
        );
        assert!(role.is_delegated_path("hello"));
        assert!(!role.is_delegated_path("world"));
    }

    #[test]
    fn delegated_role_requires_one_path_set() {
        let both = json!({
            "name": "r", "keyids": [], "threshold": 1, "terminating": false,
            "paths": ["*"], "path_hash_prefixes": ["00"]
        });
        assert!(serde_json::from_value::<DelegatedRole>(both).is_err());
        let neither = json!({
            "name": "r", "keyids": [], "threshold": 1, "terminating": false
        });
        assert!(serde_json::from_value::<DelegatedRole>(neither).is_err());

        let value = json!({
            "name": "r", "keyids": [], "threshold": 1, "terminating": true,
            "paths": ["*"], "x-role": 1
        });
        let role: DelegatedRole = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(role.paths, PathSet::Paths(vec!["*".into()]));
        assert_eq!(serde_json::to_value(&role).unwrap(), value);
    }

    #[test]
    fn delegations_validation() {
        let mut delegations = Delegations::with_roles(
            HashMap::new(),
            vec![role("targets", PathSet::Paths(vec!["*".into()]), false)],
        );
        assert!(matches!(
            delegations.validate(),
            Err(Error::ReservedRoleName { .. })
        ));

        delegations.roles = Some(vec![
            role("a", PathSet::Paths(vec!["*".into()]), false),
            role("a", PathSet::Paths(vec!["*".into()]), false),
        ]);
        assert!(matches!(
            delegations.validate(),
            Err(Error::DuplicateRoleName { .. })
        ));

        delegations.roles = None;
        assert!(matches!(
            delegations.validate(),
            Err(Error::DelegationsStyle { .. })
        ));
    }

    #[test]
    fn roles_for_target_keep_declared_order() {
        let delegations = Delegations::with_roles(
            HashMap::new(),
            vec![
                role("a", PathSet::Paths(vec!["*.txt".into()]), false),
                role("b", PathSet::Paths(vec!["*.bin".into()]), false),
                role("c", PathSet::Paths(vec!["file.*".into()]), true),
            ],
        );
        assert_eq!(
            delegations.roles_for_target("file.txt"),
            vec![("a".to_owned(), false), ("c".to_owned(), true)]
        );
    }

    fn succinct(bit_length: u8) -> SuccinctRoles {
        SuccinctRoles {
            keyids: Vec::new(),
            threshold: NonZeroU64::MIN,
            bit_length,
            name_prefix: "bin".into(),
            _extra: HashMap::new(),
        }
    }

    #[test]
    fn succinct_roles_bins() {
        let roles = succinct(8);
        assert_eq!(roles.number_of_bins(), 256);
        // sha256("hello") starts with 0x2c
        assert_eq!(roles.role_for_target("hello"), "bin-2c");
        assert!(roles.is_delegated_role("bin-2c"));
        assert!(roles.is_delegated_role("bin-00"));
        assert!(!roles.is_delegated_role("bin-100"));
        assert!(!roles.is_delegated_role("bin-2"));
        assert!(!roles.is_delegated_role("nib-2c"));
        assert_eq!(roles.role_names().count(), 256);

        let small = succinct(3);
        assert_eq!(small.role_names().collect::<Vec<_>>().last().unwrap(), "bin-7");
        // 0x2c = 0b0010_1100, top three bits = 0b001
        assert_eq!(small.role_for_target("hello"), "bin-1");

        let full = succinct(32);
        assert_eq!(full.role_for_target("hello"), "bin-2cf24dba");
    }

    #[test]
    fn succinct_delegations_are_terminating() {
        let delegations = Delegations {
            keys: HashMap::new(),
            roles: None,
            succinct_roles: Some(succinct(4)),
            _extra: HashMap::new(),
        };
        delegations.validate().unwrap();
        assert_eq!(
            delegations.roles_for_target("hello"),
            vec![("bin-2".to_owned(), true)]
        );

        let mut bad = delegations;
        bad.succinct_roles = Some(succinct(33));
        assert!(matches!(
            bad.validate(),
            Err(Error::InvalidBitLength { .. })
        ));
    }
}
