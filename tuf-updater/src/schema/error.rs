// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contains the error type for the schema module.

use snafu::{Backtrace, Snafu};

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for the schema module.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("Duplicate delegated role name '{}'", name))]
    DuplicateRoleName { name: String, backtrace: Backtrace },

    #[snafu(display("Duplicate key ID {} listed for role '{}'", keyid, role))]
    DuplicateRoleKeyId {
        keyid: String,
        role: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to decode hex string '{}': {}", input, source))]
    HexDecode {
        input: String,
        source: hex::FromHexError,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Hash mismatch for {} ({}): calculated {}, expected {}",
        context,
        algorithm,
        calculated,
        expected,
    ))]
    HashMismatch {
        context: String,
        algorithm: String,
        calculated: String,
        expected: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid public key for key ID {}: {}", keyid, reason))]
    InvalidPublicKey {
        keyid: String,
        reason: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid succinct roles bit length {}, must be in 1..=32", bit_length))]
    InvalidBitLength { bit_length: u8, backtrace: Backtrace },

    #[snafu(display("Failed to serialize {} to canonical JSON: {}", what, source))]
    JsonSerialization {
        what: String,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Length mismatch for {}: calculated {}, expected {}", context, calculated, expected))]
    LengthMismatch {
        context: String,
        calculated: u64,
        expected: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Hashes for {} must not be empty", context))]
    EmptyHashes { context: String, backtrace: Backtrace },

    #[snafu(display("Delegations must set exactly one of 'roles' and 'succinct_roles'"))]
    DelegationsStyle { backtrace: Backtrace },

    #[snafu(display("Root does not define the top-level role '{}'", role))]
    MissingRole { role: String, backtrace: Backtrace },

    #[snafu(display("No delegation found for role '{}'", role))]
    NoDelegation { role: String, backtrace: Backtrace },

    #[snafu(display("Key ID {} has no public key value", keyid))]
    PublicKeyMissing { keyid: String, backtrace: Backtrace },

    #[snafu(display("Failed to read {}: {}", context, source))]
    Read {
        context: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Delegated role name '{}' is reserved for a top-level role", name))]
    ReservedRoleName { name: String, backtrace: Backtrace },

    #[snafu(display("Invalid signature from key ID {}", keyid))]
    SignatureInvalid { keyid: String, backtrace: Backtrace },

    #[snafu(display("No signature from key ID {}", keyid))]
    SignatureMissing { keyid: String, backtrace: Backtrace },

    #[snafu(display(
        "Signature threshold of {} not met for role '{}' ({} valid signatures)",
        threshold,
        role,
        valid,
    ))]
    SignatureThreshold {
        role: String,
        threshold: u64,
        valid: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsupported hash algorithm '{}'", algorithm))]
    UnsupportedHashAlgorithm {
        algorithm: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsupported key type '{}' with scheme '{}'", keytype, scheme))]
    UnsupportedKey {
        keytype: String,
        scheme: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsupported spec_version '{}'", given))]
    UnsupportedSpecVersion { given: String, backtrace: Backtrace },

    #[snafu(display("Delegated role '{}' must set exactly one of 'paths' and 'path_hash_prefixes'", name))]
    PathSetStyle { name: String, backtrace: Backtrace },
}
