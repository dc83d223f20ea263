// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handles cryptographic keys and their serialization in TUF metadata files.

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::error::{self, Result};
use crate::schema::{canonical_form, spki};
use aws_lc_rs::digest::{digest, SHA256};
use aws_lc_rs::signature::{
    UnparsedPublicKey, VerificationAlgorithm, ECDSA_P256_SHA256_ASN1, ECDSA_P384_SHA384_ASN1,
    ED25519, RSA_PKCS1_2048_8192_SHA256, RSA_PSS_2048_8192_SHA256,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ensure, OptionExt};
use std::collections::HashMap;

/// Serializes signing keys as defined by the TUF specification. All keys have the format
/// ```text
///  { "keytype" : KEYTYPE,
///     "scheme" : SCHEME,
///     "keyval" : KEYVAL
///  }
/// ```
/// where:
/// KEYTYPE is a string denoting a public key signature system, such as RSA or ECDSA.
///
/// SCHEME is a string denoting a corresponding signature scheme. For example: "rsassa-pss-sha256"
/// and "ecdsa-sha2-nistp256".
///
/// KEYVAL is a dictionary containing the public portion of the key:
/// `"keyval" : {"public" : PUBLIC}`
///
/// Key types and schemes this crate cannot verify are still parsed, so that metadata using them
/// round-trips; signatures made with them never count towards a threshold.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Key {
    /// The ID under which this key is listed. Filled in from the enclosing `keys` map when
    /// metadata is parsed; not part of the key's serialized form.
    #[serde(skip)]
    pub keyid: Decoded<Hex>,

    /// The public key signature system, e.g. "ed25519".
    pub keytype: String,

    /// The signature scheme, e.g. "ed25519" or "rsassa-pss-sha256".
    pub scheme: String,

    /// The public portion of the key.
    pub keyval: KeyVal,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// The `keyval` object of a key.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyVal {
    /// The encoded public key material.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,

    /// Extra arguments found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Key {
    /// Creates a key with the given type, scheme and public key material. The key ID is computed
    /// from the canonical form of the key.
    pub fn new(keytype: &str, scheme: &str, public: String) -> Result<Self> {
        let mut key = Key {
            keyid: Decoded::default(),
            keytype: keytype.to_owned(),
            scheme: scheme.to_owned(),
            keyval: KeyVal {
                public: Some(public),
                _extra: HashMap::new(),
            },
            _extra: HashMap::new(),
        };
        key.keyid = key.key_id()?;
        Ok(key)
    }

    /// Calculate the key ID for this key: the SHA-256 digest of its canonical JSON form.
    pub fn key_id(&self) -> Result<Decoded<Hex>> {
        let buf = canonical_form(self, "key")?;
        Ok(digest(&SHA256, &buf).as_ref().to_vec().into())
    }

    /// Verify a signature of an object made with this key.
    pub(super) fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<()> {
        let keyid = self.keyid.to_string();
        let public = self
            .keyval
            .public
            .as_deref()
            .context(error::PublicKeyMissingSnafu { keyid: &keyid })?;
        let (alg, public): (&'static dyn VerificationAlgorithm, Vec<u8>) =
            match (self.keytype.as_str(), self.scheme.as_str()) {
                ("ed25519", "ed25519") => (&ED25519, decode_hex(&keyid, public)?),
                ("ecdsa" | "ecdsa-sha2-nistp256", "ecdsa-sha2-nistp256") => {
                    (&ECDSA_P256_SHA256_ASN1, decode_spki_or_hex(&keyid, public)?)
                }
                ("ecdsa" | "ecdsa-sha2-nistp384", "ecdsa-sha2-nistp384") => {
                    (&ECDSA_P384_SHA384_ASN1, decode_spki_or_hex(&keyid, public)?)
                }
                ("rsa", "rsassa-pss-sha256") => {
                    (&RSA_PSS_2048_8192_SHA256, decode_spki_or_hex(&keyid, public)?)
                }
                ("rsa", "rsa-pkcs1v15-sha256") => {
                    (&RSA_PKCS1_2048_8192_SHA256, decode_spki_or_hex(&keyid, public)?)
                }
                (keytype, scheme) => {
                    return error::UnsupportedKeySnafu { keytype, scheme }.fail();
                }
            };

        ensure!(
            UnparsedPublicKey::new(alg, &public)
                .verify(msg, signature)
                .is_ok(),
            error::SignatureInvalidSnafu { keyid }
        );
        Ok(())
    }
}

fn decode_hex(keyid: &str, public: &str) -> Result<Vec<u8>> {
    hex::decode(public).map_err(|e| {
        error::InvalidPublicKeySnafu {
            keyid,
            reason: e.to_string(),
        }
        .build()
    })
}

/// ECDSA and RSA keys are usually PEM-encoded. A `PUBLIC KEY` block holds a SubjectPublicKeyInfo,
/// from which the raw key is extracted; `RSA PUBLIC KEY` already holds the raw PKCS#1 key.
fn decode_spki_or_hex(keyid: &str, public: &str) -> Result<Vec<u8>> {
    if !public.trim_start().starts_with("-----BEGIN") {
        return decode_hex(keyid, public);
    }
    let pem = pem::parse(public).map_err(|e| {
        error::InvalidPublicKeySnafu {
            keyid,
            reason: e.to_string(),
        }
        .build()
    })?;
    match pem.tag() {
        "PUBLIC KEY" => spki::decode(pem.contents()).map_err(|reason| {
            error::InvalidPublicKeySnafu {
                keyid,
                reason: reason.to_owned(),
            }
            .build()
        }),
        "RSA PUBLIC KEY" => Ok(pem.contents().to_vec()),
        tag => error::InvalidPublicKeySnafu {
            keyid,
            reason: format!("unexpected PEM tag '{tag}'"),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_lc_rs::rand::SystemRandom;
    use aws_lc_rs::signature::{Ed25519KeyPair, KeyPair};

    fn ed25519_pair() -> Ed25519KeyPair {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap()
    }

    #[test]
    fn ed25519_signature_verifies() {
        let pair = ed25519_pair();
        let key = Key::new(
            "ed25519",
            "ed25519",
            hex::encode(pair.public_key().as_ref()),
        )
        .unwrap();
        let sig = pair.sign(b"hello");
        assert!(key.verify(b"hello", sig.as_ref()).is_ok());
        assert!(key.verify(b"goodbye", sig.as_ref()).is_err());
    }

    #[test]
    fn missing_public_key_fails() {
        let mut key = Key::new("ed25519", "ed25519", "00".into()).unwrap();
        key.keyval.public = None;
        assert!(matches!(
            key.verify(b"msg", b"sig"),
            Err(error::Error::PublicKeyMissing { .. })
        ));
    }

    #[test]
    fn unknown_scheme_fails() {
        let key = Key::new("sphincs", "sphincs-shake-128s", "00".into()).unwrap();
        assert!(matches!(
            key.verify(b"msg", b"sig"),
            Err(error::Error::UnsupportedKey { .. })
        ));
    }

    #[test]
    fn key_id_ignores_listed_id() {
        let key = Key::new("ed25519", "ed25519", "ab".repeat(32)).unwrap();
        let mut relisted = key.clone();
        relisted.keyid = vec![1, 2, 3].into();
        assert_eq!(key.key_id().unwrap(), relisted.key_id().unwrap());
        assert_eq!(key.keyid, key.key_id().unwrap());
    }
}
