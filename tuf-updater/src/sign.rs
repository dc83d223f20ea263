// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing of metadata, for repository tooling and tests.

use crate::error::{self, Result};
use crate::schema::key::Key;
use crate::schema::{Role, Signature, Signed};
use aws_lc_rs::rand::SecureRandom;
use aws_lc_rs::signature::{
    EcdsaKeyPair, Ed25519KeyPair, KeyPair, RsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING,
    ECDSA_P384_SHA384_ASN1_SIGNING, RSA_PSS_SHA256,
};
use snafu::ResultExt;

/// This trait must be implemented for each type of key with which you will
/// sign things.
pub trait Sign: Sync + Send {
    /// Returns the public key in the form it is listed in metadata.
    fn tuf_key(&self) -> Result<Key>;

    /// Signs the supplied message
    fn sign(&self, msg: &[u8], rng: &dyn SecureRandom) -> Result<Vec<u8>>;
}

fn tuf_key(keytype: &str, scheme: &str, public: String) -> Result<Key> {
    Key::new(keytype, scheme, public).context(error::SerializeSnafu { what: "key" })
}

/// Implements the Sign trait for ED25519
impl Sign for Ed25519KeyPair {
    fn tuf_key(&self) -> Result<Key> {
        tuf_key("ed25519", "ed25519", hex::encode(self.public_key()))
    }

    fn sign(&self, msg: &[u8], _rng: &dyn SecureRandom) -> Result<Vec<u8>> {
        Ok(self.sign(msg).as_ref().to_vec())
    }
}

/// Implements the Sign trait for ECDSA keypairs created with an ASN.1 signing algorithm
impl Sign for EcdsaKeyPair {
    fn tuf_key(&self) -> Result<Key> {
        let public = self.public_key().as_ref();
        // Uncompressed points: 1 + 2 * 32 bytes for P-256, 1 + 2 * 48 for P-384.
        let scheme = if public.len() == 97 {
            "ecdsa-sha2-nistp384"
        } else {
            "ecdsa-sha2-nistp256"
        };
        tuf_key("ecdsa", scheme, hex::encode(public))
    }

    fn sign(&self, msg: &[u8], rng: &dyn SecureRandom) -> Result<Vec<u8>> {
        let signature = self.sign(rng, msg).context(error::SignSnafu)?;
        Ok(signature.as_ref().to_vec())
    }
}

/// Implements the Sign trait for RSA keypairs, signing with RSASSA-PSS
impl Sign for RsaKeyPair {
    fn tuf_key(&self) -> Result<Key> {
        let public = pem::encode(&pem::Pem::new(
            "RSA PUBLIC KEY",
            self.public_key().as_ref().to_vec(),
        ));
        tuf_key("rsa", "rsassa-pss-sha256", public)
    }

    fn sign(&self, msg: &[u8], rng: &dyn SecureRandom) -> Result<Vec<u8>> {
        let mut signature = vec![0; self.public_modulus_len()];
        self.sign(&RSA_PSS_SHA256, rng, msg, &mut signature)
            .context(error::SignSnafu)?;
        Ok(signature)
    }
}

/// Parses a PEM-encoded private key and, if it is recognized, returns an object that implements
/// the Sign trait. `PRIVATE KEY` (PKCS#8) blocks may hold ED25519, ECDSA P-256/P-384 or RSA keys;
/// `RSA PRIVATE KEY` blocks hold PKCS#1 RSA keys.
pub fn parse_keypair(key: &[u8]) -> Result<Box<dyn Sign>> {
    let Ok(pem) = pem::parse(key) else {
        return error::KeyUnrecognizedSnafu.fail();
    };
    match pem.tag() {
        "PRIVATE KEY" => {
            let der = pem.contents();
            if let Ok(pair) = Ed25519KeyPair::from_pkcs8_maybe_unchecked(der) {
                Ok(Box::new(pair))
            } else if let Ok(pair) = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, der)
            {
                Ok(Box::new(pair))
            } else if let Ok(pair) = EcdsaKeyPair::from_pkcs8(&ECDSA_P384_SHA384_ASN1_SIGNING, der)
            {
                Ok(Box::new(pair))
            } else if let Ok(pair) = RsaKeyPair::from_pkcs8(der) {
                Ok(Box::new(pair))
            } else {
                error::KeyUnrecognizedSnafu.fail()
            }
        }
        "RSA PRIVATE KEY" => RsaKeyPair::from_der(pem.contents())
            .map(|pair| Box::new(pair) as Box<dyn Sign>)
            .map_err(|e| {
                error::KeyRejectedSnafu {
                    reason: e.to_string(),
                }
                .build()
            }),
        _ => error::KeyUnrecognizedSnafu.fail(),
    }
}

impl<T: Role> Signed<T> {
    /// Signs the canonical form of `signed` with `key`, replacing any earlier signature made by
    /// the same key.
    pub fn sign(&mut self, key: &dyn Sign, rng: &dyn SecureRandom) -> Result<()> {
        let keyid = key.tuf_key()?.keyid;
        let data = self
            .signed
            .canonical_form()
            .context(error::SerializeSnafu {
                what: T::TYPE.to_string(),
            })?;
        let sig = key.sign(&data, rng)?;
        self.signatures.retain(|s| s.keyid != keyid);
        self.signatures.push(Signature {
            keyid,
            sig: sig.into(),
        });
        Ok(())
    }
}
