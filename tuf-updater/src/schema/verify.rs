// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::error::{self, Result};
use crate::schema::key::Key;
use crate::schema::{canonical_form, Delegations, Role, RoleType, Root, Signed, Targets};
use serde::Serialize;
use snafu::OptionExt;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;

const SIGNED: &str = "signed metadata";

/// The keys trusted for a role and the number of them that must sign.
#[derive(Debug, Clone, Copy)]
pub struct Authorization<'a> {
    /// Key IDs whose signatures count towards the threshold.
    pub keyids: &'a [Decoded<Hex>],
    /// Number of distinct valid signatures required.
    pub threshold: NonZeroU64,
    /// Where to find the public keys for `keyids`.
    pub keys: &'a HashMap<Decoded<Hex>, Key>,
}

/// Metadata that can delegate trust: root for the top-level roles, targets for its delegated
/// roles.
pub trait KeyHolder {
    /// The keys and threshold this holder assigns to `role`, if it delegates to it.
    fn authorization(&self, role: &str) -> Option<Authorization<'_>>;
}

impl KeyHolder for Root {
    fn authorization(&self, role: &str) -> Option<Authorization<'_>> {
        let role_type = role.parse::<RoleType>().ok()?;
        let role_keys = self.roles.get(&role_type)?;
        Some(Authorization {
            keyids: &role_keys.keyids,
            threshold: role_keys.threshold,
            keys: &self.keys,
        })
    }
}

impl KeyHolder for Delegations {
    fn authorization(&self, role: &str) -> Option<Authorization<'_>> {
        if let Some(roles) = &self.roles {
            let delegated = roles.iter().find(|r| r.name == role)?;
            return Some(Authorization {
                keyids: &delegated.keyids,
                threshold: delegated.threshold,
                keys: &self.keys,
            });
        }
        let succinct = self.succinct_roles.as_ref()?;
        succinct.is_delegated_role(role).then_some(Authorization {
            keyids: &succinct.keyids,
            threshold: succinct.threshold,
            keys: &self.keys,
        })
    }
}

impl KeyHolder for Targets {
    fn authorization(&self, role: &str) -> Option<Authorization<'_>> {
        self.delegations.as_ref()?.authorization(role)
    }
}

impl Key {
    /// Verifies that `signed` carries a valid signature made by this key over the canonical form
    /// of its `signed` portion.
    pub fn verify_signature<U: Serialize>(&self, signed: &Signed<U>) -> Result<()> {
        let signature = signed
            .signatures
            .iter()
            .find(|s| s.keyid == self.keyid)
            .context(error::SignatureMissingSnafu {
                keyid: self.keyid.to_string(),
            })?;
        let data = canonical_form(&signed.signed, SIGNED)?;
        self.verify(&data, &signature.sig)
    }
}

impl<T: KeyHolder> Signed<T> {
    /// Verifies that `delegate`, the metadata for `role`, is signed by at least the threshold of
    /// keys this metadata trusts for `role`.
    ///
    /// Each authorized key ID counts at most once; signatures from unknown keys, keys with
    /// unsupported types, and invalid signatures are ignored.
    pub fn verify_delegate<U: Serialize>(&self, role: &str, delegate: &Signed<U>) -> Result<()> {
        let authorization = self
            .signed
            .authorization(role)
            .context(error::NoDelegationSnafu { role })?;
        let data = canonical_form(&delegate.signed, SIGNED)?;

        let mut valid = HashSet::new();
        for signature in &delegate.signatures {
            if !authorization.keyids.contains(&signature.keyid) || valid.contains(&signature.keyid)
            {
                continue;
            }
            let Some(key) = authorization.keys.get(&signature.keyid) else {
                continue;
            };
            match key.verify(&data, &signature.sig) {
                Ok(()) => {
                    valid.insert(&signature.keyid);
                }
                Err(e) => log::trace!("ignoring signature for '{}': {}", role, e),
            }
        }

        let threshold = authorization.threshold.get();
        snafu::ensure!(
            valid.len() as u64 >= threshold,
            error::SignatureThresholdSnafu {
                role,
                threshold,
                valid: valid.len() as u64,
            }
        );
        Ok(())
    }
}

impl Signed<Root> {
    /// Verifies that this root is signed by a threshold of the keys it trusts for itself.
    pub fn verify_self(&self) -> Result<()> {
        self.verify_delegate(&Root::TYPE.to_string(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DelegatedRole, PathSet, RoleKeys, Signature};
    use aws_lc_rs::rand::SystemRandom;
    use aws_lc_rs::signature::{Ed25519KeyPair, KeyPair};
    use chrono::{TimeZone, Utc};

    struct Signer {
        pair: Ed25519KeyPair,
        key: Key,
    }

    impl Signer {
        fn new() -> Self {
            let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
            let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
            let key = Key::new("ed25519", "ed25519", hex::encode(pair.public_key())).unwrap();
            Signer { pair, key }
        }

        fn sign<U: Serialize>(&self, signed: &mut Signed<U>) {
            let data = canonical_form(&signed.signed, SIGNED).unwrap();
            signed.signatures.push(Signature {
                keyid: self.key.keyid.clone(),
                sig: self.pair.sign(&data).as_ref().to_vec().into(),
            });
        }
    }

    fn root_with(signers: &[&Signer], threshold: u64) -> Root {
        let mut root = Root::new(
            NonZeroU64::MIN,
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        );
        for role in RoleType::ALL {
            root.roles.insert(
                role,
                RoleKeys::new(Vec::new(), NonZeroU64::new(threshold).unwrap()),
            );
            for signer in signers {
                root.add_key(signer.key.clone(), role);
            }
        }
        root
    }

    #[test]
    fn threshold_counts_distinct_keys() {
        let (a, b) = (Signer::new(), Signer::new());
        let root = Signed::new(root_with(&[&a, &b], 2));

        let mut targets = Signed::new(Targets::new(
            NonZeroU64::MIN,
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        ));
        a.sign(&mut targets);
        a.sign(&mut targets);
        assert!(matches!(
            root.verify_delegate("targets", &targets),
            Err(error::Error::SignatureThreshold { valid: 1, .. })
        ));

        b.sign(&mut targets);
        root.verify_delegate("targets", &targets).unwrap();
    }

    #[test]
    fn invalid_and_unknown_signatures_are_ignored() {
        let (a, outsider) = (Signer::new(), Signer::new());
        let root = Signed::new(root_with(&[&a], 1));
        let mut targets = Signed::new(Targets::new(
            NonZeroU64::MIN,
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        ));
        outsider.sign(&mut targets);
        targets.signatures.push(Signature {
            keyid: a.key.keyid.clone(),
            sig: vec![0; 64].into(),
        });
        assert!(root.verify_delegate("targets", &targets).is_err());

        a.sign(&mut targets);
        root.verify_delegate("targets", &targets).unwrap();
    }

    #[test]
    fn root_verifies_itself() {
        let a = Signer::new();
        let mut root = Signed::new(root_with(&[&a], 1));
        assert!(root.verify_self().is_err());
        a.sign(&mut root);
        root.verify_self().unwrap();
        a.key.verify_signature(&root).unwrap();
    }

    #[test]
    fn unknown_role_has_no_delegation() {
        let a = Signer::new();
        let mut targets = Signed::new(Targets::new(
            NonZeroU64::MIN,
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        ));
        targets.signed.delegations = Some(Delegations::with_roles(
            HashMap::from([(a.key.keyid.clone(), a.key.clone())]),
            vec![DelegatedRole::new(
                "child",
                vec![a.key.keyid.clone()],
                NonZeroU64::MIN,
                false,
                PathSet::Paths(vec!["*".into()]),
            )],
        ));
        let mut child = Signed::new(Targets::new(
            NonZeroU64::MIN,
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        ));
        a.sign(&mut child);
        targets.verify_delegate("child", &child).unwrap();
        assert!(matches!(
            targets.verify_delegate("other", &child),
            Err(error::Error::NoDelegation { .. })
        ));
    }
}
