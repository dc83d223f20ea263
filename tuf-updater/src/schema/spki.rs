// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracts the raw public key from a DER-encoded SubjectPublicKeyInfo.
//!
//! ```text
//! SubjectPublicKeyInfo  ::=  SEQUENCE  {
//!      algorithm            AlgorithmIdentifier,
//!      subjectPublicKey     BIT STRING  }
//! ```
//!
//! The algorithm is implied by the key's `keytype` and `scheme`, so the identifier is skipped.

use untrusted::{Input, Reader};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_BIT_STRING: u8 = 0x03;

pub(super) fn decode(der: &[u8]) -> Result<Vec<u8>, &'static str> {
    Input::from(der).read_all("trailing data after SubjectPublicKeyInfo", |reader| {
        let spki = expect_tag(reader, TAG_SEQUENCE)?;
        spki.read_all("trailing data in SubjectPublicKeyInfo", |spki| {
            expect_tag(spki, TAG_SEQUENCE)?;
            let bits = expect_tag(spki, TAG_BIT_STRING)?;
            bits.read_all("malformed public key bit string", |bits| {
                // Number of unused bits in the final byte; keys are always whole bytes.
                if bits.read_byte().map_err(|_| "empty bit string")? != 0 {
                    return Err("public key bit string has unused bits");
                }
                Ok(bits.read_bytes_to_end().as_slice_less_safe().to_vec())
            })
        })
    })
}

fn expect_tag<'a>(reader: &mut Reader<'a>, tag: u8) -> Result<Input<'a>, &'static str> {
    let actual = reader.read_byte().map_err(|_| "unexpected end of DER")?;
    if actual != tag {
        return Err("unexpected DER tag");
    }
    let length = read_length(reader)?;
    reader
        .read_bytes(length)
        .map_err(|_| "DER length exceeds input")
}

fn read_length(reader: &mut Reader<'_>) -> Result<usize, &'static str> {
    let first = reader.read_byte().map_err(|_| "unexpected end of DER")?;
    if first & 0x80 == 0 {
        return Ok(usize::from(first));
    }
    let count = first & 0x7f;
    if count == 0 || count > 4 {
        return Err("unsupported DER length");
    }
    let mut length = 0usize;
    for _ in 0..count {
        let byte = reader.read_byte().map_err(|_| "unexpected end of DER")?;
        length = (length << 8) | usize::from(byte);
    }
    Ok(length)
}
