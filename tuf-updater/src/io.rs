// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::transport::{TransportError, TransportErrorKind, TransportStream};
use futures::StreamExt;
use url::Url;

/// Create a new stream from `stream`. The new stream returns an error for the item that exceeds the
/// total byte count of `max_size`, and ends there.
/// * `stream` - The original stream.
/// * `max_size` - Size limit in bytes.
/// * `specifier` - What is being downloaded, for the error message.
pub(crate) fn max_size_adapter(
    stream: TransportStream,
    url: Url,
    max_size: u64,
    specifier: &'static str,
) -> TransportStream {
    let mut size: u64 = 0;
    let stream = stream
        .map(move |chunk| {
            if let Ok(bytes) = &chunk {
                size = size.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
            }
            if size > max_size {
                return Err(TransportError::new_with_cause(
                    TransportErrorKind::MaxSizeExceeded,
                    &url,
                    format!("{specifier} is larger than the maximum of {max_size} bytes"),
                ));
            }
            chunk
        })
        .scan(false, |failed, chunk| {
            // Stop after the first error.
            let item = (!*failed).then(|| {
                *failed = chunk.is_err();
                chunk
            });
            std::future::ready(item)
        });

    stream.boxed()
}
