// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;

use crate::error::FeedError;
use crate::http::{HttpClient, RequestOptions};

use super::parse::{FeedDocument, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    options: RequestOptions,
) -> Result<Bytes, FeedError> {
    let response = client
        .get(url, options)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(response.body)
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    options: RequestOptions,
) -> Result<FeedDocument, FeedError> {
    let bytes = fetch_feed_bytes(client, url, options).await?;
    parse_feed(&bytes, url)
}
