//! Feed fetchers and state extractors.
//!
//! Each feed has a pure `parse_*` function that turns a response body into a
//! normalized state, and a `fetch_*` wrapper that performs the GET and maps
//! transport failures onto [`WatchError`].

pub mod roll;
pub mod tree;

pub use roll::{RollState, RollStatus};
pub use tree::TreeState;

use crate::error::{Feed, WatchError};
use crate::transport::{HttpResponse, Transport};

/// GET `url` and return the response, rejecting transport errors and
/// non-success statuses.
fn fetch(transport: &impl Transport, feed: Feed, url: &str) -> Result<HttpResponse, WatchError> {
    let response = transport
        .get(url)
        .map_err(|e| WatchError::fetch(feed, e))?;
    if !response.success() {
        return Err(WatchError::fetch(
            feed,
            format!("response status {}", response.status),
        ));
    }
    Ok(response)
}
