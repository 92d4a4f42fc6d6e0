//! Backend request headers carrying a bearer token

use common::Secret;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Headers every backend JSON call carries.
///
/// The Authorization value is marked sensitive so HTTP-level debug output
/// redacts it.
pub fn bearer_headers(token: &Secret<String>) -> Result<HeaderMap> {
    let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
        .map_err(|e| Error::InvalidHeader(format!("bearer token: {e}")))?;
    authorization.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(X_REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
    Ok(headers)
}
