//! The request context handed over by the HTTP layer.
//!
//! Verification never parses HTTP itself. The HTTP layer supplies a
//! [`SigningRequest`] carrying the method, host, matched route template and
//! every submitted form/query parameter. [`SigningRequest::from_http`] builds
//! one from [`http::request::Parts`] and a buffered form body.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::canonical::{DEBUG_PARAM, canonicalize};
use crate::error::AuthError;

/// Content type whose body parameters take part in signing.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A request as seen by the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    method: String,
    host: String,
    route: String,
    params: HashMap<String, String>,
    debug: bool,
}

impl SigningRequest {
    /// Create a request from already-extracted parts.
    ///
    /// When a key occurs more than once the first value wins. The debug flag is
    /// set when a `debug` parameter equal to `1` is present.
    pub fn new<K, V>(
        method: impl Into<String>,
        host: impl Into<String>,
        route: impl Into<String>,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = HashMap::new();
        for (key, value) in params {
            if let Entry::Vacant(slot) = map.entry(key.into()) {
                slot.insert(value.into());
            }
        }
        let debug = map.get(DEBUG_PARAM).is_some_and(|v: &String| v == "1");

        Self {
            method: method.into(),
            host: host.into(),
            route: route.into(),
            params: map,
            debug,
        }
    }

    /// Build a request from HTTP request parts, the matched route template and
    /// the buffered body.
    ///
    /// Body parameters are read for `POST`, `PUT` and `PATCH` requests with an
    /// `application/x-www-form-urlencoded` content type and take precedence over
    /// query parameters of the same name. The debug flag is read from the query
    /// string only.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if the query string or form body is not
    /// valid UTF-8 or contains a malformed percent escape.
    pub fn from_http(
        parts: &http::request::Parts,
        route: &str,
        body: &[u8],
    ) -> Result<Self, AuthError> {
        let query = parts.uri.query().unwrap_or("");
        check_form_encoding(query.as_bytes(), "query string")?;

        let mut params: Vec<(String, String)> = Vec::new();
        if carries_form_body(parts) {
            check_form_encoding(body, "form body")?;
            params.extend(form_urlencoded::parse(body).into_owned());
        }
        let query_params: Vec<(String, String)> =
            form_urlencoded::parse(query.as_bytes()).into_owned().collect();
        let debug = query_params
            .iter()
            .find(|(k, _)| k == DEBUG_PARAM)
            .is_some_and(|(_, v)| v == "1");
        params.extend(query_params);

        let host = parts
            .headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
            .or_else(|| parts.uri.authority().map(|a| a.as_str().to_owned()))
            .unwrap_or_default();

        let mut request = Self::new(parts.method.as_str(), host, route, params);
        request.debug = debug;
        Ok(request)
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Host as received, possibly with a port.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Matched route template.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Value of a parameter, if submitted.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// All submitted parameters, in no particular order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the caller asked for debug issuance.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Set or replace a parameter.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// The canonical string for this request.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        canonicalize(&self.method, &self.host, &self.route, self.params())
    }
}

fn carries_form_body(parts: &http::request::Parts) -> bool {
    let method_has_body = matches!(
        parts.method,
        http::Method::POST | http::Method::PUT | http::Method::PATCH
    );
    let is_form = parts
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        });
    method_has_body && is_form
}

/// Reject input that is not UTF-8 or has a `%` not followed by two hex digits.
fn check_form_encoding(input: &[u8], what: &str) -> Result<(), AuthError> {
    std::str::from_utf8(input)
        .map_err(|e| AuthError::Internal(format!("{what} is not valid UTF-8: {e}")))?;

    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' {
            let valid = input
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(AuthError::Internal(format!(
                    "{what} has an invalid escape at byte {i}"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
