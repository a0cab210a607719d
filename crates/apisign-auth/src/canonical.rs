//! Canonical string construction.
//!
//! The string that gets signed is:
//!
//! ```text
//! HTTPMethod + Host + RoutePath + key1=value1key2=value2...
//! ```
//!
//! - `Host` has any `:port` suffix removed, since callers may sit behind
//!   port-translating proxies and never sign a port.
//! - `RoutePath` is the matched route template (e.g. `/v1/orders/:id`), not the
//!   raw request URI.
//! - Parameters are sorted by key in byte order and concatenated as `key=value`
//!   with no separator between pairs. `Signature` and `debug` are excluded.
//!
//! Nothing is escaped, so `a=1` + `b` and `a` + `1b` collide. Existing signers
//! depend on this exact format; changing it needs a new protocol version.

/// Parameter names that are protocol metadata and never part of the signed string.
pub const EXCLUDED_PARAMS: [&str; 2] = [SIGNATURE_PARAM, DEBUG_PARAM];

/// Name of the signature parameter.
pub const SIGNATURE_PARAM: &str = "Signature";

/// Name of the debug-issuance flag parameter.
pub const DEBUG_PARAM: &str = "debug";

/// Build the canonical string for a request.
///
/// Parameter order in `params` does not matter. If a key appears more than
/// once, all occurrences are kept and ordered by value; callers that need
/// first-value-wins semantics should deduplicate first (as
/// [`SigningRequest`](crate::request::SigningRequest) does).
///
/// # Examples
///
/// ```
/// use apisign_auth::canonical::canonicalize;
///
/// let canonical = canonicalize(
///     "GET",
///     "api.example.com:8443",
///     "/v1/orders",
///     [("Timestamp", "1700000000"), ("Nonce", "42"), ("Signature", "ignored")],
/// );
/// assert_eq!(canonical, "GETapi.example.com/v1/ordersNonce=42Timestamp=1700000000");
/// ```
#[must_use]
pub fn canonicalize<'a, I>(method: &str, host: &str, route: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(&str, &str)> = params
        .into_iter()
        .filter(|(key, _)| !EXCLUDED_PARAMS.contains(key))
        .collect();

    pairs.sort_unstable();

    let host = strip_port(host);
    let capacity = method.len()
        + host.len()
        + route.len()
        + pairs.iter().map(|(k, v)| k.len() + v.len() + 1).sum::<usize>();

    let mut canonical = String::with_capacity(capacity);
    canonical.push_str(method);
    canonical.push_str(host);
    canonical.push_str(route);
    for (key, value) in pairs {
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(value);
    }
    canonical
}

/// Remove a `:port` suffix from a host, keeping everything before the first `:`.
///
/// # Examples
///
/// ```
/// use apisign_auth::canonical::strip_port;
///
/// assert_eq!(strip_port("api.example.com:8080"), "api.example.com");
/// assert_eq!(strip_port("api.example.com"), "api.example.com");
/// ```
#[must_use]
pub fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}
