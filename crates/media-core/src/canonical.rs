//! Cache-busting query parameters and URL canonicalization.
//!
//! Resolved asset URLs carry a handful of reserved query parameters whose only
//! purpose is to defeat browser/CDN caching. Canonicalization removes them so
//! that every variant of the same asset shares one cache key.

use std::borrow::Cow;

use url::form_urlencoded;

/// Query parameters reserved for cache busting.
pub const RESERVED_PARAMS: &[&str] = &["v", "retry", "t", "_t", "timestamp"];

/// Initial cache key, set once per mount.
pub const MOUNT_PARAM: &str = "v";
/// Retry counter, set on every retry.
pub const RETRY_PARAM: &str = "retry";
/// Wall-clock cache buster, set on every retry.
pub const TIME_PARAM: &str = "t";

struct Parts<'a> {
    base: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

fn split(url: &str) -> Parts<'_> {
    let (rest, fragment) = match url.split_once('#') {
        Some((r, f)) => (r, Some(f)),
        None => (url, None),
    };
    let (base, query) = match rest.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (rest, None),
    };
    Parts {
        base,
        query,
        fragment,
    }
}

/// Decoded name of one raw `name=value` query segment.
fn param_name(pair: &str) -> Cow<'_, str> {
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .map(|(name, _)| name)
        .unwrap_or(Cow::Borrowed(""))
}

fn is_reserved(pair: &str) -> bool {
    let name = param_name(pair);
    RESERVED_PARAMS.contains(&&*name)
}

fn join(base: &str, pairs: &[&str], fragment: Option<&str>) -> String {
    let mut out = String::with_capacity(base.len() + 32);
    out.push_str(base);
    if !pairs.is_empty() {
        out.push('?');
        out.push_str(&pairs.join("&"));
    }
    if let Some(f) = fragment {
        out.push('#');
        out.push_str(f);
    }
    out
}

/// Strip every reserved cache-busting parameter from `url`.
///
/// Names are compared after percent-decoding, so `%76=1` is stripped like
/// `v=1`. Other parameters keep their order and encoding. Works for relative
/// paths as well as absolute URLs.
pub fn canonicalize(url: &str) -> String {
    let parts = split(url);
    let kept: Vec<&str> = parts
        .query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .filter(|pair| !is_reserved(pair))
                .collect()
        })
        .unwrap_or_default();
    join(parts.base, &kept, parts.fragment)
}

/// Set `name=value` on `url`, replacing any existing occurrences of `name`.
pub fn with_param(url: &str, name: &str, value: &str) -> String {
    let parts = split(url);
    let fresh = format!("{}={}", name, value);
    let mut pairs: Vec<&str> = parts
        .query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty() && param_name(pair) != name)
                .collect()
        })
        .unwrap_or_default();
    pairs.push(&fresh);
    join(parts.base, &pairs, parts.fragment)
}
