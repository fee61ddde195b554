//! Reading and writing the session cookies.
//!
//! Cookies are written with one of two attribute profiles chosen per request: browsers talking to
//! a local server over plain HTTP would drop `Secure`/`SameSite=None` cookies, so local requests
//! get a minimal cookie and everything else gets the cross-site profile.
//!
//! Values are percent-encoded on write and decoded on read, so any username survives the trip
//! through a cookie.

use std::borrow::Cow;

use axum::http::{
    HeaderMap, HeaderValue, Uri,
    header::{COOKIE, HOST, SET_COOKIE},
};

use crate::errors::{Error, Result};

/// Attribute profile for cookies written in response to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieTransport {
    /// `HttpOnly; Secure; SameSite=None` for remote clients
    Secure,
    /// Path only, for clients on the same machine
    Plain,
}

impl CookieTransport {
    /// Pick the profile from the authority the request was addressed to.
    ///
    /// `localhost`, `127.0.0.1` and `[::1]` are local whatever the port; a request without any
    /// authority gets the secure profile.
    pub fn for_request(headers: &HeaderMap, uri: &Uri) -> Self {
        let authority = headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| uri.authority().map(|authority| authority.as_str()));

        match authority.map(host_without_port) {
            Some(host) if is_local_host(host) => CookieTransport::Plain,
            _ => CookieTransport::Secure,
        }
    }

    fn cookie(self, key: &str, value: &str) -> String {
        match self {
            CookieTransport::Secure => format!("{key}={value}; Path=/; HttpOnly; Secure; SameSite=None"),
            CookieTransport::Plain => format!("{key}={value}; Path=/"),
        }
    }

    fn expired_cookie(self, key: &str) -> String {
        match self {
            CookieTransport::Secure => format!("{key}=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0"),
            CookieTransport::Plain => format!("{key}=; Path=/; Max-Age=0"),
        }
    }
}

fn host_without_port(authority: &str) -> &str {
    let authority = authority.trim();
    if let Some(rest) = authority.strip_prefix('[') {
        // IPv6 literal, keep the brackets
        return match rest.find(']') {
            Some(end) => &authority[..end + 2],
            None => authority,
        };
    }
    authority.split_once(':').map_or(authority, |(host, _)| host)
}

fn is_local_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" || host == "[::1]"
}

/// Whether `name` can be used verbatim as a cookie name.
pub fn is_cookie_name_valid(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b';' | b',' | b'"' | b'\\' | b'='))
}

/// Value of the named request cookie, percent-decoded.
///
/// Empty values, and values that do not decode to UTF-8, count as absent.
pub fn read_cookie<'a>(headers: &'a HeaderMap, key: &str) -> Option<Cow<'a, str>> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == key)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .filter(|value| !value.is_empty())
}

/// Whether the request carries the named cookie with a non-empty value.
pub fn has_cookie(headers: &HeaderMap, key: &str) -> bool {
    read_cookie(headers, key).is_some()
}

/// Whether the request carries every named cookie with a non-empty value.
pub fn has_all_cookies(headers: &HeaderMap, keys: &[&str]) -> bool {
    keys.iter().all(|key| has_cookie(headers, key))
}

/// Append a `Set-Cookie` header storing `value`, percent-encoded, under `key`.
pub fn set_cookie(headers: &mut HeaderMap, transport: CookieTransport, key: &str, value: &str) -> Result<()> {
    if !is_cookie_name_valid(key) {
        return Err(Error::Internal {
            operation: format!("set cookie {key}: name contains characters not allowed in a cookie"),
        });
    }
    append(headers, transport.cookie(key, &urlencoding::encode(value)))
}

/// Append a `Set-Cookie` header that makes the client discard `key`.
pub fn remove_cookie(headers: &mut HeaderMap, transport: CookieTransport, key: &str) -> Result<()> {
    if !is_cookie_name_valid(key) {
        return Err(Error::Internal {
            operation: format!("remove cookie {key}: name contains characters not allowed in a cookie"),
        });
    }
    append(headers, transport.expired_cookie(key))
}

fn append(headers: &mut HeaderMap, cookie: String) -> Result<()> {
    let value = HeaderValue::from_str(&cookie).map_err(|e| Error::Internal {
        operation: format!("build Set-Cookie header: {e}"),
    })?;
    headers.append(SET_COOKIE, value);
    Ok(())
}
