//! URL construction.
//!
//! Everything here is pure string work; nothing touches the network.
//!
//! ```text
//! /<webapp>/<mountPoint>/<service>/<escapedPath>/<action>?<params>
//! ```

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::options::{Options, Service};
use crate::path::RepoPath;

/// Bytes `encodeURIComponent` escapes: all but alphanumerics and `-_.!~*'()`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Bytes `encodeURI` escapes: as above, minus the URI reserved characters.
const URI: &AsciiSet = &COMPONENT
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#');

/// Percent-encode a whole URI, leaving its structural characters alone.
pub fn encode_uri(input: &str) -> String {
    utf8_percent_encode(input, URI).to_string()
}

/// Percent-encode a single query value.
pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Build the server-relative URL for a service, path and action.
///
/// `service` defaults to the file service. Without a path no path segment is
/// emitted at all, leaving it to the server to pick a default or reject the
/// request.
///
/// The path is escaped with [`encode_uri`], which leaves reserved characters
/// intact. A `#` or `?` inside a file name therefore reaches the URL
/// unescaped, where it starts a fragment or query. Callers with such names
/// must escape them before building the request.
pub fn build_url(
    service: Option<&Service>,
    path: Option<&RepoPath>,
    action: Option<&str>,
    options: &Options,
) -> String {
    let service = service.unwrap_or(&Service::Files);
    let mut url = format!(
        "/{}/{}/{}",
        options.webapp,
        options.mount_point,
        options.segment(service)
    );

    if let Some(path) = path {
        let encoded = encode_uri(&path.escaped());
        if !encoded.is_empty() {
            url.push('/');
            url.push_str(&encoded);
        }
    }

    if let Some(action) = action.filter(|a| !a.is_empty()) {
        url.push('/');
        url.push_str(action);
    }

    url
}

/// Append query parameters in order.
///
/// The first parameter is introduced with `?` unless the URL already carries a
/// query, every other one with `&`. Names pass through verbatim, values are
/// component-encoded.
pub fn append_params<'a, I>(url: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut url = url.to_string();
    for (name, value) in params {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(name);
        url.push('=');
        url.push_str(&encode_uri_component(value));
    }
    url
}
