//! URI normalization performed before opening (spec §6, "URI handling").

/// The result of normalizing a URI passed to `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSource {
    /// The local path or media URL the container should actually open.
    pub url: String,
    /// Set when the URI named an explicit input format
    /// (`device://host?query` or `format://host?query`); overrides
    /// [`ContainerConfiguration::forced_input_format`](crate::config::ContainerConfiguration).
    pub forced_input_format: Option<String>,
}

/// Normalizes a URI per spec §6:
/// - `file://` or UNC URIs resolve to the local path, not the URI string;
/// - `device://host?query` and `format://host?query` move `host` into
///   `forced_input_format` and the unescaped query (leading `?` trimmed)
///   becomes the media URL.
///
/// Anything else passes through unchanged.
#[must_use]
pub fn normalize(uri: &str) -> NormalizedSource {
    if let Some(path) = file_uri_to_path(uri) {
        return NormalizedSource {
            url: path,
            forced_input_format: None,
        };
    }

    for scheme in ["device://", "format://"] {
        if let Some(rest) = uri.strip_prefix(scheme) {
            let (host, query) = split_host_and_query(rest);
            let unescaped = percent_decode(query.trim_start_matches('?'));
            return NormalizedSource {
                url: unescaped,
                forced_input_format: Some(host.to_string()),
            };
        }
    }

    NormalizedSource {
        url: uri.to_string(),
        forced_input_format: None,
    }
}

fn file_uri_to_path(uri: &str) -> Option<String> {
    if let Some(rest) = uri.strip_prefix("file://") {
        // UNC form: file://host/share/path -> \\host\share\path
        if let Some((host, path)) = rest.split_once('/') {
            if !host.is_empty() {
                return Some(format!("\\\\{host}\\{path}").replace('/', "\\"));
            }
        }
        return Some(percent_decode(rest));
    }
    if uri.starts_with("\\\\") {
        return Some(uri.to_string());
    }
    None
}

fn split_host_and_query(rest: &str) -> (&str, &str) {
    match rest.find('?') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    }
}

/// Minimal percent-decoding sufficient for the query strings this core
/// handles; full URI semantics (reserved characters, IRIs) are the host
/// application's concern, not this core's (spec §1 Non-goals).
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            // Work on raw bytes, not `&s[..]`: the two hex digits can sit on
            // either side of a multi-byte UTF-8 character, and slicing the
            // `str` there would panic on the non-char-boundary index.
            let hex = [bytes[i + 1], bytes[i + 2]];
            if let Ok(hex) = std::str::from_utf8(&hex) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
