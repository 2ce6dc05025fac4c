//! Canonical request construction for `bce-signer-v1`.
//!
//! The canonical request is the string that is actually signed:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders
//! ```
//!
//! Signer and verifier must produce it byte-for-byte identically, so every
//! escaping and ordering rule here is part of the wire contract.

use std::collections::HashSet;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::request::RequestDescriptor;

/// Query parameter that carries the authentication string itself.
pub const AUTHORIZATION_PARAM: &str = "authorization";

/// Header names that are always signed when present.
const SIGNED_HEADER_NAMES: &[&str] = &["host", "content-length", "content-type", "content-md5"];

/// Prefix of the vendor headers that are always signed when present.
const BCE_HEADER_PREFIX: &str = "x-bce-";

/// Bytes left untouched by [`query_escape`]: the RFC 3986 unreserved set.
const QUERY_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the canonical request and the sorted list of signed header names.
///
/// # Examples
///
/// ```
/// use bce_auth::RequestDescriptor;
/// use bce_auth::canonical::build_canonical_request;
///
/// let request = RequestDescriptor::new("get", "/meiyou")
///     .header("Host", "jowin-dev.bj.bcebos.com");
/// let (canonical, signed_headers) = build_canonical_request(&request);
/// assert_eq!(canonical, "GET\n/meiyou\n\nhost:jowin-dev.bj.bcebos.com");
/// assert_eq!(signed_headers, vec!["host"]);
/// ```
#[must_use]
pub fn build_canonical_request(request: &RequestDescriptor) -> (String, Vec<String>) {
    let method = request.method().to_uppercase();
    let canonical_uri = build_canonical_uri(request.path());
    let canonical_query = build_canonical_query_string(request.query_params());
    let (canonical_headers, signed_headers) = build_canonical_headers(request.headers());

    (
        format!("{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}"),
        signed_headers,
    )
}

/// Build the canonical URI from a decoded path.
///
/// The whole path is query-escaped, then `%2F` is turned back into `/`.
/// Empty paths are normalized to `/`.
///
/// # Examples
///
/// ```
/// use bce_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri(""), "/");
/// assert_eq!(build_canonical_uri("/a b/c:d"), "/a+b/c%3Ad");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    let path = if path.is_empty() { "/" } else { path };
    query_escape(path).replace("%2F", "/")
}

/// Build the canonical query string.
///
/// Only the first value of a repeated key is used and the `authorization`
/// parameter is skipped. The escaped `key=value` pairs are sorted byte-wise.
///
/// # Examples
///
/// ```
/// use bce_auth::canonical::build_canonical_query_string;
///
/// let params = vec![
///     ("b".to_owned(), "2".to_owned()),
///     ("a".to_owned(), "1".to_owned()),
/// ];
/// assert_eq!(build_canonical_query_string(&params), "a=1&b=2");
/// assert_eq!(build_canonical_query_string(&[]), "");
/// ```
#[must_use]
pub fn build_canonical_query_string(params: &[(String, String)]) -> String {
    let mut seen: HashSet<&str> = HashSet::with_capacity(params.len());
    let mut pairs: Vec<String> = Vec::with_capacity(params.len());

    for (key, value) in params {
        if key == AUTHORIZATION_PARAM || !seen.insert(key.as_str()) {
            continue;
        }
        pairs.push(format!("{}={}", query_escape(key), query_escape(value)));
    }

    pairs.sort_unstable();
    pairs.join("&")
}

/// Build the canonical header block and the signed header names.
///
/// Selected headers are `host`, `content-length`, `content-type`,
/// `content-md5` and everything starting with `x-bce-`. Only the first
/// occurrence of a name counts; its value is trimmed of spaces and tabs and
/// the header is dropped if nothing is left.
///
/// The `name:value` entries and the names are sorted independently. The two
/// orders differ when one name is a prefix of another (`x-bce-a` sorts before
/// `x-bce-a-b`, but `x-bce-a-b:…` sorts before `x-bce-a:…`).
#[must_use]
pub fn build_canonical_headers(headers: &[(String, String)]) -> (String, Vec<String>) {
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut names: Vec<String> = Vec::new();
    let mut entries: Vec<String> = Vec::new();

    for (name, value) in headers {
        let lower_name = name.to_lowercase();
        if !seen.insert(lower_name.clone()) || !is_signed_header(&lower_name) {
            continue;
        }

        let trimmed = value.trim_matches([' ', '\t']);
        if trimmed.is_empty() {
            continue;
        }

        entries.push(format!("{lower_name}:{}", query_escape(trimmed)));
        names.push(lower_name);
    }

    names.sort_unstable();
    entries.sort_unstable();

    (entries.join("\n"), names)
}

/// Join signed header names with `;`.
///
/// # Examples
///
/// ```
/// use bce_auth::canonical::build_signed_headers_string;
///
/// let names = vec!["host".to_owned(), "x-bce-date".to_owned()];
/// assert_eq!(build_signed_headers_string(&names), "host;x-bce-date");
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[String]) -> String {
    signed_headers.join(";")
}

/// Escape a string for use in a query component.
///
/// Every byte outside `A-Z a-z 0-9 - _ . ~` becomes `%XX` with uppercase hex
/// digits, except the space which becomes `+`.
#[must_use]
pub fn query_escape(input: &str) -> String {
    input
        .split(' ')
        .map(|part| utf8_percent_encode(part, QUERY_ESCAPE_SET).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

fn is_signed_header(lower_name: &str) -> bool {
    SIGNED_HEADER_NAMES.contains(&lower_name) || lower_name.starts_with(BCE_HEADER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_should_escape_like_a_query_component() {
        assert_eq!(query_escape("abcXYZ019-_.~"), "abcXYZ019-_.~");
        assert_eq!(query_escape("a b"), "a+b");
        assert_eq!(query_escape("a+b"), "a%2Bb");
        assert_eq!(query_escape("x*y!z"), "x%2Ay%21z");
        assert_eq!(query_escape("2024-01-01T00:00:00Z"), "2024-01-01T00%3A00%3A00Z");
        assert_eq!(query_escape("ä"), "%C3%A4");
    }

    #[test]
    fn test_should_normalize_empty_path_to_slash() {
        assert_eq!(build_canonical_uri(""), "/");
        assert_eq!(build_canonical_uri("/"), "/");
    }

    #[test]
    fn test_should_keep_slashes_and_escape_the_rest_of_the_path() {
        assert_eq!(build_canonical_uri("/meiyou"), "/meiyou");
        assert_eq!(build_canonical_uri("/dir/sub dir/ä.txt"), "/dir/sub+dir/%C3%A4.txt");
        assert_eq!(build_canonical_uri("/a?b#c"), "/a%3Fb%23c");
    }

    #[test]
    fn test_should_re_escape_already_escaped_path() {
        assert_eq!(build_canonical_uri("/hello%20world"), "/hello%2520world");
    }

    #[test]
    fn test_should_sort_query_parameters() {
        let params = pairs(&[("b", "2"), ("a", "1"), ("c", "3")]);
        assert_eq!(build_canonical_query_string(&params), "a=1&b=2&c=3");
    }

    #[test]
    fn test_should_use_only_first_value_of_repeated_query_key() {
        let params = pairs(&[("k", "first"), ("k", "second"), ("a", "")]);
        assert_eq!(build_canonical_query_string(&params), "a=&k=first");
    }

    #[test]
    fn test_should_skip_authorization_query_parameter() {
        let params = pairs(&[("authorization", "bce-signer-v1/..."), ("acl", "")]);
        assert_eq!(build_canonical_query_string(&params), "acl=");

        // The exclusion is case-sensitive.
        let params = pairs(&[("Authorization", "x")]);
        assert_eq!(build_canonical_query_string(&params), "Authorization=x");
    }

    #[test]
    fn test_should_escape_query_keys_and_values() {
        let params = pairs(&[("response content", "a/b"), ("x", "1+1=2")]);
        assert_eq!(
            build_canonical_query_string(&params),
            "response+content=a%2Fb&x=1%2B1%3D2"
        );
    }

    #[test]
    fn test_should_sort_query_by_bytes_after_escaping() {
        // Uppercase sorts before lowercase and '+' (0x2B) before '=' (0x3D).
        let params = pairs(&[("a", "1"), ("a b", "2"), ("A", "3")]);
        assert_eq!(build_canonical_query_string(&params), "A=3&a+b=2&a=1");
    }

    #[test]
    fn test_should_select_only_signed_headers() {
        let headers = pairs(&[
            ("Host", "example.com"),
            ("Content-Type", "text/plain"),
            ("Content-Length", "12"),
            ("Content-MD5", "abc=="),
            ("X-Bce-Date", "2024-01-01T00:00:00Z"),
            ("User-Agent", "curl/8.0"),
            ("Accept", "*/*"),
            ("x-amz-date", "20240101T000000Z"),
        ]);
        let (canonical, names) = build_canonical_headers(&headers);
        assert_eq!(
            names,
            vec!["content-length", "content-md5", "content-type", "host", "x-bce-date"]
        );
        assert_eq!(
            canonical,
            "content-length:12\n\
             content-md5:abc%3D%3D\n\
             content-type:text%2Fplain\n\
             host:example.com\n\
             x-bce-date:2024-01-01T00%3A00%3A00Z"
        );
    }

    #[test]
    fn test_should_trim_values_and_drop_empty_headers() {
        let headers = pairs(&[
            ("Host", " \texample.com\t "),
            ("x-bce-empty", " \t "),
            ("x-bce-meta", "  Mixed Case  "),
        ]);
        let (canonical, names) = build_canonical_headers(&headers);
        assert_eq!(names, vec!["host", "x-bce-meta"]);
        assert_eq!(canonical, "host:example.com\nx-bce-meta:Mixed+Case");
    }

    #[test]
    fn test_should_use_first_occurrence_of_repeated_header() {
        let headers = pairs(&[
            ("X-Bce-Meta", "first"),
            ("x-bce-meta", "second"),
            ("x-bce-blank", ""),
            ("x-bce-blank", "not-used"),
        ]);
        let (canonical, names) = build_canonical_headers(&headers);
        assert_eq!(names, vec!["x-bce-meta"]);
        assert_eq!(canonical, "x-bce-meta:first");
    }

    #[test]
    fn test_should_sort_names_and_entries_independently() {
        let headers = pairs(&[("x-bce-a", "1"), ("x-bce-a-b", "2")]);
        let (canonical, names) = build_canonical_headers(&headers);
        assert_eq!(build_signed_headers_string(&names), "x-bce-a;x-bce-a-b");
        assert_eq!(canonical, "x-bce-a-b:2\nx-bce-a:1");
    }

    #[test]
    fn test_should_produce_empty_header_block_without_signed_headers() {
        let headers = pairs(&[("Accept", "*/*")]);
        let (canonical, names) = build_canonical_headers(&headers);
        assert!(canonical.is_empty());
        assert!(names.is_empty());
    }

    #[test]
    fn test_should_build_canonical_request_for_reference_scenario() {
        let request = RequestDescriptor::new("GET", "/meiyou")
            .header("Host", "jowin-dev.bj.bcebos.com")
            .header("x-bce-date", "2024-01-01T00:00:00Z");

        let (canonical, names) = build_canonical_request(&request);
        assert_eq!(
            canonical,
            "GET\n/meiyou\n\nhost:jowin-dev.bj.bcebos.com\nx-bce-date:2024-01-01T00%3A00%3A00Z"
        );
        assert_eq!(build_signed_headers_string(&names), "host;x-bce-date");
    }

    #[test]
    fn test_should_uppercase_method_and_include_query() {
        let request = RequestDescriptor::new("put", "")
            .query("uploads", "")
            .header("content-length", "0");

        let (canonical, _) = build_canonical_request(&request);
        assert_eq!(canonical, "PUT\n/\nuploads=\ncontent-length:0");
    }
}
