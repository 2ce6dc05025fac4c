//! Transport-independent description of the request being signed.

/// The parts of an HTTP request that take part in signing.
///
/// Query parameters and headers are kept as ordered multimaps: a key may
/// appear several times, and canonicalization only looks at the first
/// occurrence. The path is the *decoded* path.
///
/// # Examples
///
/// ```
/// use bce_auth::RequestDescriptor;
///
/// let request = RequestDescriptor::new("GET", "/meiyou")
///     .header("Host", "jowin-dev.bj.bcebos.com")
///     .query("partNumber", "1");
/// assert_eq!(request.method(), "GET");
/// assert_eq!(request.headers().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    /// Create a descriptor with no query parameters and no headers.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a header. Names keep the case they were given.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The HTTP method as supplied.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The decoded request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order.
    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    /// Headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of the header with the given name, compared case-insensitively.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
