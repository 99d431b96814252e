//! Request preparation
//!
//! Virtual users issue the same request thousands of times, so everything
//! that can be computed once is computed here: the final URL with encoded
//! query parameters, the parsed header map, and the body (attached only for
//! methods that take one).

use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use stampede_core::TargetSpec;

use crate::errors::HttpError;
use crate::types::HttpMethod;

/// A target request, resolved once and reused for every iteration
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    url: Url,
    method: HttpMethod,
    headers: HeaderMap,
    body: Option<String>,
}

impl PreparedRequest {
    /// Resolve a target spec into a reusable request.
    ///
    /// Query parameters are appended to any query already present on the
    /// URL. An absent body on POST/PUT/PATCH becomes the empty string.
    pub fn from_target(target: &TargetSpec) -> Result<Self, HttpError> {
        let mut url = Url::parse(&target.url)?;
        if !target.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &target.query_params {
                pairs.append_pair(key, value);
            }
        }

        let method = HttpMethod::parse_or_get(&target.method);

        let mut headers = HeaderMap::with_capacity(target.headers.len());
        for (key, value) in &target.headers {
            let name = HeaderName::from_str(key)
                .map_err(|_| HttpError::InvalidHeaderName(key.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidHeaderValue(key.clone()))?;
            headers.insert(name, value);
        }

        let body = method
            .takes_body()
            .then(|| target.body.clone().unwrap_or_default());

        Ok(Self {
            url,
            method,
            headers,
            body,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn target(url: &str, method: &str) -> TargetSpec {
        TargetSpec {
            url: url.to_string(),
            method: method.to_string(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            body: None,
        }
    }

    #[test]
    fn query_params_are_encoded() {
        let mut spec = target("http://api.example.com/search", "GET");
        spec.query_params
            .insert("q".to_string(), "two words".to_string());

        let prepared = PreparedRequest::from_target(&spec).unwrap();
        assert_eq!(
            prepared.url().as_str(),
            "http://api.example.com/search?q=two+words"
        );
    }

    #[test]
    fn query_params_append_to_existing_query() {
        let mut spec = target("http://api.example.com/search?page=1", "GET");
        spec.query_params
            .insert("size".to_string(), "20".to_string());

        let prepared = PreparedRequest::from_target(&spec).unwrap();
        let query = prepared.url().query().unwrap();
        assert!(query.contains("page=1"));
        assert!(query.contains("size=20"));
    }

    #[test]
    fn body_rules_follow_the_method() {
        let mut spec = target("http://api.example.com/orders", "POST");
        let prepared = PreparedRequest::from_target(&spec).unwrap();
        // Absent body on a POST becomes the empty string
        assert_eq!(prepared.body(), Some(""));

        spec.body = Some("{\"sku\":1}".to_string());
        let prepared = PreparedRequest::from_target(&spec).unwrap();
        assert_eq!(prepared.body(), Some("{\"sku\":1}"));

        spec.method = "GET".to_string();
        let prepared = PreparedRequest::from_target(&spec).unwrap();
        assert_eq!(prepared.body(), None);
    }

    #[test]
    fn unknown_method_prepares_as_get() {
        let spec = target("http://api.example.com/", "BREW");
        let prepared = PreparedRequest::from_target(&spec).unwrap();
        assert_eq!(prepared.method(), HttpMethod::Get);
    }

    #[test]
    fn bad_headers_are_rejected() {
        let mut spec = target("http://api.example.com/", "GET");
        spec.headers
            .insert("X Bad Name".to_string(), "v".to_string());
        assert!(matches!(
            PreparedRequest::from_target(&spec),
            Err(HttpError::InvalidHeaderName(_))
        ));
    }
}
