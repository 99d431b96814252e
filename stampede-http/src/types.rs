//! HTTP method handling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// HTTP methods the load generator can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether a request body is attached for this method
    pub fn takes_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    /// Parse a method name, falling back to GET with a warning.
    ///
    /// Test plans carry the method as a free-form string; an unrecognized
    /// value must not abort a run that already passed validation.
    pub fn parse_or_get(s: &str) -> Self {
        match s.parse() {
            Ok(method) => method,
            Err(()) => {
                warn!("unsupported HTTP method '{}', using GET", s);
                HttpMethod::Get
            }
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("PATCH".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn unknown_method_falls_back_to_get() {
        assert_eq!(HttpMethod::parse_or_get("FETCH"), HttpMethod::Get);
        assert_eq!(HttpMethod::parse_or_get(""), HttpMethod::Get);
        assert_eq!(HttpMethod::parse_or_get("delete"), HttpMethod::Delete);
    }

    #[test]
    fn body_only_for_mutating_methods() {
        assert!(HttpMethod::Post.takes_body());
        assert!(HttpMethod::Put.takes_body());
        assert!(HttpMethod::Patch.takes_body());
        assert!(!HttpMethod::Get.takes_body());
        assert!(!HttpMethod::Delete.takes_body());
    }
}
