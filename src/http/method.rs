use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MethodError {
    #[error("unsupported HTTP method: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    PUT,
    POST,
    DELETE,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::PUT => "PUT",
            Method::POST => "POST",
            Method::DELETE => "DELETE",
        }
    }

    /// The default method matrix probed when the caller configures none.
    pub fn defaults() -> Vec<Method> {
        vec![Method::GET, Method::POST, Method::PUT, Method::DELETE]
    }
}

impl FromStr for Method {
    type Err = MethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(MethodError::Unsupported(s.to_string())),
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_methods_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::GET);
        assert_eq!("Post".parse::<Method>().unwrap(), Method::POST);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::DELETE);
    }

    #[test]
    fn rejects_unknown_methods() {
        let result = "PATCH".parse::<Method>();
        assert!(matches!(result, Err(MethodError::Unsupported(_))));
    }

    #[test]
    fn defaults_match_spec_order() {
        assert_eq!(
            Method::defaults(),
            vec![Method::GET, Method::POST, Method::PUT, Method::DELETE]
        );
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for m in Method::defaults() {
            assert_eq!(m.to_string().parse::<Method>().unwrap(), m);
        }
    }
}
