use crate::utils::error::{As3Error, Result};
use regex::Regex;
use std::collections::HashSet;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::OnceLock;
use url::Url;

/// AS3 object names: a letter first, then letters, digits, `_`, `.` or `-`.
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z][0-9A-Za-z_.\-]*$";
const IDENTIFIER_MAX_LEN: usize = 190;

/// Property names AS3 gives meaning to inside ADC, Tenant and Application
/// objects. An object named like one of these collides with the property.
pub const RESERVED_IDENTIFIERS: &[&str] = &[
    "class",
    "schemaVersion",
    "id",
    "label",
    "remark",
    "updateMode",
    "controls",
    "constants",
    "template",
    "schemaOverlay",
    "enable",
    "defaultRouteDomain",
    "optimisticLockKey",
];

fn identifier_regex() -> Result<&'static Regex> {
    static IDENTIFIER_RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    IDENTIFIER_RE
        .get_or_init(|| Regex::new(IDENTIFIER_PATTERN))
        .as_ref()
        .map_err(|e| As3Error::config(e.to_string()))
}

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(As3Error::validation(field_name, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(As3Error::validation(
                field_name,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(As3Error::validation(
            field_name,
            format!("Invalid URL format '{}': {}", url_str, e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(As3Error::validation(field_name, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(As3Error::validation(field_name, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(As3Error::validation(
            field_name,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(As3Error::validation(
            field_name,
            format!("Value {} must be between {} and {}", value, min, max),
        ));
    }
    Ok(())
}

/// Narrows a raw port number to a TCP port, rejecting 0 and anything above 65535.
pub fn validate_port(field_name: &str, value: i64) -> Result<u16> {
    validate_range(field_name, value, 1, i64::from(u16::MAX))?;
    u16::try_from(value).map_err(|e| As3Error::validation(field_name, e.to_string()))
}

pub fn validate_ip(field_name: &str, value: &str) -> Result<IpAddr> {
    value.trim().parse::<IpAddr>().map_err(|_| {
        As3Error::validation(field_name, format!("'{}' is not a valid IP address", value))
    })
}

pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;

    if value.len() > IDENTIFIER_MAX_LEN {
        return Err(As3Error::validation(
            field_name,
            format!("'{}' is longer than {} characters", value, IDENTIFIER_MAX_LEN),
        ));
    }

    if !identifier_regex()?.is_match(value) {
        return Err(As3Error::validation(
            field_name,
            format!(
                "'{}' must start with a letter and contain only letters, digits, '_', '.' or '-'",
                value
            ),
        ));
    }

    if RESERVED_IDENTIFIERS.contains(&value) {
        return Err(As3Error::validation(
            field_name,
            format!("'{}' is a reserved AS3 property name", value),
        ));
    }
    Ok(())
}

/// Returns the first value that occurs more than once, in input order.
pub fn first_duplicate<'a, T, I>(values: I) -> Option<&'a T>
where
    T: Eq + Hash + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut seen = HashSet::new();
    values.into_iter().find(|value| !seen.insert(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("provider.server", "https://10.1.1.245").is_ok());
        assert!(validate_url("provider.server", "http://bigip.example.com:8443").is_ok());
        assert!(validate_url("provider.server", "").is_err());
        assert!(validate_url("provider.server", "10.1.1.245").is_err());
        assert!(validate_url("provider.server", "ftp://bigip.example.com").is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("output", "rendered/ColNew.json").is_ok());
        assert!(validate_path("output", "").is_err());
        assert!(validate_path("output", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_port_bounds() {
        assert_eq!(validate_port("vsport", 80).unwrap(), 80);
        assert_eq!(validate_port("vsport", 1).unwrap(), 1);
        assert_eq!(validate_port("vsport", 65535).unwrap(), 65535);
        assert!(validate_port("vsport", 0).is_err());
        assert!(validate_port("vsport", 70000).is_err());
        assert!(validate_port("vsport", -1).is_err());
    }

    #[test]
    fn test_validate_ip() {
        assert!(validate_ip("vsip", "10.39.2.1").is_ok());
        assert!(validate_ip("vsip", "2001:db8::10").is_ok());
        assert!(validate_ip("vsip", "10.39.2").is_err());
        assert!(validate_ip("vsip", "web").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("partition", "ColNew").is_ok());
        assert!(validate_identifier("pool_name", "web_pool").is_ok());
        assert!(validate_identifier("name", "app-1.v2").is_ok());
        assert!(validate_identifier("name", "").is_err());
        assert!(validate_identifier("name", "1web").is_err());
        assert!(validate_identifier("name", "web pool").is_err());
        assert!(validate_identifier("name", &"a".repeat(191)).is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_reserved_names() {
        for reserved in RESERVED_IDENTIFIERS {
            let err = validate_identifier("name", reserved).unwrap_err();
            assert!(matches!(err, As3Error::ValidationError { ref message, .. } if message.contains("reserved")));
        }
        // 大小寫不同就不是保留字
        assert!(validate_identifier("name", "Class").is_ok());
        assert!(validate_identifier("name", "identity").is_ok());
    }

    #[test]
    fn test_first_duplicate() {
        let names = vec!["web".to_string(), "api".to_string(), "web".to_string()];
        assert_eq!(first_duplicate(&names).map(String::as_str), Some("web"));

        let unique = vec![1, 2, 3];
        assert_eq!(first_duplicate(&unique), None);
    }
}
