use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::IpAddr;

/// Wrapper for sensitive data (passwords, tokens) that never prints its contents
#[derive(Clone)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for SecureString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecureString::new)
    }
}

/// Truncated, salted hash of an identifier for safe logging.
///
/// Stable for a given salt, so log lines about the same principal correlate
/// without exposing the username or id itself.
pub fn log_safe_id(id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..4])
}

/// Validates username format and length requirements.
///
/// 3 to 64 characters, ASCII letters, digits and underscore, starting with a letter.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }
    if username.len() > 64 {
        return Err("Username must not exceed 64 characters".to_string());
    }
    if !username
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
    {
        return Err("Username must start with a letter".to_string());
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }
    Ok(())
}

/// bcrypt only looks at the first 72 bytes; longer input is refused
/// rather than silently truncated.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password must not be empty".to_string());
    }
    if password.len() > 72 {
        return Err("Password must not exceed 72 bytes".to_string());
    }
    Ok(())
}

/// Identify the caller for admission control.
///
/// Forwarded headers are only consulted when the gateway sits behind a
/// trusted proxy; otherwise any client could pick its own bucket.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        // X-Forwarded-For: "client, proxy1, proxy2"
        if let Some(forwarded_for) = headers.get("x-forwarded-for")
            && let Ok(forwarded_str) = forwarded_for.to_str()
            && let Some(first_ip) = forwarded_str.split(',').next()
            && let Ok(ip) = first_ip.trim().parse::<IpAddr>()
        {
            return normalize_ip(ip);
        }

        if let Some(real_ip) = headers.get("x-real-ip")
            && let Ok(real_ip_str) = real_ip.to_str()
            && let Ok(ip) = real_ip_str.trim().parse::<IpAddr>()
        {
            return normalize_ip(ip);
        }
    }

    if let Some(ip) = direct_ip {
        return normalize_ip(ip);
    }

    "unknown".to_string()
}

fn normalize_ip(ip: IpAddr) -> String {
    match ip {
        // ::ffff:a.b.c.d and a.b.c.d are the same caller
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        IpAddr::V4(v4) => v4.to_string(),
    }
}
