// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection URI helpers.

/// Percent-encode a userinfo component (user or password).
pub fn escape_userinfo(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// `scheme://[user[:password]@]host:port[/path]`
pub fn build(
    scheme: &str,
    user: Option<&str>,
    password: Option<&str>,
    host: &str,
    port: u16,
    path: &str,
) -> String {
    let auth = match (user.filter(|u| !u.is_empty()), password.filter(|p| !p.is_empty())) {
        (Some(u), Some(p)) => format!("{}:{}@", escape_userinfo(u), escape_userinfo(p)),
        (Some(u), None) => format!("{}@", escape_userinfo(u)),
        (None, Some(p)) => format!(":{}@", escape_userinfo(p)),
        (None, None) => String::new(),
    };
    format!("{scheme}://{auth}{host}:{port}{path}")
}

#[cfg(test)]
#[path = "uri_tests.rs"]
mod tests;
