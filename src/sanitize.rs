// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTML escaping for user text embedded in the notification email.

/// Replace the five HTML-significant characters with entities.
///
/// Single pass, so `&` in the output is never escaped again.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape, then turn line breaks into `<br/>`.
pub fn message_to_html(text: &str) -> String {
    escape_html(text).replace("\r\n", "\n").replace('\n', "<br/>")
}
