// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for abuse simulation.

use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Submission bodies that must each be rejected with 400.
pub fn invalid_bodies() -> Vec<(&'static str, String)> {
    let long = |n: usize| "x".repeat(n);
    vec![
        ("missing name", r#"{"email":"a@b.com","message":"Hi"}"#.to_string()),
        ("missing email", r#"{"name":"A","message":"Hi"}"#.to_string()),
        ("missing message", r#"{"name":"A","email":"a@b.com"}"#.to_string()),
        ("blank name", r#"{"name":"   ","email":"a@b.com","message":"Hi"}"#.to_string()),
        ("empty object", "{}".to_string()),
        (
            "name too long",
            format!(r#"{{"name":"{}","email":"a@b.com","message":"Hi"}}"#, long(81)),
        ),
        (
            "message too long",
            format!(r#"{{"name":"A","email":"a@b.com","message":"{}"}}"#, long(1001)),
        ),
        ("no at sign", r#"{"name":"A","email":"ab.com","message":"Hi"}"#.to_string()),
        ("no dot in domain", r#"{"name":"A","email":"a@b","message":"Hi"}"#.to_string()),
        (
            "three links",
            r#"{"name":"A","email":"a@b.com","message":"http://a https://b HTTP://c"}"#.to_string(),
        ),
        ("not json", "name=A&email=a@b.com".to_string()),
        ("json array", "[1,2,3]".to_string()),
        ("wrong field type", r#"{"name":5,"email":"a@b.com","message":"Hi"}"#.to_string()),
    ]
}

/// Messages carrying `n` links with mixed schemes and casing.
pub fn linky_message(n: usize) -> String {
    let links = (0..n)
        .map(|i| match i % 3 {
            0 => format!("http://spam-{i}.example"),
            1 => format!("HTTPS://spam-{i}.example"),
            _ => format!("hTtPs://spam-{i}.example"),
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("Great deals: {links}")
}
