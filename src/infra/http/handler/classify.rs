//! Header-based request classification.

use std::net::{IpAddr, Ipv4Addr};

use axum::http::{HeaderMap, header::USER_AGENT};
use once_cell::sync::Lazy;
use regex::Regex;

/// Reported when the client sends no usable `User-Agent`.
pub const DEFAULT_USER_AGENT: &str = "bot";

const X_REQUESTED_WITH: &str = "x-requested-with";
const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

static MOBILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "ipod|iphone|android|blackberry|palm|nokia|symbian|samsung|psp|kindle|phone|mobile|ucweb|opera mini|fennec",
    )
    .expect("mobile pattern must compile")
});

static SPIDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new("bot|crawl|spider|slurp|search|lycos|robozilla|fetcher")
        .expect("spider pattern must compile")
});

pub fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_USER_AGENT)
}

pub fn is_mobile(user_agent: &str) -> bool {
    MOBILE.is_match(&user_agent.to_lowercase())
}

pub fn is_spider(user_agent: &str) -> bool {
    SPIDER.is_match(&user_agent.to_lowercase())
}

pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get(X_REQUESTED_WITH)
        .is_some_and(|value| value.as_bytes() == b"XMLHttpRequest")
}

/// Client address, optionally taken from proxy headers.
///
/// `X-Real-IP` wins over the first `X-Forwarded-For` entry. Unparseable
/// header values fall back to the peer address.
pub fn remote_ip(peer: Option<IpAddr>, headers: &HeaderMap, trust_forwarded: bool) -> Option<IpAddr> {
    if !trust_forwarded {
        return peer;
    }

    let header_ip = |name: &str, first_only: bool| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|raw| if first_only { raw.split(',').next().unwrap_or(raw) } else { raw })
            .and_then(|raw| raw.trim().parse::<IpAddr>().ok())
    };

    header_ip(X_REAL_IP, false)
        .or_else(|| header_ip(X_FORWARDED_FOR, true))
        .or(peer)
}

pub fn is_system(remote: Option<IpAddr>) -> bool {
    remote == Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
