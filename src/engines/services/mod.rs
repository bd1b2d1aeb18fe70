pub mod google;
pub mod bing;
pub mod yandex;
pub mod tineye;
pub mod iqdb;
pub mod saucenao;
pub mod trace;

use anyhow::{Context, Result};
use std::time::Duration;

/// HTTP client shared by the engines that do network pre-work.
///
/// Every client carries a request timeout so a hung provider can never pin a
/// fan-out worker slot forever.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()
        .context("cannot build HTTP client")
}

/// Short display label for a result URL, derived from its host.
pub fn site_label(url: &str) -> String {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or(url);

    match host {
        h if h.contains("pixiv") || h.contains("pximg") => "Pixiv".to_string(),
        h if h.contains("twitter") || h == "x.com" => "Twitter".to_string(),
        h if h.contains("danbooru") => "Danbooru".to_string(),
        h if h.contains("gelbooru") => "Gelbooru".to_string(),
        h if h.contains("yande.re") => "Yandere".to_string(),
        h if h.contains("anilist") => "AniList".to_string(),
        h => {
            // second-level domain, capitalized
            let parts: Vec<&str> = h.split('.').collect();
            let name = if parts.len() >= 2 {
                parts[parts.len() - 2]
            } else {
                h
            };
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => h.to_string(),
            }
        }
    }
}
