use super::{http_client, site_label};
use crate::chat::Button;
use crate::engines::trait_def::SearchEngine;
use crate::engines::types::{EngineError, EngineInfo, ResultMeta, ResultRecord, SearchMatch};
use anyhow::Result;
use scraper::{ElementRef, Html, Selector};

const INFO: EngineInfo = EngineInfo {
    name: "IQDB",
    provider_url: "https://iqdb.org",
    description: "Multi-service booru search; matches artwork even when resized.",
    recommendation: &["Anime artwork", "Manga panels"],
    types: &["Anime / artwork"],
    supports_best_match: true,
    pre_work: false,
};

pub struct IqdbEngine {
    client: reqwest::Client,
}

/// Parsed best-match cell of an IQDB result page.
#[derive(Debug, PartialEq)]
struct IqdbHit {
    source_url: String,
    thumbnail: Option<String>,
    similarity: Option<u8>,
    size: Option<String>,
    rating: Option<String>,
    tags: Vec<String>,
}

impl IqdbEngine {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
        })
    }

    fn result_url(image_url: &str) -> String {
        format!("https://iqdb.org/?url={}", urlencoding::encode(image_url))
    }
}

#[async_trait::async_trait]
impl SearchEngine for IqdbEngine {
    fn info(&self) -> &EngineInfo {
        &INFO
    }

    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button> {
        Some(Button::link(
            label.unwrap_or(INFO.name),
            Self::result_url(image_url),
        ))
    }

    async fn best_match(&self, image_url: &str) -> Result<Option<SearchMatch>, EngineError> {
        let html = self
            .client
            .get(Self::result_url(image_url))
            .send()
            .await?
            .text()
            .await?;

        let Some(hit) = extract_best_match(&html)? else {
            return Ok(None);
        };

        let mut record = ResultRecord::new();
        if let Some(size) = &hit.size {
            record.push("Size", size);
        }
        if let Some(rating) = &hit.rating {
            record.push("Rating", rating);
        }
        if !hit.tags.is_empty() {
            let tags: Vec<String> = hit.tags.iter().map(|tag| format!("#{}", tag)).collect();
            record.push("Tags", tags.join(" "));
        }

        let mut meta = ResultMeta::new(INFO.name, INFO.provider_url);
        meta.provided_via = Some(site_label(&hit.source_url));
        meta.provided_via_url = Some(hit.source_url.clone());
        meta.similarity = hit.similarity;
        meta.thumbnail = hit.thumbnail.clone();
        meta.identifier = Some(hit.source_url.clone());
        meta.thumbnail_identifier = hit.thumbnail.clone();
        meta.buttons = vec![Button::link(site_label(&hit.source_url), &hit.source_url)];

        Ok(Some(SearchMatch { record, meta }))
    }
}

fn selector(css: &str) -> Result<Selector, EngineError> {
    Selector::parse(css)
        .map_err(|error| EngineError::UnexpectedResponse(format!("bad selector {}: {}", css, error)))
}

/// Pull the "Best match" table out of an IQDB result page.
fn extract_best_match(html: &str) -> Result<Option<IqdbHit>, EngineError> {
    if html.contains("No relevant matches") {
        return Ok(None);
    }

    let document = Html::parse_document(html);
    let table_selector = selector("#pages table")?;
    let header_selector = selector("th")?;

    for table in document.select(&table_selector) {
        let is_best = table
            .select(&header_selector)
            .any(|th| th.text().collect::<String>().trim() == "Best match");
        if !is_best {
            continue;
        }
        return Ok(parse_match_table(&table)?);
    }

    Ok(None)
}

fn parse_match_table(table: &ElementRef) -> Result<Option<IqdbHit>, EngineError> {
    let link_selector = selector("td.image a")?;
    let image_selector = selector("td.image img")?;
    let cell_selector = selector("td")?;

    let Some(source_url) = table
        .select(&link_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(absolute_url)
    else {
        return Ok(None);
    };

    let mut hit = IqdbHit {
        source_url,
        thumbnail: None,
        similarity: None,
        size: None,
        rating: None,
        tags: vec![],
    };

    if let Some(img) = table.select(&image_selector).next() {
        hit.thumbnail = img.value().attr("src").map(|src| {
            if src.starts_with('/') {
                format!("https://iqdb.org{}", src)
            } else {
                absolute_url(src)
            }
        });
        if let Some(alt) = img.value().attr("alt") {
            let (rating, tags) = parse_alt(alt);
            hit.rating = rating;
            hit.tags = tags;
        }
    }

    for cell in table.select(&cell_selector) {
        let text = cell.text().collect::<String>();
        let text = text.trim();
        if let Some(percent) = text.strip_suffix("% similarity") {
            hit.similarity = percent.trim().parse::<f32>().ok().map(|s| s.round() as u8);
        } else if text.contains('×') {
            // "450×633 [Safe]"
            let mut parts = text.splitn(2, '[');
            hit.size = Some(parts.next().unwrap_or_default().trim().to_string());
            if hit.rating.is_none() {
                hit.rating = parts
                    .next()
                    .map(|rest| rest.trim_end_matches(']').trim().to_string());
            }
        }
    }

    Ok(Some(hit))
}

/// IQDB links booru results protocol-relative.
fn absolute_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

/// Thumbnail alt text looks like `Rating: s Score: 33 Tags: tag1 tag2`.
fn parse_alt(alt: &str) -> (Option<String>, Vec<String>) {
    let mut rating = None;
    let mut tags = vec![];

    if let Some(rest) = alt.split("Rating:").nth(1) {
        if let Some(value) = rest.split_whitespace().next() {
            rating = Some(
                match value {
                    "s" => "Safe",
                    "q" => "Questionable",
                    "e" => "Explicit",
                    other => other,
                }
                .to_string(),
            );
        }
    }
    if let Some(rest) = alt.split("Tags:").nth(1) {
        tags = rest
            .split_whitespace()
            .map(|tag| tag.to_string())
            .collect();
    }

    (rating, tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
    <div id="pages">
      <div><table><tr><th>Your image</th></tr></table></div>
      <div><table>
        <tr><th>Best match</th></tr>
        <tr><td class='image'>
          <a href="//danbooru.donmai.us/posts/123">
            <img src='/danbooru/a/b/c.jpg' alt='Rating: s Score: 33 Tags: sky cloud'>
          </a>
        </td></tr>
        <tr><td>450×633 [Safe]</td></tr>
        <tr><td>92% similarity</td></tr>
      </table></div>
    </div>
    "#;

    #[test]
    fn test_extract_best_match() {
        let hit = extract_best_match(PAGE).unwrap().unwrap();
        assert_eq!(hit.source_url, "https://danbooru.donmai.us/posts/123");
        assert_eq!(
            hit.thumbnail.as_deref(),
            Some("https://iqdb.org/danbooru/a/b/c.jpg")
        );
        assert_eq!(hit.similarity, Some(92));
        assert_eq!(hit.size.as_deref(), Some("450×633"));
        assert_eq!(hit.rating.as_deref(), Some("Safe"));
        assert_eq!(hit.tags, vec!["sky", "cloud"]);
    }

    #[test]
    fn test_no_relevant_matches() {
        let html = "<div>No relevant matches</div>";
        assert!(extract_best_match(html).unwrap().is_none());
    }

    #[test]
    fn test_page_without_best_match_table() {
        let html = r#"<div id="pages"><table><tr><th>Your image</th></tr></table></div>"#;
        assert!(extract_best_match(html).unwrap().is_none());
    }

    #[test]
    fn test_parse_alt() {
        let (rating, tags) = parse_alt("Rating: q Score: 5 Tags: a b c");
        assert_eq!(rating.as_deref(), Some("Questionable"));
        assert_eq!(tags, vec!["a", "b", "c"]);
    }
}
