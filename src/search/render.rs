//! Pure formatting of a best-match result into HTML reply text.

use crate::engines::{ResultMeta, ResultRecord};
use crate::text::{bold, code, field_title, hidden_link, link};

/// Render one result + metadata record. Deterministic, no I/O.
pub fn build_reply(result: &ResultRecord, meta: &ResultMeta) -> String {
    let mut reply = format!(
        "Provided by: {}",
        link(&bold(&meta.provider), &meta.provider_url)
    );

    if let Some(via) = &meta.provided_via {
        let via = match &meta.provided_via_url {
            Some(via_url) => link(&bold(via), via_url),
            None => bold(via),
        };
        reply += &format!(" with {}", via);
    }

    if let Some(similarity) = meta.similarity {
        reply += &format!(" with {} similarity", bold(&format!("{}%", similarity)));
    }

    if let Some(thumbnail) = &meta.thumbnail {
        reply = hidden_link(thumbnail) + &reply;
    }

    reply += "\n\n";

    for (key, value) in result.iter() {
        if value.starts_with('#') {
            // tag listing, keep it as plain text
            reply += &format!("{}{}\n", field_title(key), value);
        } else {
            reply += &format!("{}{}\n", field_title(key), code(value));
        }
    }

    for error in &meta.errors {
        reply += error;
    }

    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ResultMeta {
        ResultMeta::new("IQDB", "https://iqdb.org")
    }

    #[test]
    fn test_provider_attribution() {
        let reply = build_reply(&ResultRecord::new(), &meta());
        assert!(reply.starts_with(
            "Provided by: <a href=\"https://iqdb.org\"><b>IQDB</b></a>"
        ));
    }

    #[test]
    fn test_similarity_and_tags() {
        let mut record = ResultRecord::new();
        record.push("Tags", "#a #b");
        let mut meta = meta();
        meta.similarity = Some(87);

        let reply = build_reply(&record, &meta);
        assert!(reply.contains("<b>87%</b> similarity"));
        assert!(reply.contains("<b>Tags</b>: #a #b\n"));
        assert!(!reply.contains("<code>#a #b</code>"));
    }

    #[test]
    fn test_plain_value_is_code() {
        let mut record = ResultRecord::new();
        record.push("Title", "One Piece");
        let reply = build_reply(&record, &meta());
        assert!(reply.contains("<b>Title</b>: <code>One Piece</code>\n"));
    }

    #[test]
    fn test_thumbnail_leads_reply() {
        let mut meta = meta();
        meta.thumbnail = Some("https://iqdb.org/t.jpg".to_string());
        let reply = build_reply(&ResultRecord::new(), &meta);
        assert!(reply.starts_with("<a href=\"https://iqdb.org/t.jpg\">&#8203;</a>"));
    }

    #[test]
    fn test_via_attribution() {
        let mut meta = meta();
        meta.provided_via = Some("Danbooru".to_string());
        meta.provided_via_url = Some("https://danbooru.donmai.us/posts/1".to_string());
        let reply = build_reply(&ResultRecord::new(), &meta);
        assert!(reply.contains(
            " with <a href=\"https://danbooru.donmai.us/posts/1\"><b>Danbooru</b></a>"
        ));
    }

    #[test]
    fn test_errors_trail_reply() {
        let mut meta = meta();
        meta.errors.push("provider timed out".to_string());
        let reply = build_reply(&ResultRecord::new(), &meta);
        assert!(reply.ends_with("provider timed out"));
    }
}
