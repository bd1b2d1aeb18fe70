//! HTML tag helpers for chat transports that render HTML-formatted text.

/// Escape the characters that are unsafe inside HTML text nodes.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn bold(text: &str) -> String {
    format!("<b>{}</b>", escape(text))
}

pub fn code(text: &str) -> String {
    format!("<code>{}</code>", escape(text))
}

pub fn link(text: &str, url: &str) -> String {
    format!("<a href=\"{}\">{}</a>", url, text)
}

/// Invisible anchor used to attach a preview image to a message.
pub fn hidden_link(url: &str) -> String {
    format!("<a href=\"{}\">&#8203;</a>", url)
}

/// Field title prefix, e.g. `<b>Similarity</b>: `.
pub fn field_title(text: &str) -> String {
    format!("{}: ", bold(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn test_bold_escapes_content() {
        assert_eq!(bold("<x>"), "<b>&lt;x&gt;</b>");
    }

    #[test]
    fn test_hidden_link() {
        assert_eq!(
            hidden_link("https://example.com/t.jpg"),
            "<a href=\"https://example.com/t.jpg\">&#8203;</a>"
        );
    }

    #[test]
    fn test_field_title() {
        assert_eq!(field_title("Source"), "<b>Source</b>: ");
    }
}
