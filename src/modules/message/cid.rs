use regex::{Captures, Regex};
use std::sync::LazyLock;

static CID_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(src|href|background)(\s*=\s*)(["']?)cid:([^"'\s>]+)"#)
        .expect("cid pattern is valid")
});

/// Points every `cid:` reference of an HTML body at the content endpoint of the same message,
/// so an embedded image resolves when the HTML is rendered straight from the REST API.
pub fn replace_with_rest_path(message_id: u64, html: &str) -> String {
    CID_REFERENCE
        .replace_all(html, |caps: &Captures<'_>| {
            format!(
                "{}{}{}/rest/messages/{}/content/{}",
                &caps[1], &caps[2], &caps[3], message_id, &caps[4]
            )
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::replace_with_rest_path;

    #[test]
    fn rewrites_quoted_and_unquoted_references() {
        let html = r#"<img src="cid:logo@x"><a HREF='cid:doc.pdf'>d</a><td background=cid:bg>"#;
        assert_eq!(
            replace_with_rest_path(42, html),
            r#"<img src="/rest/messages/42/content/logo@x"><a HREF='/rest/messages/42/content/doc.pdf'>d</a><td background=/rest/messages/42/content/bg>"#
        );
    }

    #[test]
    fn leaves_other_urls_alone() {
        let html = r#"<img src="https://example.com/cid:nope.png"> cid:plain-text"#;
        assert_eq!(replace_with_rest_path(1, html), html);
    }
}
