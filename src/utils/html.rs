// src/utils/html.rs

use std::collections::HashSet;

/// Strips every tag from a plain-text field (titles, topics, group names)
/// and trims the result. `<script>`/`<style>` lose their content as well.
///
/// The result is stored and compared as text, so the entities ammonia
/// writes for text nodes are turned back into characters.
/// Rich-text documents are JSON and never go through here.
pub fn plain_text(input: &str) -> String {
    let cleaned = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(input)
        .to_string();

    unescape_text(&cleaned).trim().to_string()
}

/// Reverses the escaping html5ever applies to text nodes. `&amp;` goes last
/// so an escaped entity name stays literal.
fn unescape_text(serialized: &str) -> String {
    serialized
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_scripts() {
        assert_eq!(plain_text("  <b>Optics</b> "), "Optics");
        assert_eq!(plain_text("Intro<script>alert(1)</script>"), "Intro");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(plain_text("Algebra II"), "Algebra II");
    }

    #[test]
    fn special_characters_survive_as_text() {
        assert_eq!(plain_text("Q&A: x < y"), "Q&A: x < y");
        assert_eq!(plain_text("<i>Tom & Jerry</i> > cartoons"), "Tom & Jerry > cartoons");
        assert_eq!(plain_text("R&D"), "R&D");
    }

    #[test]
    fn escaped_entity_names_stay_literal() {
        assert_eq!(plain_text("write &amp;lt; for <"), "write &lt; for <");
    }
}
