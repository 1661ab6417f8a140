//! Markdown-aware word counting.
//!
//! Markup is stripped before counting so that syntax (`#`, `**`, link targets,
//! code) does not inflate the totals:
//!
//! 1. Fenced code blocks
//! 2. Inline code spans
//! 3. Image references (dropped entirely)
//! 4. Link references (link text kept, target dropped)
//! 5. Emphasis markers
//! 6. Heading markers and list, number and quote prefixes, repeated until
//!    no line starts with one
//!
//! Line structure is preserved in the cleaned text, so counting the output of
//! [`clean_markdown`] again yields the same number.

use regex::Regex;
use std::sync::LazyLock;

static FENCED_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```|~~~.*?~~~").expect("fenced code regex"));

static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]*`").expect("inline code regex"));

/// `![alt](url)` and Obsidian-style `![[embed]]`.
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[\[[^\]\n]*\]\]|!\[[^\]\n]*\]\([^)\n]*\)").expect("image regex")
});

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]*)\]\([^)\n]*\)").expect("link regex"));

/// `[[target]]` or `[[target|alias]]`; keeps the alias when present.
static WIKI_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]|\n]*)(?:\|([^\]\n]*))?\]\]").expect("wiki link regex")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]{0,3}#{1,6}(?:[ \t]+|$)").expect("heading regex"));

static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*+|~~+|__+").expect("emphasis regex"));

static SINGLE_UNDERSCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)_(\S[^_\n]*)_").expect("underscore emphasis regex"));

/// Repeated markers are consumed together (`> - item`, `- - item`).
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:(?:[-+]|\d+[.)]|>+)(?:[ \t]+|$))+").expect("prefix regex")
});

/// Remove markdown syntax, keeping prose and line structure.
///
/// Runs of horizontal whitespace collapse to a single space and blank lines
/// are dropped.
pub fn clean_markdown(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = FENCED_CODE_RE.replace_all(text, " ");
    let text = INLINE_CODE_RE.replace_all(&text, " ");
    // Stray backticks from unbalanced fences would pair up across lines on a second pass
    let text = text.replace('`', "");
    let text = IMAGE_RE.replace_all(&text, " ");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = WIKI_LINK_RE.replace_all(&text, |caps: &regex::Captures<'_>| {
        caps.get(2)
            .or_else(|| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    let text = SINGLE_UNDERSCORE_RE.replace_all(&text, "$1$2");
    let text = EMPHASIS_RE.replace_all(&text, "");
    let text = strip_line_markers(&text);

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip heading markers and list/quote prefixes until none lead a line.
///
/// Markers nest in either order (`> # heading`, `# - item`), so a single
/// pass of each can leave one behind.
fn strip_line_markers(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let stripped = PREFIX_RE.replace_all(&current, "");
        let stripped = HEADING_RE.replace_all(&stripped, "");
        if stripped == current.as_str() {
            return current;
        }
        current = stripped.into_owned();
    }
}

/// Count words in markdown text. Never fails; empty input yields 0.
pub fn count_words(text: &str) -> u64 {
    clean_markdown(text).split_whitespace().count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_and_emphasis() {
        let text = "# Title\n\nHello **world**, this is *markdown*.";
        assert_eq!(clean_markdown(text), "Title\nHello world, this is markdown.");
        assert_eq!(count_words(text), 6);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t\n"), 0);
    }

    #[test]
    fn test_code_is_not_counted() {
        let text = "Intro line\n```rust\nfn main() { println!(\"hi\"); }\n```\nUse `cargo run` now";
        assert_eq!(count_words(text), 4);
    }

    #[test]
    fn test_links_keep_text_and_images_vanish() {
        let text = "See [the docs](https://example.com/a b) and ![diagram](img.png) here";
        assert_eq!(clean_markdown(text), "See the docs and here");

        let wiki = "Linked to [[Daily Note]] and [[target|alias text]] plus ![[embed.png]]";
        assert_eq!(count_words(wiki), 8);
    }

    #[test]
    fn test_list_and_quote_prefixes() {
        let text = "- first item\n* second item\n1. third item\n> quoted words\n> - nested";
        assert_eq!(
            clean_markdown(text),
            "first item\nsecond item\nthird item\nquoted words\nnested"
        );
        assert_eq!(count_words(text), 9);
    }

    #[test]
    fn test_bare_markers_are_not_words() {
        assert_eq!(count_words("#\n-\n>\n1."), 0);
        assert_eq!(count_words("- - double marker"), 2);
    }

    #[test]
    fn test_nested_heading_markers_are_not_words() {
        assert_eq!(clean_markdown("> # Quoted heading"), "Quoted heading");
        assert_eq!(clean_markdown("- ## Listed heading"), "Listed heading");
        assert_eq!(count_words("> # Quoted heading\n- ## Listed heading"), 4);
    }

    #[test]
    fn test_snake_case_stays_one_word() {
        assert_eq!(count_words("call read_text_file here"), 3);
        assert_eq!(count_words("an _emphasised_ word"), 3);
    }

    #[test]
    fn test_counting_cleaned_text_is_stable() {
        let samples = [
            "# Title\n\nHello **world**, this is *markdown*.",
            "- - nested list\n> > deep quote\n```\nunclosed fence\n",
            "a ` b\nc ` d",
            "[link](url) and ![img](x) and `code` and ~~struck~~ text",
            "## Heading ##\n1) one\n2) two\n\n---\n",
            "> # Quoted heading",
            "- ## Listed heading",
            "# > - quoted list heading",
            "` # tick heading",
        ];
        for sample in samples {
            let cleaned = clean_markdown(sample);
            assert_eq!(count_words(&cleaned), count_words(sample), "sample: {sample:?}");
            assert_eq!(clean_markdown(&cleaned), cleaned, "sample: {sample:?}");
        }
    }
}
