const FRONTMATTER_DELIMITER: &str = "---";

/// Counts whitespace separated words, ignoring a leading frontmatter block.
pub fn count_words(text: &str) -> u64 {
    strip_frontmatter(text).split_whitespace().count() as u64
}

/// Removes a frontmatter block that opens on the very first line and closes at the next `---`
/// line. Without a closing delimiter the text is returned untouched.
pub fn strip_frontmatter(text: &str) -> &str {
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next().filter(|line| is_delimiter(line)) else {
        return text;
    };

    let mut consumed = first.len();
    for line in lines {
        consumed += line.len();
        if is_delimiter(line) {
            return &text[consumed..];
        }
    }
    text
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == FRONTMATTER_DELIMITER
}

#[cfg(test)]
mod tests {
    use super::{count_words, strip_frontmatter};

    #[test]
    fn test_plain_text() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t "), 0);
        assert_eq!(count_words("one"), 1);
        assert_eq!(count_words("  one two\n\nthree\tfour  "), 4);
    }

    #[test]
    fn test_frontmatter_is_ignored() {
        let text = "---\ntags: [daily, journal]\nmood: fine\n---\nWrote three words";
        assert_eq!(count_words(text), 3);
        assert_eq!(strip_frontmatter(text), "Wrote three words");
    }

    #[test]
    fn test_only_frontmatter_counts_zero() {
        assert_eq!(count_words("---\ntitle: hello world\n---"), 0);
        assert_eq!(count_words("---\ntitle: hello world\n---\n"), 0);
        assert_eq!(count_words("---\n---\n"), 0);
    }

    #[test]
    fn test_frontmatter_ends_at_first_closing_delimiter() {
        let text = "---\na: b\n---\nbody text\n---\nmore\n";
        // The second `---` is a regular token in the body.
        assert_eq!(count_words(text), 4);
    }

    #[test]
    fn test_windows_line_endings() {
        assert_eq!(count_words("---\r\ntitle: x\r\n---\r\nsome body\r\n"), 2);
    }

    #[test]
    fn test_unclosed_frontmatter_is_plain_text() {
        assert_eq!(count_words("---\ntitle: x\nbody"), 4);
    }

    #[test]
    fn test_delimiter_must_open_the_text() {
        assert_eq!(count_words("intro\n---\na: b\n---\n"), 5);
        assert_eq!(count_words("--- not a delimiter\nword\n---\n"), 6);
    }
}
