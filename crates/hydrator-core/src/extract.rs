//! Entity extraction: finds web links and bang commands in message text.
//!
//! Both extractors are pure and return matches in left-to-right order of
//! occurrence, without deduplication.
//!
//! Bang-command arguments are limited to `[A-Za-z0-9_.-]` tokens on the
//! same line as the command.
//! Quoted, multi-word arguments are only understood later, by the command
//! registry's tokenizer, once a whole command string has been captured.

use std::sync::LazyLock;

use regex::Regex;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:[-\w.]|%[0-9a-fA-F]{2})+(?:/\S*)?").expect("valid URL pattern")
});

static BANG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!([A-Za-z0-9_.-]+)((?:[^\S\r\n]+[A-Za-z0-9_.-]+)*)")
        .expect("valid bang-command pattern")
});

/// Extract `http://` and `https://` links from `text`.
pub fn extract_urls(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Extract bang commands from `text`, without the leading `!`.
///
/// Each result is the command token followed by its argument tokens,
/// joined by single spaces: `"see !weather  London"` yields
/// `["weather London"]`.
pub fn extract_bang_commands(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    BANG_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let mut parts = vec![caps.get(1)?.as_str()];
            if let Some(args) = caps.get(2) {
                parts.extend(args.as_str().split_whitespace());
            }
            let command = parts.join(" ");
            (!command.is_empty()).then_some(command)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_text() {
        assert!(extract_urls("").is_empty());
        assert!(extract_bang_commands("").is_empty());
    }

    #[test]
    fn test_single_url() {
        assert_eq!(
            extract_urls("Check out https://example.com"),
            vec!["https://example.com"]
        );
    }

    #[test]
    fn test_urls_in_order_with_paths_and_queries() {
        let text = "first http://a.example/x?y=1&z=2 then https://b.example/path/to#frag done";
        assert_eq!(
            extract_urls(text),
            vec!["http://a.example/x?y=1&z=2", "https://b.example/path/to#frag"]
        );
    }

    #[test]
    fn test_repeated_urls_are_not_deduplicated() {
        let text = "https://example.com and again https://example.com";
        assert_eq!(extract_urls(text).len(), 2);
    }

    #[test]
    fn test_percent_encoded_host() {
        assert_eq!(
            extract_urls("see https://ex%41mple.com/page"),
            vec!["https://ex%41mple.com/page"]
        );
    }

    #[test]
    fn test_no_false_positives() {
        let text = "ftp://files.example.com mailto:someone@example.com www.example.com http:/broken";
        assert!(extract_urls(text).is_empty());
    }

    #[test]
    fn test_url_stops_at_whitespace() {
        assert_eq!(
            extract_urls("(https://example.com/a) next"),
            vec!["https://example.com/a)"]
        );
    }

    #[test]
    fn test_simple_bang_command() {
        assert_eq!(
            extract_bang_commands("Tell me about !books please."),
            vec!["books please."]
        );
    }

    #[test]
    fn test_bang_command_with_args() {
        assert_eq!(
            extract_bang_commands("What's the weather like? !weather London today"),
            vec!["weather London today"]
        );
    }

    #[test]
    fn test_multiple_bang_commands() {
        assert_eq!(
            extract_bang_commands("I need !books and also !weather London, thanks."),
            vec!["books and also", "weather London"]
        );
    }

    #[test]
    fn test_bang_args_joined_by_single_space() {
        assert_eq!(
            extract_bang_commands("!book  The\tGreat   Gatsby"),
            vec!["book The Great Gatsby"]
        );
    }

    #[test]
    fn test_bang_args_stop_at_line_break() {
        assert_eq!(
            extract_bang_commands("!books\nplease list them"),
            vec!["books"]
        );
    }

    #[test]
    fn test_bang_without_command_is_ignored() {
        assert!(extract_bang_commands("Wow! That is great !").is_empty());
    }

    #[test]
    fn test_quoted_args_are_not_captured() {
        assert_eq!(
            extract_bang_commands(r#"!book "The Great Gatsby""#),
            vec!["book"]
        );
    }

    #[test]
    fn test_k_disjoint_commands_yield_k_results() {
        let text = "!a 1 !b !c x y\n!d";
        assert_eq!(extract_bang_commands(text), vec!["a 1", "b", "c x y", "d"]);
    }
}
