//! Rendering assistant replies into Telegram-sized HTML chunks.

use regex::Regex;

/// Telegram caps messages at 4096 chars; leave headroom for markup.
const MAX_CHUNK_CHARS: usize = 4000;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Convert the subset of markdown the assistant actually emits
/// (inline code, bold, italics) to Telegram HTML.
pub fn markdown_to_telegram_html(markdown: &str) -> String {
    let escaped = escape_html(markdown);

    let code_re = Regex::new(r"`([^`]+)`").expect("valid regex");
    let bold_re = Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex");
    let italic_re = Regex::new(r"\*([^*]+)\*").expect("valid regex");

    let converted = code_re.replace_all(&escaped, "<code>$1</code>");
    let converted = bold_re.replace_all(&converted, "<b>$1</b>");
    let converted = italic_re.replace_all(&converted, "<i>$1</i>");

    converted.into_owned()
}

/// Split text into chunks of at most `max_length` chars, preferring
/// newline boundaries. A single line longer than the limit is split
/// mid-line.
pub fn chunk_message(text: &str, max_length: usize) -> Vec<String> {
    if max_length == 0 {
        return vec![String::new()];
    }
    if text.chars().count() <= max_length {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let current_len = current.chars().count();
        let joined_len = if current.is_empty() {
            line_len
        } else {
            current_len + 1 + line_len
        };

        if joined_len <= max_length {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if line_len <= max_length {
            current = line.to_string();
            continue;
        }

        // Line itself is oversized, cut it at the char limit. The last
        // piece stays in `current` so following lines can join it.
        let line_chars: Vec<char> = line.chars().collect();
        let mut start = 0;
        while start < line_chars.len() {
            let end = (start + max_length).min(line_chars.len());
            let piece: String = line_chars[start..end].iter().collect();
            if end == line_chars.len() {
                current = piece;
            } else {
                chunks.push(piece);
            }
            start = end;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

pub fn render_reply(markdown: &str) -> Vec<String> {
    if markdown.trim().is_empty() {
        return vec![];
    }
    let html = markdown_to_telegram_html(markdown);
    chunk_message(&html, MAX_CHUNK_CHARS)
        .into_iter()
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_replaces_entities() {
        let input = "2 & 2 < 5 \"yes\"";
        assert_eq!(escape_html(input), "2 &amp; 2 &lt; 5 &quot;yes&quot;");
    }

    #[test]
    fn markdown_to_telegram_html_converts_markup() {
        let input = "hey **you** try `this` *maybe*";
        assert_eq!(
            markdown_to_telegram_html(input),
            "hey <b>you</b> try <code>this</code> <i>maybe</i>"
        );
    }

    #[test]
    fn chunk_message_keeps_short_text_whole() {
        let chunks = chunk_message("one\ntwo", 100);
        assert_eq!(chunks, vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn chunk_message_splits_at_newlines() {
        let chunks = chunk_message("first\nsecond\nthird", 12);
        assert_eq!(
            chunks,
            vec!["first\nsecond".to_string(), "third".to_string()]
        );
    }

    #[test]
    fn chunk_message_splits_oversized_lines() {
        let chunks = chunk_message("abcdef", 2);
        assert_eq!(
            chunks,
            vec!["ab".to_string(), "cd".to_string(), "ef".to_string()]
        );
    }

    #[test]
    fn render_reply_drops_empty_input() {
        assert!(render_reply("   \n  ").is_empty());
    }

    #[test]
    fn render_reply_converts_and_chunks() {
        assert_eq!(render_reply("*hi*"), vec!["<i>hi</i>".to_string()]);
    }
}
