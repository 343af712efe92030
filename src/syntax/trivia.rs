//! Trivia handling: how whitespace and comments between tokens are attached.
//!
//! The gap between two tokens is split at its first line break. Everything up
//! to and including that break trails the previous token; the remainder leads
//! the next one. A token therefore "owns" the rest of its line.

/// Splits the gap between two tokens into `(trailing, leading)` trivia.
pub fn split_gap(gap: &str) -> (&str, &str) {
    match first_line_break_end(gap) {
        Some(end) => gap.split_at(end),
        None => (gap, ""),
    }
}

/// Attaches trivia to a sequence of token spans taken from `text`.
///
/// Returns one `(leading, trailing)` pair per span. Text before the first
/// span leads the first token; text after the last span trails the last one.
pub fn attach_trivia(text: &str, spans: &[(usize, usize)]) -> Vec<(String, String)> {
    let mut trivia = vec![(String::new(), String::new()); spans.len()];
    let mut previous_end = 0;

    for (index, &(start, end)) in spans.iter().enumerate() {
        let gap = &text[previous_end..start];
        if index == 0 {
            trivia[0].0 = gap.to_string();
        } else {
            let (trailing, leading) = split_gap(gap);
            trivia[index - 1].1 = trailing.to_string();
            trivia[index].0 = leading.to_string();
        }
        previous_end = end;
    }

    if let Some(last) = trivia.last_mut() {
        last.1.push_str(&text[previous_end..]);
    }
    trivia
}

/// True when `text` ends in a line break (`\n`, `\r\n` or a lone `\r`).
pub fn ends_with_line_break(text: &str) -> bool {
    text.ends_with('\n') || text.ends_with('\r')
}

/// Splits the final line break off `text`, returning `(rest, line_break)`.
pub fn strip_last_line_break(text: &str) -> Option<(&str, &str)> {
    let break_len = if text.ends_with("\r\n") {
        2
    } else if ends_with_line_break(text) {
        1
    } else {
        return None;
    };
    Some(text.split_at(text.len() - break_len))
}

/// The whitespace that starts the last line of a token's leading trivia.
///
/// Returns an empty string when that line holds anything but spaces or tabs.
pub fn indentation_of(leading: &str) -> &str {
    let last_line = match leading.rfind(['\n', '\r']) {
        Some(index) => &leading[index + 1..],
        None => leading,
    };
    if last_line.chars().all(|c| c == ' ' || c == '\t') {
        last_line
    } else {
        ""
    }
}

/// True when the trivia contains a line comment.
pub fn has_comment(trivia: &str) -> bool {
    trivia.contains("//") || trivia.contains('#')
}

fn first_line_break_end(text: &str) -> Option<usize> {
    let index = text.find(['\n', '\r'])?;
    if text[index..].starts_with("\r\n") {
        Some(index + 2)
    } else {
        Some(index + 1)
    }
}
