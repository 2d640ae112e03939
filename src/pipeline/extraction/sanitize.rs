/// Sanitize extracted text before passing downstream.
/// Strips control characters and zero-width marks, collapses whitespace runs
/// within each line, drops blank lines. Letters and combining marks of any
/// script (Devanagari matras included) are preserved.
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !is_stripped(*c))
        .collect::<String>()
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_stripped(c: char) -> bool {
    (c.is_control() && c != '\n' && c != '\t')
        || matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{2060}')
}
