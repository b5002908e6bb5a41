//! ANSI terminal rendering of [`RichText`].

use crate::decorate::{CodeStyle, RichText, Span, Style};

const RESET: &str = "\x1b[0m";

fn escape_codes(style: &Style) -> String {
    let mut codes = Vec::new();
    if style.bold {
        codes.push("1");
    }
    if style.italic {
        codes.push("3");
    }
    match style.code {
        Some(CodeStyle::Inline) => codes.push("36"),
        Some(CodeStyle::Block) => codes.push("2"),
        None => {}
    }
    format!("\x1b[{}m", codes.join(";"))
}

/// Render `text` with ANSI SGR escapes: bold, italic, cyan inline code and
/// dimmed code blocks on their own lines. Plain spans are emitted verbatim.
///
/// ```
/// use speakflow::console::render_ansi;
/// use speakflow::decorate::decorate;
///
/// assert_eq!(render_ansi(&decorate("a **b**")), "a \x1b[1mb\x1b[0m");
/// ```
pub fn render_ansi(text: &RichText) -> String {
    let spans = text.spans();
    let is_block = |span: &Span| span.style.code == Some(CodeStyle::Block);
    let mut out = String::new();

    for (i, span) in spans.iter().enumerate() {
        if span.style.is_plain() {
            out.push_str(&span.text);
            continue;
        }

        let block = is_block(span);
        let opens_block = block && (i == 0 || !is_block(&spans[i - 1]));
        let closes_block = block && !spans.get(i + 1).is_some_and(is_block);

        if opens_block && !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&escape_codes(&span.style));
        out.push_str(&span.text);
        out.push_str(RESET);
        if closes_block {
            out.push('\n');
        }
    }
    out
}
