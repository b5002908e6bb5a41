//! Styled-span representation produced by [`decorate`](super::decorate).

/// Kind of code formatting applied to a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeStyle {
    /// Backtick-delimited span inside running text.
    Inline,
    /// Fenced, possibly multi-line, block.
    Block,
}

impl CodeStyle {
    fn html_tags(self) -> (&'static str, &'static str) {
        match self {
            CodeStyle::Inline => ("<code>", "</code>"),
            CodeStyle::Block => ("<pre>", "</pre>"),
        }
    }
}

/// Formatting flags of one span. Flags accumulate when markup nests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub code: Option<CodeStyle>,
}

impl Style {
    /// Add the emphasis denoted by a delimiter of `len` asterisks.
    pub(crate) fn with_emphasis(self, len: usize) -> Self {
        Self {
            bold: self.bold || len >= 2,
            italic: self.italic || len == 1 || len == 3,
            ..self
        }
    }

    pub(crate) fn with_code(self, code: CodeStyle) -> Self {
        Self {
            code: Some(code),
            ..self
        }
    }

    pub fn is_plain(&self) -> bool {
        *self == Style::default()
    }
}

/// A run of text sharing one [`Style`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: Style,
}

/// Decorated text: an ordered list of non-empty spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    spans: Vec<Span>,
}

impl RichText {
    /// Append `text`, merging with the previous span when the style matches.
    pub(crate) fn push(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.spans.last_mut() {
            if last.style == style {
                last.text.push_str(text);
                return;
            }
        }
        self.spans.push(Span {
            text: text.to_string(),
            style,
        });
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// `true` when no span carries any formatting.
    pub fn is_plain(&self) -> bool {
        self.spans.iter().all(|s| s.style.is_plain())
    }

    /// The text with all markup removed.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Render as an HTML fragment.
    ///
    /// Text is escaped; formatting maps to `<b>`, `<i>`, `<code>` and
    /// `<pre>`. Consecutive spans of one code kind share a single `<code>`
    /// or `<pre>`, with emphasis inside it. Otherwise bold is outermost.
    ///
    /// ```
    /// use speakflow::decorate::decorate;
    ///
    /// assert_eq!(
    ///     decorate("***hey*** <you>").to_html(),
    ///     "<b><i>hey</i></b> &lt;you&gt;"
    /// );
    /// ```
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let mut open_code = None;
        for span in &self.spans {
            if span.style.code != open_code {
                if let Some(code) = open_code {
                    html.push_str(code.html_tags().1);
                }
                if let Some(code) = span.style.code {
                    html.push_str(code.html_tags().0);
                }
                open_code = span.style.code;
            }

            let mut inner = escape_html(&span.text);
            if span.style.italic {
                inner = format!("<i>{inner}</i>");
            }
            if span.style.bold {
                inner = format!("<b>{inner}</b>");
            }
            html.push_str(&inner);
        }
        if let Some(code) = open_code {
            html.push_str(code.html_tags().1);
        }
        html
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorate::decorate;

    #[test]
    fn emphasis_lengths_map_to_flags() {
        let base = Style::default();
        assert_eq!(
            base.with_emphasis(1),
            Style {
                italic: true,
                ..base
            }
        );
        assert_eq!(base.with_emphasis(2), Style { bold: true, ..base });
        assert_eq!(
            base.with_emphasis(3),
            Style {
                bold: true,
                italic: true,
                ..base
            }
        );
    }

    #[test]
    fn push_merges_runs_of_equal_style() {
        let mut rich = RichText::default();
        rich.push("a", Style::default());
        rich.push("b", Style::default());
        rich.push("", Style::default());
        let code = Style::default().with_code(CodeStyle::Inline);
        rich.push("x", code);
        rich.push("y", code);
        rich.push("z", code.with_emphasis(1));

        assert_eq!(rich.spans().len(), 3);
        assert_eq!(rich.spans()[0].text, "ab");
        assert_eq!(rich.spans()[1].text, "xy");
    }

    #[test]
    fn html_escapes_code_blocks() {
        let html = decorate("```\nif a < b && c {}\n```").to_html();
        assert_eq!(html, "<pre>if a &lt; b &amp;&amp; c {}</pre>");
    }

    #[test]
    fn html_of_inline_code_inside_bold() {
        let html = decorate("**use `ls`**").to_html();
        assert_eq!(html, "<b>use </b><code><b>ls</b></code>");
    }

    #[test]
    fn html_keeps_one_wrapper_around_styled_code() {
        let html = decorate("see `a **b** c` and ```x\n***y***```").to_html();
        assert_eq!(
            html,
            "see <code>a <b>b</b> c</code> and <pre>x\n<b><i>y</i></b></pre>"
        );
    }

    #[test]
    fn plain_text_drops_markers() {
        assert_eq!(decorate("**hi** and *there*").plain_text(), "hi and there");
    }
}
