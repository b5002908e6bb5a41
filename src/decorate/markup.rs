//! Inline markup parser.
//!
//! | Source            | Result              |
//! |-------------------|---------------------|
//! | `***text***`      | bold + italic       |
//! | `**text**`        | bold                |
//! | `*text*`          | italic              |
//! | ```` ```code``` ```` | code block (may span lines) |
//! | `` `code` ``      | inline code         |
//!
//! Delimiters are matched one kind at a time, in the order of the table.
//! A later kind may enclose spans matched earlier but never cuts through
//! one, so `` `a *b` c* `` is italic from `b` on and the backticks stay
//! literal. Emphasis therefore also applies inside code. Emphasis and inline
//! code never cross a line break. A delimiter is a run of exactly its own
//! length; one without a matching closer, or enclosing nothing, stays
//! literal.

use super::rich::{CodeStyle, RichText, Style};

/// Translate `text` into styled spans.
///
/// Decoration is one-way: feed it source text, never its own output.
///
/// ```
/// use speakflow::decorate::decorate;
///
/// let rich = decorate("**hi** and *there*");
/// let spans = rich.spans();
/// assert_eq!(spans.len(), 3);
/// assert!(spans[0].style.bold);
/// assert_eq!(spans[1].text, " and ");
/// assert!(spans[2].style.italic);
/// ```
pub fn decorate(text: &str) -> RichText {
    let mut nodes = vec![Node::Text(text)];
    for kind in PRECEDENCE {
        nodes = apply(nodes, kind);
    }

    let mut out = RichText::default();
    emit(&nodes, Style::default(), &mut out);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// Run of 1 to 3 asterisks.
    Emphasis(usize),
    Fence,
    InlineCode,
}

const PRECEDENCE: [Kind; 5] = [
    Kind::Emphasis(3),
    Kind::Emphasis(2),
    Kind::Emphasis(1),
    Kind::Fence,
    Kind::InlineCode,
];

impl Kind {
    fn marker(self) -> u8 {
        match self {
            Kind::Emphasis(_) => b'*',
            Kind::Fence | Kind::InlineCode => b'`',
        }
    }

    fn run(self) -> usize {
        match self {
            Kind::Emphasis(len) => len,
            Kind::Fence => 3,
            Kind::InlineCode => 1,
        }
    }

    fn is_code(self) -> bool {
        matches!(self, Kind::Fence | Kind::InlineCode)
    }
}

#[derive(Debug)]
enum Node<'a> {
    Text(&'a str),
    Span(Kind, Vec<Node<'a>>),
}

impl Node<'_> {
    fn contains_newline(&self) -> bool {
        match self {
            Node::Text(text) => text.contains('\n'),
            Node::Span(_, children) => children.iter().any(Node::contains_newline),
        }
    }
}

/// A node list with the delimiters of one kind split out of its text.
enum Item<'a> {
    Delim(&'a str),
    Node(Node<'a>),
}

impl<'a> Item<'a> {
    fn into_node(self) -> Node<'a> {
        match self {
            Item::Delim(text) => Node::Text(text),
            Item::Node(node) => node,
        }
    }
}

/// Match `kind` everywhere in `nodes`, inside existing spans first.
/// Code content is not searched for further code.
fn apply(nodes: Vec<Node<'_>>, kind: Kind) -> Vec<Node<'_>> {
    let nodes = nodes
        .into_iter()
        .map(|node| match node {
            Node::Span(outer, children) if !(outer.is_code() && kind.is_code()) => {
                Node::Span(outer, apply(children, kind))
            }
            other => other,
        })
        .collect();

    let mut items: Vec<Option<Item<'_>>> =
        split_delims(nodes, kind).into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(items.len());
    let mut i = 0;

    while i < items.len() {
        if matches!(items[i], Some(Item::Delim(_))) {
            if let Some(close) = find_close(&items, i + 1, kind) {
                let mut children: Vec<Node<'_>> = items[i + 1..close]
                    .iter_mut()
                    .filter_map(Option::take)
                    .map(Item::into_node)
                    .collect();
                if kind == Kind::Fence {
                    trim_fence_newlines(&mut children);
                }
                out.push(Node::Span(kind, children));
                i = close + 1;
                continue;
            }
        }
        if let Some(item) = items[i].take() {
            out.push(item.into_node());
        }
        i += 1;
    }
    out
}

fn split_delims(nodes: Vec<Node<'_>>, kind: Kind) -> Vec<Item<'_>> {
    let marker = kind.marker();
    let mut items = Vec::new();

    for node in nodes {
        let Node::Text(text) = node else {
            items.push(Item::Node(node));
            continue;
        };

        let bytes = text.as_bytes();
        let mut literal_start = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != marker {
                i += 1;
                continue;
            }
            let run = bytes[i..].iter().take_while(|&&b| b == marker).count();
            if run == kind.run() {
                if literal_start < i {
                    items.push(Item::Node(Node::Text(&text[literal_start..i])));
                }
                items.push(Item::Delim(&text[i..i + run]));
                literal_start = i + run;
            }
            i += run;
        }
        if literal_start < text.len() {
            items.push(Item::Node(Node::Text(&text[literal_start..])));
        }
    }
    items
}

/// Index of the next delimiter after `from`, provided it encloses at least
/// one item and, for single-line kinds, no line break.
fn find_close(items: &[Option<Item<'_>>], from: usize, kind: Kind) -> Option<usize> {
    for (j, item) in items.iter().enumerate().skip(from) {
        match item {
            Some(Item::Delim(_)) => return (j > from).then_some(j),
            Some(Item::Node(node)) if kind != Kind::Fence && node.contains_newline() => {
                return None;
            }
            _ => {}
        }
    }
    None
}

fn trim_fence_newlines(children: &mut [Node<'_>]) {
    if let Some(Node::Text(first)) = children.first_mut() {
        let text: &str = *first;
        *first = text.strip_prefix('\n').unwrap_or(text);
    }
    if let Some(Node::Text(last)) = children.last_mut() {
        let text: &str = *last;
        *last = text.strip_suffix('\n').unwrap_or(text);
    }
}

fn emit(nodes: &[Node<'_>], style: Style, out: &mut RichText) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push(text, style),
            Node::Span(Kind::Emphasis(len), children) => {
                emit(children, style.with_emphasis(*len), out)
            }
            Node::Span(Kind::Fence, children) => {
                emit(children, style.with_code(CodeStyle::Block), out)
            }
            Node::Span(Kind::InlineCode, children) => {
                emit(children, style.with_code(CodeStyle::Inline), out)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
