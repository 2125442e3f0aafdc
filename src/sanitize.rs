// src/sanitize.rs

//! Allow-list sanitization of model-generated HTML fragments.
//!
//! The upstream model is only ever asked for small snippets, so instead of a
//! browser-grade DOM library this uses a minimal fragment parser plus an
//! explicit allow-list tree-walk:
//!
//! * Elements outside the allow-list are replaced by their flattened text
//!   content (so `<script>` bodies survive only as inert text).
//! * Allowed elements lose every `on*` event-handler attribute and any
//!   `href` pointing at the `javascript:` scheme.
//! * Text nodes pass through unchanged and are entity-escaped on output,
//!   which makes sanitization idempotent.

/// Tags the sanitizer keeps. Everything else is collapsed to text.
const ALLOWED_TAGS: &[&str] = &["p", "ul", "li", "em", "strong", "br", "h3"];

/// Tags that never have children and are serialized without a close tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img"];

/// A node in the parsed fragment tree.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Element {
        tag: String,
        attrs: Vec<(String, Option<String>)>,
        children: Vec<Node>,
    },
}

/// Sanitizes an HTML fragment down to the fixed allow-list.
///
/// Parses the input, walks the tree depth-first applying the allow-list
/// policy, and serializes back to a fragment string. Running the result
/// through this function again yields the same string.
pub fn sanitize_fragment(input: &str) -> String {
    let nodes = parse_fragment(input);
    let clean: Vec<Node> = nodes.into_iter().map(sanitize_node).collect();

    let mut out = String::with_capacity(input.len());
    for node in &clean {
        serialize_node(node, &mut out);
    }
    out
}

fn is_allowed_tag(tag: &str) -> bool {
    ALLOWED_TAGS.contains(&tag)
}

fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Attribute names matching `on` + letters (onclick, onLoad, ...).
/// Names are lowercased by the parser, so a plain prefix check suffices.
fn is_event_handler(name: &str) -> bool {
    name.len() > 2
        && name.starts_with("on")
        && name[2..].chars().all(|c| c.is_ascii_alphabetic())
}

/// True when an attribute value resolves to the `javascript:` scheme.
/// Whitespace and control characters are ignored before matching, since
/// browsers tolerate `java\nscript:` style obfuscation.
fn is_javascript_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect();
    compact.to_ascii_lowercase().starts_with("javascript:")
}

fn keep_attribute(name: &str, value: &Option<String>) -> bool {
    if is_event_handler(name) {
        return false;
    }
    if name == "href" {
        if let Some(v) = value {
            if is_javascript_url(v) {
                return false;
            }
        }
    }
    true
}

fn sanitize_node(node: Node) -> Node {
    match node {
        Node::Text(text) => Node::Text(text),
        Node::Element {
            tag,
            attrs,
            children,
        } => {
            if !is_allowed_tag(&tag) {
                // The flattened text already subsumes the children, so this
                // branch is not traversed further.
                let mut text = String::new();
                flatten_text(&children, &mut text);
                return Node::Text(text);
            }

            let attrs = attrs
                .into_iter()
                .filter(|(name, value)| keep_attribute(name, value))
                .collect();
            let children = children.into_iter().map(sanitize_node).collect();

            Node::Element {
                tag,
                attrs,
                children,
            }
        }
    }
}

fn flatten_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element { children, .. } => flatten_text(children, out),
        }
    }
}

// --- Serialization ---

fn serialize_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => escape_text(text, out),
        Node::Element {
            tag,
            attrs,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                if let Some(value) = value {
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
            }
            out.push('>');

            if !is_void_tag(tag) {
                for child in children {
                    serialize_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

// --- Fragment parser ---

/// Parses an HTML fragment into a node tree.
///
/// Deliberately forgiving: a `<` that does not start a tag is literal text,
/// stray close tags are dropped, and elements left open at end of input are
/// closed implicitly. Comments are discarded.
fn parse_fragment(input: &str) -> Vec<Node> {
    let mut parser = Parser { input, pos: 0 };
    let mut builder = TreeBuilder::new();

    while let Some(token) = parser.next_token() {
        match token {
            Token::Text(text) => builder.push_text(text),
            Token::Open {
                tag,
                attrs,
                self_closing,
            } => {
                if self_closing || is_void_tag(&tag) {
                    builder.push_node(Node::Element {
                        tag,
                        attrs,
                        children: Vec::new(),
                    });
                } else {
                    builder.open(tag, attrs);
                }
            }
            Token::Close(tag) => builder.close(&tag),
        }
    }

    builder.finish()
}

enum Token {
    Text(String),
    Open {
        tag: String,
        attrs: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    Close(String),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.bump();
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        if self.pos >= self.input.len() {
            return None;
        }

        if self.rest().starts_with("<!--") {
            self.skip_comment();
            return self.next_token();
        }

        if self.rest().starts_with('<') {
            let after = self.rest()[1..].chars().next();
            match after {
                Some('/') => {
                    if let Some(token) = self.parse_close_tag() {
                        return Some(token);
                    }
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    if let Some(token) = self.parse_open_tag() {
                        return Some(token);
                    }
                }
                _ => {}
            }
            // Not a tag after all; emit the `<` as literal text together
            // with whatever plain text follows it.
            let start = self.pos;
            self.bump();
            self.consume_text();
            return Some(Token::Text(decode_entities(&self.input[start..self.pos])));
        }

        let start = self.pos;
        self.consume_text();
        Some(Token::Text(decode_entities(&self.input[start..self.pos])))
    }

    fn consume_text(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '<' {
                break;
            }
            self.bump();
        }
    }

    fn skip_comment(&mut self) {
        match self.rest().find("-->") {
            Some(end) => self.pos += end + 3,
            None => self.pos = self.input.len(),
        }
    }

    fn parse_tag_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric())
        {
            self.bump();
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    /// Parses `</name ... >`. Returns None on malformed input, leaving the
    /// caller to treat the `<` as text.
    fn parse_close_tag(&mut self) -> Option<Token> {
        let saved = self.pos;
        self.pos += 2; // "</"
        let name = self.parse_tag_name();
        if name.is_empty() {
            self.pos = saved;
            return None;
        }
        match self.rest().find('>') {
            Some(end) => {
                self.pos += end + 1;
                Some(Token::Close(name))
            }
            None => {
                // Truncated close tag at end of input; swallow it.
                self.pos = self.input.len();
                Some(Token::Close(name))
            }
        }
    }

    fn parse_open_tag(&mut self) -> Option<Token> {
        self.pos += 1; // "<"
        let tag = self.parse_tag_name();

        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') => {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => {
                    if let Some(attr) = self.parse_attribute() {
                        attrs.push(attr);
                    }
                }
            }
        }

        Some(Token::Open {
            tag,
            attrs,
            self_closing,
        })
    }

    fn parse_attribute(&mut self) -> Option<(String, Option<String>)> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() || ch == '=' || ch == '>' || ch == '/' {
                break;
            }
            self.bump();
        }
        if self.pos == start {
            // Stuck on a character the name loop refuses; consume it so the
            // tag loop makes progress.
            self.bump();
            return None;
        }
        let name = self.input[start..self.pos].to_ascii_lowercase();

        self.skip_whitespace();
        if self.peek() != Some('=') {
            return Some((name, None));
        }
        self.bump();
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                while let Some(ch) = self.peek() {
                    if ch == quote {
                        break;
                    }
                    self.bump();
                }
                let raw = &self.input[start..self.pos];
                self.bump(); // closing quote, if any
                raw.to_string()
            }
            _ => {
                let start = self.pos;
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_whitespace() || ch == '>' {
                        break;
                    }
                    self.bump();
                }
                self.input[start..self.pos].to_string()
            }
        };

        Some((name, Some(decode_entities(&value))))
    }
}

/// Builds the node tree from the token stream, holding currently-open
/// elements on a stack.
struct TreeBuilder {
    roots: Vec<Node>,
    stack: Vec<(String, Vec<(String, Option<String>)>, Vec<Node>)>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            roots: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some((_, _, children)) => children.push(node),
            None => self.roots.push(node),
        }
    }

    fn push_text(&mut self, text: String) {
        if !text.is_empty() {
            self.push_node(Node::Text(text));
        }
    }

    fn open(&mut self, tag: String, attrs: Vec<(String, Option<String>)>) {
        self.stack.push((tag, attrs, Vec::new()));
    }

    /// Closes the nearest matching open element, implicitly closing anything
    /// opened inside it. A close tag with no matching open is ignored.
    fn close(&mut self, tag: &str) {
        let Some(depth) = self.stack.iter().rposition(|(open, _, _)| open == tag) else {
            return;
        };
        while self.stack.len() > depth {
            self.pop_element();
        }
    }

    fn pop_element(&mut self) {
        if let Some((tag, attrs, children)) = self.stack.pop() {
            self.push_node(Node::Element {
                tag,
                attrs,
                children,
            });
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while !self.stack.is_empty() {
            self.pop_element();
        }
        self.roots
    }
}

/// Decodes the handful of character references the serializer emits (plus
/// numeric references). Unknown references are kept literally.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let Some(semi) = rest[1..].find(';').map(|i| i + 1) else {
            out.push_str(rest);
            return out;
        };
        let entity = &rest[1..semi];

        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => decode_numeric_entity(entity),
        };

        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}
