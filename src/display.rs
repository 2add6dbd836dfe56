use crate::config::Config;
use crate::dom_tree::{Node, NodeData, NodeId};
use crate::error::Result;
use crate::Document;
use lazy_static::lazy_static;
use owo_colors::OwoColorize;
use regex::Regex;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::io::Write;

/// Output formats for the selected nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Display {
    /// The nodes as indented html.
    Tree,
    /// Text nodes only, one per line.
    Text,
    /// The value of one attribute, one per line.
    Attr(String),
    /// A JSON array mirroring the tree structure.
    Json,
    /// The number of selected nodes.
    Count,
}

lazy_static! {
    static ref RE_ATTR_DIRECTIVE: Regex = Regex::new(r"^attr\{([a-zA-Z\-]+)\}$").unwrap();
    static ref RE_DIRECTIVE_SHAPE: Regex = Regex::new(r"^[a-zA-Z]+\{.*\}$").unwrap();
}

/// Tags that never have an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

fn is_void_element(node: &Node) -> bool {
    node.tag_name()
        .map_or(false, |tag| VOID_ELEMENTS.contains(&tag))
}

fn in_script(node: &Node) -> bool {
    node.parent().map_or(false, |parent| parent.has_tag("script"))
}

/// Escapes `&`, `'`, `<`, `>` and `"`.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl Display {
    /// Parses a display directive such as `text{}`, `json{}` or `attr{href}`.
    pub fn parse(token: &str) -> Option<Display> {
        match token {
            "text{}" => return Some(Display::Text),
            "json{}" => return Some(Display::Json),
            _ => {}
        }

        RE_ATTR_DIRECTIVE
            .captures(token)
            .and_then(|caps| caps.get(1))
            .map(|name| Display::Attr(name.as_str().to_string()))
    }

    /// Whether the token has the `name{...}` shape of a display directive.
    pub fn looks_like_directive(token: &str) -> bool {
        RE_DIRECTIVE_SHAPE.is_match(token)
    }

    /// Writes `nodes` of `document` in this format.
    pub fn render<W: Write>(
        &self,
        w: &mut W,
        document: &Document,
        nodes: &[NodeId],
        config: &Config,
    ) -> Result<()> {
        let nodes: Vec<Node> = nodes.iter().map(|id| document.node(id)).collect();

        match self {
            Display::Tree => {
                let printer = TreePrinter { config };
                for node in &nodes {
                    printer.print_node(w, node, 0)?;
                }
            }
            Display::Text => {
                for node in &nodes {
                    print_text(w, node, config)?;
                }
            }
            Display::Attr(name) => {
                for node in &nodes {
                    for attr in node.attrs().iter().filter(|a| &*a.name.local == name) {
                        writeln!(w, "{}", escape(&attr.value, config))?;
                    }
                }
            }
            Display::Json => {
                let list = Value::Array(nodes.iter().map(|node| jsonify(node, config)).collect());
                let formatter = PrettyFormatter::with_indent(config.indent.as_bytes());
                let mut ser = serde_json::Serializer::with_formatter(&mut *w, formatter);
                list.serialize(&mut ser)?;
                writeln!(w)?;
            }
            Display::Count => writeln!(w, "{}", nodes.len())?,
        }

        Ok(())
    }
}

fn escape(s: &str, config: &Config) -> String {
    if config.escape_html {
        escape_html(s)
    } else {
        s.to_string()
    }
}

/// Escapes text unless it is the content of a script.
fn escape_text(node: &Node, s: &str, config: &Config) -> String {
    if in_script(node) {
        s.to_string()
    } else {
        escape(s, config)
    }
}

struct TreePrinter<'c> {
    config: &'c Config,
}

impl<'c> TreePrinter<'c> {
    fn print_indent<W: Write>(&self, w: &mut W, level: usize) -> Result<()> {
        for _ in 0..level {
            w.write_all(self.config.indent.as_bytes())?;
        }
        Ok(())
    }

    fn print_open_tag<W: Write>(&self, w: &mut W, node: &Node, tag: &str) -> Result<()> {
        let color = self.config.color;
        if color {
            write!(w, "{}{}", "<".cyan(), tag.cyan())?;
        } else {
            write!(w, "<{}", tag)?;
        }

        for attr in node.attrs() {
            let value = escape(&attr.value, self.config);
            if color {
                write!(
                    w,
                    " {}{}{}",
                    (&*attr.name.local).magenta(),
                    "=".cyan(),
                    format!("\"{}\"", value).blue()
                )?;
            } else {
                write!(w, " {}=\"{}\"", &*attr.name.local, value)?;
            }
        }

        if color {
            write!(w, "{}", ">".cyan())?;
        } else {
            write!(w, ">")?;
        }
        Ok(())
    }

    fn print_close_tag<W: Write>(&self, w: &mut W, tag: &str) -> Result<()> {
        if self.config.color {
            writeln!(w, "{}{}{}", "</".cyan(), tag.cyan(), ">".cyan())?;
        } else {
            writeln!(w, "</{}>", tag)?;
        }
        Ok(())
    }

    fn print_node<W: Write>(&self, w: &mut W, node: &Node, level: usize) -> Result<()> {
        match node.data() {
            NodeData::Text { contents } => {
                let text = escape_text(node, contents, self.config);
                let text = text.trim();
                if !text.is_empty() {
                    self.print_indent(w, level)?;
                    writeln!(w, "{}", text)?;
                }
            }
            NodeData::Element(element) => {
                let tag = &*element.name.local;
                self.print_indent(w, level)?;
                if tag == "pre" && self.config.preformatted && !self.config.color {
                    self.print_pre(w, node)?;
                    writeln!(w)?;
                    return Ok(());
                }

                self.print_open_tag(w, node, tag)?;
                writeln!(w)?;
                if !is_void_element(node) {
                    self.print_children(w, node, level + 1)?;
                    self.print_indent(w, level)?;
                    self.print_close_tag(w, tag)?;
                }
            }
            NodeData::Comment { contents } => {
                self.print_indent(w, level)?;
                let comment = format!("<!--{}-->", escape(contents, self.config));
                if self.config.color {
                    writeln!(w, "{}", comment.yellow())?;
                } else {
                    writeln!(w, "{}", comment)?;
                }
            }
            NodeData::Document | NodeData::Doctype { .. } => {
                self.print_children(w, node, level)?;
            }
            NodeData::ProcessingInstruction { .. } => {}
        }
        Ok(())
    }

    fn print_children<W: Write>(&self, w: &mut W, node: &Node, level: usize) -> Result<()> {
        if let Some(max) = self.config.max_print_level {
            if level >= max {
                self.print_indent(w, level)?;
                writeln!(w, "...")?;
                return Ok(());
            }
        }

        for child in node.children() {
            self.print_node(w, &child, level)?;
        }
        Ok(())
    }

    /// Writes the subtree as it was written in the source, without
    /// indentation or trimming.
    fn print_pre<W: Write>(&self, w: &mut W, node: &Node) -> Result<()> {
        match node.data() {
            NodeData::Text { contents } => {
                write!(w, "{}", escape_text(node, contents, self.config))?;
            }
            NodeData::Element(element) => {
                let tag = &*element.name.local;
                self.print_open_tag(w, node, tag)?;
                if !is_void_element(node) {
                    for child in node.children() {
                        self.print_pre(w, &child)?;
                    }
                    write!(w, "</{}>", tag)?;
                }
            }
            NodeData::Comment { contents } => {
                writeln!(w, "<!--{}-->", escape(contents, self.config))?;
            }
            NodeData::Document | NodeData::Doctype { .. } => {
                for child in node.children() {
                    self.print_pre(w, &child)?;
                }
            }
            NodeData::ProcessingInstruction { .. } => {}
        }
        Ok(())
    }
}

/// Writes every text node of the subtree, untrimmed, one per line.
fn print_text<W: Write>(w: &mut W, node: &Node, config: &Config) -> Result<()> {
    for node in std::iter::once(*node).chain(node.descendants()) {
        if let NodeData::Text { contents } = node.data() {
            writeln!(w, "{}", escape_text(&node, contents, config))?;
        }
    }
    Ok(())
}

/// Appends `text` to the string stored under `key`, separated by a space.
fn append_joined(vals: &mut Map<String, Value>, key: &str, text: String) {
    let joined = match vals.get(key) {
        Some(Value::String(current)) => format!("{} {}", current, text),
        _ => text,
    };
    vals.insert(key.to_string(), Value::String(joined));
}

fn jsonify(node: &Node, config: &Config) -> Value {
    let mut vals = Map::new();
    for attr in node.attrs() {
        vals.insert(
            attr.name.local.to_string(),
            Value::String(escape(&attr.value, config)),
        );
    }
    vals.insert(
        "tag".to_string(),
        Value::String(node.tag_name().unwrap_or_default().to_string()),
    );

    let mut children = vec![];
    for child in node.children() {
        match child.data() {
            NodeData::Element(_) => children.push(jsonify(&child, config)),
            NodeData::Text { contents } => {
                let text = contents.trim();
                if !text.is_empty() {
                    let text = if node.has_tag("script") {
                        text.to_string()
                    } else {
                        escape(text, config)
                    };
                    append_joined(&mut vals, "text", text);
                }
            }
            NodeData::Comment { contents } => {
                append_joined(&mut vals, "comment", escape(contents.trim(), config));
            }
            _ => {}
        }
    }

    if !children.is_empty() {
        vals.insert("children".to_string(), Value::Array(children));
    }

    Value::Object(vals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(html: &str, sel: &str, display: Display, config: &Config) -> String {
        let doc = Document::from(html);
        let nodes = doc.select(sel).unwrap().ids();
        let mut out = vec![];
        display.render(&mut out, &doc, &nodes, config).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_directive() {
        assert_eq!(Display::parse("text{}"), Some(Display::Text));
        assert_eq!(Display::parse("json{}"), Some(Display::Json));
        assert_eq!(
            Display::parse("attr{data-id}"),
            Some(Display::Attr("data-id".to_string()))
        );
        assert_eq!(Display::parse("attr{}"), None);
        assert_eq!(Display::parse("li"), None);
        assert!(Display::looks_like_directive("bogus{}"));
        assert!(!Display::looks_like_directive("li.x"));
    }

    #[test]
    fn test_directive_patterns() {
        let caps = RE_ATTR_DIRECTIVE.captures("attr{aria-label}").unwrap();
        assert_eq!(&caps[1], "aria-label");
        assert!(!RE_ATTR_DIRECTIVE.is_match("attr{href} "));
        assert!(RE_DIRECTIVE_SHAPE.is_match("text{x}"));
        assert!(!RE_DIRECTIVE_SHAPE.is_match("a[x={}]"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&#34;x&#34;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_tree() {
        let out = render(
            r#"<ul class="x"><li>1</li><li>a &amp; b<br></li></ul>"#,
            "ul",
            Display::Tree,
            &Config::default(),
        );
        assert_eq!(
            out,
            "<ul class=\"x\">\n <li>\n  1\n </li>\n <li>\n  a &amp; b\n  <br>\n </li>\n</ul>\n"
        );
    }

    #[test]
    fn test_tree_limit_and_indent() {
        let config = Config {
            max_print_level: Some(2),
            indent: "  ".to_string(),
            ..Config::default()
        };
        let out = render("<div><p><b>x</b></p></div>", "div", Display::Tree, &config);
        assert_eq!(out, "<div>\n  <p>\n    ...\n  </p>\n</div>\n");
    }

    #[test]
    fn test_tree_comment_and_script() {
        let out = render(
            "<div><!-- c --><script>a < b</script></div>",
            "div",
            Display::Tree,
            &Config::default(),
        );
        assert_eq!(
            out,
            "<div>\n <!-- c -->\n <script>\n  a < b\n </script>\n</div>\n"
        );
    }

    #[test]
    fn test_tree_pre() {
        let config = Config {
            preformatted: true,
            ..Config::default()
        };
        let out = render("<pre>  a\n  <b>b</b></pre>", "pre", Display::Tree, &config);
        assert_eq!(out, "<pre>  a\n  <b>b</b></pre>\n");
    }

    #[test]
    fn test_text() {
        let out = render(
            "<ul><li>1</li><li>2</li><li>3</li></ul>",
            "ul li",
            Display::Text,
            &Config::default(),
        );
        assert_eq!(out, "1\n2\n3\n");
    }

    #[test]
    fn test_attr_plain() {
        let html = r#"<a href="/a?x=1&amp;y=2">a</a><a>b</a><a href="/c">c</a>"#;
        let escaped = render(html, "a", Display::Attr("href".to_string()), &Config::default());
        assert_eq!(escaped, "/a?x=1&amp;y=2\n/c\n");

        let config = Config {
            escape_html: false,
            ..Config::default()
        };
        let plain = render(html, "a", Display::Attr("href".to_string()), &config);
        assert_eq!(plain, "/a?x=1&y=2\n/c\n");
    }

    #[test]
    fn test_json() {
        let out = render(
            r#"<div id="d">hello <!-- note --><span>x</span> world</div>"#,
            "div",
            Display::Json,
            &Config::default(),
        );
        let expected = r#"[
 {
  "children": [
   {
    "tag": "span",
    "text": "x"
   }
  ],
  "comment": "note",
  "id": "d",
  "tag": "div",
  "text": "hello world"
 }
]
"#;
        assert_eq!(out, expected);
    }

    #[test]
    fn test_json_empty() {
        let out = render("<p></p>", "a", Display::Json, &Config::default());
        assert_eq!(out, "[]\n");
    }

    #[test]
    fn test_count() {
        let out = render(
            "<ul><li>1</li><li>2</li></ul>",
            "li",
            Display::Count,
            &Config::default(),
        );
        assert_eq!(out, "2\n");
    }
}
