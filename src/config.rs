use crate::display::Display;

/// Options for one run, threaded into the runner and the renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Overrides the input decoding.
    pub charset: Option<String>,
    /// Truncates tree output below this depth.
    pub max_print_level: Option<usize>,
    /// Prints `<pre>` elements verbatim.
    pub preformatted: bool,
    /// Colorizes tree output.
    pub color: bool,
    /// Escapes text and attribute values, except script contents.
    pub escape_html: bool,
    /// Repeated once per indentation level.
    pub indent: String,
    /// Outputs the document minus the matched subtrees.
    pub invert: bool,
    /// Used when the selectors don't end with a display directive.
    pub display: Display,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            charset: None,
            max_print_level: None,
            preformatted: false,
            color: false,
            escape_html: true,
            indent: " ".to_string(),
            invert: false,
            display: Display::Tree,
        }
    }
}
