use clap::{ArgAction, Parser};
use pup::{Config, Display};
use std::path::PathBuf;

/// Command line parser for the `pup` binary.
#[derive(Debug, Parser)]
#[command(
    name = "pup",
    version,
    disable_version_flag = true,
    about = "Filter and format HTML with CSS-like selectors"
)]
pub struct Cli {
    /// Print result with color
    #[arg(short, long)]
    pub color: bool,

    /// File to read from (defaults to stdin)
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Number of spaces to use for indent
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub indent: usize,

    /// Print number of elements selected
    #[arg(short = 'n', long)]
    pub number: bool,

    /// Restrict number of levels printed
    #[arg(short, long, value_name = "N")]
    pub limit: Option<usize>,

    /// Don't escape html
    #[arg(short, long)]
    pub plain: bool,

    /// Preserve preformatted text
    #[arg(long)]
    pub pre: bool,

    /// Specify the charset for pup to use
    #[arg(long, value_name = "LABEL")]
    pub charset: Option<String>,

    /// Invert the selection: print the document minus the matches
    #[arg(short = 'x', long)]
    pub invert: bool,

    /// Log debug information to stderr
    #[arg(long)]
    pub verbose: bool,

    /// Display version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Selectors, optionally ending with a display directive
    #[arg(value_name = "SELECTOR")]
    pub selectors: Vec<String>,
}

impl Cli {
    /// Bundles the output options into one `Config`.
    pub fn config(&self) -> Config {
        Config {
            charset: self.charset.clone(),
            max_print_level: self.limit,
            preformatted: self.pre,
            color: self.color,
            escape_html: !self.plain,
            indent: " ".repeat(self.indent),
            invert: self.invert,
            display: if self.number {
                Display::Count
            } else {
                Display::Tree
            },
        }
    }

    /// Splits the positional arguments into selector tokens.
    pub fn tokens(&self) -> Vec<String> {
        split_tokens(&self.selectors.join(" "))
    }
}

/// Splits on whitespace outside `[...]`, `(...)` and quotes. A `,` outside
/// those is always a token of its own.
pub fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(",".to_string());
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn clap_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_split_commas() {
        for text in ["link,a", "link ,a", "link , a", " link,  a "] {
            assert_eq!(split_tokens(text), vec!["link", ",", "a"], "{:?}", text);
        }
    }

    #[test]
    fn test_split_keeps_brackets_together() {
        assert_eq!(
            split_tokens(r#"a[title="a, b c"] li:not( .x ) text{}"#),
            vec![r#"a[title="a, b c"]"#, "li:not( .x )", "text{}"]
        );
        assert_eq!(
            split_tokens("li:nth-child(2n + 1), p"),
            vec!["li:nth-child(2n + 1)", ",", "p"]
        );
    }

    #[test]
    fn test_split_combinators() {
        assert_eq!(
            split_tokens("#toc div + ul > li"),
            vec!["#toc", "div", "+", "ul", ">", "li"]
        );
    }

    #[test]
    fn test_config_from_flags() {
        let cli = Cli::try_parse_from(["pup", "-i", "4", "-n", "-p", "-l", "3", "ul", "li"])
            .unwrap();
        let config = cli.config();
        assert_eq!(config.indent, "    ");
        assert_eq!(config.display, Display::Count);
        assert!(!config.escape_html);
        assert_eq!(config.max_print_level, Some(3));
        assert_eq!(cli.tokens(), vec!["ul", "li"]);
    }

    #[test]
    fn test_config_defaults() {
        let cli = Cli::try_parse_from(["pup"]).unwrap();
        assert_eq!(cli.config(), Config::default());
        assert!(cli.tokens().is_empty());
    }
}
