//! Text tokenization for rules and queries.
//!
//! Both the rule corpus and query texts go through the same word tokenizer so
//! positions line up: lowercase word tokens, a trailing `+` kept (license
//! names like "gpl2+"), punctuation dropped. Rule texts additionally support
//! `{{...}}` template wildcard markup whose content is dropped and recorded
//! as a gap position.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

const TEMPLATE_OPEN: &str = "{{";
const TEMPLATE_CLOSE: &str = "}}";

/// Common words ignored during matching such as HTML tags and XML entities.
pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set = HashSet::new();

    // common XML character references as &quot;
    for &word in &["amp", "apos", "gt", "lt", "nbsp", "quot"] {
        set.insert(word);
    }

    // common html tags as <a href=https://link ...> ... </a>
    for &word in &[
        "a", "abbr", "alt", "blockquote", "body", "br", "class", "div", "em", "h1", "h2", "h3",
        "h4", "h5", "hr", "href", "img", "li", "ol", "p", "pre", "rel", "script", "span", "src",
        "td", "th", "tr", "ul",
    ] {
        set.insert(word);
    }

    // comment line markers
    set.insert("rem"); // batch files
    set.insert("dnl"); // autotools

    // doc book tags as <para>
    set.insert("para");
    set.insert("ulink");

    // HTML punctuations and entities all as &emdash;
    for &word in &[
        "bdquo", "bull", "bullet", "colon", "comma", "emdash", "emsp", "ensp", "ge", "hairsp",
        "ldquo", "ldquor", "le", "lpar", "lsaquo", "lsquo", "lsquor", "mdash", "ndash", "numsp",
        "period", "puncsp", "raquo", "rdquo", "rdquor", "rpar", "rsaquo", "rsquo", "rsquor",
        "sbquo", "semi", "thinsp", "tilde",
    ] {
        set.insert(word);
    }

    // xml char entities
    set.insert("x3c");
    set.insert("x3e");

    set
});

/// Splits on whitespace and punctuation: keep only characters and numbers and
/// `+` when in the middle or end of a word. Unicode-aware.
static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^_\W]+\+?[^_\W]*").expect("invalid word pattern"));

/// Pattern matching words plus the `{{` and `}}` template markers.
static TEMPLATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[^_\W]+\+?[^_\W]*|\{\{|\}\})").expect("invalid template pattern")
});

/// Tokenize text into lowercase word tokens, keeping stopwords.
pub fn word_tokens(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let lowercase = text.to_lowercase();
    WORD_PATTERN
        .find_iter(&lowercase)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Tokenize text into lowercase word tokens, dropping stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    word_tokens(text)
        .into_iter()
        .filter(|token| !STOPWORDS.contains(token.as_str()))
        .collect()
}

/// Tokenized rule text with template gap positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplateTokens {
    /// Token stream with `{{...}}` content removed.
    pub tokens: Vec<String>,
    /// Positions after which a template wildcard permits skipping: the index
    /// of the last token emitted before each `{{...}}` region.
    pub gaps: BTreeSet<usize>,
}

/// Tokenize rule text, dropping the content of `{{...}}` wildcard regions and
/// recording a gap at the last token position before each region.
///
/// Invalid markup (nested, dangling or leading-edge braces that guard no
/// token) is tolerated: a warning is logged and the text is tokenized as if
/// the braces were plain punctuation, yielding no gaps.
pub fn tokenize_template(text: &str) -> TemplateTokens {
    let lowercase = text.to_lowercase();

    let mut tokens: Vec<String> = Vec::new();
    let mut gaps: BTreeSet<usize> = BTreeSet::new();
    let mut in_gap = false;

    for found in TEMPLATE_PATTERN.find_iter(&lowercase) {
        let piece = found.as_str();
        match piece {
            TEMPLATE_OPEN => {
                if in_gap {
                    log::warn!("invalid rule template with nested {{{{ braces: {text:.60}");
                    return plain_template_tokens(text);
                }
                in_gap = true;
                if let Some(last) = tokens.len().checked_sub(1) {
                    gaps.insert(last);
                }
            }
            TEMPLATE_CLOSE => {
                if !in_gap {
                    log::warn!("invalid rule template with dangling }}}} braces: {text:.60}");
                    return plain_template_tokens(text);
                }
                in_gap = false;
            }
            word => {
                // wildcard content is dropped, it matches anything
                if !in_gap && !STOPWORDS.contains(word) {
                    tokens.push(word.to_string());
                }
            }
        }
    }

    if in_gap {
        log::warn!("invalid rule template with unclosed {{{{ braces: {text:.60}");
        return plain_template_tokens(text);
    }

    TemplateTokens { tokens, gaps }
}

fn plain_template_tokens(text: &str) -> TemplateTokens {
    TemplateTokens {
        tokens: tokenize(text),
        gaps: BTreeSet::new(),
    }
}
