use serde::{Deserialize, Serialize};

/// One executable fragment of a script. `index` is the 1-based position of
/// the fragment in the split script, counting discarded empty fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub index: usize,
    pub sql: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Split on every `;`, wherever it appears.
    #[default]
    Naive,
    /// Split on `;` outside quotes, comments and `$$` bodies.
    Lexical,
}

pub fn split_statements(script: &str, mode: SplitMode) -> Vec<Statement> {
    match mode {
        SplitMode::Naive => split_naive(script),
        SplitMode::Lexical => split_lexical(script),
    }
}

/// Split on the `;` delimiter, discarding whitespace-only fragments.
pub fn split_naive(script: &str) -> Vec<Statement> {
    script
        .split(';')
        .enumerate()
        .filter(|(_, s)| !s.trim().is_empty())
        .map(|(i, s)| Statement {
            index: i + 1,
            sql: s.trim().to_string(),
        })
        .collect()
}

/// Split on `;` only where it ends a statement. Single-quoted strings,
/// double-quoted identifiers, `--` and `/* */` comments and dollar-quoted
/// bodies are skipped over. Fragments holding only whitespace and comments are
/// discarded. Unterminated quotes or comments run to the end of the script.
pub fn split_lexical(script: &str) -> Vec<Statement> {
    let bytes = script.as_bytes();
    let len = bytes.len();
    let mut out = Vec::new();

    let mut start = 0;
    let mut index = 0;
    let mut has_code = false;
    let mut i = 0;

    let mut push = |index: usize, fragment: &str, has_code: bool| {
        if has_code {
            out.push(Statement {
                index,
                sql: fragment.trim().to_string(),
            });
        }
    };

    while i < len {
        match bytes[i] {
            b';' => {
                index += 1;
                push(index, &script[start..i], has_code);
                has_code = false;
                i += 1;
                start = i;
            }
            q @ (b'\'' | b'"') => {
                has_code = true;
                i = skip_quoted(bytes, i, q);
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match script[i + 2..].find("*/") {
                    Some(off) => i + 2 + off + 2,
                    None => len,
                };
            }
            b'$' => {
                has_code = true;
                i = skip_dollar_quoted(script, i);
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                has_code = true;
                i += 1;
            }
        }
    }

    index += 1;
    push(index, &script[start..], has_code);
    out
}

/// Returns the position just past the closing quote; doubled quotes escape.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// `$tag$ ... $tag$` (tag may be empty). A `$` that does not open such a
/// body, like a positional `$1`, is consumed on its own.
fn skip_dollar_quoted(script: &str, open: usize) -> usize {
    let rest = &script.as_bytes()[open + 1..];
    let tag_len = rest
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    let starts_with_digit = rest.first().is_some_and(|b| b.is_ascii_digit());
    if rest.get(tag_len) != Some(&b'$') || starts_with_digit {
        return open + 1;
    }

    let delim = &script[open..open + tag_len + 2];
    let body = open + tag_len + 2;
    match script[body..].find(delim) {
        Some(off) => body + off + delim.len(),
        None => script.len(),
    }
}
