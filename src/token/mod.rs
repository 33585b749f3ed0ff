//! Line tokenizer.
//!
//! Splits a completed input line into a bounded table of token slices.
//! Tokens are separated by spaces; single- and double-quoted spans are
//! preserved verbatim, quotes and escapes included, so that the
//! marshaller can decode them later. A backslash prevents the following
//! byte from closing a quote.
//!
//! The token table is bounded by [`MAX_PARAMS`]; tokens beyond the
//! capacity are silently discarded and surface downstream as a
//! parameter-count mismatch, never as a tokenizer error.

use heapless::Vec;

/// Maximum number of tokens (command name included) per line.
pub const MAX_PARAMS: usize = 8;

/// Split a line into raw token slices.
///
/// # Examples
///
/// ```rust
/// use nanoshell::token::tokenize;
///
/// let tokens = tokenize(r#"echo "hello world" 17"#);
/// assert_eq!(&tokens[..], ["echo", "\"hello world\"", "17"]);
/// ```
pub fn tokenize(line: &str) -> Vec<&str, MAX_PARAMS> {
    let mut tokens = Vec::new();
    let bytes = line.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let start = i;
        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'\\' && i + 1 < bytes.len() {
                i += 2;
                continue;
            }
            match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                }
                None => {
                    if b == b' ' {
                        break;
                    }
                    if b == b'"' || b == b'\'' {
                        quote = Some(b);
                    }
                }
            }
            i += 1;
        }

        // Token boundaries always fall on ASCII bytes, so slicing is
        // safe even for multi-byte input.
        if tokens.push(&line[start..i]).is_err() {
            break;
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_spaces() {
        let tokens = tokenize("set gpio 13 high");
        assert_eq!(&tokens[..], ["set", "gpio", "13", "high"]);
    }

    #[test]
    fn collapses_repeated_spaces() {
        let tokens = tokenize("  echo   hi  ");
        assert_eq!(&tokens[..], ["echo", "hi"]);
    }

    #[test]
    fn quoted_spans_stay_verbatim() {
        let tokens = tokenize(r#"echo "hello world" 'a b'"#);
        assert_eq!(&tokens[..], ["echo", "\"hello world\"", "'a b'"]);
    }

    #[test]
    fn backslash_keeps_a_quote_open() {
        let tokens = tokenize(r#"echo "say \" it" x"#);
        assert_eq!(&tokens[..], ["echo", r#""say \" it""#, "x"]);
    }

    #[test]
    fn unterminated_quote_runs_to_end_of_line() {
        let tokens = tokenize(r#"echo "half done"#);
        assert_eq!(&tokens[..], ["echo", "\"half done"]);
    }

    #[test]
    fn empty_line_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("    ").is_empty());
    }

    #[test]
    fn overflow_truncates_silently() {
        let tokens = tokenize("a b c d e f g h i j");
        assert_eq!(tokens.len(), MAX_PARAMS);
        assert_eq!(tokens[MAX_PARAMS - 1], "h");
    }
}
