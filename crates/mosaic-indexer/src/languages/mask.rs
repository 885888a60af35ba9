//! Blanking of comments and string literals ahead of import scanning
//!
//! Masked bytes become spaces and newlines survive, so byte offsets and line
//! numbers in the masked text are those of the source.

/// Python: every comment and string literal, docstrings included.
pub fn python(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                let end = line_end(bytes, i);
                blank(&mut out, i, end);
                i = end;
            }
            quote @ (b'\'' | b'"') => {
                let end = if bytes[i..].starts_with(&[quote; 3]) {
                    triple_end(bytes, i + 3, quote)
                } else {
                    quoted_end(bytes, i + 1, quote)
                };
                blank(&mut out, i, end);
                i = end;
            }
            _ => i += 1,
        }
    }
    into_text(out, source)
}

/// JavaScript, TypeScript and C: comments, template literals and string
/// literals. A literal right after a word of `keep_after`, or inside an
/// `import(` / `require(` call, is where a specifier lives and is kept.
pub fn c_like(source: &str, keep_after: &[&str]) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = line_end(bytes, i);
                blank(&mut out, i, end);
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = find(bytes, i + 2, b"*/").map_or(bytes.len(), |at| at + 2);
                blank(&mut out, i, end);
                i = end;
            }
            b'`' => {
                let end = template_end(bytes, i + 1);
                blank(&mut out, i, end);
                i = end;
            }
            quote @ (b'\'' | b'"') => {
                let end = quoted_end(bytes, i + 1, quote);
                if !holds_specifier(&out[..i], keep_after) {
                    blank(&mut out, i, end);
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    into_text(out, source)
}

fn blank(out: &mut [u8], start: usize, end: usize) {
    let len = out.len();
    for byte in &mut out[start..end.min(len)] {
        if *byte != b'\n' {
            *byte = b' ';
        }
    }
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    find(bytes, from, b"\n").unwrap_or(bytes.len())
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| from + at)
}

/// End of a one-line literal: past the closing quote, or at the newline.
fn quoted_end(bytes: &[u8], from: usize, quote: u8) -> usize {
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' => return j,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

fn triple_end(bytes: &[u8], from: usize, quote: u8) -> usize {
    let mut j = from;
    while j < bytes.len() {
        if bytes[j] == b'\\' {
            j += 2;
        } else if bytes[j..].starts_with(&[quote; 3]) {
            return j + 3;
        } else {
            j += 1;
        }
    }
    bytes.len()
}

fn template_end(bytes: &[u8], from: usize) -> usize {
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'`' => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

fn ends_with_word(code: &[u8], word: &str) -> bool {
    code.ends_with(word.as_bytes())
        && code[..code.len() - word.len()]
            .last()
            .is_none_or(|byte| !is_word_byte(*byte))
}

fn holds_specifier(code: &[u8], keep_after: &[&str]) -> bool {
    let code = code.trim_ascii_end();
    if let Some(call) = code.strip_suffix(b"(") {
        let callee = call.trim_ascii_end();
        return ends_with_word(callee, "require") || ends_with_word(callee, "import");
    }
    keep_after.iter().any(|word| ends_with_word(code, word))
}

// Blanking only ever starts and stops on ASCII bytes.
fn into_text(out: Vec<u8>, source: &str) -> String {
    String::from_utf8(out).unwrap_or_else(|_| source.to_string())
}
