//! Line-oriented recognition of Zig function declarations.
//!
//! This is deliberately not a parser. The rewriter only needs to recover a
//! narrow, well-known declaration shape (modifiers, `fn`, name, parameter
//! list, return type, body braces) from otherwise-opaque text, so each
//! extraction step here is a small scanner with an explicit failure mode:
//! callers treat `None` as "leave the input untouched" rather than aborting.

use regex::Regex;

/// Comment token that flags the next function declaration for the
/// split-and-wrapper rewrite. The marker line itself is kept in the output.
pub const NOINLINE_MARKER: &str = "//noinline";

/// Comment token that removes itself and the single following line from the
/// output entirely.
pub const DEBUG_ONLY_MARKER: &str = "//DEBUGONLY";

/// File extension of the sources the rewriter processes.
pub const SOURCE_EXTENSION: &str = "zig";

/// Parsed shape of one function declaration.
///
/// Built transiently while a marked declaration is being rewritten and
/// discarded afterwards. `param_names` drops the type annotations; the raw
/// parameter text is recovered separately via [`raw_signature_parts`] so the
/// wrapper can reproduce the author's formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    /// Identifier following the `fn` keyword.
    pub name: String,
    /// Everything before the `fn` keyword (`pub`, `export`, `inline`, ...),
    /// trimmed; empty for plain functions.
    pub modifiers: String,
    /// Parameter names in declaration order, type annotations discarded.
    pub param_names: Vec<String>,
    /// Text between the closing paren and the body brace, trimmed.
    pub return_type: String,
    /// Leading-whitespace width of the declaration's first physical line.
    pub indent: usize,
    /// Physical lines the declaration spans up to and including the line
    /// holding the body-opening brace.
    pub line_count: usize,
}

/// Pattern matching a function-declaration line: optional modifier keywords,
/// the `fn` keyword, an identifier, and an opening paren.
pub fn declaration_pattern() -> Regex {
    Regex::new(r"(?:pub\s+)?(?:export\s+)?(?:inline\s+)?fn\s+\w+\s*\(").unwrap()
}

/// Parse the declaration starting at `lines[start]`.
///
/// Physical lines are accumulated until one contains the body-opening brace;
/// returns `None` if the file ends first, or if the `fn` keyword, the name,
/// or the parameter group cannot be located in the normalized span.
pub fn parse_signature(lines: &[&str], start: usize) -> Option<FunctionSignature> {
    let mut line_count = 0;
    let mut brace_found = false;
    for line in &lines[start..] {
        line_count += 1;
        if line.contains('{') {
            brace_found = true;
            break;
        }
    }
    if !brace_found {
        return None;
    }

    let span = &lines[start..start + line_count];
    let normalized = normalize_span(span);
    let (name, modifiers, param_names, return_type) = extract_fields(&normalized)?;

    let indent = leading_whitespace(lines[start]);

    Some(FunctionSignature { name, modifiers, param_names, return_type, indent, line_count })
}

/// Raw parameter and return-type text from an un-normalized signature span.
///
/// The wrapper declaration is rebuilt from these instead of the normalized
/// fields so multi-line parameter lists keep their original formatting.
pub fn raw_signature_parts(span: &[&str]) -> Option<(String, String)> {
    let raw = span.join("\n");
    let (open, close) = paren_group(&raw)?;
    let params = raw[open + 1..close].to_string();
    let after = &raw[close + 1..];
    let body_brace = after.find('{').unwrap_or(after.len());
    let return_type = after[..body_brace].trim().to_string();
    Some((params, return_type))
}

/// Rewrite a declaration's first physical line so the function name gains the
/// internal `_` suffix; every other byte of the line is preserved.
pub fn rename_declaration(line: &str, name: &str) -> Option<String> {
    let fn_pos = find_keyword(line, "fn")?;
    let after = &line[fn_pos + 2..];
    let name_start = fn_pos + 2 + (after.len() - after.trim_start().len());
    if !line[name_start..].starts_with(name) {
        return None;
    }
    let name_end = name_start + name.len();
    Some(format!("{}_{}", &line[..name_end], &line[name_end..]))
}

/// Scan forward from the line holding the body-opening brace, tracking brace
/// depth across characters; the line where depth returns to zero is the
/// inclusive end of the body.
///
/// Braces inside string/char literals and comments are counted like any
/// other: the scan is textual only. Returns `None` when the braces never
/// re-balance before end of file.
pub fn find_body_end(lines: &[&str], body_start: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, line) in lines.iter().enumerate().skip(body_start) {
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Trim every line, join with single spaces, and collapse interior runs of
/// whitespace so field extraction sees one canonical declaration string.
fn normalize_span(span: &[&str]) -> String {
    let joined = span.iter().map(|line| line.trim()).collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(joined.len());
    let mut last_was_space = false;
    for ch in joined.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

/// Extract (name, modifiers, parameter names, return type) from a normalized
/// signature string.
fn extract_fields(sig: &str) -> Option<(String, String, Vec<String>, String)> {
    let fn_pos = find_keyword(sig, "fn")?;
    let modifiers = sig[..fn_pos].trim().to_string();

    let after_fn = &sig[fn_pos + 2..];
    let name_start = fn_pos + 2 + (after_fn.len() - after_fn.trim_start().len());
    let name_len: usize =
        sig[name_start..].chars().take_while(|c| is_ident_char(*c)).map(char::len_utf8).sum();
    if name_len == 0 {
        return None;
    }
    let name = sig[name_start..name_start + name_len].to_string();

    let after_name = &sig[name_start + name_len..];
    let paren_at = name_start + name_len + (after_name.len() - after_name.trim_start().len());
    if !sig[paren_at..].starts_with('(') {
        return None;
    }
    let (open, close) = paren_group(&sig[paren_at..])?;
    let (open, close) = (paren_at + open, paren_at + close);

    let param_names = parameter_names(&sig[open + 1..close]);

    let after_params = &sig[close + 1..];
    let body_brace = after_params.find('{').unwrap_or(after_params.len());
    let return_type = after_params[..body_brace].trim().to_string();

    Some((name, modifiers, param_names, return_type))
}

/// Parameter names: split the paren-group contents on top-level commas and
/// take the text before the first `:` of each segment. Segments without a
/// `:` (or empty trailing segments) contribute nothing.
fn parameter_names(params: &str) -> Vec<String> {
    split_top_level(params)
        .into_iter()
        .filter_map(|segment| {
            let segment = segment.trim();
            if segment.is_empty() {
                return None;
            }
            segment.split_once(':').map(|(name, _)| name.trim().to_string())
        })
        .collect()
}

/// Split on commas that are not nested inside parens, brackets, or braces.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut segment_start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                segments.push(&text[segment_start..idx]);
                segment_start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&text[segment_start..]);
    segments
}

/// Byte offsets of the first matching parenthesis group in `text`, as
/// (open, close). `None` if there is no `(` or it never closes.
fn paren_group(text: &str) -> Option<(usize, usize)> {
    let open = text.find('(')?;
    let mut depth = 0i32;
    for (off, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + off));
                }
            }
            _ => {}
        }
    }
    None
}

/// First occurrence of `keyword` in `text` that stands alone as a word
/// (not embedded in a longer identifier).
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(keyword) {
        let at = search_from + rel;
        let end = at + keyword.len();
        let before_ok = text[..at].chars().next_back().map_or(true, |c| !is_ident_char(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_ident_char(c));
        if before_ok && after_ok {
            return Some(at);
        }
        search_from = at + 1;
    }
    None
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Leading-whitespace width of a line, in characters.
fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}
