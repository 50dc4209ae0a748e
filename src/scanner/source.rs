use crate::models::Span;

/// Closed set of source constructs the pattern matchers visit. The parser
/// lowers a JavaScript/TypeScript source unit into these tagged variants;
/// matchers never inspect raw text themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `xs.indexOf(x)` compared against -1 or 0.
    IndexOfCompare { polarity: MembershipPolarity },
    /// Already-idiomatic `xs.includes(x)`; recorded so membership matching
    /// can be shown to leave it alone.
    IncludesCall,
    /// `s += <expr containing a string literal>`.
    StringConcatAssign { target: String },
    /// `xs.find(...)`.
    ArrayFindCall,
    /// `...` spread directly inside an array/object literal.
    SpreadInLiteral,
    /// `new RegExp(...)` or a regex literal.
    RegexConstruction { literal_args: bool },
    /// `JSON.parse(...)`.
    JsonParseCall { literal_arg: bool },
    /// Synchronous filesystem/process API call.
    SyncIoCall { api: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipPolarity {
    /// Truthy when the element is present (`!== -1`, `>= 0`, `> -1`).
    Present,
    /// Truthy when the element is absent (`=== -1`, `== -1`).
    Absent,
}

/// Lexical context captured at the moment a construct is seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeContext {
    /// Number of enclosing loop bodies. Zero means module or function top
    /// level; loop-scoped matchers require this to be positive.
    pub loop_depth: u32,
    /// True when any enclosing function is an exported handler or a
    /// route-registered callback.
    pub in_handler: bool,
    /// Name of the nearest enclosing function, when one could be read off
    /// the declaration.
    pub enclosing_fn: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceNode {
    pub kind: NodeKind,
    pub span: Span,
    pub ctx: NodeContext,
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub nodes: Vec<SourceNode>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at line {line}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

const SYNC_IO_APIS: &[&str] = &[
    "readFileSync",
    "writeFileSync",
    "existsSync",
    "readdirSync",
    "statSync",
    "mkdirSync",
    "execSync",
];

const HANDLER_PARAMS: &[&str] = &[
    "req", "res", "ctx", "next", "request", "response", "reply", "event",
];

/// Lexically analyzes one source unit. Strings and comments are masked
/// first so constructs inside them never match; a brace-tracked scope stack
/// supplies loop depth and enclosing-function context.
pub fn parse_source(text: &str) -> Result<SourceUnit, ParseError> {
    let masked = mask_source(text.as_bytes())?;

    let mut nodes = Vec::new();
    let mut stack: Vec<Block> = Vec::new();
    let mut header = String::new();
    let mut paren_depth = 0i32;

    let original_lines: Vec<&str> = text.lines().collect();

    for (line_idx, line) in split_lines(&masked).into_iter().enumerate() {
        let line_no = (line_idx + 1) as u32;
        let original = original_lines.get(line_idx).copied().unwrap_or("");

        let mut i = 0;
        while i < line.len() {
            match line[i] {
                b'{' => {
                    stack.push(classify_header(&header));
                    header.clear();
                }
                b'}' => {
                    if stack.pop().is_none() {
                        return Err(ParseError {
                            line: line_no,
                            message: "unexpected '}'".to_string(),
                        });
                    }
                }
                // Statement separators inside a `for (;;)` header are part
                // of the header, not the end of it.
                b';' if paren_depth == 0 => header.clear(),
                c => {
                    if c == b'(' {
                        paren_depth += 1;
                    } else if c == b')' {
                        paren_depth = (paren_depth - 1).max(0);
                    }
                    if let Some((kind, len)) = detect_at(line, i, original) {
                        let ctx = context_of(&stack);
                        let col = (i + 1) as u32;
                        nodes.push(SourceNode {
                            kind,
                            span: Span::line(line_no, col, col + len as u32),
                            ctx,
                            snippet: original.trim().to_string(),
                        });
                    }
                    header.push(c as char);
                }
            }
            i += 1;
        }
        header.push(' ');
    }

    if !stack.is_empty() {
        return Err(ParseError {
            line: original_lines.len() as u32,
            message: "unbalanced braces at end of file".to_string(),
        });
    }

    Ok(SourceUnit { nodes })
}

#[derive(Debug, Clone, Default)]
struct Block {
    is_loop: bool,
    is_fn: bool,
    handler: bool,
    fn_name: Option<String>,
}

fn context_of(stack: &[Block]) -> NodeContext {
    NodeContext {
        loop_depth: stack.iter().filter(|b| b.is_loop).count() as u32,
        in_handler: stack.iter().any(|b| b.handler),
        enclosing_fn: stack
            .iter()
            .rev()
            .find(|b| b.is_fn)
            .and_then(|b| b.fn_name.clone()),
    }
}

fn classify_header(header: &str) -> Block {
    let h = header.trim();

    if (contains_word(h, "for") || contains_word(h, "while")) && h.contains('(')
        || h == "do"
        || h.ends_with(" do")
    {
        return Block {
            is_loop: true,
            ..Block::default()
        };
    }

    let is_fn = contains_word(h, "function") || h.contains("=>");
    if !is_fn {
        return Block::default();
    }

    let fn_name = function_name(h);
    let exported =
        contains_word(h, "export") || h.contains("module.exports") || h.contains("exports.");
    let route_registration = [".get(", ".post(", ".put(", ".delete(", ".patch(", ".use(", ".all("]
        .iter()
        .any(|m| h.contains(m));
    let named_like_handler = fn_name.as_deref().is_some_and(|n| {
        let n = n.to_ascii_lowercase();
        ["handle", "handler", "controller", "middleware", "route"]
            .iter()
            .any(|k| n.contains(k))
    });
    let handler_params = last_param_group(h).is_some_and(|params| {
        params.split(',').any(|p| {
            let name = p
                .trim()
                .split(['=', ':'])
                .next()
                .unwrap_or("")
                .trim()
                .trim_start_matches(['{', '[', '.']);
            HANDLER_PARAMS.contains(&name)
        })
    });

    Block {
        is_loop: false,
        is_fn: true,
        handler: (exported && (handler_params || named_like_handler)) || route_registration,
        fn_name,
    }
}

fn function_name(h: &str) -> Option<String> {
    if let Some(pos) = h.find("function") {
        let rest = h[pos + "function".len()..].trim_start().trim_start_matches('*');
        let name = take_identifier(rest.trim_start());
        if !name.is_empty() {
            return Some(name);
        }
    }
    for kw in ["const", "let", "var"] {
        if let Some(pos) = find_word(h, kw) {
            let name = take_identifier(h[pos + kw.len()..].trim_start());
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    if let Some(pos) = h.find("exports.") {
        let name = take_identifier(&h[pos + "exports.".len()..]);
        if !name.is_empty() {
            return Some(name);
        }
    }
    None
}

fn last_param_group(h: &str) -> Option<&str> {
    let close = h.rfind(')')?;
    let bytes = h.as_bytes();
    let mut depth = 0i32;
    for i in (0..=close).rev() {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&h[i + 1..close]);
                }
            }
            _ => {}
        }
    }
    None
}

fn detect_at(line: &[u8], i: usize, original: &str) -> Option<(NodeKind, usize)> {
    if let Some(node) = detect_index_of(line, i) {
        return Some(node);
    }
    if starts_at(line, i, b".includes(") {
        return Some((NodeKind::IncludesCall, ".includes(".len()));
    }
    if starts_at(line, i, b".find(") {
        return Some((NodeKind::ArrayFindCall, ".find(".len()));
    }
    if starts_at(line, i, b"new RegExp(") && boundary_before(line, i) {
        let open = i + "new RegExp".len();
        let close = matching_paren(line, open)?;
        let literal_args = args_are_literal(&line[open + 1..close]);
        return Some((NodeKind::RegexConstruction { literal_args }, close + 1 - i));
    }
    if starts_at(line, i, b"JSON.parse(") && boundary_before(line, i) {
        let open = i + "JSON.parse".len();
        let close = matching_paren(line, open)?;
        let literal_arg = args_are_literal(&line[open + 1..close]);
        return Some((NodeKind::JsonParseCall { literal_arg }, close + 1 - i));
    }
    if let Some(node) = detect_sync_io(line, i) {
        return Some(node);
    }
    if let Some(node) = detect_concat_assign(line, i) {
        return Some(node);
    }
    if starts_at(line, i, b"...") {
        let prev = prev_non_space(line, i);
        if matches!(prev, Some(b'[') | Some(b'{') | Some(b',')) {
            return Some((NodeKind::SpreadInLiteral, 3));
        }
    }
    if let Some(node) = detect_regex_literal(line, i, original) {
        return Some(node);
    }
    None
}

fn detect_index_of(line: &[u8], i: usize) -> Option<(NodeKind, usize)> {
    if !starts_at(line, i, b".indexOf(") {
        return None;
    }
    let open = i + ".indexOf".len();
    let close = matching_paren(line, open)?;
    let mut j = close + 1;
    while j < line.len() && line[j] == b' ' {
        j += 1;
    }

    // Recognized comparison family. Anything else is a plain positional
    // indexOf and not a membership test.
    let comparisons: &[(&[u8], &[u8], MembershipPolarity)] = &[
        (b"!==", b"-1", MembershipPolarity::Present),
        (b"!=", b"-1", MembershipPolarity::Absent),
        (b"===", b"-1", MembershipPolarity::Absent),
        (b"==", b"-1", MembershipPolarity::Absent),
        (b">=", b"0", MembershipPolarity::Present),
        (b">", b"-1", MembershipPolarity::Present),
    ];
    // `!=` is the loose absent-negation form; fix polarity below.
    for (op, operand, polarity) in comparisons {
        if starts_at(line, j, op) {
            let mut k = j + op.len();
            while k < line.len() && line[k] == b' ' {
                k += 1;
            }
            if starts_at(line, k, operand) {
                let polarity = if *op == b"!=" {
                    MembershipPolarity::Present
                } else {
                    *polarity
                };
                let end = k + operand.len();
                return Some((NodeKind::IndexOfCompare { polarity }, end - i));
            }
        }
    }
    None
}

fn detect_sync_io(line: &[u8], i: usize) -> Option<(NodeKind, usize)> {
    for api in SYNC_IO_APIS {
        let name = api.as_bytes();
        if starts_at(line, i, name)
            && boundary_before(line, i)
            && line.get(i + name.len()) == Some(&b'(')
        {
            return Some((
                NodeKind::SyncIoCall {
                    api: api.to_string(),
                },
                name.len(),
            ));
        }
    }
    None
}

fn detect_concat_assign(line: &[u8], i: usize) -> Option<(NodeKind, usize)> {
    if !starts_at(line, i, b"+=") || (i > 0 && line[i - 1] == b'+') {
        return None;
    }
    let rhs_end = line[i + 2..]
        .iter()
        .position(|&c| c == b';')
        .map(|p| i + 2 + p)
        .unwrap_or(line.len());
    let rhs = &line[i + 2..rhs_end];
    if !rhs.iter().any(|&c| matches!(c, b'\'' | b'"' | b'`')) {
        return None;
    }

    let mut end = i;
    while end > 0 && line[end - 1] == b' ' {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && (is_ident_byte(line[start - 1]) || line[start - 1] == b'.') {
        start -= 1;
    }
    if start == end {
        return None;
    }
    let target = String::from_utf8_lossy(&line[start..end]).to_string();
    Some((NodeKind::StringConcatAssign { target }, 2))
}

fn detect_regex_literal(line: &[u8], i: usize, original: &str) -> Option<(NodeKind, usize)> {
    if line[i] != b'/' || i + 1 >= line.len() {
        return None;
    }
    if matches!(line[i + 1], b'/' | b'*' | b'=') {
        return None;
    }
    let prev = prev_non_space(line, i);
    let after_keyword = prev_word(line, i)
        .map(|w| w == "return" || w == "case")
        .unwrap_or(false);
    let starts_expression = matches!(
        prev,
        None | Some(b'=') | Some(b'(') | Some(b',') | Some(b'[') | Some(b':') | Some(b'!')
            | Some(b'&') | Some(b'|')
    );
    if !starts_expression && !after_keyword {
        return None;
    }

    // Closing delimiter on the same line, honoring escapes and classes.
    let mut j = i + 1;
    let mut in_class = false;
    while j < line.len() {
        match line[j] {
            b'\\' => j += 1,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => break,
            b'\n' => return None,
            _ => {}
        }
        j += 1;
    }
    if j >= line.len() || j == i + 1 {
        return None;
    }
    let mut end = j + 1;
    while end < line.len() && line[end].is_ascii_lowercase() {
        end += 1;
    }
    // The masked line blanks string contents, so cross-check the original
    // to avoid divisions that merely look like delimiters.
    if original.as_bytes().get(i) != Some(&b'/') {
        return None;
    }
    Some((NodeKind::RegexConstruction { literal_args: true }, end - i))
}

fn args_are_literal(args: &[u8]) -> bool {
    // Masked string contents are spaces, so a purely literal argument list
    // reduces to quotes, spaces and commas.
    !args.is_empty()
        && args
            .iter()
            .all(|&c| matches!(c, b'\'' | b'"' | b'`' | b' ' | b','))
}

fn starts_at(line: &[u8], i: usize, pat: &[u8]) -> bool {
    line.len() >= i + pat.len() && &line[i..i + pat.len()] == pat
}

fn boundary_before(line: &[u8], i: usize) -> bool {
    i == 0 || !is_ident_byte(line[i - 1])
}

fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

fn prev_non_space(line: &[u8], i: usize) -> Option<u8> {
    line[..i].iter().rev().find(|&&c| c != b' ').copied()
}

fn prev_word(line: &[u8], i: usize) -> Option<String> {
    let mut end = i;
    while end > 0 && line[end - 1] == b' ' {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && line[start - 1].is_ascii_alphabetic() {
        start -= 1;
    }
    if start == end {
        None
    } else {
        Some(String::from_utf8_lossy(&line[start..end]).to_string())
    }
}

fn contains_word(h: &str, word: &str) -> bool {
    find_word(h, word).is_some()
}

fn find_word(h: &str, word: &str) -> Option<usize> {
    let bytes = h.as_bytes();
    let mut from = 0;
    while let Some(pos) = h[from..].find(word) {
        let at = from + pos;
        let before_ok = at == 0 || !is_ident_byte(bytes[at - 1]);
        let after = at + word.len();
        let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
        if before_ok && after_ok {
            return Some(at);
        }
        from = at + word.len();
    }
    None
}

fn take_identifier(s: &str) -> String {
    s.bytes()
        .take_while(|&c| c.is_ascii_alphanumeric() || c == b'_' || c == b'$')
        .map(|c| c as char)
        .collect()
}

/// Replaces the contents of strings, templates and comments with spaces,
/// preserving delimiters, byte offsets and newlines.
fn mask_source(bytes: &[u8]) -> Result<Vec<u8>, ParseError> {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(u8),
        Template,
        Regex { in_class: bool },
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut line = 1u32;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\n' {
            line += 1;
        }
        match state {
            State::Code => match c {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    state = State::LineComment;
                    out.push(b' ');
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    out.push(b' ');
                }
                // A `/` where an expression may start is a regex literal,
                // not division; its contents are masked so quotes inside a
                // character class never flip the string state.
                b'/' if regex_can_start(&out) => {
                    state = State::Regex { in_class: false };
                    out.push(b'/');
                }
                b'\'' | b'"' => {
                    state = State::Str(c);
                    out.push(c);
                }
                b'`' => {
                    state = State::Template;
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == b'\n' {
                    state = State::Code;
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
            }
            State::BlockComment => {
                if c == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = State::Code;
                    out.push(b' ');
                    out.push(b' ');
                    i += 2;
                    continue;
                }
                out.push(if c == b'\n' { b'\n' } else { b' ' });
            }
            State::Str(quote) => match c {
                b'\\' => {
                    out.push(b' ');
                    if i + 1 < bytes.len() {
                        out.push(b' ');
                        i += 2;
                        continue;
                    }
                }
                b'\n' => {
                    return Err(ParseError {
                        line: line - 1,
                        message: "unterminated string literal".to_string(),
                    });
                }
                c if c == quote => {
                    state = State::Code;
                    out.push(c);
                }
                _ => out.push(b' '),
            },
            State::Regex { in_class } => match c {
                b'\\' => {
                    out.push(b' ');
                    if i + 1 < bytes.len() {
                        out.push(b' ');
                        i += 2;
                        continue;
                    }
                }
                b'[' => {
                    state = State::Regex { in_class: true };
                    out.push(b' ');
                }
                b']' => {
                    state = State::Regex { in_class: false };
                    out.push(b' ');
                }
                b'/' if !in_class => {
                    state = State::Code;
                    out.push(b'/');
                }
                b'\n' => {
                    return Err(ParseError {
                        line: line - 1,
                        message: "unterminated regular expression".to_string(),
                    });
                }
                _ => out.push(b' '),
            },
            State::Template => match c {
                b'\\' => {
                    out.push(b' ');
                    if i + 1 < bytes.len() {
                        out.push(if bytes[i + 1] == b'\n' { b'\n' } else { b' ' });
                        i += 2;
                        continue;
                    }
                }
                b'`' => {
                    state = State::Code;
                    out.push(b'`');
                }
                b'\n' => out.push(b'\n'),
                _ => out.push(b' '),
            },
        }
        i += 1;
    }

    match state {
        State::Code | State::LineComment => Ok(out),
        State::BlockComment => Err(ParseError {
            line,
            message: "unterminated block comment".to_string(),
        }),
        State::Str(_) | State::Template => Err(ParseError {
            line,
            message: "unterminated string literal".to_string(),
        }),
        State::Regex { .. } => Err(ParseError {
            line,
            message: "unterminated regular expression".to_string(),
        }),
    }
}

/// Division/regex disambiguation for the masker: a `/` begins a regex when
/// the previous significant output byte cannot end an expression, or when
/// it closes a `return`/`case` keyword.
fn regex_can_start(out: &[u8]) -> bool {
    let mut k = out.len();
    while k > 0 && out[k - 1] == b' ' {
        k -= 1;
    }
    if k == 0 {
        return true;
    }
    let prev = out[k - 1];
    if matches!(
        prev,
        b'\n' | b'=' | b'(' | b',' | b'[' | b':' | b'!' | b'&' | b'|' | b';' | b'{' | b'}'
    ) {
        return true;
    }
    let mut start = k;
    while start > 0 && out[start - 1].is_ascii_alphabetic() {
        start -= 1;
    }
    let word = &out[start..k];
    word == b"return" || word == b"case"
}

fn matching_paren(line: &[u8], open: usize) -> Option<usize> {
    if line.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0i32;
    for (offset, &c) in line[open..].iter().enumerate() {
        match c {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_lines(masked: &[u8]) -> Vec<&[u8]> {
    masked.split(|&c| c == b'\n').collect()
}
