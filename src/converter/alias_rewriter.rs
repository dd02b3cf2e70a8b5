//! Alias-collision-safe rewriting of recipe text.
//!
//! Recipe conditions and select expressions are written with local aliases
//! (`entity.price`, `a.owner = entity`). Rewriting maps them onto real table
//! aliases in two phases:
//!
//! 1. every local alias used as a qualifier or standalone operand becomes a
//!    `{{real}}` placeholder; text inside placeholders is never matched again,
//!    so a real alias that equals another local alias is left alone;
//! 2. placeholders of the scope's real aliases are unwrapped.
//!
//! Quoted literals are copied verbatim. A token preceded by `.` is a field
//! name and a token that is part of a longer identifier never matches.

/// Local alias -> real table alias bindings of one recipe expansion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasScope {
    bindings: Vec<(String, String)>,
}

impl AliasScope {
    /// Scope with the recipe root alias bound to the owning table
    pub fn seeded(root_alias: &str, table_alias: &str) -> Self {
        let mut scope = Self::default();
        scope.bind(root_alias, table_alias);
        scope
    }

    pub fn bind(&mut self, local: &str, real: &str) {
        match self.bindings.iter_mut().find(|(l, _)| l == local) {
            Some(binding) => binding.1 = real.to_string(),
            None => self.bindings.push((local.to_string(), real.to_string())),
        }
    }

    pub fn get(&self, local: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(l, _)| l == local)
            .map(|(_, real)| real.as_str())
    }

    pub fn contains(&self, local: &str) -> bool {
        self.get(local).is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(l, r)| (l.as_str(), r.as_str()))
    }

    /// Copy of this scope without the binding of `local`
    pub fn without(&self, local: &str) -> Self {
        Self {
            bindings: self
                .bindings
                .iter()
                .filter(|(l, _)| l != local)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Alias(&'a str),
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Whether the token at `start..end` can be a table alias
fn is_alias_position(bytes: &[u8], start: usize, end: usize) -> bool {
    if let Some(&prev) = start.checked_sub(1).and_then(|i| bytes.get(i)) {
        if is_ident_byte(prev) || matches!(prev, b'.' | b'\\' | b':' | b'$' | b'@') {
            return false;
        }
    }
    match bytes.get(end) {
        Some(&next) => !matches!(next, b':' | b'\\' | b'('),
        None => true,
    }
}

/// Index right after the literal opened at `start`
fn skip_literal(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index right after the `}}` closing the placeholder opened at `start`
fn skip_placeholder(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

fn pieces(text: &str) -> Vec<Piece<'_>> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut verbatim_from = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' || b == b'"' {
            i = skip_literal(bytes, i);
        } else if b == b'{' && bytes.get(i + 1) == Some(&b'{') {
            i = skip_placeholder(bytes, i);
        } else if is_ident_start(b) {
            let start = i;
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            if is_alias_position(bytes, start, i) {
                if verbatim_from < start {
                    pieces.push(Piece::Text(&text[verbatim_from..start]));
                }
                pieces.push(Piece::Alias(&text[start..i]));
                verbatim_from = i;
            }
        } else {
            i += 1;
        }
    }

    if verbatim_from < text.len() {
        pieces.push(Piece::Text(&text[verbatim_from..]));
    }
    pieces
}

fn substitute(text: &str, local: &str, real: &str) -> String {
    pieces(text)
        .into_iter()
        .map(|piece| match piece {
            Piece::Alias(alias) if alias == local => format!("{{{{{real}}}}}"),
            Piece::Alias(s) | Piece::Text(s) => s.to_string(),
        })
        .collect()
}

/// Rewrites every local alias of `scope` found in `text` to its real alias
pub fn rewrite(text: &str, scope: &AliasScope) -> String {
    let mut rewritten = text.to_string();
    for (local, real) in scope.iter() {
        rewritten = substitute(&rewritten, local, real);
    }
    for (_, real) in scope.iter() {
        rewritten = rewritten.replace(&format!("{{{{{real}}}}}"), real);
    }
    rewritten
}

/// Alias tokens of `text` accepted by `is_candidate`, deduplicated, in order of appearance
pub fn referenced_aliases<F>(text: &str, is_candidate: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut found: Vec<String> = Vec::new();
    for piece in pieces(text) {
        if let Piece::Alias(alias) = piece {
            if is_candidate(alias) && !found.iter().any(|f| f == alias) {
                found.push(alias.to_string());
            }
        }
    }
    found
}
