//! The filter-spec compiler.
//!
//! A [`Filter`] is the typed rendition of an associative filter
//! specification: an insertion-ordered list of entries whose keys encode
//! an optional boolean prefix, a column name, and an optional comparison
//! suffix using the operator-mask character set `` =<>&|^!~@[]``.
//!
//! [`compile`] turns a filter into a `(fragment, params)` pair: a SQL
//! WHERE/HAVING fragment with `:name` placeholders and the matching
//! insertion-ordered parameter map. Compilation is pure; compiling the
//! same filter against the same prior-parameter context always yields the
//! same output.

use rowmap_core::{param_name, quote_ident, Error, Params, Result, Value};

/// Sentinel marking a text value as raw SQL, emitted verbatim.
pub const RAW_SENTINEL: &str = "```";

/// Characters that may surround a column name inside a filter key.
const MASK: &str = " =<>&|^!~@[]";

/// One operand of a filter entry.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A single scalar, bound as one parameter.
    Value(Value),
    /// A list of scalars (IN / BETWEEN operands).
    List(Vec<Value>),
    /// A nested sub-filter, compiled in parentheses.
    Group(Filter),
    /// A raw SQL fragment, emitted verbatim.
    Raw(String),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Value(Value::Int(v))
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Value(Value::Int(i64::from(v)))
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Value(Value::Float(v))
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Value(Value::Bool(v))
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Value(Value::Text(v.to_string()))
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Value(Value::Text(v))
    }
}

impl From<Vec<Value>> for Operand {
    fn from(v: Vec<Value>) -> Self {
        Operand::List(v)
    }
}

impl From<Filter> for Operand {
    fn from(f: Filter) -> Self {
        Operand::Group(f)
    }
}

/// One filter entry: a keyed clause or a bare (numeric-key) one.
#[derive(Debug, Clone)]
pub enum Entry {
    /// String key carrying operators and a column name.
    Keyed(String, Operand),
    /// Key-less entry: a raw fragment or a nested group.
    Bare(Operand),
}

/// An ordered filter specification.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    entries: Vec<Entry>,
}

impl Filter {
    /// Empty filter. Compiles to an empty fragment; callers must omit the
    /// WHERE/HAVING keyword in that case.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a keyed clause.
    pub fn push(mut self, key: impl Into<String>, operand: impl Into<Operand>) -> Self {
        self.entries.push(Entry::Keyed(key.into(), operand.into()));
        self
    }

    /// Append a raw SQL fragment, emitted verbatim (bring your own
    /// boolean operator).
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.entries.push(Entry::Bare(Operand::Raw(sql.into())));
        self
    }

    /// Append a nested group, joined with `AND` unless the group's first
    /// entry carries its own boolean prefix.
    pub fn group(mut self, filter: Filter) -> Self {
        self.entries.push(Entry::Bare(Operand::Group(filter)));
        self
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the filter holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Map an operator-mask token to its SQL rendering.
fn op_token(s: &str) -> Option<&'static str> {
    Some(match s {
        "=" => "=",
        ">" => ">",
        "<" => "<",
        ">=" => ">=",
        "<=" => "<=",
        "<>" => "<>",
        "!=" => "!=",
        "&" => "AND",
        "|" => "OR",
        "^" => "XOR",
        "!" => "NOT",
        "~" => "LIKE",
        "!~" => "NOT LIKE",
        "@" => "SOUNDS LIKE",
        "[]" => "IN",
        "![]" => "NOT IN",
        "><" => "BETWEEN",
        "!><" => "NOT BETWEEN",
        _ => return None,
    })
}

fn is_mask(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| MASK.contains(c))
}

/// A parsed filter key.
#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedKey {
    /// Explicit boolean joiner (`AND`/`OR`/`XOR`).
    boolean: Option<&'static str>,
    /// Leading `!` negation.
    negate: bool,
    /// Column name, stripped of mask characters.
    column: String,
    /// Trailing comparison operator.
    cmp: Option<&'static str>,
}

/// Split a key into boolean prefix, column, and comparison suffix.
///
/// Anything after a `#` is a comment and ignored, which lets callers
/// repeat otherwise-identical keys. Prefix and suffix matching prefers
/// the longest operator (1..=3 characters).
fn parse_key(key: &str) -> ParsedKey {
    let mut parsed = ParsedKey::default();
    let key = key.split('#').next().unwrap_or("").trim();
    if key.is_empty() {
        return parsed;
    }

    // Leading boolean/negation token.
    let mut rest = key;
    for n in (1..=3usize.min(key.len())).rev() {
        if !key.is_char_boundary(n) {
            continue;
        }
        let head = &key[..n];
        if is_mask(head) {
            if let Some(tok) = op_token(head.trim()) {
                match tok {
                    "AND" | "OR" | "XOR" => parsed.boolean = Some(tok),
                    "NOT" => parsed.negate = true,
                    // A comparison token in prefix position is tolerated
                    // and ignored.
                    _ => {}
                }
                rest = &key[n..];
                break;
            }
        }
    }

    // Trailing comparison token.
    let trimmed = rest.trim_end();
    for n in (1..=3usize).rev() {
        if trimmed.len() > n && trimmed.is_char_boundary(trimmed.len() - n) {
            let tail = &trimmed[trimmed.len() - n..];
            if is_mask(tail) {
                if let Some(tok) = op_token(tail.trim()) {
                    if !matches!(tok, "AND" | "OR" | "XOR" | "NOT") {
                        parsed.cmp = Some(tok);
                        rest = &trimmed[..trimmed.len() - n];
                        break;
                    }
                }
            }
        }
    }

    parsed.column = rest.trim_matches(|c| MASK.contains(c)).to_string();
    parsed
}

fn is_raw_text(s: &str) -> bool {
    s.starts_with(RAW_SENTINEL)
}

fn strip_raw(s: &str) -> String {
    s[RAW_SENTINEL.len()..].trim().to_string()
}

/// The boolean prefix of a group's first keyed entry, if any.
///
/// Used to hoist an explicit `OR`/`XOR` out of a nested group so it joins
/// the group to the preceding clause instead of dangling inside the
/// parentheses.
fn leading_bool(filter: &Filter) -> Option<&'static str> {
    match filter.entries().first() {
        Some(Entry::Keyed(key, _)) => parse_key(key).boolean,
        _ => None,
    }
}

/// Compile a filter into `(fragment, params)`.
///
/// `prior` carries parameter names already claimed by an enclosing
/// statement (e.g. a WHERE clause when compiling HAVING); generated names
/// are disambiguated against it with `__2`, `__3`, ... suffixes.
pub fn compile(filter: &Filter, prior: &Params) -> Result<(String, Params)> {
    let mut params = Params::new();
    let fragment = compile_inner(filter, prior, &mut params, false)?;
    Ok((fragment, params))
}

fn compile_inner(
    filter: &Filter,
    prior: &Params,
    params: &mut Params,
    suppress_first_bool: bool,
) -> Result<String> {
    let mut tokens: Vec<String> = Vec::new();

    for (i, entry) in filter.entries().iter().enumerate() {
        match entry {
            Entry::Bare(Operand::Raw(sql)) => {
                // Raw fragments join with a plain space; the caller
                // supplies any boolean operator.
                tokens.push(sql.trim().to_string());
            }
            Entry::Bare(Operand::Value(Value::Text(s))) if is_raw_text(s) => {
                tokens.push(strip_raw(s));
            }
            Entry::Bare(Operand::Group(group)) => {
                let hoisted = leading_bool(group);
                let inner = compile_inner(group, prior, params, hoisted.is_some())?;
                if inner.is_empty() {
                    continue;
                }
                if !tokens.is_empty() {
                    tokens.push(hoisted.unwrap_or("AND").to_string());
                }
                tokens.push(format!("({inner})"));
            }
            // A bare scalar or list has no meaning; tolerated and skipped.
            Entry::Bare(_) => {}
            Entry::Keyed(key, operand) => {
                let mut parsed = parse_key(key);
                if i == 0 && suppress_first_bool {
                    parsed.boolean = None;
                }
                compile_clause(&parsed, operand, prior, params, &mut tokens)?;
            }
        }
    }

    Ok(tokens.join(" "))
}

fn compile_clause(
    parsed: &ParsedKey,
    operand: &Operand,
    prior: &Params,
    params: &mut Params,
    tokens: &mut Vec<String>,
) -> Result<()> {
    // Operator-only keys (e.g. "|") attach their boolean to a group.
    if parsed.column.is_empty() {
        if let Operand::Group(group) = operand {
            let inner = compile_inner(group, prior, params, false)?;
            if inner.is_empty() {
                return Ok(());
            }
            if !tokens.is_empty() {
                tokens.push(parsed.boolean.unwrap_or("AND").to_string());
            }
            tokens.push(format!("({inner})"));
        }
        return Ok(());
    }

    if !tokens.is_empty() {
        tokens.push(parsed.boolean.unwrap_or("AND").to_string());
    }
    if parsed.negate {
        tokens.push("NOT".to_string());
    }

    let qcol = quote_ident(&parsed.column);
    let pbase = param_name(&parsed.column);

    match (parsed.cmp, operand) {
        (Some(op @ ("BETWEEN" | "NOT BETWEEN")), operand) => {
            let Operand::List(items) = operand else {
                return Err(Error::BetweenOperand);
            };
            if items.len() != 2 {
                return Err(Error::BetweenOperand);
            }
            let lo = params.unique_name(&format!("{pbase}1"), prior);
            params.insert(lo.clone(), items[0].clone());
            let hi = params.unique_name(&format!("{pbase}2"), prior);
            params.insert(hi.clone(), items[1].clone());
            tokens.push(format!("{qcol} {op} {lo} AND {hi}"));
        }
        (Some("IN" | "NOT IN"), _) | (_, Operand::List(_)) => {
            // A list with no suffix (or an unknown one) infers IN.
            let op = match parsed.cmp {
                Some(op @ ("IN" | "NOT IN")) => op,
                _ => "IN",
            };
            let items: Vec<Value> = match operand {
                Operand::List(items) => items.clone(),
                Operand::Value(v) => vec![v.clone()],
                // IN against a group or raw operand has no defined
                // meaning; drop the clause.
                Operand::Group(_) | Operand::Raw(_) => {
                    drop_trailing_join(tokens, parsed);
                    return Ok(());
                }
            };
            let mut names = Vec::with_capacity(items.len());
            for (n, item) in items.iter().enumerate() {
                let name = params.unique_name(&format!("{pbase}{}", n + 1), prior);
                params.insert(name.clone(), item.clone());
                names.push(name);
            }
            tokens.push(format!("{qcol} {op} ({})", names.join(", ")));
        }
        (_, Operand::Group(group)) => {
            // Nested spec under a named key: the key only anchors the
            // joiner; the group compiles in parentheses.
            let inner = compile_inner(group, prior, params, false)?;
            if inner.is_empty() {
                drop_trailing_join(tokens, parsed);
            } else {
                tokens.push(format!("({inner})"));
            }
        }
        (cmp, Operand::Raw(sql)) => {
            tokens.push(format!("{qcol} {} {}", cmp.unwrap_or("="), sql.trim()));
        }
        (cmp, Operand::Value(Value::Text(s))) if is_raw_text(s) => {
            tokens.push(format!("{qcol} {} {}", cmp.unwrap_or("="), strip_raw(s)));
        }
        (cmp, Operand::Value(v)) => {
            let name = params.unique_name(&pbase, prior);
            params.insert(name.clone(), v.clone());
            tokens.push(format!("{qcol} {} {name}", cmp.unwrap_or("=")));
        }
    }

    Ok(())
}

/// Remove the joiner (and NOT) pushed ahead of a clause that turned out
/// to produce nothing.
fn drop_trailing_join(tokens: &mut Vec<String>, parsed: &ParsedKey) {
    if parsed.negate && tokens.last().is_some_and(|t| t == "NOT") {
        tokens.pop();
    }
    if tokens
        .last()
        .is_some_and(|t| matches!(t.as_str(), "AND" | "OR" | "XOR"))
    {
        tokens.pop();
    }
}
