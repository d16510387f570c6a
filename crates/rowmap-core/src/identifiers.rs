//! Identifier quoting and parameter naming.

/// Quote a possibly-dotted column reference, one backtick pair per segment.
///
/// `usr.id` becomes `` `usr`.`id` ``. Embedded backticks are doubled.
pub fn quote_ident(ident: &str) -> String {
    ident
        .split('.')
        .map(|seg| format!("`{}`", seg.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Derive the bound-parameter name for a column: `:` prefix, dots
/// flattened to underscores.
pub fn param_name(column: &str) -> String {
    format!(":{}", column.replace('.', "_"))
}
