//! SELECT statement assembly.
//!
//! `stringify` turns a `Row` template, a select expression, a filter,
//! and a set of options into one complete SELECT statement plus its
//! bound parameters. The filter compiles into the WHERE clause; a
//! separate filter in [`SelectOptions::having`] compiles into HAVING
//! with its parameter names disambiguated against the WHERE set.

use rowmap_core::{quote_ident, Params, Result, Row};

use crate::filter::{compile, Filter};

/// Sort direction for an ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One column reference with an optional direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub dir: Option<SortDir>,
}

impl OrderTerm {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            dir: None,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            dir: Some(SortDir::Asc),
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            dir: Some(SortDir::Desc),
        }
    }
}

/// Column list for GROUP BY / ORDER BY: either verbatim SQL or a set
/// of quoted column terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnList {
    /// Emitted as-is, no quoting.
    Raw(String),
    /// Quoted per term, joined with `, `.
    Terms(Vec<OrderTerm>),
}

impl ColumnList {
    fn as_sql(&self) -> String {
        match self {
            Self::Raw(sql) => sql.trim().to_string(),
            Self::Terms(terms) => terms
                .iter()
                .map(|t| match t.dir {
                    Some(dir) => format!("{} {}", quote_ident(&t.column), dir.as_sql()),
                    None => quote_ident(&t.column),
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Raw(sql) => sql.trim().is_empty(),
            Self::Terms(terms) => terms.is_empty(),
        }
    }
}

impl From<&str> for ColumnList {
    fn from(sql: &str) -> Self {
        Self::Raw(sql.to_string())
    }
}

impl From<String> for ColumnList {
    fn from(sql: String) -> Self {
        Self::Raw(sql)
    }
}

impl From<Vec<OrderTerm>> for ColumnList {
    fn from(terms: Vec<OrderTerm>) -> Self {
        Self::Terms(terms)
    }
}

/// Clause options for a SELECT beyond the WHERE filter.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// GROUP BY columns.
    pub group: Option<ColumnList>,
    /// HAVING filter, compiled after (and disambiguated against) WHERE.
    pub having: Option<Filter>,
    /// ORDER BY columns.
    pub order: Option<ColumnList>,
    /// LIMIT; 0 omits the clause.
    pub limit: u64,
    /// OFFSET; 0 omits the clause.
    pub offset: u64,
    /// Trailing `/* … */` marker, useful for log correlation.
    pub comment: Option<String>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: impl Into<ColumnList>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn having(mut self, having: Filter) -> Self {
        self.having = Some(having);
        self
    }

    pub fn order(mut self, order: impl Into<ColumnList>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Whether the statement groups rows (drives the driver's COUNT
    /// strategy).
    pub fn is_grouped(&self) -> bool {
        self.group.as_ref().is_some_and(|g| !g.is_empty())
    }
}

/// Assemble a full SELECT over `row`.
///
/// `select_expr` is the projection, emitted verbatim (callers quote
/// their own columns or pass `*`). Empty WHERE/HAVING fragments omit
/// their keywords entirely.
pub fn stringify(
    row: &Row,
    select_expr: &str,
    filter: &Filter,
    options: &SelectOptions,
) -> Result<(String, Params)> {
    let mut sql = format!("SELECT {} FROM {}", select_expr.trim(), quote_ident(row.table()));
    if let Some(alias) = row.alias() {
        sql.push_str(&format!(" AS {}", quote_ident(alias)));
    }

    let (where_sql, mut params) = compile(filter, &Params::new())?;
    if !where_sql.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }

    if let Some(group) = options.group.as_ref().filter(|g| !g.is_empty()) {
        sql.push_str(" GROUP BY ");
        sql.push_str(&group.as_sql());
    }

    if let Some(having) = &options.having {
        let (having_sql, having_params) = compile(having, &params)?;
        if !having_sql.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&having_sql);
            params.extend(having_params);
        }
    }

    if let Some(order) = options.order.as_ref().filter(|o| !o.is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.as_sql());
    }

    if options.limit > 0 {
        sql.push_str(&format!(" LIMIT {}", options.limit));
    }
    if options.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", options.offset));
    }

    if let Some(comment) = options.comment.as_ref().filter(|c| !c.trim().is_empty()) {
        // Strip any embedded terminator so the marker cannot break out.
        sql.push_str(&format!(" /* {} */", comment.replace("*/", "")));
    }

    Ok((sql, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_core::Value;

    fn user_row() -> Row {
        Row::new("user")
    }

    #[test]
    fn test_bare_select() {
        let (sql, params) =
            stringify(&user_row(), "*", &Filter::new(), &SelectOptions::new()).unwrap();
        assert_eq!(sql, "SELECT * FROM `user`");
        assert!(params.is_empty());
    }

    #[test]
    fn test_alias_in_from() {
        let row = Row::new("user").with_alias("u");
        let (sql, _) = stringify(&row, "*", &Filter::new(), &SelectOptions::new()).unwrap();
        assert_eq!(sql, "SELECT * FROM `user` AS `u`");
    }

    #[test]
    fn test_where_clause() {
        let filter = Filter::new().push("active", 1i64);
        let (sql, params) =
            stringify(&user_row(), "*", &filter, &SelectOptions::new()).unwrap();
        assert_eq!(sql, "SELECT * FROM `user` WHERE `active` = :active");
        assert_eq!(params.get(":active"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_full_clause_order() {
        let filter = Filter::new().push("active", 1i64);
        let options = SelectOptions::new()
            .group(vec![OrderTerm::new("role")])
            .having(Filter::new().push("n >", 2i64))
            .order(vec![OrderTerm::desc("id")])
            .limit(10)
            .offset(20)
            .comment("dashboard");
        let (sql, params) = stringify(&user_row(), "*", &filter, &options).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `user` WHERE `active` = :active GROUP BY `role` \
             HAVING `n` > :n ORDER BY `id` DESC LIMIT 10 OFFSET 20 /* dashboard */"
        );
        assert_eq!(params.get(":n"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_having_params_disambiguated_against_where() {
        let filter = Filter::new().push("n", 1i64);
        let options = SelectOptions::new()
            .group("`n`")
            .having(Filter::new().push("n >", 5i64));
        let (sql, params) = stringify(&user_row(), "*", &filter, &options).unwrap();
        assert!(sql.contains("WHERE `n` = :n"));
        assert!(sql.contains("HAVING `n` > :n__2"));
        assert_eq!(params.get(":n"), Some(&Value::Int(1)));
        assert_eq!(params.get(":n__2"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_raw_column_lists_pass_through() {
        let options = SelectOptions::new().order("LENGTH(name), id DESC");
        let (sql, _) =
            stringify(&user_row(), "*", &Filter::new(), &options).unwrap();
        assert_eq!(sql, "SELECT * FROM `user` ORDER BY LENGTH(name), id DESC");
    }

    #[test]
    fn test_zero_limit_and_offset_omitted() {
        let options = SelectOptions::new().limit(0).offset(0);
        let (sql, _) =
            stringify(&user_row(), "*", &Filter::new(), &options).unwrap();
        assert_eq!(sql, "SELECT * FROM `user`");
    }

    #[test]
    fn test_empty_having_omits_keyword() {
        let options = SelectOptions::new().having(Filter::new());
        let (sql, _) =
            stringify(&user_row(), "*", &Filter::new(), &options).unwrap();
        assert!(!sql.contains("HAVING"));
    }

    #[test]
    fn test_comment_terminator_stripped() {
        let options = SelectOptions::new().comment("evil */ DROP TABLE user");
        let (sql, _) =
            stringify(&user_row(), "*", &Filter::new(), &options).unwrap();
        assert!(sql.ends_with("/* evil  DROP TABLE user */"));
    }
}
