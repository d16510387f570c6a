//! Fields and computed (adhoc) fields.

use std::fmt;
use std::rc::Rc;

use crate::row::Row;
use crate::types::{BindKind, SqlType};
use crate::value::Value;

/// A single named value holder with dirty tracking.
///
/// A field distinguishes three value slots: `initial` (as of the last
/// commit), `default` (the column default), and `value` (current). The
/// `changed` flag is maintained so that it is true exactly when `value`
/// differs loosely from `initial` since the last `commit()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub pkey: bool,
    /// Declared storage type; drives value coercion and bind kinds.
    pub sql_type: SqlType,
    default: Value,
    initial: Value,
    value: Value,
    changed: bool,
}

impl Field {
    /// Create a field. `initial` seeds from `value` unless that is NULL,
    /// in which case it seeds from `default`.
    pub fn new(name: impl Into<String>, value: Value, default: Value) -> Self {
        let initial = if value.is_null() {
            default.clone()
        } else {
            value.clone()
        };
        Self {
            name: name.into(),
            nullable: true,
            pkey: false,
            sql_type: SqlType::Text,
            default,
            initial,
            value,
            changed: false,
        }
    }

    /// Set the nullable flag.
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set the primary-key flag.
    pub fn primary_key(mut self, value: bool) -> Self {
        self.pkey = value;
        self
    }

    /// Set the storage type.
    pub fn sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = sql_type;
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Value as of the last commit.
    pub fn initial(&self) -> &Value {
        &self.initial
    }

    /// Column default.
    pub fn default(&self) -> &Value {
        &self.default
    }

    /// Parameter kind used when binding this field's value.
    pub fn bind_kind(&self) -> BindKind {
        if self.value.is_null() {
            BindKind::Null
        } else {
            self.sql_type.bind_kind()
        }
    }

    /// Whether the current value differs from `initial`.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Assign a new current value, coerced to the declared storage type.
    ///
    /// Assigning something loosely equal to `initial` leaves the field
    /// clean.
    pub fn set_value(&mut self, value: impl Into<Value>) {
        let value = value.into().coerce(self.sql_type);
        self.changed = !value.loose_eq(&self.initial);
        self.value = value;
    }

    /// Restore `value` from `initial` and clear the dirty flag.
    pub fn reset(&mut self) {
        self.value = self.initial.clone();
        self.changed = false;
    }

    /// Copy `value` into `initial` and clear the dirty flag.
    pub fn commit(&mut self) {
        self.initial = self.value.clone();
        self.changed = false;
    }
}

/// The backing expression of an adhoc field.
#[derive(Clone)]
pub enum AdhocExpr {
    /// A fixed value.
    Literal(Value),
    /// A raw SQL fragment evaluated by the database and aliased to the
    /// adhoc's name in the SELECT list.
    Sql(String),
    /// A host-side computation over the owning row.
    Call(Rc<dyn Fn(&Row) -> Value>),
}

impl fmt::Debug for AdhocExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdhocExpr::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            AdhocExpr::Sql(s) => f.debug_tuple("Sql").field(s).finish(),
            AdhocExpr::Call(_) => f.write_str("Call(..)"),
        }
    }
}

/// A computed, expression-backed field.
///
/// Unlike a plain `Field`, an adhoc has no storage column: its value is
/// either a SQL expression materialized by the driver or a lazy host-side
/// computation. `commit()` and `reset()` are no-ops and never touch the
/// expression.
#[derive(Debug, Clone)]
pub struct Adhoc {
    name: String,
    expression: AdhocExpr,
    value: Option<Value>,
    changed: bool,
}

impl Adhoc {
    /// Create an adhoc field over the given expression.
    pub fn new(name: impl Into<String>, expression: AdhocExpr) -> Self {
        Self {
            name: name.into(),
            expression,
            value: None,
            changed: false,
        }
    }

    /// Adhoc backed by a raw SQL fragment.
    pub fn sql(name: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::new(name, AdhocExpr::Sql(fragment.into()))
    }

    /// Adhoc holding a literal value.
    pub fn literal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, AdhocExpr::Literal(value.into()))
    }

    /// Adhoc computed by a host-side closure.
    pub fn call(name: impl Into<String>, f: impl Fn(&Row) -> Value + 'static) -> Self {
        Self::new(name, AdhocExpr::Call(Rc::new(f)))
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing expression.
    pub fn expression(&self) -> &AdhocExpr {
        &self.expression
    }

    /// Whether an assignment is pending evaluation.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Evaluate the adhoc against its owning row.
    ///
    /// Idempotent: once clean and cached, the cached value is returned
    /// without recomputation.
    pub fn eval(&mut self, row: &Row) -> Value {
        if let Some(cached) = &self.value {
            // An explicit assignment or hydrated result wins over the
            // expression until cleared.
            let cached = cached.clone();
            self.changed = false;
            return cached;
        }
        let value = match &self.expression {
            AdhocExpr::Literal(v) => v.clone(),
            // SQL adhocs are materialized by the driver; until hydrated
            // they read as NULL.
            AdhocExpr::Sql(_) => Value::Null,
            AdhocExpr::Call(f) => f(row),
        };
        self.value = Some(value.clone());
        self.changed = false;
        value
    }

    /// Explicitly assign a value, marking it pending.
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = Some(value.into());
        self.changed = true;
    }

    /// Inject a value read from a result set without marking it pending.
    pub fn hydrate(&mut self, value: Value) {
        self.value = Some(value);
        self.changed = false;
    }

    /// Drop the cached value.
    pub fn clear(&mut self) {
        self.value = None;
        self.changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_clean_after_construction() {
        let field = Field::new("id", Value::Null, Value::Null);
        assert!(!field.is_changed());
    }

    #[test]
    fn test_field_initial_seeds_from_default() {
        let field = Field::new("active", Value::Null, Value::Int(1));
        assert_eq!(field.initial(), &Value::Int(1));
        assert_eq!(field.value(), &Value::Null);
        assert!(!field.is_changed());
    }

    #[test]
    fn test_field_dirty_tracking() {
        let mut field = Field::new("name", Value::Text("a".into()), Value::Null);
        field.set_value("b");
        assert!(field.is_changed());
        field.set_value("a");
        assert!(!field.is_changed());
    }

    #[test]
    fn test_field_loose_equal_assignment_stays_clean() {
        let mut field =
            Field::new("n", Value::Int(1), Value::Null).sql_type(SqlType::Integer);
        field.set_value(Value::Text("1".into()));
        assert!(!field.is_changed());
    }

    #[test]
    fn test_field_reset_restores_pre_edit_value() {
        let mut field = Field::new("name", Value::Text("a".into()), Value::Null);
        field.set_value("b");
        field.reset();
        assert_eq!(field.value(), &Value::Text("a".into()));
        assert!(!field.is_changed());
    }

    #[test]
    fn test_field_commit_clears_dirty_and_moves_initial() {
        let mut field = Field::new("name", Value::Text("a".into()), Value::Null);
        field.set_value("b");
        field.commit();
        assert!(!field.is_changed());
        assert_eq!(field.initial(), &Value::Text("b".into()));
    }

    #[test]
    fn test_field_set_value_coerces_to_storage_type() {
        let mut field = Field::new("n", Value::Null, Value::Null).sql_type(SqlType::Integer);
        field.set_value(Value::Text("7".into()));
        assert_eq!(field.value(), &Value::Int(7));
    }

    #[test]
    fn test_bind_kind_null_for_null_value() {
        let field = Field::new("n", Value::Null, Value::Null).sql_type(SqlType::Integer);
        assert_eq!(field.bind_kind(), BindKind::Null);
    }

    #[test]
    fn test_adhoc_eval_caches() {
        let row = Row::new("t");
        let counter = std::rc::Rc::new(std::cell::Cell::new(0u32));
        let c = counter.clone();
        let mut adhoc = Adhoc::call("computed", move |_| {
            c.set(c.get() + 1);
            Value::Int(5)
        });
        assert_eq!(adhoc.eval(&row), Value::Int(5));
        assert_eq!(adhoc.eval(&row), Value::Int(5));
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn test_adhoc_assignment_wins_over_expression() {
        let row = Row::new("t");
        let mut adhoc = Adhoc::literal("x", 1i64);
        assert_eq!(adhoc.eval(&row), Value::Int(1));
        adhoc.set_value(9i64);
        assert!(adhoc.is_changed());
        assert_eq!(adhoc.eval(&row), Value::Int(9));
        assert!(!adhoc.is_changed());
    }

    #[test]
    fn test_adhoc_clear_restores_expression() {
        let row = Row::new("t");
        let mut adhoc = Adhoc::literal("x", 1i64);
        adhoc.set_value(9i64);
        adhoc.clear();
        assert_eq!(adhoc.eval(&row), Value::Int(1));
    }

    #[test]
    fn test_adhoc_sql_reads_hydrated_value() {
        let row = Row::new("t");
        let mut adhoc = Adhoc::sql("_rows", "COUNT(*)");
        adhoc.hydrate(Value::Int(3));
        assert_eq!(adhoc.eval(&row), Value::Int(3));
    }
}
