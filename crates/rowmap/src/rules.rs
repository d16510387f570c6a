//! Validation rules built on the mapper.
//!
//! These are consumers of the data layer, not part of it: each check
//! builds a throwaway [`Mapper`], runs `first`, and answers from cursor
//! validity.

use std::cell::RefCell;
use std::rc::Rc;

use rowmap_core::{Connection, Result, Value};
use rowmap_query::{Filter, SelectOptions};

use crate::driver::Driver;
use crate::mapper::Mapper;

/// "Does a record with this value exist?"
pub struct RecordExists<C: Connection> {
    driver: Rc<RefCell<Driver<C>>>,
    table: String,
    column: String,
}

impl<C: Connection> RecordExists<C> {
    pub fn new(
        driver: Rc<RefCell<Driver<C>>>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            table: table.into(),
            column: column.into(),
        }
    }

    /// True when at least one record carries `value` in the column.
    pub fn check(&self, value: &Value) -> Result<bool> {
        let mut mapper = Mapper::new(Rc::clone(&self.driver));
        mapper.set_name(&self.table, None, None, 0)?;
        let filter = Filter::new().push(self.column.clone(), value.clone());
        mapper.first(&filter, &SelectOptions::new(), 0)?;
        Ok(mapper.valid())
    }
}

/// "Is this value free?", optionally excluding one record so an
/// unchanged value passes its own record's uniqueness check on update.
pub struct Unique<C: Connection> {
    driver: Rc<RefCell<Driver<C>>>,
    table: String,
    column: String,
    except: Option<(String, Value)>,
}

impl<C: Connection> Unique<C> {
    pub fn new(
        driver: Rc<RefCell<Driver<C>>>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            table: table.into(),
            column: column.into(),
            except: None,
        }
    }

    /// Exclude the record whose `column` equals `value` (typically the
    /// primary key of the record being updated).
    pub fn except(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.except = Some((column.into(), value.into()));
        self
    }

    /// True when no other record carries `value` in the column.
    pub fn check(&self, value: &Value) -> Result<bool> {
        let mut mapper = Mapper::new(Rc::clone(&self.driver));
        mapper.set_name(&self.table, None, None, 0)?;
        let mut filter = Filter::new().push(self.column.clone(), value.clone());
        if let Some((column, excluded)) = &self.except {
            filter = filter.push(format!("{column} <>"), excluded.clone());
        }
        mapper.first(&filter, &SelectOptions::new(), 0)?;
        Ok(!mapper.valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;
    use rowmap_core::{ColumnInfo, SqlType};

    fn user_driver() -> Rc<RefCell<Driver<MockConnection>>> {
        let mut conn = MockConnection::new();
        conn.set_columns(
            "user",
            vec![
                ColumnInfo {
                    name: "id".to_string(),
                    sql_type: SqlType::Integer,
                    nullable: false,
                    pkey: true,
                    default: None,
                },
                ColumnInfo {
                    name: "username".to_string(),
                    sql_type: SqlType::Text,
                    nullable: false,
                    pkey: false,
                    default: None,
                },
            ],
        );
        Rc::new(RefCell::new(Driver::with_connection(conn)))
    }

    fn push_user(driver: &Rc<RefCell<Driver<MockConnection>>>) {
        driver
            .borrow_mut()
            .connection_mut()
            .unwrap()
            .push_rows(vec![vec![
                ("id".to_string(), Value::Int(1)),
                ("username".to_string(), Value::Text("foo".to_string())),
            ]]);
    }

    #[test]
    fn test_record_exists_hit_and_miss() {
        let driver = user_driver();
        let rule = RecordExists::new(Rc::clone(&driver), "user", "username");
        push_user(&driver);
        assert!(rule.check(&Value::Text("foo".to_string())).unwrap());
        // queue is empty now: the next first() yields nothing
        assert!(!rule.check(&Value::Text("ghost".to_string())).unwrap());
    }

    #[test]
    fn test_unique_fails_on_existing_value() {
        let driver = user_driver();
        let rule = Unique::new(Rc::clone(&driver), "user", "username");
        push_user(&driver);
        assert!(!rule.check(&Value::Text("foo".to_string())).unwrap());
        assert!(rule.check(&Value::Text("fresh".to_string())).unwrap());
    }

    #[test]
    fn test_unique_except_filters_own_record() {
        let driver = user_driver();
        let rule = Unique::new(Rc::clone(&driver), "user", "username").except("id", 1i64);
        assert!(rule.check(&Value::Text("foo".to_string())).unwrap());
        let log = driver
            .borrow_mut()
            .connection_mut()
            .unwrap()
            .log()
            .to_vec();
        let (sql, _) = log.last().unwrap();
        assert!(sql.contains("`username` = :username AND `id` <> :id"));
    }
}
