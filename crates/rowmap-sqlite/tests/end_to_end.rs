//! Full-stack tests: mapper and driver over a real SQLite database.

use std::cell::RefCell;
use std::rc::Rc;

use rowmap::prelude::*;
use rowmap::rules::{RecordExists, Unique};
use rowmap_sqlite::SqliteConnection;

type SharedDriver = Rc<RefCell<Driver<SqliteConnection>>>;

fn user_driver() -> SharedDriver {
    let mut conn = SqliteConnection::open_memory().unwrap();
    conn.raw()
        .execute_batch(
            "CREATE TABLE user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                active INTEGER DEFAULT 1
            )",
        )
        .unwrap();
    Rc::new(RefCell::new(Driver::with_connection(conn)))
}

fn user_mapper(driver: &SharedDriver) -> Mapper<SqliteConnection> {
    let mut mapper = Mapper::new(Rc::clone(driver));
    mapper.set_name("user", None, None, 0).unwrap();
    mapper
}

#[test]
fn test_insert_update_delete_scenario() {
    let driver = user_driver();
    let mut users = user_mapper(&driver);

    // insert: auto-increment key excluded, default applied
    users.set("username", "foo");
    assert!(users.save().unwrap());
    assert!(users.valid());
    assert_eq!(users.get("id").unwrap(), Value::Int(1));
    assert_eq!(users.get("username").unwrap(), Value::Text("foo".to_string()));
    assert_eq!(users.get("active").unwrap(), Value::Int(1));

    // update, then re-read through a fresh cursor
    users.set("username", "bar");
    assert!(users.save().unwrap());
    let mut check = user_mapper(&driver);
    check
        .first(&Filter::new().push("id", 1i64), &SelectOptions::new(), 0)
        .unwrap();
    assert!(check.valid());
    assert_eq!(check.get("username").unwrap(), Value::Text("bar".to_string()));

    // delete the current row
    assert_eq!(users.delete(None).unwrap(), 1);
    let template = driver.borrow_mut().schema("user", None, 0).unwrap();
    let remaining = driver
        .borrow_mut()
        .count(&template, &Filter::new(), &SelectOptions::new(), 0)
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn test_find_by_primary_key() {
    let driver = user_driver();
    let mut users = user_mapper(&driver);
    for name in ["a", "b", "c"] {
        users.reset();
        users.set("username", name);
        users.save().unwrap();
    }
    let mut lookup = user_mapper(&driver);
    lookup.find(&[Value::Int(2)]).unwrap();
    assert!(lookup.valid());
    assert_eq!(lookup.get("username").unwrap(), Value::Text("b".to_string()));
}

#[test]
fn test_paginate_against_real_data() {
    let driver = user_driver();
    let mut users = user_mapper(&driver);
    for name in ["a", "b", "c"] {
        users.reset();
        users.set("username", name);
        users.save().unwrap();
    }
    let template = driver.borrow_mut().schema("user", None, 0).unwrap();
    let options = SelectOptions::new().order("id");
    let page = driver
        .borrow_mut()
        .paginate(&template, 2, 1, &Filter::new(), &options, 0)
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.pages, 3);
    assert_eq!(page.count, 1);
    assert_eq!(page.start, 2);
    assert_eq!(page.end, 2);
    let mut row = page.subset.into_iter().next().unwrap();
    assert_eq!(row.get("username").unwrap(), Value::Text("b".to_string()));
}

#[test]
fn test_filtered_load_and_count() {
    let driver = user_driver();
    let mut users = user_mapper(&driver);
    for (name, active) in [("a", 1i64), ("b", 0), ("c", 1)] {
        users.reset();
        users.set("username", name);
        users.set("active", active);
        users.save().unwrap();
    }
    let mut actives = user_mapper(&driver);
    actives
        .load(&Filter::new().push("active", 1i64), &SelectOptions::new(), 0)
        .unwrap();
    assert_eq!(actives.count(), 2);

    let template = driver.borrow_mut().schema("user", None, 0).unwrap();
    let n = driver
        .borrow_mut()
        .count(
            &template,
            &Filter::new().push("active", 0i64),
            &SelectOptions::new(),
            0,
        )
        .unwrap();
    assert_eq!(n, 1);
}

#[test]
fn test_dynamic_accessors() {
    let driver = user_driver();
    let mut users = user_mapper(&driver);
    users.set("username", "dyn");
    users.save().unwrap();

    let mut lookup = user_mapper(&driver);
    let hit = lookup
        .call("loadByUsername", &[Value::Text("dyn".to_string())])
        .unwrap();
    assert_eq!(hit, Value::Bool(true));
    assert_eq!(
        lookup.call("getUsername", &[]).unwrap(),
        Value::Text("dyn".to_string())
    );
    let miss = lookup
        .call("findByUsername", &[Value::Text("ghost".to_string())])
        .unwrap();
    assert_eq!(miss, Value::Bool(false));
}

#[test]
fn test_uniqueness_rules() {
    let driver = user_driver();
    let mut users = user_mapper(&driver);
    users.set("username", "taken");
    users.save().unwrap();

    let exists = RecordExists::new(Rc::clone(&driver), "user", "username");
    assert!(exists.check(&Value::Text("taken".to_string())).unwrap());
    assert!(!exists.check(&Value::Text("free".to_string())).unwrap());

    let unique = Unique::new(Rc::clone(&driver), "user", "username");
    assert!(!unique.check(&Value::Text("taken".to_string())).unwrap());
    assert!(unique.check(&Value::Text("free".to_string())).unwrap());

    // the record itself is excluded when updating in place
    let own = Unique::new(Rc::clone(&driver), "user", "username").except("id", 1i64);
    assert!(own.check(&Value::Text("taken".to_string())).unwrap());
}

#[test]
fn test_transaction_rollback() {
    let driver = user_driver();
    let mut users = user_mapper(&driver);

    driver.borrow_mut().begin().unwrap();
    users.set("username", "temp");
    users.save().unwrap();
    driver.borrow_mut().rollback().unwrap();

    let mut check = user_mapper(&driver);
    check.load(&Filter::new(), &SelectOptions::new(), 0).unwrap();
    assert_eq!(check.count(), 0);
}

#[test]
fn test_delete_by_clause_counts() {
    let driver = user_driver();
    let mut users = user_mapper(&driver);
    for (name, active) in [("a", 0i64), ("b", 0), ("c", 1)] {
        users.reset();
        users.set("username", name);
        users.set("active", active);
        users.save().unwrap();
    }
    let removed = users
        .delete(Some(&Filter::new().push("active", 0i64)))
        .unwrap();
    assert_eq!(removed, 2);
}
