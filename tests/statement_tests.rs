//! Integration tests for statement execution.
//!
//! These tests drive [`Connection`] end to end over the in-memory store:
//! binding, translation of emulated statements, surrogate keys, paging and
//! hydration.
//!
//! ```bash
//! RUST_LOG=simpledb_record=debug cargo test --test statement_tests
//! ```

mod common;

use common::{connection_over, get_test_connection, seed_cars, shared_store, Car, Invoice};
use simpledb_record::{
    Connection, ConnectionParams, MemoryStore, ModelRegistry, Parameter, QueryError, Record,
    Records, Statement,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

async fn fetch_record(conn: &mut Connection, domain: &str, key: &str) -> Option<Record> {
    let mut stmt = Statement::new(format!("SELECT * FROM `{}` WHERE itemName() = :key", domain));
    stmt.bind_value(":key", key).expect("bind should succeed");
    conn.fetch_into(&mut stmt)
        .await
        .expect("SELECT should succeed")
}

async fn count_items(conn: &mut Connection, domain: &str) -> usize {
    let items = conn
        .query(format!("SELECT count(*) FROM `{}`", domain))
        .await
        .expect("count should succeed");
    items[0]
        .attributes
        .get_as::<u64>("Count")
        .expect("count should be numeric") as usize
}

// ============================================================================
// INSERT
// ============================================================================

#[tokio::test]
async fn test_insert_without_key_sets_last_insert_id() {
    let mut conn = get_test_connection();
    let mut stmt = conn.create_statement(
        "INSERT INTO cars (brand, colour, doors) VALUES (:brand, :colour, :doors)",
    );
    stmt.bind_value(":brand", "Ford")
        .and_then(|s| s.bind_value(":colour", "Black"))
        .and_then(|s| s.bind_value(":doors", 2))
        .expect("bind should succeed");

    assert!(conn.execute_statement(&mut stmt).await.unwrap());

    let key = conn.last_insert_id().expect("key should be recorded").to_string();
    let record = fetch_record(&mut conn, "cars", &key)
        .await
        .expect("inserted item should exist");

    assert_eq!(record.item_name, key);
    assert_eq!(record.attributes.len(), 3);
    assert_eq!(record.attributes.get("brand"), Some("Ford"));
    assert_eq!(record.attributes.get("colour"), Some("Black"));
    assert_eq!(record.attributes.get("doors"), Some("2"));
}

#[tokio::test]
async fn test_insert_stores_unescaped_values() {
    let mut conn = get_test_connection();
    let tricky = "O'Brien said \"hi\",\nthen left C:\\temp";

    let mut stmt = Statement::new("INSERT INTO notes (itemName(), body) VALUES (:itemName(), :body)");
    stmt.bind_value(":itemName()", "n1")
        .and_then(|s| s.bind_value(":body", tricky))
        .unwrap();
    conn.execute_statement(&mut stmt).await.unwrap();

    let record = fetch_record(&mut conn, "notes", "n1").await.unwrap();
    assert_eq!(record.attributes.get("body"), Some(tricky));
}

#[tokio::test]
async fn test_insert_keeps_commas_inside_literals() {
    let mut conn = get_test_connection();
    conn.execute("INSERT INTO notes (itemName(), body, tag) VALUES ('n1', 'This is, a silly', 'x')")
        .await
        .unwrap();

    let record = fetch_record(&mut conn, "notes", "n1").await.unwrap();
    assert_eq!(record.attributes.get("body"), Some("This is, a silly"));
    assert_eq!(record.attributes.get("tag"), Some("x"));
}

#[tokio::test]
async fn test_insert_omits_null_values() {
    let mut conn = get_test_connection();
    let mut stmt =
        Statement::new("INSERT INTO cars (itemName(), brand, colour) VALUES ('c1', :brand, :colour)");
    stmt.bind_value(":brand", "Saab")
        .and_then(|s| s.bind_value(":colour", None::<&str>))
        .unwrap();
    conn.execute_statement(&mut stmt).await.unwrap();

    let record = fetch_record(&mut conn, "cars", "c1").await.unwrap();
    assert!(!record.attributes.contains("colour"));
    assert_eq!(record.attributes.len(), 1);
}

#[tokio::test]
async fn test_malformed_insert_is_a_parse_failure() {
    let mut conn = get_test_connection();
    for sql in [
        "INSERT INTO cars (brand, doors) VALUES ('Ford')",
        "INSERT INTO cars (brand) VALUES ('Ford'",
        "INSERT INTO cars (brand) VALUES ('Ford)",
    ] {
        let err = conn.execute(sql).await.unwrap_err();
        assert!(
            matches!(err, QueryError::ParseFailure { .. }),
            "{} gave {:?}",
            sql,
            err
        );
    }
}

// ============================================================================
// Surrogate Keys
// ============================================================================

#[tokio::test]
async fn test_generated_keys_never_collide() {
    let params = ConnectionParams::builder()
        .key_space(3)
        .key_retry_limit(200)
        .key_seed(11)
        .build()
        .unwrap();
    let mut conn = Connection::open(MemoryStore::new(), params).unwrap();

    let mut keys = Vec::new();
    for _ in 0..3 {
        conn.execute("INSERT INTO cars (brand) VALUES ('Ford')")
            .await
            .unwrap();
        keys.push(conn.last_insert_id().unwrap().to_string());
    }
    let last = keys[2].clone();
    keys.sort();
    assert_eq!(keys, vec!["1", "2", "3"]);

    let err = conn
        .execute("INSERT INTO cars (brand) VALUES ('Ford')")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::KeyGenerationExhausted {
            domain: "cars".to_string(),
            attempts: 200,
        }
    );
    assert_eq!(conn.last_insert_id(), Some(last.as_str()));
}

#[tokio::test]
async fn test_generated_key_skips_explicit_keys() {
    let params = ConnectionParams::builder()
        .key_space(2)
        .key_retry_limit(100)
        .key_seed(5)
        .build()
        .unwrap();
    let mut conn = Connection::open(MemoryStore::new(), params).unwrap();

    conn.execute("INSERT INTO cars (itemName(), brand) VALUES ('1', 'Saab')")
        .await
        .unwrap();
    assert_eq!(conn.last_insert_id(), Some("1"));

    conn.execute("INSERT INTO cars (brand) VALUES ('Ford')")
        .await
        .unwrap();
    assert_eq!(conn.last_insert_id(), Some("2"));
}

// ============================================================================
// Binding
// ============================================================================

#[tokio::test]
async fn test_prefix_placeholders_do_not_corrupt_each_other() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 1).await;

    let mut stmt = Statement::new(
        "UPDATE cars SET brand = :brand, brandname = :brandname WHERE itemName() = 'car-000'",
    );
    stmt.bind_value(":brand", "Volvo")
        .and_then(|s| s.bind_value(":brandname", "Volvo Cars"))
        .unwrap();
    conn.execute_statement(&mut stmt).await.unwrap();

    let record = fetch_record(&mut conn, "cars", "car-000").await.unwrap();
    assert_eq!(record.attributes.get("brand"), Some("Volvo"));
    assert_eq!(record.attributes.get("brandname"), Some("Volvo Cars"));
}

#[tokio::test]
async fn test_deferred_binding_reads_value_at_execute_time() {
    let mut conn = get_test_connection();
    let calls = Arc::new(AtomicUsize::new(0));
    let colour = Arc::new(std::sync::Mutex::new("Red".to_string()));

    let mut stmt = Statement::new("INSERT INTO cars (itemName(), colour) VALUES ('c1', :colour)");
    {
        let calls = Arc::clone(&calls);
        let colour = Arc::clone(&colour);
        stmt.bind_param(":colour", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            colour.lock().map(|c| c.clone()).unwrap_or_default()
        })
        .unwrap();
    }

    *colour.lock().unwrap() = "Blue".to_string();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    conn.execute_statement(&mut stmt).await.unwrap();
    conn.execute_statement(&mut stmt).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let record = fetch_record(&mut conn, "cars", "c1").await.unwrap();
    assert_eq!(record.attributes.get("colour"), Some("Blue"));
}

#[tokio::test]
async fn test_binding_missing_placeholder_fails() {
    let mut stmt = Statement::new("SELECT * FROM cars WHERE brand = :brand");
    let err = stmt.bind_value(":colour", "Red").unwrap_err();
    assert!(matches!(err, QueryError::ParameterBinding(_)));

    let mut conn = get_test_connection();
    let err = conn
        .execute_with(&mut stmt, [(":doors", Parameter::from(2))])
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::ParameterBinding(_)));
}

#[tokio::test]
async fn test_unbound_placeholder_in_mutation_fails() {
    let mut conn = get_test_connection();
    let err = conn
        .execute("INSERT INTO cars (brand) VALUES (:brand)")
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::ParseFailure { .. }));
}

// ============================================================================
// UPDATE and DELETE
// ============================================================================

#[tokio::test]
async fn test_update_by_key_with_null_removes_attribute() {
    let mut conn = get_test_connection();
    conn.execute("INSERT INTO cars (itemName(), brand, colour) VALUES ('c1', 'Ford', 'Black')")
        .await
        .unwrap();

    let mut stmt =
        Statement::new("UPDATE cars SET colour = :colour, doors = :doors WHERE itemName() = 'c1'");
    stmt.bind_value(":colour", None::<String>)
        .and_then(|s| s.bind_value(":doors", 5))
        .unwrap();
    conn.execute_statement(&mut stmt).await.unwrap();

    let record = fetch_record(&mut conn, "cars", "c1").await.unwrap();
    assert_eq!(record.attributes.get("brand"), Some("Ford"));
    assert_eq!(record.attributes.get("doors"), Some("5"));
    assert!(!record.attributes.contains("colour"));
}

#[tokio::test]
async fn test_update_with_predicate_touches_every_match() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 6).await;

    conn.execute("UPDATE cars SET colour = 'Red' WHERE brand = 'Saab'")
        .await
        .unwrap();

    let mut stmt = Statement::new("SELECT * FROM cars WHERE colour = 'Red'");
    let red: Records<Car> = conn.fetch_all_into(&mut stmt).await.unwrap();
    assert_eq!(red.len(), 3);
    assert!(red.values().all(|car| car.brand == "Saab"));
}

#[tokio::test]
async fn test_update_value_with_escaped_quote() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 1).await;

    conn.execute(r"UPDATE cars SET owner = 'O\'Neil' WHERE itemName() = 'car-000'")
        .await
        .unwrap();

    let record = fetch_record(&mut conn, "cars", "car-000").await.unwrap();
    assert_eq!(record.attributes.get("owner"), Some("O'Neil"));
}

#[tokio::test]
async fn test_delete_by_key() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 3).await;

    conn.execute("DELETE FROM cars WHERE itemName() = 'car-001'")
        .await
        .unwrap();

    assert!(fetch_record(&mut conn, "cars", "car-001").await.is_none());
    assert_eq!(count_items(&mut conn, "cars").await, 2);
}

#[tokio::test]
async fn test_delete_with_predicate_uses_batches() {
    let store = shared_store(MemoryStore::new());
    let params = ConnectionParams::builder().key_seed(3).build().unwrap();
    let mut conn = connection_over(&store, params);
    seed_cars(&mut conn, 60).await;

    conn.execute("DELETE FROM cars WHERE brand = 'Ford'")
        .await
        .unwrap();
    assert_eq!(count_items(&mut conn, "cars").await, 30);
    assert_eq!(store.lock().await.stats().batch_deletes, 2);

    conn.execute("DELETE FROM cars").await.unwrap();
    assert_eq!(count_items(&mut conn, "cars").await, 0);
    assert_eq!(store.lock().await.stats().batch_deletes, 4);
}

#[tokio::test]
async fn test_delete_respects_configured_batch_size() {
    let store = shared_store(MemoryStore::new());
    let params = ConnectionParams::builder()
        .delete_batch_size(4)
        .select_limit(5)
        .build()
        .unwrap();
    let mut conn = connection_over(&store, params);
    seed_cars(&mut conn, 10).await;

    conn.execute("DELETE FROM `cars`").await.unwrap();

    let stats = store.lock().await.stats();
    assert_eq!(stats.batch_deletes, 3);
    assert_eq!(stats.selects, 2);
    assert_eq!(store.lock().await.item_count("cars"), 0);
}

#[tokio::test]
async fn test_mutations_on_missing_domain() {
    let mut conn = get_test_connection();
    conn.execute("DELETE FROM ghosts WHERE itemName() = 'g1'")
        .await
        .unwrap();
    conn.execute("DELETE FROM ghosts WHERE name = 'boo'")
        .await
        .unwrap();
    conn.execute("UPDATE ghosts SET name = 'boo' WHERE name = 'x'")
        .await
        .unwrap();
    conn.execute("UPDATE ghosts SET name = NULL WHERE itemName() = 'g1'")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_bare_domain_name_with_dash_and_dot() {
    let mut conn = get_test_connection();
    conn.execute("INSERT INTO my-domain (itemName(), brand) VALUES ('1', 'Ford')")
        .await
        .unwrap();
    conn.execute("UPDATE my-domain SET colour = 'Red' WHERE brand = 'Ford'")
        .await
        .unwrap();

    let mut stmt = Statement::new("SELECT * FROM my-domain WHERE itemName() = '1'");
    let car: Option<Car> = conn.fetch_into(&mut stmt).await.unwrap();
    let car = car.unwrap();
    assert_eq!(car.brand, "Ford");
    assert_eq!(car.colour, "Red");

    conn.execute("INSERT INTO cars.v2 (itemName(), brand) VALUES ('2', 'Saab')")
        .await
        .unwrap();
    conn.execute("DELETE FROM cars.v2 WHERE brand = 'Saab'")
        .await
        .unwrap();
    let mut stmt = Statement::new("SELECT * FROM cars.v2");
    let cars: Records<Car> = conn.fetch_all_into(&mut stmt).await.unwrap();
    assert!(cars.is_empty());
}

// ============================================================================
// Fetching
// ============================================================================

#[tokio::test]
async fn test_fetch_into_without_match_is_none() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 2).await;

    let mut stmt = Statement::new("SELECT * FROM cars WHERE brand = :brand");
    stmt.bind_value(":brand", "Trabant").unwrap();
    let car: Option<Car> = conn.fetch_into(&mut stmt).await.unwrap();
    assert!(car.is_none());
}

#[tokio::test]
async fn test_fetch_into_hydrates_typed_model() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 2).await;

    let mut stmt = Statement::new("SELECT * FROM cars WHERE itemName() = 'car-001'");
    let car: Car = conn.fetch_into(&mut stmt).await.unwrap().unwrap();
    assert_eq!(
        car,
        Car {
            id: "car-001".to_string(),
            brand: "Saab".to_string(),
            colour: String::new(),
            doors: 3,
        }
    );
}

#[tokio::test]
async fn test_fetch_all_follows_continuation_tokens() {
    let store = shared_store(MemoryStore::new().with_page_size(3));
    let mut conn = connection_over(&store, ConnectionParams::default());
    seed_cars(&mut conn, 10).await;

    let mut stmt = Statement::new("SELECT * FROM cars");
    let cars: Records<Car> = conn.fetch_all_into(&mut stmt).await.unwrap();

    assert_eq!(cars.len(), 10);
    let keys: Vec<_> = cars.keys().cloned().collect();
    let expected: Vec<_> = (0..10).map(|i| format!("car-{:03}", i)).collect();
    assert_eq!(keys, expected);
    assert_eq!(store.lock().await.stats().selects, 4);
}

#[tokio::test]
async fn test_fetch_all_without_match_is_empty() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 3).await;

    let mut stmt = Statement::new("SELECT * FROM cars WHERE doors > '9'");
    let cars: Records<Car> = conn.fetch_all_into(&mut stmt).await.unwrap();
    assert!(cars.is_empty());
}

#[tokio::test]
async fn test_fetch_strips_alias_syntax() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 4).await;

    let mut stmt = Statement::new(
        "SELECT `Car`.`brand` FROM `cars` AS `Car` WHERE `Car`.`brand` = :brand ORDER BY itemName() DESC",
    );
    stmt.bind_value(":brand", "Ford").unwrap();
    let records: Records<Record> = conn.fetch_all_into(&mut stmt).await.unwrap();

    assert_eq!(records.keys().collect::<Vec<_>>(), vec!["car-002", "car-000"]);
    assert!(records.values().all(|r| r.attributes.len() == 1));
}

#[tokio::test]
async fn test_fetch_failed_reports_query() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 1).await;

    let mut stmt = Statement::new("SELECT * FROM cars WHERE");
    let err = conn.fetch_all_into::<Car>(&mut stmt).await.unwrap_err();
    match err {
        QueryError::FetchFailed { query, .. } => assert_eq!(query, "SELECT * FROM cars WHERE"),
        other => panic!("expected FetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_by_class_name() {
    let mut conn = get_test_connection();
    seed_cars(&mut conn, 3).await;

    let mut registry = ModelRegistry::new();
    registry.register::<Car>("Car");

    let mut stmt = Statement::new("SELECT * FROM cars WHERE itemName() = 'car-002'");
    let model = conn
        .fetch_into_class(&mut stmt, &registry, "Car")
        .await
        .unwrap()
        .expect("car-002 should exist");
    let car = model.as_any().downcast_ref::<Car>().unwrap();
    assert_eq!(car.brand, "Ford");

    let mut stmt = Statement::new("SELECT * FROM cars");
    let all = conn
        .fetch_all_into_class(&mut stmt, &registry, "Car")
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let calls_before = conn.session().store_call_count();
    let mut stmt = Statement::new("SELECT * FROM cars");
    let err = conn
        .fetch_into_class(&mut stmt, &registry, "Truck")
        .await
        .err()
        .unwrap();
    assert_eq!(err, QueryError::ClassNotFound("Truck".to_string()));
    assert_eq!(conn.session().store_call_count(), calls_before);
}

// ============================================================================
// Read Consistency
// ============================================================================

#[tokio::test]
async fn test_eventual_store_read_consistency() {
    let store = shared_store(MemoryStore::eventual());
    let mut conn = connection_over(&store, ConnectionParams::default());

    conn.execute("INSERT INTO cars (itemName(), brand) VALUES ('c1', 'Ford')")
        .await
        .unwrap();
    conn.execute("INSERT INTO invoices (itemName(), total) VALUES ('i1', '10.00')")
        .await
        .unwrap();

    let mut stmt = Statement::new("SELECT * FROM cars");
    let stale: Option<Car> = conn.fetch_into(&mut stmt).await.unwrap();
    assert!(stale.is_none());

    let mut stmt = Statement::new("SELECT * FROM invoices");
    let invoice: Option<Invoice> = conn.fetch_into(&mut stmt).await.unwrap();
    assert_eq!(invoice.unwrap().total, "10.00");

    let consistent = ConnectionParams::builder()
        .consistent_read(true)
        .build()
        .unwrap();
    let mut strict = connection_over(&store, consistent);
    let mut stmt = Statement::new("SELECT * FROM cars");
    let car: Option<Car> = strict.fetch_into(&mut stmt).await.unwrap();
    assert_eq!(car.unwrap().brand, "Ford");

    store.lock().await.settle();
    let mut stmt = Statement::new("SELECT * FROM cars");
    let car: Option<Car> = conn.fetch_into(&mut stmt).await.unwrap();
    assert!(car.is_some());
}

// ============================================================================
// Blocking API
// ============================================================================

#[test]
fn test_blocking_api() {
    let mut conn = get_test_connection();

    let mut insert = Statement::new("INSERT INTO cars (itemName(), brand) VALUES ('b1', :brand)");
    insert.bind_value(":brand", "Lada").unwrap();
    assert!(conn.blocking_execute_statement(&mut insert).unwrap());

    let mut select = Statement::new("SELECT * FROM cars WHERE brand = 'Lada'");
    let car: Option<Car> = conn.blocking_fetch_into(&mut select).unwrap();
    assert_eq!(car.unwrap().id, "b1");

    let mut select = Statement::new("SELECT * FROM cars");
    let all: Records<Car> = conn.blocking_fetch_all_into(&mut select).unwrap();
    assert_eq!(all.len(), 1);
}
