//! Shared helpers for integration tests.

#![allow(dead_code)]

use simpledb_record::{
    AttributeStore, Attributes, Connection, ConnectionParams, MemoryStore, Model,
};
use std::sync::{Arc, Once};
use tokio::sync::Mutex;

/// Install a test subscriber once, honouring `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Connection over a fresh strongly consistent store with seeded keys.
pub fn get_test_connection() -> Connection {
    init_tracing();
    let params = ConnectionParams::builder()
        .key_seed(20_240_101)
        .build()
        .expect("test params should validate");
    Connection::open(MemoryStore::new(), params).expect("connection should open")
}

/// Connection over `store`, which the test keeps a handle to.
pub fn connection_over(store: &Arc<Mutex<MemoryStore>>, params: ConnectionParams) -> Connection {
    init_tracing();
    let shared: Arc<Mutex<dyn AttributeStore>> = store.clone();
    Connection::from_shared(shared, params).expect("connection should open")
}

pub fn shared_store(store: MemoryStore) -> Arc<Mutex<MemoryStore>> {
    Arc::new(Mutex::new(store))
}

/// Model with typed fields and eventual reads.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Car {
    pub id: String,
    pub brand: String,
    pub colour: String,
    pub doors: i64,
}

impl Model for Car {
    fn set_item_name(&mut self, name: &str) {
        self.id = name.to_string();
    }

    fn assign_attributes(&mut self, attributes: Attributes) {
        self.brand = attributes.get("brand").unwrap_or_default().to_string();
        self.colour = attributes.get("colour").unwrap_or_default().to_string();
        self.doors = attributes.get_as("doors").unwrap_or_default();
    }
}

/// Model that always reads consistently.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub total: String,
}

impl Model for Invoice {
    fn enforce_read_consistency() -> bool {
        true
    }

    fn set_item_name(&mut self, name: &str) {
        self.id = name.to_string();
    }

    fn assign_attributes(&mut self, attributes: Attributes) {
        self.total = attributes.get("total").unwrap_or_default().to_string();
    }
}

/// Insert `count` cars keyed `car-000`, `car-001`, ...
pub async fn seed_cars(conn: &mut Connection, count: usize) {
    for i in 0..count {
        let mut stmt = conn.create_statement(
            "INSERT INTO cars (itemName(), brand, doors) VALUES (:itemName(), :brand, :doors)",
        );
        stmt.bind_value(":itemName()", format!("car-{:03}", i))
            .and_then(|s| s.bind_value(":brand", if i % 2 == 0 { "Ford" } else { "Saab" }))
            .and_then(|s| s.bind_value(":doors", (i % 4 + 2) as i64))
            .expect("bind should succeed");
        conn.execute_statement(&mut stmt)
            .await
            .expect("INSERT should succeed");
    }
}
