//! Basic usage example for simpledb-record.
//!
//! This example walks through the core functionality: opening a connection
//! over the in-memory SimpleDB store, inserting with generated keys, reading
//! back into typed models, and emulated UPDATE and DELETE statements.
//!
//! Run with `RUST_LOG=simpledb_record=debug` to see store calls.

use simpledb_record::{
    Attributes, Connection, ConnectionParams, MemoryStore, Model, ModelRegistry, Records,
};
use std::error::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Car {
    id: String,
    brand: String,
    colour: Option<String>,
    doors: i64,
}

impl Model for Car {
    fn enforce_read_consistency() -> bool {
        true
    }

    fn set_item_name(&mut self, name: &str) {
        self.id = name.to_string();
    }

    fn assign_attributes(&mut self, attributes: Attributes) {
        self.brand = attributes.get("brand").unwrap_or_default().to_string();
        self.colour = attributes.get("colour").map(str::to_string);
        self.doors = attributes.get_as("doors").unwrap_or_default();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== simpledb-record Basic Usage Example ===\n");

    // 1. Open a connection
    println!("1. Opening connection over an eventually consistent store...");
    let params: ConnectionParams = "simpledb://memory?consistent_read=true&key_retries=5&query_timeout_ms=2000".parse()?;
    let mut connection = Connection::open(MemoryStore::eventual(), params)?;
    println!("   Params: {:?}\n", connection.params());

    // 2. Insert without a key
    println!("2. Inserting cars with generated keys...");
    for (brand, colour, doors) in [("Ford", "Black", 2), ("Saab", "Red", 4), ("Ford", "Blue", 5)] {
        let mut stmt = connection.create_statement(
            "INSERT INTO cars (brand, colour, doors) VALUES (:brand, :colour, :doors)",
        );
        stmt.bind_value(":brand", brand)?
            .bind_value(":colour", colour)?
            .bind_value(":doors", doors)?;
        connection.execute_statement(&mut stmt).await?;
        println!(
            "   Inserted {} with key {}",
            brand,
            connection.last_insert_id().unwrap_or("?")
        );
    }
    println!();

    // 3. Fetch one car by key
    println!("3. Fetching the last car by key...");
    let key = connection.last_insert_id().unwrap_or_default().to_string();
    let mut stmt = connection.create_statement("SELECT * FROM cars WHERE itemName() = :key");
    stmt.bind_value(":key", key.as_str())?;
    let car: Option<Car> = connection.fetch_into(&mut stmt).await?;
    println!("   {:?}\n", car);

    // 4. Update with a predicate
    println!("4. Repainting every Ford...");
    let mut stmt = connection.create_statement("UPDATE cars SET colour = :colour WHERE brand = :brand");
    let paint = String::from("Green");
    stmt.bind_param(":colour", move || paint)?
        .bind_value(":brand", "Ford")?;
    connection.execute_statement(&mut stmt).await?;

    let mut stmt = connection.create_statement("SELECT * FROM cars ORDER BY brand");
    let cars: Records<Car> = connection.fetch_all_into(&mut stmt).await?;
    for (key, car) in &cars {
        println!("   {} -> {} {:?} ({} doors)", key, car.brand, car.colour, car.doors);
    }
    println!();

    // 5. Hydrate by class name
    println!("5. Fetching through the model registry...");
    let mut registry = ModelRegistry::new();
    registry.register::<Car>("Car");
    let mut stmt = connection.create_statement("SELECT * FROM cars WHERE brand = 'Saab'");
    let saabs = connection
        .fetch_all_into_class(&mut stmt, &registry, "Car")
        .await?;
    println!("   {} Saab(s)\n", saabs.len());

    // 6. Delete
    println!("6. Deleting every Ford...");
    connection.execute("DELETE FROM cars WHERE brand = 'Ford'").await?;
    let remaining = connection.query("SELECT count(*) FROM cars").await?;
    println!(
        "   Remaining: {}",
        remaining
            .first()
            .and_then(|item| item.attributes.get("Count"))
            .unwrap_or("0")
    );

    println!(
        "\n=== Done: {} statements, {} store calls ===",
        connection.session().statement_count(),
        connection.session().store_call_count()
    );
    Ok(())
}
