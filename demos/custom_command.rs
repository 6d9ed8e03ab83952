//! Example: Lua Custom Commands
//!
//! This example demonstrates defining custom commands with Lua and invoking
//! them against the in-memory store. Run with `RUST_LOG=debug` to see the
//! script runtime's log output.

use luamock::{Error, ScriptDefinition, Store, Value};

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let store = Store::new();

    println!("=== Lua Custom Command Example ===\n");

    // Example 1: read-modify-write in one atomic step
    println!("Example 1: atomic increment");
    println!("---------------------------");

    store.set("k", 1).await?;
    store
        .define_command(
            "inc2",
            ScriptDefinition::new(
                1,
                r#"
                local rcall = redis.call
                local value1 = rcall("GET", KEYS[1])
                local value2 = value1 + ARGV[1]
                rcall("SET", KEYS[1], value2)
                return value2
                "#,
            ),
        )
        .await?;

    let result = store.invoke("inc2", vec![Value::from("k"), Value::from(5)]).await?;
    println!("inc2 k 5 -> {:?}", result);
    println!("GET k    -> {:?}", store.get("k").await?);

    // Example 2: table replies
    println!("\nExample 2: table replies");
    println!("------------------------");

    store
        .define_command("nested", ScriptDefinition::new(0, "return {{10}, {100, 200}, {}}"))
        .await?;
    let no_args: [&str; 0] = [];
    let result = store.invoke("nested", no_args).await?;
    println!("nested -> {}", serde_json::to_string(&result).unwrap_or_default());

    // Example 3: call vs pcall
    println!("\nExample 3: error handling");
    println!("-------------------------");

    store
        .define_command(
            "guarded",
            ScriptDefinition::new(0, "return redis.pcall('NOSUCHCOMMAND')"),
        )
        .await?;
    println!("guarded -> {:?}", store.invoke("guarded", no_args).await?);

    store
        .define_command(
            "unguarded",
            ScriptDefinition::new(0, "return redis.call('NOSUCHCOMMAND')"),
        )
        .await?;
    match store.invoke("unguarded", no_args).await {
        Ok(v) => println!("unguarded -> {:?}", v),
        Err(e) => println!("unguarded failed: {}", e),
    }

    // Example 4: lifecycle
    println!("\nExample 4: disposal");
    println!("-------------------");

    store.dispose_scripts().await;
    match store.invoke("inc2", ["k", "1"]).await {
        Ok(v) => println!("inc2 after dispose -> {:?}", v),
        Err(e) => println!("inc2 after dispose failed: {}", e),
    }

    Ok(())
}
