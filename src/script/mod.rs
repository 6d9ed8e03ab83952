//! Lua custom commands.
//!
//! This module lets a caller define a named command whose body is a Lua
//! script and invoke it against the store, the way `defineCommand` works on
//! a real Redis client.
//!
//! # Architecture
//!
//! The scripting system consists of these components:
//!
//! - **marshal**: converts between host [`Value`](crate::Value)s and Lua values
//! - **env**: publishes the per-invocation `KEYS` and `ARGV` globals
//! - **bridge**: `redis.call` / `redis.pcall`, dispatching into the keyspace
//! - **executor**: compiles bodies and runs one invocation
//! - **registry**: compiled commands by name
//! - **runtime**: owns the interpreter and its init/dispose lifecycle
//!
//! # Script Surface
//!
//! Scripts see exactly these globals on top of the Lua standard library:
//!
//! - `KEYS`: the first `number_of_keys` invocation arguments
//! - `ARGV`: the remaining arguments
//! - `redis.call(cmd, ...)`: runs a store command, raising on failure
//! - `redis.pcall(cmd, ...)`: runs a store command, returning `{ err = msg }`
//!   on failure
//!
//! Script effects are applied immediately and are not rolled back if the
//! script fails later on.
//!
//! # Example
//!
//! ```rust,no_run
//! use luamock::script::ScriptDefinition;
//! use luamock::{Store, Value};
//!
//! # async fn demo() -> Result<(), luamock::Error> {
//! let store = Store::new();
//! store.set("counter", "1").await?;
//!
//! let script = r#"
//!     local current = redis.call("GET", KEYS[1])
//!     local next = current + ARGV[1]
//!     redis.call("SET", KEYS[1], next)
//!     return next
//! "#;
//! store.define_command("incr_by", ScriptDefinition::new(1, script)).await?;
//!
//! let result = store.invoke("incr_by", ["counter", "5"]).await?;
//! assert_eq!(result, Value::Integer(6));
//! # Ok(())
//! # }
//! ```

mod bridge;
mod env;
mod executor;
mod marshal;
pub mod registry;
pub(crate) mod runtime;

pub use registry::ScriptDefinition;
pub(crate) use runtime::ScriptRuntime;
