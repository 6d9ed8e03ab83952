//! # luamock - An In-Memory Redis Stand-In With Lua Custom Commands
//!
//! luamock reproduces the behavior of individual Redis commands over a shared
//! in-memory map so that code talking to Redis can be tested without a
//! server. Its main feature is scripting: a caller defines a named command
//! whose body is Lua, then invokes it against the store.
//!
//! ## Architecture
//!
//! The store is split into two layers:
//!
//! - **Store**: the public, awaitable API. Every operation first acquires the
//!   execution gate, so a running script is never interleaved with another
//!   command.
//! - **Keyspace**: the synchronous core that actually executes commands. The
//!   `redis.call` bridge inside scripts talks to it directly, because a
//!   script runs while the gate is already held and cannot suspend.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use luamock::script::ScriptDefinition;
//! use luamock::{Store, Value};
//!
//! # async fn demo() -> Result<(), luamock::Error> {
//! let store = Store::new();
//! store.set("k", 1).await?;
//!
//! store
//!     .define_command(
//!         "inc2",
//!         ScriptDefinition::new(
//!             1,
//!             "local v = redis.call('GET', KEYS[1]) + ARGV[1]; redis.call('SET', KEYS[1], v); return v",
//!         ),
//!     )
//!     .await?;
//!
//! let value = store.invoke("inc2", vec![Value::from("k"), Value::from(5)]).await?;
//! assert_eq!(value, Value::Integer(6));
//! assert_eq!(store.get("k").await?, Some("6".to_string()));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod error;
pub mod keyspace;
pub mod script;
pub mod value;

// Re-exports
pub use config::Options;
pub use error::{Error, Result};
pub use keyspace::{CommandDispatcher, Keyspace};
pub use script::ScriptDefinition;
pub use value::Value;

use script::ScriptRuntime;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The main store handle.
///
/// # Thread Safety
///
/// `Store` is `Send + Sync` and can be shared across tasks using
/// `Arc<Store>`. Operations are serialized through a single gate; at most one
/// script executes at any instant.
pub struct Store {
    /// Synchronous command core
    keyspace: Arc<Keyspace>,

    /// Execution gate. Holding it grants exclusive use of the script runtime
    /// and of the keyspace as a whole.
    scripts: Mutex<ScriptRuntime>,
}

impl Store {
    /// Creates a store with default options.
    pub fn new() -> Self {
        Self::build(Options::default())
    }

    /// Creates a store with the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the options fail validation.
    pub fn with_options(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(options))
    }

    fn build(options: Options) -> Self {
        let keyspace = Arc::new(Keyspace::new());
        let dispatcher: Arc<dyn CommandDispatcher> = keyspace.clone();
        Self {
            keyspace,
            scripts: Mutex::new(ScriptRuntime::new(dispatcher, options)),
        }
    }

    /// Returns the synchronous core, for inspecting state in tests.
    ///
    /// Commands dispatched through it bypass the execution gate.
    pub fn keyspace(&self) -> Arc<Keyspace> {
        Arc::clone(&self.keyspace)
    }

    /// Runs a built-in command.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use luamock::{Store, Value};
    /// # async fn demo() -> Result<(), luamock::Error> {
    /// let store = Store::new();
    /// store.command("SADD", ["s", "a", "b"]).await?;
    /// assert_eq!(store.command("SCARD", ["s"]).await?, Value::Integer(2));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn command<I, A>(&self, name: &str, args: I) -> Result<Value>
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        let args = to_args(args)?;
        let _gate = self.scripts.lock().await;
        self.keyspace.dispatch(name, &args)
    }

    /// Defines (or redefines) the custom command `name`.
    ///
    /// The source is compiled once here; redefinition under an existing name
    /// silently replaces the previous body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Script`] if the source does not compile and
    /// [`Error::Lifecycle`] if scripting has been disposed.
    pub async fn define_command(&self, name: &str, definition: ScriptDefinition) -> Result<()> {
        let mut runtime = self.scripts.lock().await;
        runtime.define(name, definition)
    }

    /// Invokes the custom command `name`.
    ///
    /// The first `number_of_keys` arguments become `KEYS`, the rest `ARGV`.
    /// Numbers are passed to the script as their decimal strings.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if fewer arguments than keys were given
    ///   (the script does not run)
    /// - [`Error::Command`] if no such custom command is defined
    /// - [`Error::Script`] if the script raised an uncaught error
    /// - [`Error::Lifecycle`] if scripting has been disposed
    pub async fn invoke<I, A>(&self, name: &str, args: I) -> Result<Value>
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        let args = to_args(args)?;
        let mut runtime = self.scripts.lock().await;
        runtime.invoke(name, &args)
    }

    /// Names of the defined custom commands, sorted.
    pub async fn defined_commands(&self) -> Vec<String> {
        self.scripts.lock().await.command_names()
    }

    /// Tears down the Lua interpreter. Later script use fails with
    /// [`Error::Lifecycle`]; plain commands keep working.
    pub async fn dispose_scripts(&self) {
        self.scripts.lock().await.dispose();
    }

    /// Returns true once scripting has been disposed.
    pub async fn is_disposed(&self) -> bool {
        self.scripts.lock().await.is_disposed()
    }

    /// `GET key`
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.command("GET", [key]).await? {
            Value::Nil => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            other => Err(unexpected("GET", &other)),
        }
    }

    /// `SET key value`
    pub async fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.command("SET", [Value::from(key), value.into()]).await?;
        Ok(())
    }

    /// `DEL key...`, returning how many keys were removed.
    pub async fn del(&self, keys: &[&str]) -> Result<i64> {
        integer("DEL", self.command("DEL", keys.iter().copied()).await?)
    }

    /// `EXISTS key...`
    pub async fn exists(&self, keys: &[&str]) -> Result<i64> {
        integer("EXISTS", self.command("EXISTS", keys.iter().copied()).await?)
    }

    /// `INCR key`
    pub async fn incr(&self, key: &str) -> Result<i64> {
        integer("INCR", self.command("INCR", [key]).await?)
    }

    /// `PEXPIRE key millis`, returning whether a TTL was set.
    pub async fn pexpire(&self, key: &str, millis: i64) -> Result<bool> {
        let reply = self
            .command("PEXPIRE", [Value::from(key), Value::from(millis)])
            .await?;
        Ok(integer("PEXPIRE", reply)? == 1)
    }

    /// `PTTL key`: -2 for a missing key, -1 without expiry, otherwise the
    /// remaining milliseconds.
    pub async fn pttl(&self, key: &str) -> Result<i64> {
        integer("PTTL", self.command("PTTL", [key]).await?)
    }

    /// `ZCARD key`
    pub async fn zcard(&self, key: &str) -> Result<i64> {
        integer("ZCARD", self.command("ZCARD", [key]).await?)
    }

    /// `CLIENT SETNAME name`
    pub async fn client_setname(&self, name: &str) -> Result<()> {
        self.command("CLIENT", ["SETNAME", name]).await?;
        Ok(())
    }

    /// `CLIENT GETNAME`
    pub async fn client_getname(&self) -> Result<Option<String>> {
        match self.command("CLIENT", ["GETNAME"]).await? {
            Value::Nil => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            other => Err(unexpected("CLIENT GETNAME", &other)),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn to_args<I, A>(args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = A>,
    A: Into<Value>,
{
    args.into_iter().map(|arg| arg.into().to_arg()).collect()
}

fn integer(command: &str, reply: Value) -> Result<i64> {
    match reply {
        Value::Integer(n) => Ok(n),
        other => Err(unexpected(command, &other)),
    }
}

fn unexpected(command: &str, reply: &Value) -> Error {
    Error::command(format!("ERR unexpected reply to {}: {:?}", command, reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = Store::new();
        store.set("key1", "value1").await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));
        assert_eq!(store.get("key2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_numeric_set() {
        let store = Store::new();
        store.set("n", 41).await.unwrap();
        assert_eq!(store.incr("n").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_store_del_and_exists() {
        let store = Store::new();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        assert_eq!(store.exists(&["a", "b", "c"]).await.unwrap(), 2);
        assert_eq!(store.del(&["a", "c"]).await.unwrap(), 1);
        assert_eq!(store.exists(&["a"]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_invoke_arguments() {
        let store = Store::new();
        let err = store
            .invoke("anything", vec![Value::Nil])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_options_validated() {
        assert!(Store::with_options(Options::new().hook_instruction_interval(0)).is_err());
        assert!(Store::with_options(Options::default()).is_ok());
    }

    #[tokio::test]
    async fn test_defined_commands() {
        let store = Store::default();
        assert!(store.defined_commands().await.is_empty());
        store
            .define_command("b", ScriptDefinition::new(0, "return 1"))
            .await
            .unwrap();
        store
            .define_command("a", ScriptDefinition::new(0, "return 1"))
            .await
            .unwrap();
        assert_eq!(store.defined_commands().await, vec!["a", "b"]);
    }
}
