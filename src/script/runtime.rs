//! Ownership and lifecycle of the embedded Lua interpreter.
//!
//! ```text
//! Uninitialized --init()--> Ready --dispose()--> Disposed
//!        └────────────────dispose()──────────────────┘
//! ```
//!
//! The interpreter is created on first use and torn down either by an
//! explicit `dispose()` or when the runtime is dropped. Any use after
//! disposal fails with [`Error::Lifecycle`].

use crate::config::Options;
use crate::keyspace::CommandDispatcher;
use crate::script::registry::{CommandDefinition, CommandRegistry, ScriptDefinition};
use crate::script::{bridge, executor};
use crate::{Error, Result, Value};
use mlua::Lua;
use std::sync::Arc;

enum State {
    Uninitialized,
    Ready { lua: Lua, registry: CommandRegistry },
    Disposed,
}

/// One Lua interpreter plus the custom commands compiled into it.
///
/// Not internally synchronized: the owner serializes access, which is what
/// guarantees that only one script runs at a time.
pub(crate) struct ScriptRuntime {
    state: State,
    dispatcher: Arc<dyn CommandDispatcher>,
    options: Options,
}

impl ScriptRuntime {
    pub(crate) fn new(dispatcher: Arc<dyn CommandDispatcher>, options: Options) -> Self {
        Self {
            state: State::Uninitialized,
            dispatcher,
            options,
        }
    }

    /// Creates the interpreter and installs the command bridge. A no-op when
    /// already initialized.
    pub(crate) fn init(&mut self) -> Result<()> {
        match self.state {
            State::Ready { .. } => Ok(()),
            State::Disposed => Err(disposed()),
            State::Uninitialized => {
                let lua = Lua::new();
                bridge::install(&lua, Arc::clone(&self.dispatcher)).map_err(|e| {
                    Error::script(format!(
                        "failed to initialize Lua: {}",
                        executor::originating_message(&e)
                    ))
                })?;
                self.state = State::Ready {
                    lua,
                    registry: CommandRegistry::new(),
                };
                log::info!("Lua script runtime initialized");
                Ok(())
            }
        }
    }

    /// Compiles and registers `definition` under `name`, replacing any
    /// previous command of that name.
    pub(crate) fn define(&mut self, name: &str, definition: ScriptDefinition) -> Result<()> {
        self.init()?;
        let State::Ready { lua, registry } = &mut self.state else {
            return Err(disposed());
        };

        let chunk = executor::compile(lua, name, &definition.source)?;
        let replaced = registry.define(CommandDefinition {
            name: name.to_string(),
            number_of_keys: definition.number_of_keys,
            chunk,
        });

        if let Some(old) = replaced {
            log::debug!("custom command '{}' redefined", name);
            lua.remove_registry_value(old.chunk)
                .map_err(|e| Error::script(executor::originating_message(&e)))?;
        } else {
            log::debug!("custom command '{}' defined", name);
        }
        Ok(())
    }

    /// Runs the custom command `name` with `args`.
    pub(crate) fn invoke(&mut self, name: &str, args: &[String]) -> Result<Value> {
        self.init()?;
        let State::Ready { lua, registry } = &mut self.state else {
            return Err(disposed());
        };

        let definition = registry
            .get(name)
            .ok_or_else(|| Error::command(format!("ERR unknown custom command '{}'", name)))?;
        executor::execute(lua, definition, args, &self.options)
    }

    /// Names of all defined custom commands, sorted.
    pub(crate) fn command_names(&self) -> Vec<String> {
        match &self.state {
            State::Ready { registry, .. } => registry.names(),
            _ => Vec::new(),
        }
    }

    /// Releases the interpreter and every compiled chunk. Idempotent.
    pub(crate) fn dispose(&mut self) {
        match std::mem::replace(&mut self.state, State::Disposed) {
            State::Ready { lua, registry } => {
                let defined = registry.len();
                drop(registry);
                drop(lua);
                log::info!("Lua script runtime disposed ({} custom commands dropped)", defined);
            }
            State::Uninitialized => log::debug!("Lua script runtime disposed before first use"),
            State::Disposed => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    pub(crate) fn is_disposed(&self) -> bool {
        matches!(self.state, State::Disposed)
    }
}

fn disposed() -> Error {
    Error::lifecycle("script runtime has been disposed")
}
