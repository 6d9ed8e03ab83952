//! Compiles custom command bodies and runs single invocations.
//!
//! An invocation goes through these steps, with the store's execution gate
//! held by the caller for the whole duration:
//!
//! ```text
//! 1. validate   args.len() >= number_of_keys   (no Lua access on failure)
//! 2. publish    KEYS / ARGV
//! 3. run        compiled chunk; redis.call/pcall hit the keyspace directly
//! 4. capture    first return value
//! 5. marshal    Lua -> Value
//! ```
//!
//! Effects applied through `redis.call` before a failure are kept.

use crate::config::Options;
use crate::script::env::{self, InvocationContext};
use crate::script::marshal;
use crate::script::registry::CommandDefinition;
use crate::{Error, Result, Value};
use mlua::{Function, Lua, MultiValue, RegistryKey};
use std::time::Instant;

/// Compiles `source` into a chunk stored in the Lua registry.
pub(crate) fn compile(lua: &Lua, name: &str, source: &str) -> Result<RegistryKey> {
    let chunk = lua.load(source).into_function().map_err(|e| {
        Error::script(format!(
            "failed to compile '{}': {}",
            name,
            originating_message(&e)
        ))
    })?;
    lua.create_registry_value(chunk)
        .map_err(|e| Error::script(originating_message(&e)))
}

/// Runs one invocation of `definition` with `args`.
pub(crate) fn execute(
    lua: &Lua,
    definition: &CommandDefinition,
    args: &[String],
    options: &Options,
) -> Result<Value> {
    if args.len() < definition.number_of_keys {
        return Err(Error::invalid_argument(format!(
            "'{}' expects at least {} key(s), got {} argument(s)",
            definition.name,
            definition.number_of_keys,
            args.len()
        )));
    }

    let start_time = Instant::now();
    log::debug!("invoking '{}' with {} argument(s)", definition.name, args.len());

    if let Some(timeout) = options.script_timeout {
        lua.set_hook(
            mlua::HookTriggers {
                every_nth_instruction: Some(options.hook_instruction_interval),
                ..Default::default()
            },
            move |_lua, _debug| {
                if start_time.elapsed() > timeout {
                    Err(mlua::Error::RuntimeError("Script execution timeout".to_string()))
                } else {
                    Ok(())
                }
            },
        );
    }

    let ctx = InvocationContext::new(definition.number_of_keys, args);
    let result = run(lua, definition, &ctx);

    if options.script_timeout.is_some() {
        lua.remove_hook();
    }

    match result {
        Ok(value) => {
            log::info!(
                "script '{}' completed in {:?}",
                definition.name,
                start_time.elapsed()
            );
            Ok(value)
        }
        Err(e) => {
            let message = originating_message(&e);
            log::warn!("script '{}' failed: {}", definition.name, message);
            Err(Error::script(message))
        }
    }
}

fn run(lua: &Lua, definition: &CommandDefinition, ctx: &InvocationContext<'_>) -> mlua::Result<Value> {
    env::build_keys(lua, ctx)?;
    env::build_argv(lua, ctx)?;

    let chunk: Function<'_> = lua.registry_value(&definition.chunk)?;
    let returned: MultiValue<'_> = chunk.call(())?;
    marshal::first_return(returned)
}

/// Digs the message a script author would recognize out of an mlua error,
/// unwrapping callback causes so that a failed `redis.call` surfaces the
/// command's own message.
pub(crate) fn originating_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => originating_message(cause),
        mlua::Error::ExternalError(inner) => inner.to_string(),
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
