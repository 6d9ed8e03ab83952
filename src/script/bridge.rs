//! The `redis.call` / `redis.pcall` bridge from Lua into the store.
//!
//! Both functions run the command synchronously through the runtime's
//! [`CommandDispatcher`]. They differ only in how a failing command is
//! reported back to the script:
//!
//! - `redis.call` raises a Lua error, aborting the script unless the script
//!   catches it itself. Effects of earlier calls stay applied.
//! - `redis.pcall` returns a table `{ err = message }` and lets the script
//!   carry on.

use crate::keyspace::CommandDispatcher;
use crate::script::marshal::{to_command_arg, to_lua};
use crate::{Error, Result, Value};
use mlua::{Lua, Value as LuaValue, Variadic};
use std::sync::Arc;

/// Installs the global `redis` table with `call` and `pcall`.
pub(crate) fn install(lua: &Lua, dispatcher: Arc<dyn CommandDispatcher>) -> mlua::Result<()> {
    let redis = lua.create_table()?;

    let call_dispatcher = Arc::clone(&dispatcher);
    let call = lua.create_function(move |lua, args: Variadic<LuaValue<'_>>| {
        match run_command(call_dispatcher.as_ref(), &args, "call") {
            Ok(reply) => to_lua(lua, &reply),
            Err(e) => Err(mlua::Error::external(e)),
        }
    })?;
    redis.set("call", call)?;

    let pcall = lua.create_function(move |lua, args: Variadic<LuaValue<'_>>| {
        match run_command(dispatcher.as_ref(), &args, "pcall") {
            Ok(reply) => to_lua(lua, &reply),
            Err(e) => error_reply(lua, &e),
        }
    })?;
    redis.set("pcall", pcall)?;

    lua.globals().set("redis", redis)
}

fn run_command(
    dispatcher: &dyn CommandDispatcher,
    args: &[LuaValue<'_>],
    function: &str,
) -> Result<Value> {
    let (name, rest) = args.split_first().ok_or_else(|| {
        Error::command(format!(
            "ERR Please specify at least one argument for redis.{}()",
            function
        ))
    })?;
    let name = to_command_arg(name)?;
    let rest = rest.iter().map(to_command_arg).collect::<Result<Vec<_>>>()?;

    log::trace!("redis.{}({} {:?})", function, name, rest);
    dispatcher.dispatch(&name, &rest)
}

fn error_reply<'lua>(lua: &'lua Lua, err: &Error) -> mlua::Result<LuaValue<'lua>> {
    let table = lua.create_table()?;
    table.set("err", err.to_string())?;
    Ok(LuaValue::Table(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::Keyspace;
    use parking_lot::Mutex;

    /// Records every dispatch and answers with a fixed reply.
    struct Recorder {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        reply: Value,
    }

    impl CommandDispatcher for Recorder {
        fn dispatch(&self, name: &str, args: &[String]) -> Result<Value> {
            self.calls.lock().push((name.to_string(), args.to_vec()));
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_call_passes_name_and_args() {
        let lua = Lua::new();
        let recorder = Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
            reply: Value::Integer(15),
        });
        install(&lua, recorder.clone()).unwrap();

        let returned: i64 = lua
            .load(
                r#"
                local rcall = redis.call
                local exists = rcall("EXISTS", "PEPE", "THIRD")
                if exists == nil then
                    error("no reply")
                end
                return exists
                "#,
            )
            .eval()
            .unwrap();

        assert_eq!(returned, 15);
        let calls = recorder.calls.lock();
        assert_eq!(
            *calls,
            vec![(
                "EXISTS".to_string(),
                vec!["PEPE".to_string(), "THIRD".to_string()]
            )]
        );
    }

    #[test]
    fn test_numeric_args_become_strings() {
        let lua = Lua::new();
        let recorder = Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
            reply: Value::Nil,
        });
        install(&lua, recorder.clone()).unwrap();

        lua.load("redis.call('SET', 'k', 6, 2.0, 0.5)").exec().unwrap();
        let calls = recorder.calls.lock();
        assert_eq!(calls[0].1, vec!["k", "6", "2", "0.5"]);
    }

    #[test]
    fn test_call_raises_command_error() {
        let lua = Lua::new();
        install(&lua, Arc::new(Keyspace::new())).unwrap();

        let err = lua.load("redis.call('NOPE')").exec().unwrap_err();
        assert!(err.to_string().contains("ERR unknown command 'NOPE'"));
    }

    #[test]
    fn test_pcall_returns_error_table() {
        let lua = Lua::new();
        install(&lua, Arc::new(Keyspace::new())).unwrap();

        let message: String = lua
            .load(
                r#"
                local reply = redis.pcall('NOPE', 'x')
                return reply.err
                "#,
            )
            .eval()
            .unwrap();
        assert_eq!(message, "ERR unknown command 'NOPE'");
    }

    #[test]
    fn test_call_without_arguments() {
        let lua = Lua::new();
        install(&lua, Arc::new(Keyspace::new())).unwrap();

        let message: String = lua.load("return redis.pcall().err").eval().unwrap();
        assert_eq!(
            message,
            "ERR Please specify at least one argument for redis.pcall()"
        );
    }

    #[test]
    fn test_reply_marshalled_back_into_lua() {
        let lua = Lua::new();
        let keyspace = Arc::new(Keyspace::new());
        install(&lua, keyspace).unwrap();

        let ok: bool = lua
            .load(
                r#"
                redis.call('SADD', 's', 'b', 'a')
                local members = redis.call('SMEMBERS', 's')
                return #members == 2 and members[1] == 'a' and members[2] == 'b'
                    and redis.call('GET', 'missing') == nil
                "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }
}
