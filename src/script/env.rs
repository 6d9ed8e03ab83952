//! Per-invocation `KEYS` and `ARGV` globals.

use mlua::Lua;

/// The key/argument partition of one invocation.
///
/// `keys` are the first `number_of_keys` arguments, `argv` the rest. If fewer
/// arguments than keys were given, `keys` is simply shorter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InvocationContext<'a> {
    pub(crate) keys: &'a [String],
    pub(crate) argv: &'a [String],
}

impl<'a> InvocationContext<'a> {
    pub(crate) fn new(number_of_keys: usize, args: &'a [String]) -> Self {
        let split = number_of_keys.min(args.len());
        let (keys, argv) = args.split_at(split);
        Self { keys, argv }
    }
}

/// Publishes `KEYS` as a 1-indexed table.
pub(crate) fn build_keys(lua: &Lua, ctx: &InvocationContext<'_>) -> mlua::Result<()> {
    let keys = lua.create_sequence_from(ctx.keys.iter().map(String::as_str))?;
    lua.globals().set("KEYS", keys)
}

/// Publishes `ARGV` as a 1-indexed table.
pub(crate) fn build_argv(lua: &Lua, ctx: &InvocationContext<'_>) -> mlua::Result<()> {
    let argv = lua.create_sequence_from(ctx.argv.iter().map(String::as_str))?;
    lua.globals().set("ARGV", argv)
}
