//! Conversion between host [`Value`]s and Lua values.
//!
//! Host to Lua is structural: sequences become 1-indexed tables and mappings
//! become keyed tables. Lua to host follows the Redis reply conventions:
//!
//! | Lua                       | Host               |
//! |---------------------------|--------------------|
//! | `nil`, `false`            | `Nil`              |
//! | `true`                    | `Integer(1)`       |
//! | integer / float           | `Integer` / `Float`|
//! | string                    | `Text`             |
//! | `{}` or table with `[1]`  | `Sequence`         |
//! | any other table           | `Mapping`          |
//!
//! A sequence is the contiguous run `1..N`; scanning stops at the first
//! missing index even if higher indices are populated.

use crate::value::format_float;
use crate::{Error, Result, Value};
use mlua::{Lua, MultiValue, Table, Value as LuaValue};
use std::collections::BTreeMap;

/// Tables nested deeper than this are rejected (self-referencing tables
/// would otherwise recurse forever).
const MAX_DEPTH: usize = 64;

/// Converts a host value into a Lua value owned by `lua`.
pub(crate) fn to_lua<'lua>(lua: &'lua Lua, value: &Value) -> mlua::Result<LuaValue<'lua>> {
    Ok(match value {
        Value::Nil => LuaValue::Nil,
        Value::Boolean(b) => LuaValue::Boolean(*b),
        Value::Integer(n) => LuaValue::Integer(*n),
        Value::Float(f) => LuaValue::Number(*f),
        Value::Text(s) => LuaValue::String(lua.create_string(s)?),
        Value::Sequence(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
        Value::Mapping(entries) => {
            let table = lua.create_table()?;
            for (key, item) in entries {
                table.raw_set(key.as_str(), to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
    })
}

/// Converts a Lua value into a host value.
pub(crate) fn from_lua(value: LuaValue<'_>) -> mlua::Result<Value> {
    convert(value, 0)
}

/// Marshals the first of a chunk's return values; the rest are discarded.
pub(crate) fn first_return(values: MultiValue<'_>) -> mlua::Result<Value> {
    match values.into_iter().next() {
        Some(value) => from_lua(value),
        None => Ok(Value::Nil),
    }
}

/// Converts one `redis.call` argument into its command string form.
pub(crate) fn to_command_arg(value: &LuaValue<'_>) -> Result<String> {
    match value {
        LuaValue::String(s) => Ok(s.to_string_lossy().into_owned()),
        LuaValue::Integer(n) => Ok(n.to_string()),
        LuaValue::Number(f) => Ok(format_float(*f)),
        _ => Err(Error::command(
            "ERR Lua redis() command arguments must be strings or integers",
        )),
    }
}

fn convert(value: LuaValue<'_>, depth: usize) -> mlua::Result<Value> {
    match value {
        LuaValue::Nil | LuaValue::Boolean(false) => Ok(Value::Nil),
        LuaValue::Boolean(true) => Ok(Value::Integer(1)),
        LuaValue::Integer(n) => Ok(Value::Integer(n)),
        LuaValue::Number(f) => Ok(Value::Float(f)),
        LuaValue::String(s) => Ok(Value::Text(s.to_string_lossy().into_owned())),
        LuaValue::Table(table) => {
            if depth >= MAX_DEPTH {
                return Err(mlua::Error::RuntimeError(
                    "reply table nested too deeply".to_string(),
                ));
            }
            table_to_value(table, depth + 1)
        }
        other => {
            log::debug!("discarding unsupported Lua reply of type {}", other.type_name());
            Ok(Value::Nil)
        }
    }
}

fn table_to_value(table: Table<'_>, depth: usize) -> mlua::Result<Value> {
    let first: LuaValue<'_> = table.raw_get(1)?;
    let has_entries = table.clone().pairs::<LuaValue<'_>, LuaValue<'_>>().next().is_some();

    if matches!(first, LuaValue::Nil) && has_entries {
        return table_to_mapping(table, depth);
    }

    let mut items = Vec::new();
    let mut index = 1;
    loop {
        let item: LuaValue<'_> = table.raw_get(index)?;
        if matches!(item, LuaValue::Nil) {
            break;
        }
        items.push(convert(item, depth)?);
        index += 1;
    }
    Ok(Value::Sequence(items))
}

fn table_to_mapping(table: Table<'_>, depth: usize) -> mlua::Result<Value> {
    let mut entries = BTreeMap::new();
    for pair in table.pairs::<LuaValue<'_>, LuaValue<'_>>() {
        let (key, item) = pair?;
        let key = match key {
            LuaValue::String(s) => s.to_string_lossy().into_owned(),
            LuaValue::Integer(n) => n.to_string(),
            LuaValue::Number(f) => format_float(f),
            LuaValue::Boolean(b) => b.to_string(),
            other => {
                log::debug!("skipping table key of type {}", other.type_name());
                continue;
            }
        };
        entries.insert(key, convert(item, depth)?);
    }
    Ok(Value::Mapping(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(lua: &Lua, code: &str) -> Value {
        let values: MultiValue<'_> = lua.load(code).eval().unwrap();
        first_return(values).unwrap()
    }

    #[test]
    fn test_scalars_from_lua() {
        let lua = Lua::new();
        assert_eq!(eval(&lua, "return nil"), Value::Nil);
        assert_eq!(eval(&lua, "return false"), Value::Nil);
        assert_eq!(eval(&lua, "return true"), Value::Integer(1));
        assert_eq!(eval(&lua, "return 15200"), Value::Integer(15200));
        assert_eq!(eval(&lua, "return 1.5"), Value::Float(1.5));
        assert_eq!(eval(&lua, "return 'hi'"), Value::from("hi"));
        assert_eq!(eval(&lua, "return"), Value::Nil);
    }

    #[test]
    fn test_only_first_return_counts() {
        let lua = Lua::new();
        assert_eq!(eval(&lua, "return 1, 2, 3"), Value::Integer(1));
    }

    #[test]
    fn test_sequences_from_lua() {
        let lua = Lua::new();
        assert_eq!(
            eval(&lua, "return {10, 100, 200}"),
            Value::from(json!([10, 100, 200]))
        );
        assert_eq!(
            eval(&lua, "return {{10}, {100, 200}, {}}"),
            Value::from(json!([[10], [100, 200], []]))
        );
        assert_eq!(eval(&lua, "return {}"), Value::Sequence(vec![]));
    }

    #[test]
    fn test_sequence_stops_at_first_gap() {
        let lua = Lua::new();
        assert_eq!(
            eval(&lua, "local t = {1, 2}; t[4] = 4; return t"),
            Value::from(json!([1, 2]))
        );
        assert_eq!(
            eval(&lua, "return {1, false, 3}"),
            Value::from(json!([1, null, 3]))
        );
    }

    #[test]
    fn test_array_part_wins_over_string_keys() {
        // Redis semantics: once [1] is set, only the array part is replied.
        let lua = Lua::new();
        assert_eq!(
            eval(&lua, "return {1, 2, err = 'x'}"),
            Value::from(json!([1, 2]))
        );
        assert_eq!(
            eval(&lua, "return {err = 'x', ok = 'y'}"),
            Value::from(json!({ "err": "x", "ok": "y" }))
        );
    }

    #[test]
    fn test_mapping_from_lua() {
        let lua = Lua::new();
        assert_eq!(
            eval(&lua, "return { hi = 'hello', bye = 'goodbye' }"),
            Value::from(json!({ "hi": "hello", "bye": "goodbye" }))
        );
        assert_eq!(
            eval(&lua, "local t = {}; t[2] = 'two'; return t"),
            Value::from(json!({ "2": "two" }))
        );
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let lua = Lua::new();
        let values: MultiValue<'_> = lua
            .load("local t = { x = 1 }; t.self = t; return t")
            .eval()
            .unwrap();
        assert!(first_return(values).is_err());
    }

    #[test]
    fn test_host_to_lua_shapes() {
        let lua = Lua::new();
        let value = Value::from(json!({ "list": [1, "two", 3.5], "flag": true, "none": null }));
        lua.globals().set("v", to_lua(&lua, &value).unwrap()).unwrap();

        let ok: bool = lua
            .load(
                r#"
                return #v.list == 3 and v.list[1] == 1 and v.list[2] == "two"
                    and v.list[3] == 3.5 and v.flag == true and v.none == nil
                "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_round_trip_through_lua() {
        let lua = Lua::new();
        let value = Value::from(json!([[10], [100, 200], []]));
        let lua_value = to_lua(&lua, &value).unwrap();
        assert_eq!(from_lua(lua_value).unwrap(), value);
    }

    #[test]
    fn test_command_args() {
        let lua = Lua::new();
        let s = LuaValue::String(lua.create_string("GET").unwrap());
        assert_eq!(to_command_arg(&s).unwrap(), "GET");
        assert_eq!(to_command_arg(&LuaValue::Integer(6)).unwrap(), "6");
        assert_eq!(to_command_arg(&LuaValue::Number(6.0)).unwrap(), "6");
        assert_eq!(to_command_arg(&LuaValue::Number(0.25)).unwrap(), "0.25");
        assert!(to_command_arg(&LuaValue::Nil).unwrap_err().is_command_error());
        assert!(to_command_arg(&LuaValue::Boolean(true)).is_err());
    }
}
