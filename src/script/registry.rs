//! Named custom commands and their compiled chunks.

use mlua::RegistryKey;
use std::collections::HashMap;

/// What a caller supplies to define a custom command.
///
/// # Example
///
/// ```rust
/// use luamock::script::ScriptDefinition;
///
/// let definition = ScriptDefinition::new(1, "return redis.call('GET', KEYS[1])");
/// assert_eq!(definition.number_of_keys, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDefinition {
    /// How many leading invocation arguments are key names (`KEYS`).
    pub number_of_keys: usize,

    /// Lua source of the command body.
    pub source: String,
}

impl ScriptDefinition {
    /// Creates a definition from a key count and Lua source.
    pub fn new(number_of_keys: usize, source: impl Into<String>) -> Self {
        Self {
            number_of_keys,
            source: source.into(),
        }
    }
}

/// A compiled custom command. The chunk lives in the Lua registry of the
/// runtime that compiled it.
pub(crate) struct CommandDefinition {
    pub(crate) name: String,
    pub(crate) number_of_keys: usize,
    pub(crate) chunk: RegistryKey,
}

/// Custom commands by name. Redefinition replaces the previous entry.
#[derive(Default)]
pub(crate) struct CommandRegistry {
    commands: HashMap<String, CommandDefinition>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `definition`, returning the one it displaced, if any.
    pub(crate) fn define(&mut self, definition: CommandDefinition) -> Option<CommandDefinition> {
        self.commands.insert(definition.name.clone(), definition)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(name)
    }

    /// Defined names in sorted order.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.commands.len()
    }
}
