use std::collections::HashMap;

use serde_json::{Map, Value as Json};

use crate::memory::MemoryDeserializationError;
use crate::value::MemoryValue;

/// Denormalized location of a named register: the index of its root
/// (top-level) storage plus the bit window into it. Aliasing an alias
/// flattens into a window on the same root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RegisterWindow {
    root: usize,
    begin: usize,
    end: usize,
}

type RegisterCallback = Box<dyn Fn(&str) + Send>;

const REGISTER_KEY_PREFIX: &str = "register_";

/// Named registers with parent/alias/overlap semantics.
///
/// Top-level registers own their storage; aliases are bit windows into a
/// parent (possibly itself an alias). All names sharing a root storage form
/// that root's notification set: a write through any of them notifies every
/// non-silent name of the set. Writes into a constant root are ignored.
pub struct RegisterSet {
    dict: HashMap<String, RegisterWindow>,
    registers: Vec<MemoryValue>,
    constant: Vec<bool>,
    update_sets: Vec<Vec<String>>,
    root_names: Vec<String>,
    callback: Option<RegisterCallback>,
}

impl RegisterSet {
    pub fn new() -> RegisterSet {
        RegisterSet {
            dict: HashMap::new(),
            registers: Vec::new(),
            constant: Vec::new(),
            update_sets: Vec::new(),
            root_names: Vec::new(),
            callback: None,
        }
    }

    /// Registers the change observer, replacing any previous one.
    pub fn set_callback<F: Fn(&str) + Send + 'static>(&mut self, callback: F) {
        self.callback = Some(Box::new(callback));
    }

    /// Creates a top-level register of `size` bits, initialized to zero.
    pub fn create(&mut self, name: &str, size: usize) {
        self.create_with_value(name, MemoryValue::new(size), false);
    }

    /// Creates a top-level register holding `value`; `constant` makes
    /// every later write a no-op.
    pub fn create_with_value(&mut self, name: &str, value: MemoryValue, constant: bool) {
        assert!(
            !self.dict.contains_key(name),
            "register name already in use"
        );
        let root = self.registers.len();
        self.dict.insert(
            name.to_owned(),
            RegisterWindow {
                root,
                begin: 0,
                end: value.size(),
            },
        );
        self.registers.push(value);
        self.constant.push(constant);
        self.update_sets.push(vec![name.to_owned()]);
        self.root_names.push(name.to_owned());
        self.was_updated(root);
    }

    /// Creates an alias covering the parent's bits `[begin, end)`. A
    /// silent alias still reads and writes through, but is left out of the
    /// parent's notification set.
    pub fn alias(&mut self, name: &str, parent: &str, begin: usize, end: usize, silent: bool) {
        assert!(
            !self.dict.contains_key(name),
            "register name already in use"
        );
        let parent_window = *self
            .dict
            .get(parent)
            .expect("alias parent does not exist");
        assert!(
            begin <= end && parent_window.begin + end <= parent_window.end,
            "alias window out of parent range"
        );
        let window = RegisterWindow {
            root: parent_window.root,
            begin: parent_window.begin + begin,
            end: parent_window.begin + end,
        };
        self.dict.insert(name.to_owned(), window);
        if !silent {
            self.update_sets[window.root].push(name.to_owned());
        }
    }

    /// Creates an alias covering the parent's bits from `begin` to its
    /// end.
    pub fn alias_from(&mut self, name: &str, parent: &str, begin: usize, silent: bool) {
        let size = self.size_of(parent);
        self.alias(name, parent, begin, size, silent);
    }

    pub fn exists(&self, name: &str) -> bool {
        self.dict.contains_key(name)
    }

    /// Size of the named register in bits.
    pub fn size_of(&self, name: &str) -> usize {
        let window = self.window(name);
        window.end - window.begin
    }

    pub fn get(&self, name: &str) -> MemoryValue {
        let window = self.window(name);
        self.registers[window.root].subset(window.begin, window.end)
    }

    /// Writes `value` into the named register. The value size must match
    /// the register; a write into a constant root is silently dropped.
    pub fn put(&mut self, name: &str, value: &MemoryValue) {
        let window = self.window(name);
        if self.constant[window.root] {
            return;
        }
        assert!(
            value.size() == window.end - window.begin,
            "value size does not match register size"
        );
        self.registers[window.root].write(value, window.begin);
        self.was_updated(window.root);
    }

    /// Writes `value` and returns the register's previous contents.
    pub fn set(&mut self, name: &str, value: &MemoryValue) -> MemoryValue {
        let previous = self.get(name);
        self.put(name, value);
        previous
    }

    /// Names of all top-level registers, in creation order.
    pub fn root_names(&self) -> &[String] {
        &self.root_names
    }

    fn window(&self, name: &str) -> RegisterWindow {
        *self.dict.get(name).expect("register does not exist")
    }

    fn was_updated(&self, root: usize) {
        if let Some(callback) = &self.callback {
            for name in &self.update_sets[root] {
                callback(name);
            }
        }
    }

    /// Serializes all top-level registers as `register_<name>` → hex.
    pub fn serialize_json(&self) -> Json {
        let mut map = Map::new();
        for (root, name) in self.root_names.iter().enumerate() {
            map.insert(
                format!("{}{}", REGISTER_KEY_PREFIX, name),
                Json::from(crate::conversions::to_hex_string(&self.registers[root])),
            );
        }
        Json::Object(map)
    }

    /// Restores top-level register values from a snapshot. Unknown
    /// registers in the snapshot are an error; missing ones keep their
    /// current value. Constant registers are never overwritten.
    pub fn deserialize_json(&mut self, json: &Json) -> Result<(), MemoryDeserializationError> {
        let object = json
            .as_object()
            .ok_or(MemoryDeserializationError::MissingField(REGISTER_KEY_PREFIX))?;
        for (key, entry) in object {
            if !key.starts_with(REGISTER_KEY_PREFIX) {
                continue;
            }
            let name = &key[REGISTER_KEY_PREFIX.len()..];
            if !self.exists(name) {
                return Err(MemoryDeserializationError::MalformedLine(key.clone()));
            }
            let text = entry
                .as_str()
                .ok_or_else(|| MemoryDeserializationError::MalformedLine(key.clone()))?;
            let size = self.size_of(name);
            match crate::conversions::hex_string_to_memory_value(text, size) {
                Some(value) => self.put(name, &value),
                None => return Err(MemoryDeserializationError::MalformedLine(key.clone())),
            }
        }
        Ok(())
    }
}

impl Default for RegisterSet {
    fn default() -> RegisterSet {
        RegisterSet::new()
    }
}

impl PartialEq for RegisterSet {
    /// Equality over the set of top-level registers and their values.
    fn eq(&self, other: &RegisterSet) -> bool {
        if self.root_names.len() != other.root_names.len() {
            return false;
        }
        self.root_names.iter().all(|name| {
            other.exists(name)
                && other.dict[name].begin == 0
                && self.get(name) == other.get(name)
        })
    }
}
