use std::error::Error as StdError;
use std::fmt;

use serde_json::{Map, Value as Json};

use crate::value::MemoryValue;

const BYTE_COUNT_KEY: &str = "memory_byteCount";
const BYTE_SIZE_KEY: &str = "memory_byteSize";
const LINE_LENGTH_KEY: &str = "memory_lineLength";
const SEPARATOR_KEY: &str = "memory_separator";
const LINE_KEY: &str = "memory_line";

/// Default number of cells per snapshot line.
pub const DEFAULT_LINE_LENGTH: usize = 64;
/// Default separator between cells of a snapshot line.
pub const DEFAULT_SEPARATOR: &str = ",";

/// Raised when a serialized memory does not fit the memory it is loaded
/// into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryDeserializationError {
    MissingField(&'static str),
    ByteCountMismatch { expected: usize, found: usize },
    ByteSizeMismatch { expected: usize, found: usize },
    MalformedLine(String),
}

impl fmt::Display for MemoryDeserializationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryDeserializationError::MissingField(field) => {
                write!(f, "Snapshot is missing the field '{}'.", field)
            }
            MemoryDeserializationError::ByteCountMismatch { expected, found } => write!(
                f,
                "Snapshot was taken of a memory with {} cells, this memory has {}.",
                found, expected
            ),
            MemoryDeserializationError::ByteSizeMismatch { expected, found } => write!(
                f,
                "Snapshot was taken with {} bits per cell, this memory has {}.",
                found, expected
            ),
            MemoryDeserializationError::MalformedLine(key) => {
                write!(f, "Snapshot entry '{}' is malformed.", key)
            }
        }
    }
}

impl StdError for MemoryDeserializationError {}

type MemoryCallback = Box<dyn Fn(usize, usize) + Send>;

/// The linear byte-addressable store of one project.
///
/// The memory consists of `byte_count` cells of `byte_size` bits each,
/// stored contiguously in one [`MemoryValue`](../value/struct.MemoryValue.html).
/// Reads past the end are zero-padded, writes past the end are clipped to
/// the in-range prefix. Every mutation reports the touched cell range to
/// the registered change callback.
pub struct Memory {
    byte_count: usize,
    byte_size: usize,
    data: MemoryValue,
    callback: Option<MemoryCallback>,
}

impl Memory {
    pub fn new(byte_count: usize, byte_size: usize) -> Memory {
        assert!(byte_count > 0, "memory must contain at least one cell");
        assert!(
            byte_size >= 1 && byte_size <= 64,
            "cell size must be between 1 and 64 bits"
        );
        Memory {
            byte_count,
            byte_size,
            data: MemoryValue::new(byte_count * byte_size),
            callback: None,
        }
    }

    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Registers the change observer, replacing any previous one.
    pub fn set_callback<F: Fn(usize, usize) + Send + 'static>(&mut self, callback: F) {
        self.callback = Some(Box::new(callback));
    }

    /// Reads `amount` cells starting at `address`. The result always has
    /// `amount * byte_size` bits; cells past the end read as zero.
    pub fn get(&self, address: usize, amount: usize) -> MemoryValue {
        assert!(amount > 0, "cannot read zero cells");
        let mut result = MemoryValue::new(amount * self.byte_size);
        if address < self.byte_count {
            let in_range = amount.min(self.byte_count - address);
            let begin = address * self.byte_size;
            result.write(
                &self.data.subset(begin, begin + in_range * self.byte_size),
                0,
            );
        }
        result
    }

    /// Writes `value` (a whole number of cells) at `address`, clipping at
    /// the end of the memory.
    pub fn put(&mut self, address: usize, value: &MemoryValue) {
        assert!(
            value.size() % self.byte_size == 0,
            "value must cover whole cells"
        );
        let amount = value.size() / self.byte_size;
        if address >= self.byte_count {
            return;
        }
        let in_range = amount.min(self.byte_count - address);
        if in_range == amount {
            self.data.write(value, address * self.byte_size);
        } else {
            self.data.write(
                &value.subset(0, in_range * self.byte_size),
                address * self.byte_size,
            );
        }
        self.was_updated(address, in_range);
    }

    /// Writes `value` at `address` and returns the previous contents of
    /// the touched range.
    pub fn set(&mut self, address: usize, value: &MemoryValue) -> MemoryValue {
        let amount = value.size() / self.byte_size;
        let previous = self.get(address, amount);
        self.put(address, value);
        previous
    }

    fn was_updated(&self, address: usize, amount: usize) {
        if let Some(callback) = &self.callback {
            callback(address, amount);
        }
    }

    /// Serializes into the sparse-line snapshot format with default line
    /// length and separator.
    pub fn serialize_json(&self) -> Json {
        self.serialize_json_with(DEFAULT_LINE_LENGTH, DEFAULT_SEPARATOR)
    }

    pub fn serialize_json_with(&self, line_length: usize, separator: &str) -> Json {
        assert!(line_length > 0, "line length must be positive");
        let mut map = Map::new();
        map.insert(BYTE_COUNT_KEY.into(), Json::from(self.byte_count));
        map.insert(BYTE_SIZE_KEY.into(), Json::from(self.byte_size));
        map.insert(LINE_LENGTH_KEY.into(), Json::from(line_length));
        map.insert(SEPARATOR_KEY.into(), Json::from(separator));
        let line_count = (self.byte_count + line_length - 1) / line_length;
        for line in 0..line_count {
            let begin = line * line_length;
            let cells = line_length.min(self.byte_count - begin);
            let mut rendered = Vec::with_capacity(cells);
            let mut all_zero = true;
            for cell in 0..cells {
                let value = self.get(begin + cell, 1);
                all_zero &= value.is_zero();
                rendered.push(render_cell_hex(&value));
            }
            if !all_zero {
                map.insert(
                    format!("{}{}", LINE_KEY, line),
                    Json::from(rendered.join(separator)),
                );
            }
        }
        Json::Object(map)
    }

    /// Restores the memory contents from a snapshot. The snapshot's meta
    /// fields must match this memory exactly.
    pub fn deserialize_json(&mut self, json: &Json) -> Result<(), MemoryDeserializationError> {
        let byte_count = read_usize(json, BYTE_COUNT_KEY)?;
        let byte_size = read_usize(json, BYTE_SIZE_KEY)?;
        let line_length = read_usize(json, LINE_LENGTH_KEY)?;
        if byte_count != self.byte_count {
            return Err(MemoryDeserializationError::ByteCountMismatch {
                expected: self.byte_count,
                found: byte_count,
            });
        }
        if byte_size != self.byte_size {
            return Err(MemoryDeserializationError::ByteSizeMismatch {
                expected: self.byte_size,
                found: byte_size,
            });
        }
        let separator = json
            .get(SEPARATOR_KEY)
            .and_then(Json::as_str)
            .ok_or(MemoryDeserializationError::MissingField(SEPARATOR_KEY))?
            .to_owned();

        self.data = MemoryValue::new(self.byte_count * self.byte_size);
        let object = match json.as_object() {
            Some(object) => object,
            None => return Err(MemoryDeserializationError::MissingField(LINE_KEY)),
        };
        for (key, entry) in object {
            if !key.starts_with(LINE_KEY) {
                continue;
            }
            let line: usize = key[LINE_KEY.len()..]
                .parse()
                .map_err(|_| MemoryDeserializationError::MalformedLine(key.clone()))?;
            let text = entry
                .as_str()
                .ok_or_else(|| MemoryDeserializationError::MalformedLine(key.clone()))?;
            let begin = line * line_length;
            for (offset, cell_text) in text.split(&separator).enumerate() {
                let address = begin + offset;
                if address >= self.byte_count {
                    break;
                }
                // Unrepresentable characters in a cell are skipped by the
                // hex parser; an entirely unparseable cell reads as zero.
                if let Some(value) =
                    crate::conversions::hex_string_to_memory_value(cell_text, self.byte_size)
                {
                    self.data.write(&value, address * self.byte_size);
                }
            }
        }
        self.was_updated(0, self.byte_count);
        Ok(())
    }
}

/// Renders one cell as minimal hexadecimal: no leading zeros, `0` for an
/// all-zero cell.
fn render_cell_hex(value: &MemoryValue) -> String {
    let full = crate::conversions::to_hex_string(value);
    let trimmed = full[2..].trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn read_usize(json: &Json, key: &'static str) -> Result<usize, MemoryDeserializationError> {
    json.get(key)
        .and_then(Json::as_u64)
        .map(|v| v as usize)
        .ok_or(MemoryDeserializationError::MissingField(key))
}
