use std::collections::HashMap;

use super::ArchitectureError;

/// The encoding layout of an instruction. The first six are the standard
/// RISC-V formats; `Simulator` marks the fixed-pattern pseudo
/// instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionFormat {
    R,
    I,
    S,
    SB,
    U,
    UJ,
    Simulator,
}

/// The fixed bit-field values identifying one instruction within its
/// format: `opcode` always, `funct3`/`funct7` where the format has them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionKey {
    fields: Vec<(String, u32)>,
}

impl InstructionKey {
    /// Builds a key from field/value pairs. Exactly one field must be
    /// named `opcode`.
    pub fn new(fields: &[(&str, u32)]) -> InstructionKey {
        let opcode_entries = fields.iter().filter(|(name, _)| *name == "opcode").count();
        assert!(
            opcode_entries == 1,
            "an instruction key needs exactly one opcode entry"
        );
        InstructionKey {
            fields: fields
                .iter()
                .map(|(name, value)| ((*name).to_owned(), *value))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| *value)
    }

    pub fn opcode(&self) -> u32 {
        self.get("opcode").expect("key invariant violated")
    }
}

/// Everything the assembler and encoder know about one mnemonic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionInformation {
    pub mnemonic: String,
    pub format: InstructionFormat,
    /// Encoded length in bits.
    pub length: usize,
    pub key: InstructionKey,
}

impl InstructionInformation {
    pub fn new(
        mnemonic: &str,
        format: InstructionFormat,
        length: usize,
        key: InstructionKey,
    ) -> InstructionInformation {
        InstructionInformation {
            mnemonic: mnemonic.to_owned(),
            format,
            length,
            key,
        }
    }
}

/// Map from mnemonic to instruction information. Lookup is
/// case-insensitive; mnemonics are stored lowercased.
#[derive(Clone, Debug, Default)]
pub struct InstructionSet {
    map: HashMap<String, InstructionInformation>,
}

impl InstructionSet {
    pub fn new() -> InstructionSet {
        InstructionSet {
            map: HashMap::new(),
        }
    }

    /// Inserts an instruction. Re-inserting an identical definition is
    /// tolerated (modules may overlap); a differing redefinition is a
    /// conflict.
    pub fn insert(
        &mut self,
        information: InstructionInformation,
    ) -> Result<(), ArchitectureError> {
        let mnemonic = information.mnemonic.to_lowercase();
        if let Some(existing) = self.map.get(&mnemonic) {
            if *existing != information {
                return Err(ArchitectureError::ConflictingDefinition(format!(
                    "instruction '{}'",
                    mnemonic
                )));
            }
            return Ok(());
        }
        self.map.insert(mnemonic, information);
        Ok(())
    }

    pub fn get(&self, mnemonic: &str) -> Option<&InstructionInformation> {
        self.map.get(&mnemonic.to_lowercase())
    }

    pub fn contains(&self, mnemonic: &str) -> bool {
        self.map.contains_key(&mnemonic.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All mnemonics, sorted; used to build the highlighting regex.
    pub fn mnemonics_sorted(&self) -> Vec<&str> {
        let mut mnemonics: Vec<&str> = self.map.keys().map(String::as_str).collect();
        mnemonics.sort_unstable();
        mnemonics
    }
}
