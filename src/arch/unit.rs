use std::collections::HashMap;

/// Classification of a register, as shown to table views.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterType {
    Integer,
    Float,
    Vector,
    Flag,
    Link,
    ProgramCounter,
}

/// A part register: the id of the contained register plus its bit offset
/// within the enclosing one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstituentInformation {
    pub id: usize,
    pub offset: usize,
}

/// Static description of one register.
///
/// The enclosing/constituent relations form a forest rooted at top-level
/// registers; only those own storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterInformation {
    pub id: usize,
    pub name: String,
    /// Size in bits.
    pub size: usize,
    pub register_type: RegisterType,
    pub constant: bool,
    /// Id of the register this one is a window into, if any.
    pub enclosing: Option<usize>,
    /// Bit offset within the enclosing register.
    pub offset: usize,
    pub constituents: Vec<ConstituentInformation>,
}

impl RegisterInformation {
    pub fn new(id: usize, name: &str, size: usize, register_type: RegisterType) -> Self {
        RegisterInformation {
            id,
            name: name.to_owned(),
            size,
            register_type,
            constant: false,
            enclosing: None,
            offset: 0,
            constituents: Vec::new(),
        }
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.enclosing.is_none()
    }
}

/// A named group of registers (e.g. the integer unit), with lookup by id
/// and by name plus the unit's special registers.
#[derive(Clone, Debug)]
pub struct UnitInformation {
    name: String,
    registers: Vec<RegisterInformation>,
    by_name: HashMap<String, usize>,
    program_counter: Option<usize>,
    link: Option<usize>,
}

impl UnitInformation {
    pub fn new(name: &str) -> UnitInformation {
        UnitInformation {
            name: name.to_owned(),
            registers: Vec::new(),
            by_name: HashMap::new(),
            program_counter: None,
            link: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a register. Panics on a duplicate name or id; module
    /// definitions are static data, so that is a programming error.
    pub fn add_register(&mut self, register: RegisterInformation) {
        assert!(
            !self.by_name.contains_key(&register.name),
            "duplicate register name in unit"
        );
        match register.register_type {
            RegisterType::ProgramCounter => self.program_counter = Some(register.id),
            RegisterType::Link => self.link = Some(register.id),
            _ => {}
        }
        self.by_name
            .insert(register.name.clone(), self.registers.len());
        self.registers.push(register);
    }

    pub fn registers(&self) -> &[RegisterInformation] {
        &self.registers
    }

    pub fn register_by_name(&self, name: &str) -> Option<&RegisterInformation> {
        self.by_name.get(name).map(|&index| &self.registers[index])
    }

    pub fn register_by_id(&self, id: usize) -> Option<&RegisterInformation> {
        self.registers.iter().find(|register| register.id == id)
    }

    pub fn program_counter(&self) -> Option<&RegisterInformation> {
        self.program_counter.and_then(|id| self.register_by_id(id))
    }

    pub fn link(&self) -> Option<&RegisterInformation> {
        self.link.and_then(|id| self.register_by_id(id))
    }

    /// Replaces the size of every register; used when a 64-bit module
    /// widens a 32-bit base.
    pub fn resize_registers(&mut self, size: usize) {
        for register in &mut self.registers {
            if register.is_top_level() && register.register_type != RegisterType::Flag {
                register.size = size;
            }
        }
    }

    /// Register names sorted alphabetically, for stable observer output.
    pub fn register_names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registers.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}
