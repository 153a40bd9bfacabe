use std::collections::HashMap;

/// A section-relative address, handed out during the first pass and
/// resolved to an absolute address once all sections are laid out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelativeMemoryPosition {
    pub section: String,
    pub offset: usize,
}

/// One bump-pointer allocator per section.
///
/// Sections come into existence on first use; `calculate_positions` lays
/// them out end-to-end with `text` first and the rest in first-seen
/// order.
pub struct MemoryAllocator {
    order: Vec<String>,
    sizes: HashMap<String, usize>,
    bases: HashMap<String, usize>,
    current: String,
}

pub const TEXT_SECTION: &str = "text";
pub const DATA_SECTION: &str = "data";

impl MemoryAllocator {
    pub fn new() -> MemoryAllocator {
        let mut allocator = MemoryAllocator {
            order: Vec::new(),
            sizes: HashMap::new(),
            bases: HashMap::new(),
            current: TEXT_SECTION.to_owned(),
        };
        allocator.ensure_section(TEXT_SECTION);
        allocator.ensure_section(DATA_SECTION);
        allocator
    }

    fn ensure_section(&mut self, name: &str) {
        if !self.sizes.contains_key(name) {
            self.order.push(name.to_owned());
            self.sizes.insert(name.to_owned(), 0);
        }
    }

    pub fn set_current_section(&mut self, name: &str) {
        self.ensure_section(name);
        self.current = name.to_owned();
    }

    pub fn current_section(&self) -> &str {
        &self.current
    }

    /// Reserves `size` cells in the current section.
    pub fn allocate(&mut self, size: usize) -> RelativeMemoryPosition {
        let section = self.current.clone();
        self.allocate_in(&section, size)
    }

    /// Reserves `size` cells in the named section.
    pub fn allocate_in(&mut self, section: &str, size: usize) -> RelativeMemoryPosition {
        self.ensure_section(section);
        let offset = self.sizes[section];
        *self.sizes.get_mut(section).expect("section just ensured") = offset + size;
        RelativeMemoryPosition {
            section: section.to_owned(),
            offset,
        }
    }

    /// Like [`allocate`](#method.allocate), but first rounds the section
    /// pointer up to a multiple of `alignment`.
    pub fn allocate_aligned(&mut self, size: usize, alignment: usize) -> RelativeMemoryPosition {
        assert!(alignment >= 1, "alignment must be positive");
        let section = self.current.clone();
        let occupied = self.sizes[&section];
        let padding = (alignment - occupied % alignment) % alignment;
        if padding > 0 {
            self.allocate_in(&section, padding);
        }
        self.allocate_in(&section, size)
    }

    /// Lays the sections out end-to-end: `text` first, the others in
    /// first-seen order.
    pub fn calculate_positions(&mut self) {
        let mut base = 0;
        self.bases.clear();
        let mut names: Vec<String> = self.order.clone();
        names.sort_by_key(|name| if name == TEXT_SECTION { 0 } else { 1 });
        for name in names {
            self.bases.insert(name.clone(), base);
            base += self.sizes[&name];
        }
    }

    /// Resolves a relative position. Only valid after
    /// `calculate_positions`.
    pub fn absolute(&self, position: &RelativeMemoryPosition) -> usize {
        self.bases[&position.section] + position.offset
    }

    /// Total cells allocated across all sections.
    pub fn total_size(&self) -> usize {
        self.sizes.values().sum()
    }
}

impl Default for MemoryAllocator {
    fn default() -> MemoryAllocator {
        MemoryAllocator::new()
    }
}
