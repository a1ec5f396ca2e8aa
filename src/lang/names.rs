use std::cmp::Ordering;

use crate::lang::types::ValueType;

/// Index of a label inside one compiling script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub(crate) u16);

/// What a name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Const(i32),
    Reg {
        index: u8,
        ty: ValueType,
        writable: bool,
    },
    Label(LabelId),
    Type(ValueType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub name: String,
    pub kind: RefKind,
}

/// Name table kept sorted for binary search.
///
/// The registry holds the global table; every compilation owns a local one
/// whose entries shadow the globals.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<NamedRef>,
}

/// Compares `name` with the concatenation `prefix + suffix` without
/// allocating it.
pub(crate) fn cmp_split(name: &str, prefix: &str, suffix: &str) -> Ordering {
    name.bytes().cmp(prefix.bytes().chain(suffix.bytes()))
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedRef> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&NamedRef> {
        self.get_split(name, "")
    }

    /// Looks up `prefix + suffix`.
    pub fn get_split(&self, prefix: &str, suffix: &str) -> Option<&NamedRef> {
        self.entries
            .binary_search_by(|e| cmp_split(&e.name, prefix, suffix))
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut NamedRef> {
        match self.entries.binary_search_by(|e| e.name.as_str().cmp(name)) {
            Ok(i) => self.entries.get_mut(i),
            Err(_) => None,
        }
    }

    /// Inserts a new name, returning the existing entry on collision.
    pub fn insert(&mut self, name: impl Into<String>, kind: RefKind) -> Result<(), &NamedRef> {
        let name = name.into();
        match self.entries.binary_search_by(|e| e.name.as_str().cmp(&name)) {
            Ok(i) => Err(&self.entries[i]),
            Err(i) => {
                self.entries.insert(i, NamedRef { name, kind });
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(names: &[&str]) -> SymbolTable {
        let mut t = SymbolTable::new();
        for (i, name) in names.iter().enumerate() {
            t.insert(*name, RefKind::Const(i as i32)).unwrap();
        }
        t
    }

    #[test]
    fn test_sorted_insert_and_lookup() {
        let t = table(&["zeta", "alpha", "mid"]);
        let names: Vec<&str> = t.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(t.get("mid").map(|e| e.kind), Some(RefKind::Const(2)));
        assert!(t.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_insert() {
        let mut t = table(&["a"]);
        let err = t.insert("a", RefKind::Const(9)).unwrap_err();
        assert_eq!(err.kind, RefKind::Const(0));
    }

    #[test]
    fn test_split_lookup() {
        let t = table(&["Unit.getHealth", "Unit.getId", "Unit"]);
        assert_eq!(
            t.get_split("Unit", ".getHealth").map(|e| e.name.as_str()),
            Some("Unit.getHealth")
        );
        assert!(t.get_split("Unit", ".getMissing").is_none());
        assert!(t.get_split("Uni", "").is_none());
    }

    #[test]
    fn test_cmp_split() {
        assert_eq!(cmp_split("ab", "a", "b"), Ordering::Equal);
        assert_eq!(cmp_split("ab", "a", "c"), Ordering::Less);
        assert_eq!(cmp_split("abc", "a", "b"), Ordering::Greater);
    }
}
