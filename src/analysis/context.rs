//! Per-function variable typing.

use std::collections::HashMap;

use super::format::FormatSpec;

/// Variable name to declared type text for one function.
///
/// The first recorded type for a name wins; later shadowing declarations
/// never overwrite it.
#[derive(Debug, Clone, Default)]
pub struct KnownTypes {
    types: HashMap<String, String>,
}

impl KnownTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a variable. Returns false when the name was already known.
    pub fn record(&mut self, name: &str, type_text: &str) -> bool {
        if self.types.contains_key(name) {
            return false;
        }
        self.types.insert(name.to_string(), type_text.to_string());
        true
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Conversion for a variable. Unknown variables print as `%d`; known
    /// variables whose type has no single conversion print nothing.
    pub fn format_of(&self, name: &str) -> Option<FormatSpec> {
        match self.type_of(name) {
            Some(ty) => FormatSpec::for_type(ty),
            None => Some(FormatSpec::I32),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Analysis state owned by a single function rewrite.
#[derive(Debug, Clone)]
pub struct FunctionContext {
    name: String,
    pub known: KnownTypes,
}

impl FunctionContext {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            known: KnownTypes::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_type_wins() {
        let mut known = KnownTypes::new();
        assert!(known.record("x", "int"));
        assert!(!known.record("x", "char *"));
        assert_eq!(known.type_of("x"), Some("int"));
        assert_eq!(known.len(), 1);
    }

    #[test]
    fn test_format_of() {
        let mut known = KnownTypes::new();
        known.record("p", "struct dev *");
        known.record("s", "struct dev");
        assert_eq!(known.format_of("p"), Some(FormatSpec::Pointer));
        assert_eq!(known.format_of("s"), None);
        assert_eq!(known.format_of("unknown"), Some(FormatSpec::I32));
    }
}
