//! Module, value table and symbol table definitions

use super::instruction::{Operation, Region, Value};
use super::types::Type;
use crate::{Error, Result};

/// Type and debug name of an SSA value
#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo {
    /// Declared type
    pub ty: Type,
    /// Advisory role tag, never affects lowering
    pub name_hint: Option<String>,
}

/// Arena of every SSA value in a module
#[derive(Debug, Clone, Default)]
pub struct ValueTable {
    values: Vec<ValueInfo>,
}

impl ValueTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Allocate a fresh value of the given type
    pub fn alloc(&mut self, ty: Type) -> Value {
        let id = self.values.len() as u32;
        self.values.push(ValueInfo {
            ty,
            name_hint: None,
        });
        Value(id)
    }

    /// Allocate a fresh value with a name hint
    pub fn alloc_named(&mut self, ty: Type, hint: &str) -> Value {
        let value = self.alloc(ty);
        self.set_name_hint(value, hint);
        value
    }

    /// Look up a value
    pub fn get(&self, value: Value) -> Result<&ValueInfo> {
        self.values
            .get(value.0 as usize)
            .ok_or_else(|| Error::malformed(format!("unknown value {}", value)))
    }

    /// Type of a value
    pub fn type_of(&self, value: Value) -> Result<&Type> {
        self.get(value).map(|info| &info.ty)
    }

    /// Name hint of a value, if any
    pub fn name_hint(&self, value: Value) -> Option<&str> {
        self.values
            .get(value.0 as usize)
            .and_then(|info| info.name_hint.as_deref())
    }

    /// Attach a name hint to a value
    pub fn set_name_hint(&mut self, value: Value, hint: &str) {
        if let Some(info) = self.values.get_mut(value.0 as usize) {
            info.name_hint = Some(hint.to_string());
        }
    }

    /// Number of values allocated so far
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no value was allocated
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Compilation unit: a top-level region plus the values it defines
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Top-level operations
    pub body: Region,
    /// Types and names of all values
    pub values: ValueTable,
}

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self {
            body: Region::new(),
            values: ValueTable::new(),
        }
    }

    /// Allocate a fresh value of the given type
    pub fn new_value(&mut self, ty: Type) -> Value {
        self.values.alloc(ty)
    }

    /// Append an operation to the top-level region
    pub fn push(&mut self, op: Operation) {
        self.body.ops.push(op);
    }

    /// Find a top-level operation defining the given symbol
    pub fn lookup_symbol(&self, name: &str) -> Option<&Operation> {
        self.body
            .ops
            .iter()
            .find(|op| op.symbol_name() == Some(name))
    }

    /// Insert a symbol-defining operation, replacing any existing definition
    /// of the same name in place
    ///
    /// Returns true if an existing definition was replaced.
    pub fn insert_or_update(&mut self, op: Operation) -> Result<bool> {
        let name = op
            .symbol_name()
            .ok_or_else(|| Error::malformed("insert_or_update on an op without a symbol"))?
            .to_string();

        match self
            .body
            .ops
            .iter()
            .position(|existing| existing.symbol_name() == Some(name.as_str()))
        {
            Some(index) => {
                self.body.ops[index] = op;
                Ok(true)
            }
            None => {
                self.body.ops.push(op);
                Ok(false)
            }
        }
    }

    /// Names of all top-level symbols, in program order
    pub fn symbols(&self) -> Vec<&str> {
        self.body
            .ops
            .iter()
            .filter_map(|op| op.symbol_name())
            .collect()
    }

    /// Visit every operation depth-first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Operation)) {
        self.body.walk(visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{FuncOp, IntRegister};

    #[test]
    fn test_value_table() {
        let mut values = ValueTable::new();
        let a = values.alloc(Type::IntReg(IntRegister::Unallocated));
        let b = values.alloc_named(Type::IntReg(IntRegister::A0), "arg");
        assert_eq!(a, Value(0));
        assert_eq!(b, Value(1));
        assert_eq!(values.name_hint(b), Some("arg"));
        assert_eq!(values.name_hint(a), None);
        assert!(values.type_of(Value(7)).is_err());
    }

    #[test]
    fn test_insert_or_update_is_keyed_by_name() {
        let mut module = Module::new();
        let first = FuncOp::external("free", vec![IntRegister::A0], vec![]);
        assert!(!module.insert_or_update(Operation::Func(first)).unwrap());

        let second = FuncOp::external("free", vec![IntRegister::A0], vec![]);
        assert!(module.insert_or_update(Operation::Func(second)).unwrap());

        assert_eq!(module.symbols(), vec!["free"]);
        assert!(module.lookup_symbol("free").is_some());
        assert!(module.lookup_symbol("malloc").is_none());
    }

    #[test]
    fn test_insert_or_update_requires_symbol() {
        let mut module = Module::new();
        let result = module.insert_or_update(Operation::cast(Value(0), Value(1)));
        assert!(matches!(result, Err(Error::MalformedIr(_))));
    }
}
