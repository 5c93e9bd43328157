//! Symbol table. Globals, functions, and enum constants share one namespace;
//! a function body gets a second namespace for parameters and locals that
//! shadows it for the duration of that function.

use std::collections::HashMap;

use mcc_util::{DataType, Opcode, Symbol, SymbolClass};

#[derive(Default)]
pub struct SymbolTable {
    globals: HashMap<String, Symbol>,
    locals: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local-then-global lookup, matching `find_symbol`.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }

    pub fn lookup_global(&self, name: &str) -> Option<&Symbol> {
        self.globals.get(name)
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    pub fn insert_global(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.globals.insert(name.into(), symbol);
    }

    pub fn insert_local(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.locals.insert(name.into(), symbol);
    }

    /// Drops all local/parameter bindings, restoring the plain global
    /// namespace for the next function (or for the end of parsing).
    pub fn clear_locals(&mut self) {
        self.locals.clear();
    }
}

/// Registers `open`, `read`, `close`, `printf`, `malloc`, `memset`,
/// `memcmp`, and `exit` as built-in calls, each carrying its own opcode as
/// its symbol value the way `add_sys_calls` wires the original's syscall
/// dispatch straight through the symbol table.
pub fn install_sys_calls(table: &mut SymbolTable) {
    const SYS_CALLS: [(&str, Opcode); 8] = [
        ("open", Opcode::Open),
        ("read", Opcode::Read),
        ("close", Opcode::Clos),
        ("printf", Opcode::Prtf),
        ("malloc", Opcode::Malc),
        ("memset", Opcode::Mset),
        ("memcmp", Opcode::Mcmp),
        ("exit", Opcode::Exit),
    ];
    for (name, op) in SYS_CALLS {
        table.insert_global(
            name,
            Symbol {
                name: name.to_string(),
                datatype: DataType::INT,
                class: SymbolClass::Sys,
                value: op.as_word(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_shadow_globals_by_name() {
        let mut table = SymbolTable::new();
        table.insert_global(
            "x",
            Symbol {
                name: "x".into(),
                datatype: DataType::INT,
                class: SymbolClass::Global,
                value: 0,
            },
        );
        table.insert_local(
            "x",
            Symbol {
                name: "x".into(),
                datatype: DataType::CHAR,
                class: SymbolClass::Local,
                value: 1,
            },
        );
        assert_eq!(table.lookup("x").unwrap().class, SymbolClass::Local);
        table.clear_locals();
        assert_eq!(table.lookup("x").unwrap().class, SymbolClass::Global);
    }

    #[test]
    fn sys_calls_carry_their_opcode_as_value() {
        let mut table = SymbolTable::new();
        install_sys_calls(&mut table);
        let printf = table.lookup_global("printf").unwrap();
        assert_eq!(printf.class, SymbolClass::Sys);
        assert_eq!(Opcode::from_word(printf.value), Some(Opcode::Prtf));
    }
}
