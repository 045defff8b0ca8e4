//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Symbol tracking for the ents parser
//
// Lexical scoping is a stack of name sets, pushed on function entry and on
// each nested block, plus a flat set of file-scope globals. Functions live
// in their own registry which enforces the prototype/definition rules.
//

use std::collections::{HashMap, HashSet};
use std::fmt;

// ============================================================================
// Scope Stack
// ============================================================================

/// Variable scoping. The scope stack is non-empty exactly while the parser
/// is inside a function body.
#[derive(Debug, Default)]
pub struct ScopeStack {
    globals: HashSet<String>,
    scopes: Vec<HashSet<String>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashSet::new());
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// True while inside a function body
    pub fn in_function(&self) -> bool {
        !self.scopes.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declare a name in the innermost scope
    pub fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    /// Declare a file-scope global
    pub fn declare_global(&mut self, name: &str) {
        self.globals.insert(name.to_string());
    }

    /// Is `name` visible here (any live scope, or a global)?
    pub fn is_declared(&self, name: &str) -> bool {
        self.globals.contains(name) || self.scopes.iter().any(|s| s.contains(name))
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }
}

// ============================================================================
// Function Registry
// ============================================================================

/// What the parser knows about a declared function
#[derive(Debug, Clone, Copy)]
pub struct FunctionInfo {
    pub arity: usize,
    /// Introduced by a header prototype
    pub prototype: bool,
    /// A full definition has been seen
    pub defined: bool,
}

/// Registry of declared functions: header prototypes and full definitions.
/// A definition may follow a prototype of the same name; any other collision
/// is an error.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    funcs: HashMap<String, FunctionInfo>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn arity(&self, name: &str) -> Option<usize> {
        self.funcs.get(name).map(|f| f.arity)
    }

    pub fn is_prototype(&self, name: &str) -> bool {
        self.funcs.get(name).is_some_and(|f| f.prototype)
    }

    /// Register a header prototype
    pub fn declare_prototype(&mut self, name: &str, arity: usize) -> Result<(), SymbolError> {
        match self.funcs.get_mut(name) {
            Some(info) if info.defined => Err(SymbolError::Redefinition(name.to_string())),
            Some(info) => {
                if info.arity != arity {
                    return Err(SymbolError::ArityMismatch {
                        name: name.to_string(),
                        expected: info.arity,
                        found: arity,
                    });
                }
                info.prototype = true;
                Ok(())
            }
            None => {
                self.funcs.insert(
                    name.to_string(),
                    FunctionInfo {
                        arity,
                        prototype: true,
                        defined: false,
                    },
                );
                Ok(())
            }
        }
    }

    /// Register a full definition
    pub fn define(&mut self, name: &str, arity: usize) -> Result<(), SymbolError> {
        match self.funcs.get_mut(name) {
            Some(info) => {
                if !info.prototype || info.defined {
                    return Err(SymbolError::Redefinition(name.to_string()));
                }
                if info.arity != arity {
                    return Err(SymbolError::ArityMismatch {
                        name: name.to_string(),
                        expected: info.arity,
                        found: arity,
                    });
                }
                info.defined = true;
                Ok(())
            }
            None => {
                self.funcs.insert(
                    name.to_string(),
                    FunctionInfo {
                        arity,
                        prototype: false,
                        defined: true,
                    },
                );
                Ok(())
            }
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// Name already defined and not re-declarable
    Redefinition(String),
    /// Definition disagrees with a prototype's parameter count
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::Redefinition(name) => write!(f, "Duplicated function name '{}'.", name),
            SymbolError::ArityMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "Function '{}' declared with {} parameters, defined with {}.",
                name, expected, found
            ),
        }
    }
}

impl std::error::Error for SymbolError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_visibility() {
        let mut scopes = ScopeStack::new();
        assert!(!scopes.in_function());

        scopes.enter_scope();
        scopes.declare("a");
        scopes.enter_scope();
        scopes.declare("b");

        assert!(scopes.is_declared("a"));
        assert!(scopes.is_declared("b"));

        scopes.exit_scope();
        assert!(scopes.is_declared("a"));
        assert!(!scopes.is_declared("b"));

        scopes.exit_scope();
        assert!(!scopes.in_function());
        assert!(!scopes.is_declared("a"));
    }

    #[test]
    fn test_globals_always_visible() {
        let mut scopes = ScopeStack::new();
        scopes.declare_global("counter");
        assert!(scopes.is_declared("counter"));
        assert!(scopes.is_global("counter"));

        scopes.enter_scope();
        assert!(scopes.is_declared("counter"));
        scopes.exit_scope();
        assert!(scopes.is_declared("counter"));
    }

    #[test]
    fn test_declare_outside_function_is_ignored() {
        let mut scopes = ScopeStack::new();
        scopes.declare("x");
        assert!(!scopes.is_declared("x"));
    }

    #[test]
    fn test_define_then_redefine() {
        let mut funcs = FunctionRegistry::new();
        funcs.define("f", 2).unwrap();
        assert!(funcs.contains("f"));
        assert_eq!(funcs.arity("f"), Some(2));
        assert!(matches!(
            funcs.define("f", 2),
            Err(SymbolError::Redefinition(_))
        ));
    }

    #[test]
    fn test_prototype_then_define() {
        let mut funcs = FunctionRegistry::new();
        funcs.declare_prototype("ping", 0).unwrap();
        assert!(funcs.is_prototype("ping"));
        funcs.define("ping", 0).unwrap();
        // A second definition is still an error
        assert!(funcs.define("ping", 0).is_err());
    }

    #[test]
    fn test_definition_without_prototype_collides() {
        let mut funcs = FunctionRegistry::new();
        funcs.define("f", 0).unwrap();
        assert!(funcs.declare_prototype("f", 0).is_err());
    }

    #[test]
    fn test_arity_agreement() {
        let mut funcs = FunctionRegistry::new();
        funcs.declare_prototype("f", 2).unwrap();
        assert!(matches!(
            funcs.define("f", 3),
            Err(SymbolError::ArityMismatch { .. })
        ));
        funcs.define("f", 2).unwrap();
    }
}
