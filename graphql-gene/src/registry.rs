//! The field-line registry.
//!
//! Schema generation happens in two phases. First, every model, inline type and type extension
//! contributes _field lines_ to a [`TypeDefLines`] registry: for each type, a map from field name
//! to the field's type signature, argument signatures and directive invocations. Entries are only
//! ever merged, never replaced, so that several sources (a model, its aliases, global extensions)
//! can all describe the same type. Once every source has been processed, the registry is
//! [printed](TypeDefLines::print) to GraphQL SDL, which is then parsed and materialized into an
//! executable schema.

use crate::default_resolver::{PAGE_ARG_DEFAULT, PER_PAGE_ARG_DEFAULT};
use derive_more::Display;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

/// The kind of a GraphQL type definition.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum VarType {
    #[default]
    #[display(fmt = "type")]
    Object,
    #[display(fmt = "enum")]
    Enum,
    #[display(fmt = "interface")]
    Interface,
    #[display(fmt = "input")]
    Input,
    #[display(fmt = "scalar")]
    Scalar,
    #[display(fmt = "union")]
    Union,
}

/// The accumulated definition of a single field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldLine {
    /// The return type signature, possibly empty for enum values and union members.
    pub type_def: String,
    /// Candidate signatures for each argument.
    pub args_def: IndexMap<String, IndexSet<String>>,
    /// Serialized directive invocations.
    pub directives: IndexSet<String>,
}

impl FieldLine {
    /// Add a candidate signature for the argument `key`.
    ///
    /// The reserved pagination arguments `page` and `perPage` get their default values appended to
    /// the signature.
    pub fn add_argument(&mut self, key: &str, signature: &str) {
        let signature = match key {
            "page" => format!("{signature} = {PAGE_ARG_DEFAULT}"),
            "perPage" => format!("{signature} = {PER_PAGE_ARG_DEFAULT}"),
            _ => signature.to_string(),
        };
        self.args_def
            .entry(key.to_string())
            .or_default()
            .insert(signature);
    }

    /// Print this field line as it appears in the body of a type definition.
    pub fn print(&self, name: &str) -> String {
        let mut line = name.to_string();
        if !self.args_def.is_empty() {
            let args = self
                .args_def
                .iter()
                .map(|(arg, candidates)| format!("{arg}: {}", candidates.iter().join(" | ")))
                .join(", ");
            line = format!("{line}({args})");
        }
        if !self.type_def.is_empty() {
            line = format!("{line}: {}", self.type_def);
        }
        if !self.directives.is_empty() {
            line = format!("{line} {}", self.directives.iter().join(" "));
        }
        line
    }
}

/// The accumulated definition of a single type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeDefinition {
    pub var_type: VarType,
    /// Serialized directive invocations on the type itself.
    pub directives: IndexSet<String>,
    /// Interfaces implemented by an object type.
    pub implements: IndexSet<String>,
    pub lines: IndexMap<String, FieldLine>,
}

impl TypeDefinition {
    /// Create an empty definition of the given kind.
    pub fn new(var_type: VarType) -> Self {
        Self {
            var_type,
            ..Default::default()
        }
    }

    /// Get or create the line for `field`.
    pub fn ensure_field(&mut self, field: &str) -> &mut FieldLine {
        self.lines.entry(field.to_string()).or_default()
    }

    /// Print this definition as SDL.
    ///
    /// Returns [`None`] if the type has no fields, since GraphQL does not allow empty types.
    pub fn print(&self, name: &str) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let directives = self
            .directives
            .iter()
            .map(|directive| format!(" {directive}"))
            .join("");
        if self.var_type == VarType::Union {
            return Some(format!(
                "union {name}{directives} = {}",
                self.lines.keys().join(" | ")
            ));
        }

        let implements = if self.implements.is_empty() {
            String::new()
        } else {
            format!(" implements {}", self.implements.iter().join(" & "))
        };
        let lines = self
            .lines
            .iter()
            .map(|(field, line)| format!("  {}", line.print(field)))
            .join("\n");
        Some(format!(
            "{} {name}{implements}{directives} {{\n{lines}\n}}",
            self.var_type
        ))
    }
}

/// The field-line registry: every type definition collected so far, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeDefLines {
    types: IndexMap<String, TypeDefinition>,
}

impl TypeDefLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the definition of the type `name`.
    ///
    /// New types are object types.
    pub fn ensure_type(&mut self, name: &str) -> &mut TypeDefinition {
        self.types.entry(name.to_string()).or_default()
    }

    /// Get or create the definition of the type `name`, forcing its kind.
    pub fn ensure_type_of(&mut self, name: &str, var_type: VarType) -> &mut TypeDefinition {
        let def = self.ensure_type(name);
        def.var_type = var_type;
        def
    }

    /// Get or create the line for `field` in the type `ty`.
    pub fn ensure_field(&mut self, ty: &str, field: &str) -> &mut FieldLine {
        self.ensure_type(ty).ensure_field(field)
    }

    /// Attach a serialized directive invocation to the type `ty`.
    pub fn set_directive_on_type(&mut self, ty: &str, directive: impl Into<String>) {
        self.ensure_type(ty).directives.insert(directive.into());
    }

    /// Attach a serialized directive invocation to the field `ty.field`.
    pub fn set_directive_on_field(&mut self, ty: &str, field: &str, directive: impl Into<String>) {
        self.ensure_field(ty, field)
            .directives
            .insert(directive.into());
    }

    /// Add a candidate signature for the argument `key` of `ty.field`.
    pub fn add_argument(&mut self, ty: &str, field: &str, key: &str, signature: &str) {
        self.ensure_field(ty, field).add_argument(key, signature);
    }

    /// Drop the line for `field` in the type `ty`, if there is one.
    pub fn remove_field(&mut self, ty: &str, field: &str) -> Option<FieldLine> {
        self.types.get_mut(ty)?.lines.shift_remove(field)
    }

    /// Insert a whole type definition, merging it into any existing definition with the same name.
    ///
    /// The kind of `def` wins; fields, arguments and directives are merged.
    pub fn merge_type(&mut self, name: &str, def: TypeDefinition) {
        let existing = self.ensure_type(name);
        existing.var_type = def.var_type;
        existing.directives.extend(def.directives);
        existing.implements.extend(def.implements);
        for (field, line) in def.lines {
            let existing = existing.ensure_field(&field);
            if !line.type_def.is_empty() {
                existing.type_def = line.type_def;
            }
            for (arg, candidates) in line.args_def {
                existing.args_def.entry(arg).or_default().extend(candidates);
            }
            existing.directives.extend(line.directives);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TypeDefinition> {
        self.types.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Whether `name` is defined and has at least one field line.
    pub fn has_lines(&self, name: &str) -> bool {
        self.get(name).map_or(false, |def| !def.lines.is_empty())
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (&str, &TypeDefinition)> {
        self.types.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Print the registry as SDL: `Query` first, then every other type in insertion order.
    ///
    /// Types without any fields are left out.
    pub fn print(&self) -> String {
        let query = self.types.get_key_value("Query");
        query
            .into_iter()
            .chain(self.types.iter().filter(|(name, _)| *name != "Query"))
            .filter_map(|(name, def)| def.print(name))
            .join("\n\n")
    }
}
