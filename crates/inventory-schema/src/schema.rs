//! Schema registry.
//!
//! Types are declared as [`TypeDef`]s (an ordered predicate list plus
//! permission thresholds) and flattened once by [`RegistryBuilder::build`]:
//! base predicates come first, type-specific ones follow, and a type-specific
//! predicate with an inherited name replaces the inherited one in place.
//! The resulting [`Registry`] is immutable and safe to share across threads.

use crate::error::SchemaError;
use crate::predicate::{Predicate, PredicateKind};
use crate::role::{Operation, Role};
use std::collections::{BTreeSet, HashMap};

/// Multi-valued type tag predicate carried by every node.
pub const TYPE_PREDICATE: &str = "dgraph.type";

/// Type every inventory entry derives from.
pub const BASE_TYPE: &str = "Entry";

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone)]
pub struct TypeDef {
    name: String,
    base: Option<String>,
    description: Option<String>,
    create: Role,
    edit: Role,
    predicates: Vec<Predicate>,
}

impl TypeDef {
    /// A new declaration; create and edit default to `Contributor`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            base: None,
            description: None,
            create: Role::Contributor,
            edit: Role::Contributor,
            predicates: Vec::new(),
        }
    }

    pub fn extends(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }

    pub fn permissions(mut self, create: Role, edit: Role) -> Self {
        self.create = create;
        self.edit = edit;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// A flattened, registered type.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub name: String,
    pub description: Option<String>,
    /// Ancestors first, this type last.
    pub lineage: Vec<String>,
    pub create: Role,
    pub edit: Role,
    pub predicates: Vec<Predicate>,
}

impl EntityType {
    pub fn predicate(&self, name: &str) -> Option<&Predicate> {
        self.predicates.iter().find(|p| p.name == name)
    }

    pub fn permission(&self, op: Operation) -> Role {
        match op {
            Operation::Create => self.create,
            Operation::Edit => self.edit,
        }
    }

    pub fn derives_from(&self, type_name: &str) -> bool {
        self.lineage.iter().any(|t| t == type_name)
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    defs: Vec<TypeDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, def: TypeDef) -> Self {
        self.defs.push(def);
        self
    }

    /// Flattens every declaration in order.
    ///
    /// Fails on a predicate declared twice in one type, a type declared twice,
    /// or a base that was not declared earlier.
    pub fn build(self) -> Result<Registry, SchemaError> {
        let mut types: Vec<EntityType> = Vec::with_capacity(self.defs.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for def in self.defs {
            if index.contains_key(&def.name) {
                return Err(SchemaError::DuplicateType(def.name));
            }
            let mut seen = BTreeSet::new();
            for p in &def.predicates {
                if !seen.insert(p.name.as_str()) {
                    return Err(SchemaError::DuplicatePredicate {
                        type_name: def.name.clone(),
                        predicate: p.name.clone(),
                    });
                }
            }

            let (mut lineage, mut predicates) = match &def.base {
                Some(base) => {
                    let parent = index.get(base).map(|&i| &types[i]).ok_or_else(|| {
                        SchemaError::UnknownBase {
                            type_name: def.name.clone(),
                            base: base.clone(),
                        }
                    })?;
                    (parent.lineage.clone(), parent.predicates.clone())
                }
                None => (Vec::new(), Vec::new()),
            };

            for p in def.predicates {
                match predicates.iter_mut().find(|existing| existing.name == p.name) {
                    Some(slot) => *slot = p,
                    None => predicates.push(p),
                }
            }
            lineage.push(def.name.clone());

            index.insert(def.name.clone(), types.len());
            types.push(EntityType {
                name: def.name,
                description: def.description,
                lineage,
                create: def.create,
                edit: def.edit,
                predicates,
            });
        }

        Ok(Registry { types, index })
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug)]
pub struct Registry {
    types: Vec<EntityType>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn get_type(&self, name: &str) -> Result<&EntityType, SchemaError> {
        self.index
            .get(name)
            .map(|&i| &self.types[i])
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Case-insensitive lookup, for type names coming from user input.
    pub fn resolve_type(&self, name: &str) -> Option<&EntityType> {
        let name = name.trim();
        self.index
            .get(name)
            .map(|&i| &self.types[i])
            .or_else(|| self.types.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    /// Flattened predicates of `type_name`: inherited first, then its own.
    pub fn get_predicates(&self, type_name: &str) -> Result<&[Predicate], SchemaError> {
        self.get_type(type_name).map(|t| t.predicates.as_slice())
    }

    pub fn get_permission(&self, type_name: &str, op: Operation) -> Result<Role, SchemaError> {
        self.get_type(type_name).map(|t| t.permission(op))
    }

    /// First declaration of `name` across all types, in declaration order.
    pub fn predicate(&self, name: &str) -> Option<&Predicate> {
        self.types
            .iter()
            .flat_map(|t| t.predicates.iter())
            .find(|p| p.name == name)
    }

    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// `true` for registered types derived from [`BASE_TYPE`].
    pub fn is_entry_type(&self, name: &str) -> bool {
        self.get_type(name).is_ok_and(|t| t.derives_from(BASE_TYPE))
    }

    /// Names of every predicate holding dates, across all types.
    pub fn date_predicates(&self) -> BTreeSet<&str> {
        self.types
            .iter()
            .flat_map(|t| t.predicates.iter())
            .filter(|p| p.is_date())
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Storage schema (DDL) for every stored predicate and every type.
    ///
    /// Order follows type declaration order, then predicate order within the
    /// flattened type; a predicate is emitted at its first occurrence. When
    /// types disagree, the list form wins and directives are unioned.
    pub fn generate_storage_schema(&self) -> String {
        struct Decl {
            dtype: &'static str,
            list: bool,
            directives: Vec<String>,
        }

        let mut order: Vec<&str> = Vec::new();
        let mut decls: HashMap<&str, Decl> = HashMap::new();

        for p in self.types.iter().flat_map(|t| t.predicates.iter()) {
            let Some(dtype) = storage_dtype(p) else {
                continue;
            };
            let decl = decls.entry(p.name.as_str()).or_insert_with(|| {
                order.push(p.name.as_str());
                Decl {
                    dtype,
                    list: false,
                    directives: Vec::new(),
                }
            });
            decl.list |= p.is_list();
            let mut wanted: Vec<&str> = p.directives.iter().map(String::as_str).collect();
            if p.is_relationship() {
                wanted.push("@reverse");
            }
            if matches!(p.kind, PredicateKind::Geo) && p.directives.is_empty() {
                wanted.push("@index(geo)");
            }
            for d in wanted {
                if !decl.directives.iter().any(|have| have == d) {
                    decl.directives.push(d.to_string());
                }
            }
        }

        let mut out = String::new();
        for name in &order {
            let decl = &decls[name];
            let ty = if decl.list {
                format!("[{}]", decl.dtype)
            } else {
                decl.dtype.to_string()
            };
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&ty);
            for d in &decl.directives {
                out.push(' ');
                out.push_str(d);
            }
            out.push_str(" .\n");
        }

        for t in &self.types {
            out.push_str(&format!("\ntype {} {{\n", t.name));
            for p in t.predicates.iter().filter(|p| storage_dtype(p).is_some()) {
                out.push_str("  ");
                out.push_str(&p.name);
                out.push('\n');
            }
            out.push_str("}\n");
        }
        out
    }
}

/// Storage scalar type, or `None` for predicates that are never stored.
fn storage_dtype(p: &Predicate) -> Option<&'static str> {
    if !p.stored || p.name == TYPE_PREDICATE {
        return None;
    }
    let dtype = match &p.kind {
        PredicateKind::Uid | PredicateKind::ReverseRelationship { .. } => return None,
        PredicateKind::UniqueName | PredicateKind::String | PredicateKind::ListString { .. } => {
            "string"
        }
        PredicateKind::SingleChoice { numeric, .. } | PredicateKind::MultipleChoice { numeric, .. } => {
            if *numeric {
                "int"
            } else {
                "string"
            }
        }
        PredicateKind::Integer => "int",
        PredicateKind::Boolean => "bool",
        PredicateKind::DateTime | PredicateKind::Year | PredicateKind::ListYear => "datetime",
        PredicateKind::Relationship { .. } => "uid",
        PredicateKind::Geo => "geo",
        PredicateKind::Password => "password",
    };
    Some(dtype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::TargetConstraint;

    fn registry() -> Registry {
        RegistryBuilder::new()
            .define(
                TypeDef::new("Entry")
                    .predicate(Predicate::uid())
                    .predicate(Predicate::string("name").required().directive("@index(term)"))
                    .predicate(Predicate::string("description")),
            )
            .define(
                TypeDef::new("Source")
                    .extends("Entry")
                    .predicate(Predicate::string("channel_url"))
                    .predicate(Predicate::string("description").large().overwrite()),
            )
            .define(
                TypeDef::new("Channel")
                    .extends("Entry")
                    .permissions(Role::Admin, Role::Admin)
                    .predicate(Predicate::list_relationship(
                        "sources",
                        TargetConstraint::one("Source"),
                    )),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn flattens_base_first_and_overrides_in_place() {
        let r = registry();
        let names: Vec<_> = r
            .get_predicates("Source")
            .unwrap()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["uid", "name", "description", "channel_url"]);
        let description = r.get_type("Source").unwrap().predicate("description").unwrap();
        assert!(description.overwrite);
        assert!(!r.get_type("Entry").unwrap().predicate("description").unwrap().overwrite);
    }

    #[test]
    fn permissions_and_lineage() {
        let r = registry();
        assert_eq!(r.get_permission("Channel", Operation::Create).unwrap(), Role::Admin);
        assert_eq!(r.get_permission("Source", Operation::Edit).unwrap(), Role::Contributor);
        assert_eq!(r.get_type("Source").unwrap().lineage, vec!["Entry", "Source"]);
        assert!(r.is_entry_type("Channel"));
        assert!(r.get_permission("Nope", Operation::Create).is_err());
        assert_eq!(r.resolve_type("source").unwrap().name, "Source");
    }

    #[test]
    fn rejects_bad_declarations() {
        let dup = RegistryBuilder::new()
            .define(
                TypeDef::new("A")
                    .predicate(Predicate::string("x"))
                    .predicate(Predicate::string("x")),
            )
            .build();
        assert!(matches!(dup, Err(SchemaError::DuplicatePredicate { .. })));

        let orphan = RegistryBuilder::new()
            .define(TypeDef::new("B").extends("Missing"))
            .build();
        assert!(matches!(orphan, Err(SchemaError::UnknownBase { .. })));

        let twice = RegistryBuilder::new()
            .define(TypeDef::new("C"))
            .define(TypeDef::new("C"))
            .build();
        assert_eq!(twice.unwrap_err(), SchemaError::DuplicateType("C".into()));
    }

    #[test]
    fn storage_schema_is_stable() {
        let r = registry();
        let ddl = r.generate_storage_schema();
        assert_eq!(ddl, r.generate_storage_schema());
        assert!(ddl.starts_with("name: string @index(term) .\ndescription: string .\n"));
        assert!(ddl.contains("sources: [uid] @reverse .\n"));
        assert!(!ddl.contains("uid:"));
        assert!(ddl.contains("type Source {\n  name\n  description\n  channel_url\n}\n"));
    }
}
