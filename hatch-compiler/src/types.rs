//! The language's type representation and per-module type table.

use std::collections::HashMap;
use std::rc::Rc;

/// One member of a struct-shaped type.
#[derive(Debug)]
pub struct StructMember {
    /// Member name.
    pub name: String,
    /// 1-based position within the struct; position 0 holds the length
    /// byte.
    pub position: u8,
    /// Member type.
    pub ty: Type,
}

#[derive(Debug)]
struct TypeData {
    name: String,
    length: usize,
    members: Vec<StructMember>,
}

/// A language type. Cheap to clone; equality is by name.
#[derive(Debug, Clone)]
pub struct Type(Rc<TypeData>);

impl Type {
    /// A primitive or struct type with the given cell length.
    pub fn new(name: impl Into<String>, length: usize) -> Self {
        Self(Rc::new(TypeData {
            name: name.into(),
            length,
            members: Vec::new(),
        }))
    }

    /// A struct-shaped type; its length is the member count (one cell per
    /// member, plus the leading length byte at runtime).
    pub fn with_members(name: impl Into<String>, members: Vec<StructMember>) -> Self {
        Self(Rc::new(TypeData {
            name: name.into(),
            length: members.len(),
            members,
        }))
    }

    /// The type's name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Payload length in cells.
    pub fn length(&self) -> usize {
        self.0.length
    }

    /// Struct members in position order; empty for primitives.
    pub fn members(&self) -> &[StructMember] {
        &self.0.members
    }

    /// Whether the type is struct-shaped.
    pub fn has_internal_structure(&self) -> bool {
        !self.0.members.is_empty()
    }

    /// The member with the given name.
    pub fn member(&self, name: &str) -> Option<&StructMember> {
        self.0.members.iter().find(|member| member.name == name)
    }

    fn is(&self, name: &str) -> bool {
        self.0.name == name
    }

    /// Whether this is `int`.
    pub fn is_int(&self) -> bool {
        self.is("int")
    }

    /// Whether this is `bool`.
    pub fn is_bool(&self) -> bool {
        self.is("bool")
    }

    /// Whether this is `void`.
    pub fn is_void(&self) -> bool {
        self.is("void")
    }

    /// Whether this is `string`.
    pub fn is_string(&self) -> bool {
        self.is("string")
    }

    /// Whether this is the first-class function type.
    pub fn is_func(&self) -> bool {
        self.is("func")
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for Type {}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-module type table: the primitives, the module's structs, and the
/// registered cast relation.
#[derive(Debug)]
pub struct TypeTable {
    types: HashMap<String, Type>,
    casts: Vec<(String, String)>,
}

impl TypeTable {
    /// A table holding the primitives and the default cast relation.
    pub fn new() -> Self {
        let mut table = Self {
            types: HashMap::new(),
            casts: Vec::new(),
        };

        for (name, length) in [
            ("int", 1),
            ("bool", 1),
            ("char", 1),
            ("void", 1),
            ("string", 1),
            ("func", 1),
        ] {
            table.define(Type::new(name, length));
        }

        table.allow_cast("char", "int");
        table.allow_cast("int", "char");
        table.allow_cast("bool", "int");

        table
    }

    /// Registers a type, replacing any previous definition of the name.
    pub fn define(&mut self, ty: Type) -> Type {
        self.types.insert(ty.name().to_string(), ty.clone());
        ty
    }

    /// Looks a type up by name.
    pub fn get(&self, name: &str) -> Option<Type> {
        self.types.get(name).cloned()
    }

    /// Whether the name is a registered type.
    pub fn exists(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registers a cast pair.
    pub fn allow_cast(&mut self, from: &str, to: &str) {
        self.casts.push((from.to_string(), to.to_string()));
    }

    /// Whether a cast between the two types is registered.
    pub fn is_cast_allowed(&self, from: &Type, to: &Type) -> bool {
        self.casts
            .iter()
            .any(|(f, t)| f == from.name() && t == to.name())
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_member_positions_are_one_based() {
        let car = Type::with_members(
            "Car",
            vec![
                StructMember {
                    name: "wheels".into(),
                    position: 1,
                    ty: Type::new("int", 1),
                },
                StructMember {
                    name: "seats".into(),
                    position: 2,
                    ty: Type::new("int", 1),
                },
            ],
        );

        assert_eq!(2, car.length());
        assert_eq!(1, car.member("wheels").unwrap().position);
        assert_eq!(2, car.member("seats").unwrap().position);
        assert!(car.member("doors").is_none());
    }

    #[test]
    fn casts_must_be_registered() {
        let table = TypeTable::new();
        let int = table.get("int").unwrap();
        let ch = table.get("char").unwrap();
        let b = table.get("bool").unwrap();

        assert!(table.is_cast_allowed(&ch, &int));
        assert!(table.is_cast_allowed(&int, &ch));
        assert!(table.is_cast_allowed(&b, &int));
        assert!(!table.is_cast_allowed(&int, &b));
    }
}
