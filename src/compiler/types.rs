// This file is part of nova64.
// Grounded on spec.md §3's type lattice and §4.11's size/conversion table.
// Tagged-variant re-expression per spec §9's design note ("one enum per
// AST category... re-express inheritance as tagged variants").

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Byte,
    Int,
    Uint,
    Bool,
    Fixed,
    Ufixed,
    Void,
    Pointer(Box<Type>),
    Array(Box<Type>, u32),
    Struct(String),
    Enum(String),
    Function(Box<Type>, Vec<Type>),
    /// A bare type name the parser couldn't yet resolve to `Struct` or
    /// `Enum` (it doesn't have the declaration list in scope). The type
    /// checker's first pass rewrites every `Named` it finds once the
    /// symbol table is built.
    Named(String),
}

impl Type {
    /// Byte size per spec.md §4.11: byte/bool = 1, int/uint/fixed/ufixed/
    /// pointer = 2, void = 0, array = element size × count, struct = sum
    /// of field sizes, enum = 1.
    pub fn size_of(&self, structs: &std::collections::HashMap<String, StructLayout>) -> u32 {
        match self {
            Type::Byte | Type::Bool => 1,
            Type::Int | Type::Uint | Type::Fixed | Type::Ufixed => 2,
            Type::Void => 0,
            Type::Pointer(_) => 2,
            Type::Array(elem, count) => elem.size_of(structs) * count,
            Type::Struct(name) => structs.get(name).map(|s| s.size).unwrap_or(0),
            Type::Enum(_) => 1,
            Type::Function(_, _) => 0,
            Type::Named(_) => 0,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Byte | Type::Int | Type::Uint | Type::Fixed | Type::Ufixed | Type::Enum(_)
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Byte | Type::Int | Type::Uint | Type::Enum(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_, _))
    }

    pub fn is_pointer_to_struct(&self) -> bool {
        matches!(self, Type::Pointer(inner) if inner.is_struct())
    }

    /// Implicit conversions per spec.md §4.11: identity always; byte
    /// widens to int/uint/fixed/ufixed; int->fixed, uint->ufixed. `bool`
    /// never implicitly converts.
    pub fn implicitly_converts_to(&self, target: &Type) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (Type::Byte, Type::Int) | (Type::Byte, Type::Uint) => true,
            (Type::Byte, Type::Fixed) | (Type::Byte, Type::Ufixed) => true,
            (Type::Int, Type::Fixed) => true,
            (Type::Uint, Type::Ufixed) => true,
            _ => false,
        }
    }

    /// A narrowing conversion is allowed with a warning (spec.md §4.11
    /// type checker: "narrowing from a wider integral to a narrower
    /// integral is allowed with a warning").
    pub fn is_narrowing_integral(&self, target: &Type) -> bool {
        self.is_integral() && target.is_integral() && self.size_hint() > target.size_hint()
    }

    fn size_hint(&self) -> u32 {
        match self {
            Type::Byte => 1,
            Type::Int | Type::Uint => 2,
            Type::Enum(_) => 1,
            _ => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub offset: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructLayout {
    pub name: String,
    pub fields: Vec<StructField>,
    pub size: u32,
}

impl StructLayout {
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumLayout {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumLayout {
    pub fn value_of(&self, member: &str) -> Option<i64> {
        self.members.iter().find(|(n, _)| n == member).map(|(_, v)| *v)
    }
}
