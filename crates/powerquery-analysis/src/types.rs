//! Representation of the M structural type system.
//!
//! A [`Type`] is a kind, a nullability flag, and an optional extended
//! shape carrying structural detail (known record fields, a function
//! signature, a literal value). Union types are normalised on
//! construction: nested unions are flattened and variants deduplicated by
//! structural equality, so operator-lattice decisions are never
//! order-sensitive.

use std::fmt;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use powerquery_grammar::PrimitiveTypeKind;
use serde::Serialize;

pub mod infer;
pub mod lattice;

pub use infer::inspect_xor;

/// The kind of a structural type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TypeKind {
    /// The `action` type.
    Action,
    /// The `any` type, the top of the lattice.
    Any,
    /// The `anynonnull` type.
    AnyNonNull,
    /// The `binary` type.
    Binary,
    /// The `date` type.
    Date,
    /// The `datetime` type.
    DateTime,
    /// The `datetimezone` type.
    DateTimeZone,
    /// The `duration` type.
    Duration,
    /// The `function` type.
    Function,
    /// The `list` type.
    List,
    /// The `logical` type.
    Logical,
    /// The `none` type, the bottom of the lattice.
    None,
    /// The type of positions a value cannot occupy (e.g. a keyword
    /// constant).
    NotApplicable,
    /// The `null` type.
    Null,
    /// The `number` type.
    Number,
    /// The `record` type.
    Record,
    /// The `table` type.
    Table,
    /// The `text` type.
    Text,
    /// The `time` type.
    Time,
    /// The `type` type.
    Type,
    /// The type of nodes the engine cannot type.
    Unknown,
}

impl TypeKind {
    /// Determines if the kind is one of the clock kinds that participate
    /// in duration arithmetic.
    pub fn is_clock(self) -> bool {
        matches!(
            self,
            Self::Date | Self::DateTime | Self::DateTimeZone | Self::Time
        )
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Action => "action",
            Self::Any => "any",
            Self::AnyNonNull => "anynonnull",
            Self::Binary => "binary",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::DateTimeZone => "datetimezone",
            Self::Duration => "duration",
            Self::Function => "function",
            Self::List => "list",
            Self::Logical => "logical",
            Self::None => "none",
            Self::NotApplicable => "not applicable",
            Self::Null => "null",
            Self::Number => "number",
            Self::Record => "record",
            Self::Table => "table",
            Self::Text => "text",
            Self::Time => "time",
            Self::Type => "type",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl From<PrimitiveTypeKind> for TypeKind {
    fn from(kind: PrimitiveTypeKind) -> Self {
        match kind {
            PrimitiveTypeKind::Action => Self::Action,
            PrimitiveTypeKind::Any => Self::Any,
            PrimitiveTypeKind::AnyNonNull => Self::AnyNonNull,
            PrimitiveTypeKind::Binary => Self::Binary,
            PrimitiveTypeKind::Date => Self::Date,
            PrimitiveTypeKind::DateTime => Self::DateTime,
            PrimitiveTypeKind::DateTimeZone => Self::DateTimeZone,
            PrimitiveTypeKind::Duration => Self::Duration,
            PrimitiveTypeKind::Function => Self::Function,
            PrimitiveTypeKind::List => Self::List,
            PrimitiveTypeKind::Logical => Self::Logical,
            PrimitiveTypeKind::None => Self::None,
            PrimitiveTypeKind::Null => Self::Null,
            PrimitiveTypeKind::Number => Self::Number,
            PrimitiveTypeKind::Record => Self::Record,
            PrimitiveTypeKind::Table => Self::Table,
            PrimitiveTypeKind::Text => Self::Text,
            PrimitiveTypeKind::Time => Self::Time,
            PrimitiveTypeKind::Type => Self::Type,
        }
    }
}

/// A formal parameter of a function type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionParameter {
    /// The parameter's name.
    pub name: String,
    /// Whether the parameter is optional.
    pub is_optional: bool,
    /// Whether the parameter accepts null.
    pub is_nullable: bool,
    /// The parameter's declared type, if any.
    pub ty: Option<Type>,
}

/// The structural detail a type may carry beyond its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExtendedType {
    /// A normalised union of variants.
    AnyUnion(Vec<Type>),
    /// A function whose signature is known.
    DefinedFunction {
        /// The function's parameters.
        parameters: Vec<FunctionParameter>,
        /// The function's return type.
        return_type: Box<Type>,
    },
    /// A list whose element types are known positionally.
    DefinedList(Vec<Type>),
    /// A record whose fields are known.
    DefinedRecord {
        /// The record's fields, in declaration order.
        fields: IndexMap<String, Type>,
        /// Whether further fields may exist.
        is_open: bool,
    },
    /// A table whose columns are known.
    DefinedTable {
        /// The table's columns, in declaration order.
        fields: IndexMap<String, Type>,
        /// Whether further columns may exist.
        is_open: bool,
    },
    /// A `type function ...` value.
    FunctionType {
        /// The function's parameters.
        parameters: Vec<FunctionParameter>,
        /// The function's return type.
        return_type: Box<Type>,
    },
    /// A `type {..}` value.
    ListType {
        /// The type of the list's items.
        item_type: Box<Type>,
    },
    /// A numeric literal, e.g. the type of `1`.
    NumberLiteral {
        /// The literal's verbatim text.
        literal: String,
        /// The literal's numeric value.
        value: OrderedFloat<f64>,
    },
    /// A `type [..]` value.
    RecordType {
        /// The record type's fields.
        fields: IndexMap<String, Type>,
        /// Whether further fields may exist.
        is_open: bool,
    },
    /// A `type table [..]` value.
    TableType {
        /// The table type's columns.
        fields: IndexMap<String, Type>,
        /// Whether further columns may exist.
        is_open: bool,
    },
    /// A `type table <expression>` value whose row type is an
    /// expression.
    TableTypePrimaryExpression {
        /// The id of the row-type expression node.
        primary: powerquery_grammar::NodeId,
    },
    /// A text literal, e.g. the type of `"a"`.
    TextLiteral {
        /// The literal's verbatim text.
        literal: String,
    },
}

/// An M structural type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type {
    /// The kind of the type.
    pub kind: TypeKind,
    /// Whether the type accepts null.
    pub is_nullable: bool,
    /// Structural detail beyond the kind, if known.
    pub extended: Option<ExtendedType>,
}

impl Type {
    /// The non-nullable `any` instance.
    pub const ANY: Self = Self::primitive(TypeKind::Any);
    /// The `none` instance.
    pub const NONE: Self = Self::primitive(TypeKind::None);
    /// The not-applicable instance.
    pub const NOT_APPLICABLE: Self = Self::primitive(TypeKind::NotApplicable);
    /// The `null` instance, nullable by definition.
    pub const NULL: Self = Self {
        kind: TypeKind::Null,
        is_nullable: true,
        extended: None,
    };
    /// The unknown instance.
    pub const UNKNOWN: Self = Self::primitive(TypeKind::Unknown);

    /// Creates a non-nullable type of the given kind with no extended
    /// shape.
    pub const fn primitive(kind: TypeKind) -> Self {
        Self {
            kind,
            is_nullable: false,
            extended: None,
        }
    }

    /// Creates a nullable type of the given kind with no extended shape.
    pub const fn nullable(kind: TypeKind) -> Self {
        Self {
            kind,
            is_nullable: true,
            extended: None,
        }
    }

    /// Creates a type of the given kind with the given extended shape.
    pub fn extended(kind: TypeKind, extended: ExtendedType) -> Self {
        Self {
            kind,
            is_nullable: false,
            extended: Some(extended),
        }
    }

    /// Creates a normalised union of the given variants.
    ///
    /// Nested unions are flattened and variants deduplicated by
    /// structural equality. A union of one variant is that variant; a
    /// union of none is unknown. The union is nullable when any variant
    /// is.
    pub fn any_union(variants: impl IntoIterator<Item = Type>) -> Self {
        let mut flattened: Vec<Type> = Vec::new();
        for variant in variants {
            match variant.extended {
                Some(ExtendedType::AnyUnion(inner)) => {
                    for variant in inner {
                        if !flattened.contains(&variant) {
                            flattened.push(variant);
                        }
                    }
                }
                _ => {
                    if !flattened.contains(&variant) {
                        flattened.push(variant);
                    }
                }
            }
        }

        match flattened.len() {
            0 => Self::UNKNOWN,
            1 => flattened.pop().expect("one variant should be present"),
            _ => Self {
                kind: TypeKind::Any,
                is_nullable: flattened.iter().any(|v| v.is_nullable),
                extended: Some(ExtendedType::AnyUnion(flattened)),
            },
        }
    }

    /// Gets the union variants: the variants of an `AnyUnion`, or the
    /// type itself.
    pub fn union_variants(&self) -> &[Type] {
        match &self.extended {
            Some(ExtendedType::AnyUnion(variants)) => variants,
            _ => std::slice::from_ref(self),
        }
    }

    /// Determines if every union variant is of one of the given kinds.
    pub fn all_variants_of(&self, kinds: &[TypeKind]) -> bool {
        self.union_variants()
            .iter()
            .all(|variant| kinds.contains(&variant.kind))
    }

    /// Gets the known fields, if the type is a record or table shape
    /// carrying them.
    pub fn known_fields(&self) -> Option<&IndexMap<String, Type>> {
        match &self.extended {
            Some(
                ExtendedType::DefinedRecord { fields, .. }
                | ExtendedType::DefinedTable { fields, .. }
                | ExtendedType::RecordType { fields, .. }
                | ExtendedType::TableType { fields, .. },
            ) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nullable && self.kind != TypeKind::Null {
            write!(f, "nullable ")?;
        }
        self.kind.fmt(f)
    }
}

/// A pluggable source of types for identifiers and invocations that are
/// not resolvable in local scope.
///
/// The engine hard-codes no library of built-in functions; every
/// external-name lookup goes through the configured resolver.
pub trait ExternalTypeResolver: std::fmt::Debug + Send + Sync {
    /// Resolves the type of an identifier, if the resolver knows it.
    fn resolve_identifier(&self, identifier: &str) -> Option<Type>;

    /// Resolves the result type of invoking the named function with the
    /// given argument types, if the resolver knows it.
    fn resolve_invocation(&self, identifier: &str, argument_types: &[Type]) -> Option<Type> {
        let _ = argument_types;
        self.resolve_identifier(identifier)
            .and_then(|ty| match ty.extended {
                Some(ExtendedType::DefinedFunction { return_type, .. }) => Some(*return_type),
                _ => None,
            })
    }
}

/// The default resolver: it knows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl ExternalTypeResolver for NoResolver {
    fn resolve_identifier(&self, _: &str) -> Option<Type> {
        None
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unions_flatten_and_deduplicate() {
        let inner = Type::any_union([
            Type::primitive(TypeKind::Number),
            Type::primitive(TypeKind::Text),
        ]);
        let outer = Type::any_union([
            inner,
            Type::primitive(TypeKind::Number),
            Type::primitive(TypeKind::Logical),
        ]);

        match outer.extended {
            Some(ExtendedType::AnyUnion(variants)) => {
                assert_eq!(
                    variants
                        .iter()
                        .map(|v| v.kind)
                        .collect::<Vec<_>>(),
                    vec![TypeKind::Number, TypeKind::Text, TypeKind::Logical]
                );
            }
            other => panic!("expected a union, got {other:?}"),
        }
    }

    #[test]
    fn union_of_one_is_the_variant() {
        let ty = Type::any_union([
            Type::primitive(TypeKind::Number),
            Type::primitive(TypeKind::Number),
        ]);
        assert_eq!(ty, Type::primitive(TypeKind::Number));
    }

    #[test]
    fn union_order_does_not_affect_membership() {
        let a = Type::any_union([
            Type::primitive(TypeKind::Number),
            Type::primitive(TypeKind::Text),
        ]);
        let b = Type::any_union([
            Type::primitive(TypeKind::Text),
            Type::primitive(TypeKind::Number),
        ]);
        assert!(a.all_variants_of(&[TypeKind::Number, TypeKind::Text]));
        assert!(b.all_variants_of(&[TypeKind::Number, TypeKind::Text]));
    }

    #[test]
    fn union_nullability_is_inherited() {
        let ty = Type::any_union([
            Type::nullable(TypeKind::Number),
            Type::primitive(TypeKind::Text),
        ]);
        assert!(ty.is_nullable);
    }
}
