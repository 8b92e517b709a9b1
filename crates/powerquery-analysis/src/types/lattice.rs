//! The binary-operator compatibility lattice.
//!
//! A mapping from `(left kind, operator, right kind)` to the result kind,
//! built once from systematic factories. A full-key miss means the
//! operation is invalid and yields `none`; a partial key `(left kind,
//! operator)` yields the set of result kinds still reachable, which backs
//! type inference over incomplete binary expressions.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::LazyLock;

use powerquery_grammar::Constant;

use super::TypeKind;

/// A binary operator that participates in the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    /// The `+` operator.
    Addition,
    /// The `and` operator.
    And,
    /// The `&` operator.
    Concatenation,
    /// The `/` operator.
    Division,
    /// The `=` operator.
    Equal,
    /// The `>` operator.
    GreaterThan,
    /// The `>=` operator.
    GreaterThanEqualTo,
    /// The `<` operator.
    LessThan,
    /// The `<=` operator.
    LessThanEqualTo,
    /// The `*` operator.
    Multiplication,
    /// The `<>` operator.
    NotEqual,
    /// The `or` operator.
    Or,
    /// The `-` operator.
    Subtraction,
}

impl Operator {
    /// The relational operators.
    pub const RELATIONAL: &'static [Operator] = &[
        Operator::LessThan,
        Operator::LessThanEqualTo,
        Operator::GreaterThan,
        Operator::GreaterThanEqualTo,
    ];

    /// The equality operators.
    pub const EQUALITY: &'static [Operator] = &[Operator::Equal, Operator::NotEqual];

    /// Maps an operator constant from the tree to a lattice operator.
    pub fn from_constant(constant: Constant) -> Option<Self> {
        Some(match constant {
            Constant::Plus => Self::Addition,
            Constant::And => Self::And,
            Constant::Ampersand => Self::Concatenation,
            Constant::Division => Self::Division,
            Constant::Equal => Self::Equal,
            Constant::GreaterThan => Self::GreaterThan,
            Constant::GreaterThanEqualTo => Self::GreaterThanEqualTo,
            Constant::LessThan => Self::LessThan,
            Constant::LessThanEqualTo => Self::LessThanEqualTo,
            Constant::Asterisk => Self::Multiplication,
            Constant::NotEqual => Self::NotEqual,
            Constant::Or => Self::Or,
            Constant::Minus => Self::Subtraction,
            _ => return None,
        })
    }
}

/// The kinds that compare under the relational operators.
const RELATIONAL_KINDS: &[TypeKind] = &[
    TypeKind::Null,
    TypeKind::Logical,
    TypeKind::Number,
    TypeKind::Time,
    TypeKind::Date,
    TypeKind::DateTime,
    TypeKind::DateTimeZone,
    TypeKind::Duration,
    TypeKind::Text,
    TypeKind::Binary,
];

/// The additional kinds that compare under the equality operators.
const EQUALITY_ONLY_KINDS: &[TypeKind] = &[TypeKind::List, TypeKind::Record, TypeKind::Table];

/// The clock kinds that participate in duration arithmetic.
const CLOCK_KINDS: &[TypeKind] = &[
    TypeKind::Date,
    TypeKind::DateTime,
    TypeKind::DateTimeZone,
    TypeKind::Time,
];

/// The full-key lattice.
static LATTICE: LazyLock<HashMap<(TypeKind, Operator, TypeKind), TypeKind>> =
    LazyLock::new(build_lattice);

/// The partial-key index: `(left kind, operator)` to the reachable result
/// kinds, in a deterministic order.
static PARTIAL: LazyLock<HashMap<(TypeKind, Operator), BTreeSet<TypeKind>>> =
    LazyLock::new(|| {
        let mut partial: HashMap<(TypeKind, Operator), BTreeSet<TypeKind>> = HashMap::new();
        for ((left, operator, _), result) in LATTICE.iter() {
            partial.entry((*left, *operator)).or_default().insert(*result);
        }
        partial
    });

/// Builds the full-key lattice from the factories.
fn build_lattice() -> HashMap<(TypeKind, Operator, TypeKind), TypeKind> {
    let mut lattice = HashMap::new();
    let mut add = |left: TypeKind, operator: Operator, right: TypeKind, result: TypeKind| {
        lattice.insert((left, operator, right), result);
    };

    // Relational comparisons on equal kinds.
    for operator in Operator::RELATIONAL {
        for kind in RELATIONAL_KINDS {
            add(*kind, *operator, *kind, TypeKind::Logical);
        }
    }

    // Equality comparisons on equal kinds.
    for operator in Operator::EQUALITY {
        for kind in RELATIONAL_KINDS.iter().chain(EQUALITY_ONLY_KINDS) {
            add(*kind, *operator, *kind, TypeKind::Logical);
        }
    }

    // Numeric arithmetic.
    for operator in [
        Operator::Addition,
        Operator::Subtraction,
        Operator::Multiplication,
        Operator::Division,
    ] {
        add(TypeKind::Number, operator, TypeKind::Number, TypeKind::Number);
    }

    // Logical conjunction and disjunction.
    for operator in [Operator::And, Operator::Or] {
        add(TypeKind::Logical, operator, TypeKind::Logical, TypeKind::Logical);
    }

    // Clock arithmetic.
    for clock in CLOCK_KINDS {
        add(*clock, Operator::Addition, TypeKind::Duration, *clock);
        add(TypeKind::Duration, Operator::Addition, *clock, *clock);
        add(*clock, Operator::Subtraction, TypeKind::Duration, *clock);
        add(*clock, Operator::Subtraction, *clock, TypeKind::Duration);
    }

    // Merging a date and a time yields a datetime.
    add(
        TypeKind::Date,
        Operator::Concatenation,
        TypeKind::Time,
        TypeKind::DateTime,
    );

    // Duration scaling.
    add(
        TypeKind::Duration,
        Operator::Multiplication,
        TypeKind::Number,
        TypeKind::Duration,
    );
    add(
        TypeKind::Number,
        Operator::Multiplication,
        TypeKind::Duration,
        TypeKind::Duration,
    );
    add(
        TypeKind::Duration,
        Operator::Division,
        TypeKind::Number,
        TypeKind::Duration,
    );

    // Concatenation.
    add(TypeKind::Text, Operator::Concatenation, TypeKind::Text, TypeKind::Text);
    add(TypeKind::List, Operator::Concatenation, TypeKind::List, TypeKind::List);
    add(
        TypeKind::Record,
        Operator::Concatenation,
        TypeKind::Record,
        TypeKind::Record,
    );
    add(
        TypeKind::Table,
        Operator::Concatenation,
        TypeKind::Table,
        TypeKind::Table,
    );

    lattice
}

/// Looks up the result kind for a fully-known binary operation.
///
/// Returns `None` for invalid combinations; the caller maps that to the
/// `none` type.
pub fn lookup(left: TypeKind, operator: Operator, right: TypeKind) -> Option<TypeKind> {
    LATTICE.get(&(left, operator, right)).copied()
}

/// Looks up the result kinds still reachable given only the left operand
/// and the operator.
pub fn lookup_partial(left: TypeKind, operator: Operator) -> Vec<TypeKind> {
    PARTIAL
        .get(&(left, operator))
        .map(|kinds| kinds.iter().copied().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn symmetric_operators_are_symmetric() {
        let mut symmetric = vec![
            (TypeKind::Number, Operator::Addition, TypeKind::Number),
            (TypeKind::Logical, Operator::And, TypeKind::Logical),
            (TypeKind::Logical, Operator::Or, TypeKind::Logical),
        ];
        for kind in RELATIONAL_KINDS.iter().chain(EQUALITY_ONLY_KINDS) {
            symmetric.push((*kind, Operator::Equal, *kind));
            symmetric.push((*kind, Operator::NotEqual, *kind));
        }

        for (left, operator, right) in symmetric {
            assert_eq!(
                lookup(left, operator, right),
                lookup(right, operator, left),
                "{left:?} {operator:?} {right:?} is not symmetric"
            );
        }

        // Clock arithmetic is symmetric for addition in particular.
        assert_eq!(
            lookup(TypeKind::Date, Operator::Addition, TypeKind::Duration),
            lookup(TypeKind::Duration, Operator::Addition, TypeKind::Date),
        );
    }

    #[test]
    fn clock_rules() {
        assert_eq!(
            lookup(TypeKind::Date, Operator::Subtraction, TypeKind::Date),
            Some(TypeKind::Duration)
        );
        assert_eq!(
            lookup(TypeKind::DateTime, Operator::Addition, TypeKind::Duration),
            Some(TypeKind::DateTime)
        );
        assert_eq!(
            lookup(TypeKind::Date, Operator::Concatenation, TypeKind::Time),
            Some(TypeKind::DateTime)
        );
    }

    #[test]
    fn invalid_combinations_miss() {
        assert_eq!(lookup(TypeKind::Text, Operator::Addition, TypeKind::Text), None);
        assert_eq!(
            lookup(TypeKind::Number, Operator::And, TypeKind::Number),
            None
        );
    }

    #[test]
    fn partial_lookup_collects_reachable_results() {
        let reachable = lookup_partial(TypeKind::Date, Operator::Subtraction);
        assert_eq!(reachable, vec![TypeKind::Date, TypeKind::Duration]);

        let reachable = lookup_partial(TypeKind::Number, Operator::Addition);
        assert_eq!(reachable, vec![TypeKind::Number]);
    }
}
