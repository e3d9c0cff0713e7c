//! Composable query specifications
//!
//! A [`Specification`] is an immutable predicate tree over the columns of one
//! entity. Trees are built from predicates with `and`/`or`/`not` (or the `&`,
//! `|` and `!` operators) and are only turned into SQL when a repository runs
//! them. Translation is a pure function: the same tree always renders the same
//! [`Filter`], and nothing is evaluated in-process.
//!
//! # Null handling
//!
//! SQL comparisons against `NULL` are unknown rather than false. `Not` renders
//! as `NOT COALESCE(inner, FALSE)`, so negation always selects the complement
//! of the inner match set within the table and `Not(Not(a))` matches exactly
//! what `a` matches.
//!
//! # Example
//!
//! ```rust
//! use infra_db::repositories::item::{is_active, title_contains, ItemField};
//! use infra_db::specification::Direction;
//!
//! let spec = is_active() & !title_contains("draft");
//! let query = spec.order_by(ItemField::CreatedAt, Direction::Desc).limit(20);
//! let filter = query.filter_clause(1);
//! assert!(filter.clause.contains("NOT COALESCE"));
//! ```

use std::fmt::{self, Write as _};
use std::ops;

use crate::value::Value;

/// A column that specifications can reference
///
/// Each entity has its own column enum, which ties a specification to the
/// entity whose table it filters.
pub trait Column: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// SQL column name
    fn name(&self) -> &'static str;
}

/// Comparison applied by a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    /// Null-aware inequality (`IS DISTINCT FROM`)
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    ILike,
    In,
    IsNull,
    IsNotNull,
}

impl Operator {
    fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "IS DISTINCT FROM",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::In => "IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    None,
    One(Value),
    Many(Vec<Value>),
}

/// A single `field operator value` condition
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate<F> {
    field: F,
    operator: Operator,
    operand: Operand,
}

impl<F: Column> Predicate<F> {
    pub fn field(&self) -> F {
        self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Values this predicate binds, in placeholder order
    pub fn values(&self) -> &[Value] {
        match &self.operand {
            Operand::None => &[],
            Operand::One(value) => std::slice::from_ref(value),
            Operand::Many(values) => values,
        }
    }
}

/// A predicate tree over the columns `F` of one entity
#[derive(Debug, Clone, PartialEq)]
pub enum Specification<F> {
    Predicate(Predicate<F>),
    And(Box<Specification<F>>, Box<Specification<F>>),
    Or(Box<Specification<F>>, Box<Specification<F>>),
    Not(Box<Specification<F>>),
}

impl<F: Column> Specification<F> {
    fn compare(field: F, operator: Operator, value: Value) -> Self {
        Specification::Predicate(Predicate {
            field,
            operator,
            operand: Operand::One(value),
        })
    }

    pub fn eq(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Eq, value.into())
    }

    pub fn ne(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Ne, value.into())
    }

    pub fn lt(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Lt, value.into())
    }

    pub fn le(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Le, value.into())
    }

    pub fn gt(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Gt, value.into())
    }

    pub fn ge(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Ge, value.into())
    }

    /// Case-sensitive pattern match; see [`escape_like`] for literal input
    pub fn like(field: F, pattern: impl Into<String>) -> Self {
        Self::compare(field, Operator::Like, Value::Text(pattern.into()))
    }

    pub fn ilike(field: F, pattern: impl Into<String>) -> Self {
        Self::compare(field, Operator::ILike, Value::Text(pattern.into()))
    }

    /// Membership test; an empty list matches nothing
    pub fn is_in<V: Into<Value>>(field: F, values: impl IntoIterator<Item = V>) -> Self {
        Specification::Predicate(Predicate {
            field,
            operator: Operator::In,
            operand: Operand::Many(values.into_iter().map(Into::into).collect()),
        })
    }

    pub fn is_null(field: F) -> Self {
        Specification::Predicate(Predicate {
            field,
            operator: Operator::IsNull,
            operand: Operand::None,
        })
    }

    pub fn is_not_null(field: F) -> Self {
        Specification::Predicate(Predicate {
            field,
            operator: Operator::IsNotNull,
            operand: Operand::None,
        })
    }

    pub fn and(self, other: Specification<F>) -> Self {
        Specification::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Specification<F>) -> Self {
        Specification::Or(Box::new(self), Box::new(other))
    }

    /// Wraps this specification in a query ordered by `field`
    pub fn order_by(self, field: F, direction: Direction) -> Query<F> {
        Query::from(self).order_by(field, direction)
    }

    /// Renders this tree with placeholders numbered from `first_param`
    pub fn to_filter(&self, first_param: usize) -> Filter {
        let mut filter = Filter {
            clause: String::new(),
            params: Vec::new(),
        };
        render(self, first_param, &mut filter);
        filter
    }
}

/// Combines two specifications with AND
pub fn and<F: Column>(left: Specification<F>, right: Specification<F>) -> Specification<F> {
    left.and(right)
}

/// Combines two specifications with OR
pub fn or<F: Column>(left: Specification<F>, right: Specification<F>) -> Specification<F> {
    left.or(right)
}

/// Negates a specification
pub fn not<F: Column>(spec: Specification<F>) -> Specification<F> {
    Specification::Not(Box::new(spec))
}

impl<F: Column> ops::BitAnd for Specification<F> {
    type Output = Specification<F>;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl<F: Column> ops::BitOr for Specification<F> {
    type Output = Specification<F>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl<F: Column> ops::Not for Specification<F> {
    type Output = Specification<F>;

    fn not(self) -> Self::Output {
        not(self)
    }
}

/// A rendered WHERE clause and its bind values
///
/// `clause` references `params` through `$n` placeholders numbered from the
/// `first_param` passed at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub clause: String,
    pub params: Vec<Value>,
}

impl Filter {
    /// Filter that matches every row
    pub fn always() -> Self {
        Self {
            clause: "TRUE".to_string(),
            params: Vec::new(),
        }
    }

    /// Index the next placeholder after this filter would take
    pub fn next_param(&self, first_param: usize) -> usize {
        first_param + self.params.len()
    }
}

fn push_param(value: &Value, first_param: usize, filter: &mut Filter) {
    let index = filter.next_param(first_param);
    // Writing into a String cannot fail
    let _ = write!(filter.clause, "${}", index);
    filter.params.push(value.clone());
}

fn render<F: Column>(spec: &Specification<F>, first_param: usize, filter: &mut Filter) {
    match spec {
        Specification::Predicate(predicate) => {
            render_predicate(predicate, first_param, filter);
        }
        Specification::And(left, right) => {
            filter.clause.push('(');
            render(left, first_param, filter);
            filter.clause.push_str(" AND ");
            render(right, first_param, filter);
            filter.clause.push(')');
        }
        Specification::Or(left, right) => {
            filter.clause.push('(');
            render(left, first_param, filter);
            filter.clause.push_str(" OR ");
            render(right, first_param, filter);
            filter.clause.push(')');
        }
        Specification::Not(inner) => {
            filter.clause.push_str("NOT COALESCE(");
            render(inner, first_param, filter);
            filter.clause.push_str(", FALSE)");
        }
    }
}

fn render_predicate<F: Column>(predicate: &Predicate<F>, first_param: usize, filter: &mut Filter) {
    let column = predicate.field.name();
    match (&predicate.operand, predicate.operator) {
        (Operand::Many(values), Operator::In) if values.is_empty() => {
            filter.clause.push_str("FALSE");
        }
        (Operand::Many(values), _) => {
            filter.clause.push_str(column);
            filter.clause.push_str(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    filter.clause.push_str(", ");
                }
                push_param(value, first_param, filter);
            }
            filter.clause.push(')');
        }
        (Operand::One(value), operator) => {
            filter.clause.push_str(column);
            filter.clause.push(' ');
            filter.clause.push_str(operator.sql());
            filter.clause.push(' ');
            push_param(value, first_param, filter);
        }
        (Operand::None, operator) => {
            filter.clause.push_str(column);
            filter.clause.push(' ');
            filter.clause.push_str(operator.sql());
        }
    }
}

/// Escapes `%`, `_` and `\` so `input` matches literally inside a LIKE pattern
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Sort direction for an ordering clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A specification plus explicit ordering and paging
///
/// Without `order_by`, rows come back in storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query<F> {
    spec: Option<Specification<F>>,
    order: Vec<(F, Direction)>,
    offset: Option<i64>,
    limit: Option<i64>,
}

impl<F: Column> Query<F> {
    /// Query matching every row
    pub fn all() -> Self {
        Self {
            spec: None,
            order: Vec::new(),
            offset: None,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: F, direction: Direction) -> Self {
        self.order.push((field, direction));
        self
    }

    /// Adds a secondary ordering key
    pub fn then_by(self, field: F, direction: Direction) -> Self {
        self.order_by(field, direction)
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset.max(0));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.max(0));
        self
    }

    pub fn specification(&self) -> Option<&Specification<F>> {
        self.spec.as_ref()
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    /// Renders only the filtering part of the query
    pub fn filter_clause(&self, first_param: usize) -> Filter {
        self.spec
            .as_ref()
            .map(|spec| spec.to_filter(first_param))
            .unwrap_or_else(Filter::always)
    }

    /// Appends WHERE, ORDER BY, LIMIT and OFFSET to `select`
    ///
    /// Placeholders start at `$1`.
    pub fn render(&self, select: &str) -> (String, Vec<Value>) {
        let filter = self.filter_clause(1);
        let mut sql = String::from(select);
        let mut params = filter.params;

        if self.spec.is_some() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.clause);
        }

        if !self.order.is_empty() {
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|(field, direction)| format!("{} {}", field.name(), direction.sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        if let Some(limit) = self.limit {
            params.push(Value::Int(limit));
            let _ = write!(sql, " LIMIT ${}", params.len());
        }

        if let Some(offset) = self.offset {
            params.push(Value::Int(offset));
            let _ = write!(sql, " OFFSET ${}", params.len());
        }

        (sql, params)
    }
}

impl<F: Column> Default for Query<F> {
    fn default() -> Self {
        Self::all()
    }
}

impl<F: Column> From<Specification<F>> for Query<F> {
    fn from(spec: Specification<F>) -> Self {
        Self {
            spec: Some(spec),
            ..Self::all()
        }
    }
}
