use crate::tree::{BinaryOp, CallKind, Expr, SourceRef, UnaryOp, VarId};
use bson::{Bson, Document};

/// Build a lambda from a closure over its variable.
fn lambda(f: impl FnOnce(Operand) -> Operand) -> Expr {
    let var = VarId::fresh();
    let body = f(Operand::var(var)).into_expr();
    Expr::lambda(var, body)
}

///
/// Queryable
///
/// Fluent chain builder over a collection source. Every method appends one
/// call shape; nothing is validated here. The chain stays pure data until it
/// is handed to a translator, which is where unsupported shapes are refused.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Queryable {
    expr: Expr,
}

impl Queryable {
    #[must_use]
    pub fn collection(collection: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            expr: Expr::Source(SourceRef {
                collection: collection.into(),
                document_type: document_type.into(),
            }),
        }
    }

    fn chain(self, kind: CallKind, args: Vec<Expr>) -> Self {
        Self {
            expr: Expr::call(kind, self.expr, args),
        }
    }

    fn chain_lambda(self, kind: CallKind, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain(kind, vec![lambda(f)])
    }

    #[must_use]
    pub fn filter(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::Filter, f)
    }

    /// Merge a pre-rendered filter document into the chain verbatim.
    #[must_use]
    pub fn filter_document(self, document: Document) -> Self {
        self.chain(CallKind::Filter, vec![Expr::InjectedFilter(document)])
    }

    #[must_use]
    pub fn project(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::Project, f)
    }

    #[must_use]
    pub fn sort_by(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::SortBy, f)
    }

    #[must_use]
    pub fn sort_by_desc(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::SortByDesc, f)
    }

    #[must_use]
    pub fn then_by(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::ThenBy, f)
    }

    #[must_use]
    pub fn then_by_desc(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::ThenByDesc, f)
    }

    #[must_use]
    pub fn group_by(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::GroupBy, f)
    }

    #[must_use]
    pub fn skip(self, count: i64) -> Self {
        self.chain(CallKind::Skip, vec![Expr::constant(count)])
    }

    #[must_use]
    pub fn take(self, count: i64) -> Self {
        self.chain(CallKind::Take, vec![Expr::constant(count)])
    }

    #[must_use]
    pub fn distinct(self) -> Self {
        self.chain(CallKind::Distinct, vec![])
    }

    /// The comparer-taking overload; always refused at translation time.
    #[must_use]
    pub fn distinct_with_comparer(self) -> Self {
        self.chain(CallKind::DistinctWithComparer, vec![])
    }

    // terminals

    #[must_use]
    pub fn count(self) -> Self {
        self.chain(CallKind::Count, vec![])
    }

    #[must_use]
    pub fn count_long(self) -> Self {
        self.chain(CallKind::CountLong, vec![])
    }

    #[must_use]
    pub fn sum(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::Sum, f)
    }

    #[must_use]
    pub fn avg(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::Avg, f)
    }

    #[must_use]
    pub fn min(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::Min, f)
    }

    #[must_use]
    pub fn max(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::Max, f)
    }

    #[must_use]
    pub fn first(self) -> Self {
        self.chain(CallKind::First, vec![])
    }

    #[must_use]
    pub fn first_or_none(self) -> Self {
        self.chain(CallKind::FirstOrNone, vec![])
    }

    #[must_use]
    pub fn single(self) -> Self {
        self.chain(CallKind::Single, vec![])
    }

    #[must_use]
    pub fn single_or_none(self) -> Self {
        self.chain(CallKind::SingleOrNone, vec![])
    }

    #[must_use]
    pub fn last(self) -> Self {
        self.chain(CallKind::Last, vec![])
    }

    #[must_use]
    pub fn last_or_none(self) -> Self {
        self.chain(CallKind::LastOrNone, vec![])
    }

    #[must_use]
    pub fn nth(self, index: i64) -> Self {
        self.chain(CallKind::Nth, vec![Expr::constant(index)])
    }

    #[must_use]
    pub fn any(self) -> Self {
        self.chain(CallKind::Any, vec![])
    }

    #[must_use]
    pub fn any_where(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::Any, f)
    }

    #[must_use]
    pub fn all(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::All, f)
    }

    // recognized-but-refused operators, constructible so refusals are testable

    #[must_use]
    pub fn flat_map(self, f: impl FnOnce(Operand) -> Operand) -> Self {
        self.chain_lambda(CallKind::FlatMap, f)
    }

    #[must_use]
    pub fn reverse(self) -> Self {
        self.chain(CallKind::Reverse, vec![])
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        self.chain(CallKind::Union, vec![other.expr])
    }

    #[must_use]
    pub fn into_expr(self) -> Expr {
        self.expr
    }

    #[must_use]
    pub const fn expr(&self) -> &Expr {
        &self.expr
    }
}

///
/// Operand
///
/// Value-expression handle used inside lambdas. Wraps one `Expr` and offers
/// the member, comparison, arithmetic, string, and aggregation vocabulary.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Operand {
    expr: Expr,
}

impl Operand {
    const fn var(var: VarId) -> Self {
        Self {
            expr: Expr::Var(var),
        }
    }

    #[must_use]
    pub fn into_expr(self) -> Expr {
        self.expr
    }

    fn wrap(expr: Expr) -> Self {
        Self { expr }
    }

    #[must_use]
    pub fn get(self, name: &str) -> Self {
        Self::wrap(Expr::member(self.expr, name))
    }

    /// Element count of an array-typed field.
    #[must_use]
    pub fn len(self) -> Self {
        self.get("len")
    }

    // date parts

    #[must_use]
    pub fn year(self) -> Self {
        self.get("year")
    }

    #[must_use]
    pub fn month(self) -> Self {
        self.get("month")
    }

    #[must_use]
    pub fn day(self) -> Self {
        self.get("day")
    }

    /// Day of the week, 1 (Sunday) through 7 (Saturday).
    #[must_use]
    pub fn day_of_week(self) -> Self {
        self.get("day_of_week")
    }

    /// Day of the year, starting at 1.
    #[must_use]
    pub fn day_of_year(self) -> Self {
        self.get("day_of_year")
    }

    #[must_use]
    pub fn hour(self) -> Self {
        self.get("hour")
    }

    #[must_use]
    pub fn minute(self) -> Self {
        self.get("minute")
    }

    #[must_use]
    pub fn second(self) -> Self {
        self.get("second")
    }

    #[must_use]
    pub fn millisecond(self) -> Self {
        self.get("millisecond")
    }

    // comparisons

    fn binary(self, op: BinaryOp, rhs: impl Into<Self>) -> Self {
        Self::wrap(Expr::binary(op, self.expr, rhs.into().expr))
    }

    #[must_use]
    pub fn eq(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    #[must_use]
    pub fn ne(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    #[must_use]
    pub fn lt(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    #[must_use]
    pub fn lte(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Lte, rhs)
    }

    #[must_use]
    pub fn gt(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    #[must_use]
    pub fn gte(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Gte, rhs)
    }

    // arithmetic

    #[must_use]
    pub fn add(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    #[must_use]
    pub fn sub(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Subtract, rhs)
    }

    #[must_use]
    pub fn mul(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Multiply, rhs)
    }

    #[must_use]
    pub fn div(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Divide, rhs)
    }

    #[must_use]
    pub fn rem(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Modulo, rhs)
    }

    #[must_use]
    pub fn neg(self) -> Self {
        Self::wrap(Expr::unary(UnaryOp::Negate, self.expr))
    }

    // logic

    #[must_use]
    pub fn and(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    #[must_use]
    pub fn or(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    #[must_use]
    pub fn not(self) -> Self {
        Self::wrap(Expr::unary(UnaryOp::Not, self.expr))
    }

    #[must_use]
    pub fn coalesce(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Coalesce, rhs)
    }

    // strings

    #[must_use]
    pub fn to_lower(self) -> Self {
        Self::wrap(Expr::call(CallKind::ToLower, self.expr, vec![]))
    }

    #[must_use]
    pub fn to_upper(self) -> Self {
        Self::wrap(Expr::call(CallKind::ToUpper, self.expr, vec![]))
    }

    #[must_use]
    pub fn substr(self, start: i64, len: i64) -> Self {
        Self::wrap(Expr::call(
            CallKind::Substr,
            self.expr,
            vec![Expr::constant(start), Expr::constant(len)],
        ))
    }

    fn pattern(self, kind: CallKind, fragment: &str, case_insensitive: bool) -> Self {
        Self::wrap(Expr::call(
            kind,
            self.expr,
            vec![
                Expr::constant(fragment),
                Expr::constant(case_insensitive),
            ],
        ))
    }

    #[must_use]
    pub fn starts_with(self, fragment: &str) -> Self {
        self.pattern(CallKind::StartsWith, fragment, false)
    }

    #[must_use]
    pub fn starts_with_ci(self, fragment: &str) -> Self {
        self.pattern(CallKind::StartsWith, fragment, true)
    }

    #[must_use]
    pub fn ends_with(self, fragment: &str) -> Self {
        self.pattern(CallKind::EndsWith, fragment, false)
    }

    #[must_use]
    pub fn ends_with_ci(self, fragment: &str) -> Self {
        self.pattern(CallKind::EndsWith, fragment, true)
    }

    #[must_use]
    pub fn contains_str(self, fragment: &str) -> Self {
        self.pattern(CallKind::ContainsStr, fragment, false)
    }

    #[must_use]
    pub fn contains_str_ci(self, fragment: &str) -> Self {
        self.pattern(CallKind::ContainsStr, fragment, true)
    }

    // arrays and membership

    #[must_use]
    pub fn contains_elem(self, element: impl Into<Self>) -> Self {
        let element = element.into();
        Self::wrap(Expr::call(
            CallKind::ContainsElem,
            self.expr,
            vec![element.expr],
        ))
    }

    #[must_use]
    pub fn contains_all(self, elements: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        let list = elements.into_iter().map(Into::into).collect::<Vec<_>>();
        Self::wrap(Expr::call(
            CallKind::ContainsAll,
            self.expr,
            vec![Expr::Constant(Bson::Array(list))],
        ))
    }

    // group-element aggregation

    /// The grouping key of a group variable.
    #[must_use]
    pub fn key(self) -> Self {
        self.get("key")
    }

    #[must_use]
    pub fn count(self) -> Self {
        Self::wrap(Expr::call(CallKind::Count, self.expr, vec![]))
    }

    fn aggregate(self, kind: CallKind, f: impl FnOnce(Self) -> Self) -> Self {
        Self::wrap(Expr::call(kind, self.expr, vec![lambda(f)]))
    }

    #[must_use]
    pub fn sum(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.aggregate(CallKind::Sum, f)
    }

    #[must_use]
    pub fn avg(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.aggregate(CallKind::Avg, f)
    }

    #[must_use]
    pub fn min(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.aggregate(CallKind::Min, f)
    }

    #[must_use]
    pub fn max(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.aggregate(CallKind::Max, f)
    }

    #[must_use]
    pub fn first(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.aggregate(CallKind::First, f)
    }

    #[must_use]
    pub fn last(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.aggregate(CallKind::Last, f)
    }

    /// Accumulate the selected value of every group element into an array.
    #[must_use]
    pub fn push(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.aggregate(CallKind::Push, f)
    }
}

/// Constant operand from any literal the document model accepts.
pub fn lit(value: impl Into<Bson>) -> Operand {
    Operand::wrap(Expr::Constant(value.into()))
}

/// Record-construction operand.
pub fn record<const N: usize>(fields: [(&str, Operand); N]) -> Operand {
    Operand::wrap(Expr::Record(
        fields
            .into_iter()
            .map(|(name, operand)| (name.to_string(), operand.expr))
            .collect(),
    ))
}

/// Sequence-construction operand.
pub fn seq<const N: usize>(items: [Operand; N]) -> Operand {
    Operand::wrap(Expr::Sequence(
        items.into_iter().map(|operand| operand.expr).collect(),
    ))
}

/// Conditional operand.
pub fn cond(condition: Operand, then: Operand, otherwise: Operand) -> Operand {
    Operand::wrap(Expr::Conditional {
        condition: Box::new(condition.expr),
        then: Box::new(then.expr),
        otherwise: Box::new(otherwise.expr),
    })
}

macro_rules! operand_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    lit(value)
                }
            }
        )*
    };
}

operand_from!(i32, i64, f64, bool, &str, String, Bson, bson::DateTime);
