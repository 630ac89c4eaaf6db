//! Compiled expression IR consumed by the evaluator.
//!
//! An external compiler lowers source text into this representation: a
//! compilation unit holding ordered declarations over boxed expression trees.
//! Identifiers and labels arrive pre-interned. The engine never sees source
//! text; attributes are carried opaquely and ignored.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    bound::BoundOp,
    decimal::Decimal,
    intern::{Interns, StringId},
    value::BasicType,
};

/// Label of an arc, compared by kind plus payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Regular field name. Identifier and quoted-string forms are normalized
    /// to the same label by the compiler.
    Str(StringId),
    /// List element position.
    Index(usize),
    /// Hidden identifier, namespaced by its enclosing package.
    Hidden { name: StringId, package: StringId },
    /// Definition identifier; a reference through it closes the result
    /// recursively.
    Def(StringId),
}

impl Label {
    /// True for labels that are excluded from data export.
    #[must_use]
    pub fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden { .. })
    }

    #[must_use]
    pub fn is_definition(self) -> bool {
        matches!(self, Self::Def(_))
    }

    /// True for regular (exportable) field labels.
    #[must_use]
    pub fn is_regular(self) -> bool {
        matches!(self, Self::Str(_) | Self::Index(_))
    }

    /// Renders the label for error messages and export.
    #[must_use]
    pub fn display<'a>(self, interns: &'a Interns) -> std::borrow::Cow<'a, str> {
        match self {
            Self::Str(id) => interns.get(id).into(),
            Self::Index(i) => i.to_string().into(),
            Self::Hidden { name, .. } => format!("_{}", interns.get(name)).into(),
            Self::Def(id) => format!("#{}", interns.get(id)).into(),
        }
    }
}

/// One declaration inside a struct body (or at the unit root).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    /// A field: `label: value`, with optional (`?`) and required (`!`) flags.
    Field {
        label: Label,
        value: Expr,
        optional: bool,
        required: bool,
    },
    /// A pattern constraint: `[matcher]: value` applies `value` to every arc
    /// whose label unifies with `matcher`.
    Pattern { matcher: Expr, value: Expr },
    /// `...` or `...expr`: default constraint for unmatched labels; its
    /// presence keeps the struct open.
    Ellipsis { value: Option<Expr> },
    /// A non-field expression at struct scope, unified into the enclosing
    /// struct.
    Embedding { expr: Expr },
    /// `let name = expr`, scoped to the enclosing struct body.
    Let { name: StringId, value: Expr },
    /// `for`/`if`/`let` clauses followed by a struct body; each complete
    /// iteration embeds the body into the enclosing node.
    Comprehension { clauses: Vec<Clause>, body: Vec<Decl> },
    /// Attribute metadata, carried through but never interpreted.
    Attribute { key: Box<str>, body: Box<str> },
}

impl Decl {
    /// A plain required field without flags.
    #[must_use]
    pub fn field(label: Label, value: Expr) -> Self {
        Self::Field {
            label,
            value,
            optional: false,
            required: false,
        }
    }

    /// An optional field (`label?: value`).
    #[must_use]
    pub fn optional_field(label: Label, value: Expr) -> Self {
        Self::Field {
            label,
            value,
            optional: true,
            required: false,
        }
    }

    #[must_use]
    pub fn embedding(expr: Expr) -> Self {
        Self::Embedding { expr }
    }
}

/// One clause of a comprehension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Clause {
    /// `for key, value in source`. `key` is optional (`for v in ...`).
    For {
        key: Option<StringId>,
        value: StringId,
        source: Expr,
    },
    /// `if cond` terminates the current iteration when `cond` is false.
    If { cond: Expr },
    /// `let name = expr` adds a binding to the iteration scope.
    Let { name: StringId, value: Expr },
}

/// One element of a list literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ListElem {
    Elem(Expr),
    /// `...` or `...expr`: open tail; subsequent unifications may extend the
    /// list, each added element constrained by `expr`.
    Ellipsis(Option<Expr>),
    /// Clause-driven element generation.
    Comprehension { clauses: Vec<Clause>, body: Expr },
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InterpolationPart {
    Lit(Box<str>),
    Expr(Expr),
}

/// One alternative of a disjunction expression, with its `*` mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisjunctExpr {
    pub expr: Expr,
    pub default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
    /// Numeric negation.
    Neg,
    /// Numeric identity.
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Decimal division; the result is always a float.
    Div,
    /// Unification `&`.
    Unify,
    /// Boolean `&&`.
    LAnd,
    /// Boolean `||`.
    LOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Regex match `=~`.
    Match,
    /// Regex mismatch `!~`.
    NotMatch,
}

/// Reference to an identifier, resolved through the lexical scope chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefName {
    Regular(StringId),
    /// Hidden identifier; resolved within the unit's package namespace.
    Hidden(StringId),
    Def(StringId),
}

impl RefName {
    #[must_use]
    pub fn name(self) -> StringId {
        match self {
            Self::Regular(id) | Self::Hidden(id) | Self::Def(id) => id,
        }
    }
}

/// An expression in the compiled IR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(BigInt),
    Float(Decimal),
    String(Box<str>),
    Bytes(Box<[u8]>),
    /// The top literal `_`.
    Top,
    /// An explicit bottom literal `_|_`.
    Bottom { message: Option<Box<str>> },
    /// A basic-type marker literal.
    Type(BasicType),
    Ref(RefName),
    /// `x.f`
    Selector { expr: Box<Expr>, label: Label },
    /// `x[i]`
    Index { expr: Box<Expr>, index: Box<Expr> },
    /// `x[lo:hi]`
    Slice {
        expr: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
    },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A unary comparison forming a bound value: `>=e`, `!=e`, ...
    Bound { op: BoundOp, expr: Box<Expr> },
    /// A regex constraint literal: `=~e` / `!~e` in prefix position.
    Matcher { negated: bool, pattern: Box<Expr> },
    /// Builtin call by qualified name.
    Call { func: Box<str>, args: Vec<Expr> },
    StructLit { decls: Vec<Decl> },
    ListLit { elems: Vec<ListElem> },
    Interpolation { parts: Vec<InterpolationPart> },
    Disjunction { terms: Vec<DisjunctExpr> },
}

impl Expr {
    #[must_use]
    pub fn int(n: i64) -> Self {
        Self::Int(BigInt::from(n))
    }

    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into().into_boxed_str())
    }

    /// Parses a float literal. Returns `None` for malformed literals; the
    /// external compiler guarantees well-formed ones.
    #[must_use]
    pub fn float(s: &str) -> Option<Self> {
        Decimal::from_string(s).ok().map(Self::Float)
    }

    #[must_use]
    pub fn reference(name: StringId) -> Self {
        Self::Ref(RefName::Regular(name))
    }

    #[must_use]
    pub fn unify(lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op: BinOp::Unify,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[must_use]
    pub fn binary(op: BinOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[must_use]
    pub fn select(expr: Self, label: Label) -> Self {
        Self::Selector {
            expr: Box::new(expr),
            label,
        }
    }

    #[must_use]
    pub fn index(expr: Self, index: Self) -> Self {
        Self::Index {
            expr: Box::new(expr),
            index: Box::new(index),
        }
    }

    #[must_use]
    pub fn bound(op: BoundOp, expr: Self) -> Self {
        Self::Bound {
            op,
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn struct_lit(decls: Vec<Decl>) -> Self {
        Self::StructLit { decls }
    }

    #[must_use]
    pub fn list_lit(elems: Vec<Self>) -> Self {
        Self::ListLit {
            elems: elems.into_iter().map(ListElem::Elem).collect(),
        }
    }

    /// Builds a disjunction from `(expr, marked)` pairs.
    #[must_use]
    pub fn disjunction(terms: Vec<(Self, bool)>) -> Self {
        Self::Disjunction {
            terms: terms
                .into_iter()
                .map(|(expr, default)| DisjunctExpr { expr, default })
                .collect(),
        }
    }

    #[must_use]
    pub fn call(func: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call {
            func: func.into().into_boxed_str(),
            args,
        }
    }
}

/// A compiled compilation unit: the root struct's ordered declarations plus
/// the intern table every label and identifier in the unit refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    interns: Interns,
    /// Package name, used to namespace hidden identifiers. The empty string
    /// denotes an unnamed package.
    pub package: StringId,
    pub decls: Vec<Decl>,
}

impl Default for CompilationUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilationUnit {
    #[must_use]
    pub fn new() -> Self {
        Self::with_package("")
    }

    #[must_use]
    pub fn with_package(package: &str) -> Self {
        let mut interns = Interns::new();
        let package = interns.intern(package);
        Self {
            interns,
            package,
            decls: Vec::new(),
        }
    }

    /// Interns an identifier or label payload.
    pub fn intern(&mut self, s: &str) -> StringId {
        self.interns.intern(s)
    }

    /// Interns a regular field label.
    pub fn str_label(&mut self, s: &str) -> Label {
        Label::Str(self.interns.intern(s))
    }

    /// Interns a definition label.
    pub fn def_label(&mut self, s: &str) -> Label {
        Label::Def(self.interns.intern(s))
    }

    /// Interns a hidden label in this unit's package namespace.
    pub fn hidden_label(&mut self, s: &str) -> Label {
        Label::Hidden {
            name: self.interns.intern(s),
            package: self.package,
        }
    }

    /// Interns a name and builds a regular reference to it.
    pub fn reference(&mut self, s: &str) -> Expr {
        Expr::Ref(RefName::Regular(self.interns.intern(s)))
    }

    pub fn push(&mut self, decl: Decl) {
        self.decls.push(decl);
    }

    #[must_use]
    pub fn interns(&self) -> &Interns {
        &self.interns
    }
}
