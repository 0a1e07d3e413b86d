//! Typed AST for compiled predicates.
//!
//! Every node kind is an allow-listed operation; there is no node that can
//! name an arbitrary host function, so anything the interpreter can do is
//! enumerated here.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

/// The two bound variables plus comprehension locals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    Name,
    Content,
    /// Comprehension variable, addressed by its nesting slot (0 = outermost).
    Local(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

/// Allow-listed free functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Any,
    All,
    Sum,
    Min,
    Max,
    Abs,
    Int,
    Float,
    Str,
    Bool,
    Ord,
    Set,
    Sorted,
    List,
    /// `count(haystack, needle)`: non-overlapping occurrences.
    Count,
}

/// Allow-listed string methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Lower,
    Upper,
    Casefold,
    Strip,
    Lstrip,
    Rstrip,
    Startswith,
    Endswith,
    Count,
    Find,
    Split,
    Splitlines,
    Replace,
    Isdigit,
    Isalpha,
    Isalnum,
    Isspace,
    Isupper,
    Islower,
    Istitle,
    Isascii,
}

/// Regex entry points. `matches(p, s)` compiles to `Search` with a boolean
/// result; the `re.*` spellings follow Python truthiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexOp {
    Matches,
    Search,
    Match,
    Fullmatch,
    Findall,
}

/// `re.I`, `re.M` and `re.S`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexFlags {
    pub ignore_case: bool,
    pub multi_line: bool,
    pub dot_all: bool,
}

impl RegexFlags {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A regex literal compiled ahead of evaluation. `regex` already carries
/// the anchoring implied by the op (`re.match`, `re.fullmatch`).
#[derive(Clone)]
pub struct RegexLiteral {
    pub source: String,
    pub flags: RegexFlags,
    pub regex: Regex,
}

impl fmt::Debug for RegexLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexLiteral")
            .field("source", &self.source)
            .field("flags", &self.flags)
            .finish()
    }
}

impl PartialEq for RegexLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub element: Expr,
    /// Slot the loop variable is bound to while iterating.
    pub slot: usize,
    pub iter: Expr,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Var(Var),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Flattened `and` / `or` chain; evaluated left to right, short-circuit.
    BoolChain {
        op: BoolOp,
        operands: Vec<Expr>,
    },
    /// `a < b <= c` style chain; each inner operand evaluated once.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    IfElse {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
    },
    Call {
        func: Builtin,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
    Regex {
        op: RegexOp,
        pattern: RegexLiteral,
        subject: Box<Expr>,
    },
    /// List comprehension or generator argument; produces a list unless
    /// consumed lazily by `any` / `all`.
    Comprehension(Box<Comprehension>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Byte offset in the source.
    pub pos: usize,
    /// Height of this subtree; leaves are 1.
    pub height: usize,
}

impl Expr {
    /// Build a node, computing its height from its direct children.
    pub fn new(kind: ExprKind, pos: usize) -> Self {
        let mut height = 0;
        kind.for_each_child(|child| height = height.max(child.height));
        Self {
            kind,
            pos,
            height: height + 1,
        }
    }

    pub fn for_each_child(&self, f: impl FnMut(&Expr)) {
        self.kind.for_each_child(f)
    }
}

impl ExprKind {
    fn for_each_child(&self, mut f: impl FnMut(&Expr)) {
        match self {
            ExprKind::Literal(_) | ExprKind::Var(_) => {}
            ExprKind::List(items) => items.iter().for_each(f),
            ExprKind::Unary { operand, .. } => f(&**operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                f(&**lhs);
                f(&**rhs);
            }
            ExprKind::BoolChain { operands, .. } => operands.iter().for_each(f),
            ExprKind::Compare { first, rest } => {
                f(&**first);
                rest.iter().for_each(|(_, e)| f(e));
            }
            ExprKind::IfElse {
                condition,
                then,
                otherwise,
            } => {
                f(&**condition);
                f(&**then);
                f(&**otherwise);
            }
            ExprKind::Index { target, index } => {
                f(&**target);
                f(&**index);
            }
            ExprKind::Slice {
                target,
                start,
                stop,
            } => {
                f(&**target);
                if let Some(s) = start {
                    f(&**s);
                }
                if let Some(s) = stop {
                    f(&**s);
                }
            }
            ExprKind::Call { args, .. } => args.iter().for_each(f),
            ExprKind::MethodCall { receiver, args, .. } => {
                f(&**receiver);
                args.iter().for_each(f);
            }
            ExprKind::Regex { subject, .. } => f(&**subject),
            ExprKind::Comprehension(c) => {
                f(&c.element);
                f(&c.iter);
                if let Some(cond) = &c.condition {
                    f(cond);
                }
            }
        }
    }
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Builtin::Len,
            "any" => Builtin::Any,
            "all" => Builtin::All,
            "sum" => Builtin::Sum,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "abs" => Builtin::Abs,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "str" => Builtin::Str,
            "bool" => Builtin::Bool,
            "ord" => Builtin::Ord,
            "set" => Builtin::Set,
            "sorted" => Builtin::Sorted,
            "list" => Builtin::List,
            "count" => Builtin::Count,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Any => "any",
            Builtin::All => "all",
            Builtin::Sum => "sum",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Bool => "bool",
            Builtin::Ord => "ord",
            Builtin::Set => "set",
            Builtin::Sorted => "sorted",
            Builtin::List => "list",
            Builtin::Count => "count",
        }
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Builtin::Min | Builtin::Max => (1, usize::MAX),
            Builtin::Sum => (1, 2),
            Builtin::Count => (2, 2),
            _ => (1, 1),
        }
    }
}

impl Method {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "lower" => Method::Lower,
            "upper" => Method::Upper,
            "casefold" => Method::Casefold,
            "strip" => Method::Strip,
            "lstrip" => Method::Lstrip,
            "rstrip" => Method::Rstrip,
            "startswith" => Method::Startswith,
            "endswith" => Method::Endswith,
            "count" => Method::Count,
            "find" => Method::Find,
            "split" => Method::Split,
            "splitlines" => Method::Splitlines,
            "replace" => Method::Replace,
            "isdigit" | "isnumeric" | "isdecimal" => Method::Isdigit,
            "isalpha" => Method::Isalpha,
            "isalnum" => Method::Isalnum,
            "isspace" => Method::Isspace,
            "isupper" => Method::Isupper,
            "islower" => Method::Islower,
            "istitle" => Method::Istitle,
            "isascii" => Method::Isascii,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Lower => "lower",
            Method::Upper => "upper",
            Method::Casefold => "casefold",
            Method::Strip => "strip",
            Method::Lstrip => "lstrip",
            Method::Rstrip => "rstrip",
            Method::Startswith => "startswith",
            Method::Endswith => "endswith",
            Method::Count => "count",
            Method::Find => "find",
            Method::Split => "split",
            Method::Splitlines => "splitlines",
            Method::Replace => "replace",
            Method::Isdigit => "isdigit",
            Method::Isalpha => "isalpha",
            Method::Isalnum => "isalnum",
            Method::Isspace => "isspace",
            Method::Isupper => "isupper",
            Method::Islower => "islower",
            Method::Istitle => "istitle",
            Method::Isascii => "isascii",
        }
    }

    pub fn arity(self) -> (usize, usize) {
        match self {
            Method::Strip | Method::Lstrip | Method::Rstrip | Method::Split => (0, 1),
            Method::Startswith | Method::Endswith | Method::Count | Method::Find => (1, 1),
            Method::Replace => (2, 2),
            _ => (0, 0),
        }
    }
}

impl RegexOp {
    pub fn name(self) -> &'static str {
        match self {
            RegexOp::Matches => "matches",
            RegexOp::Search => "re.search",
            RegexOp::Match => "re.match",
            RegexOp::Fullmatch => "re.fullmatch",
            RegexOp::Findall => "re.findall",
        }
    }
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
        }
    }
}
