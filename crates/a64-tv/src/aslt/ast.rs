//! Semantic tree produced by the semantics backend.
//!
//! A bounded algebraic tree: statements, expressions, and types, with
//! tagged variants matched on directly during lowering. `Display`
//! renders the canonical serialized form, which is also what the
//! `aslp.stmt` / `aslp.expr` metadata carries.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Bits(Box<Expr>),
    Boolean,
    Constructor(String),
    Register(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LExpr {
    Var(String),
    Field(Box<LExpr>, String),
    Array(Box<LExpr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub lo: Box<Expr>,
    pub wd: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(String),
    Field(Box<Expr>, String),
    Array(Box<Expr>, Box<Expr>),
    Slice(Box<Expr>, Slice),
    LitInt(i128),
    LitBits(String),
    TApply {
        name: String,
        targs: Vec<Expr>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign(LExpr, Expr),
    ConstDecl {
        ty: Ty,
        name: String,
        init: Expr,
    },
    VarDecl {
        ty: Ty,
        name: String,
        init: Expr,
    },
    VarDeclsNoInit {
        ty: Ty,
        names: Vec<String>,
    },
    Assert(Expr),
    Throw,
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    For {
        var: String,
        start: Expr,
        direction: Direction,
        stop: Expr,
        body: Vec<Stmt>,
    },
    TCall {
        name: String,
        targs: Vec<Expr>,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// The literal integer behind this expression, when it is one.
    /// Bits literals count: lane selectors arrive as bitstrings.
    #[must_use]
    pub fn as_lit_int(&self) -> Option<i128> {
        match self {
            Self::LitInt(v) => Some(*v),
            Self::LitBits(bits) if bits.len() <= 127 => {
                i128::from_str_radix(bits, 2).ok()
            }
            _ => None,
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

fn write_names(f: &mut fmt::Formatter<'_>, names: &[String]) -> fmt::Result {
    write!(f, "[")?;
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "\"{name}\"")?;
    }
    write!(f, "]")
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bits(width) => write!(f, "Type_Bits({width})"),
            Self::Boolean => write!(f, "Type_Boolean()"),
            Self::Constructor(name) => write!(f, "Type_Constructor(\"{name}\")"),
            Self::Register(bits) => write!(f, "Type_Register({bits})"),
        }
    }
}

impl fmt::Display for LExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "LExpr_Var(\"{name}\")"),
            Self::Field(base, field) => write!(f, "LExpr_Field({base},\"{field}\")"),
            Self::Array(base, index) => write!(f, "LExpr_Array({base},{index})"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "Expr_Var(\"{name}\")"),
            Self::Field(base, field) => write!(f, "Expr_Field({base},\"{field}\")"),
            Self::Array(base, index) => write!(f, "Expr_Array({base},{index})"),
            Self::Slice(base, slice) => {
                write!(
                    f,
                    "Expr_Slices({base},[Slice_LoWd({},{})])",
                    slice.lo, slice.wd
                )
            }
            Self::LitInt(value) => write!(f, "Expr_LitInt({value})"),
            Self::LitBits(bits) => write!(f, "Expr_LitBits('{bits}')"),
            Self::TApply { name, targs, args } => {
                write!(f, "Expr_TApply(\"{name}\",")?;
                write_list(f, targs)?;
                write!(f, ",")?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "Direction_Up"),
            Self::Down => write!(f, "Direction_Down"),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign(lhs, rhs) => write!(f, "Stmt_Assign({lhs},{rhs})"),
            Self::ConstDecl { ty, name, init } => {
                write!(f, "Stmt_ConstDecl({ty},\"{name}\",{init})")
            }
            Self::VarDecl { ty, name, init } => {
                write!(f, "Stmt_VarDecl({ty},\"{name}\",{init})")
            }
            Self::VarDeclsNoInit { ty, names } => {
                write!(f, "Stmt_VarDeclsNoInit({ty},")?;
                write_names(f, names)?;
                write!(f, ")")
            }
            Self::Assert(cond) => write!(f, "Stmt_Assert({cond})"),
            Self::Throw => write!(f, "Stmt_Throw()"),
            Self::If {
                cond,
                then,
                otherwise,
            } => {
                write!(f, "Stmt_If({cond},")?;
                write_list(f, then)?;
                write!(f, ",[],")?;
                write_list(f, otherwise)?;
                write!(f, ")")
            }
            Self::For {
                var,
                start,
                direction,
                stop,
                body,
            } => {
                write!(f, "Stmt_For(\"{var}\",{start},{direction},{stop},")?;
                write_list(f, body)?;
                write!(f, ")")
            }
            Self::TCall { name, targs, args } => {
                write!(f, "Stmt_TCall(\"{name}\",")?;
                write_list(f, targs)?;
                write!(f, ",")?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}
