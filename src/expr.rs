//! Constraint expressions over an implicit subject value (`this`).

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Binary operators, in the form they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "%")]
    Rem,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Rem => "%",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    /// The operator whose result is always the opposite of this one.
    pub fn antonym(&self) -> Option<BinOp> {
        match self {
            BinOp::Eq => Some(BinOp::Ne),
            BinOp::Ne => Some(BinOp::Eq),
            BinOp::Lt => Some(BinOp::Ge),
            BinOp::Ge => Some(BinOp::Lt),
            BinOp::Gt => Some(BinOp::Le),
            BinOp::Le => Some(BinOp::Gt),
            BinOp::Rem | BinOp::And | BinOp::Or => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne => 3,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Rem => 5,
        }
    }
}

/// Predicates that have a named opposite.
const MEMBER_ANTONYMS: &[(&str, &str)] = &[("isOdd", "isEven"), ("isFinite", "isInfinite")];

fn member_antonym(name: &str) -> Option<&'static str> {
    MEMBER_ANTONYMS.iter().find_map(|(a, b)| {
        if *a == name {
            Some(*b)
        } else if *b == name {
            Some(*a)
        } else {
            None
        }
    })
}

const PRIMARY: u8 = 6;

/// A boolean predicate (or a sub-term of one) over `this`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    /// The value under validation.
    This,
    /// `target.name`, or `target.name(args)` when `args` is present.
    Member {
        target: Box<Expr>,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<Vec<Expr>>,
    },
    /// A free function call such as `Regex("...")`.
    Call { function: String, args: Vec<Expr> },
    Binary {
        lhs: Box<Expr>,
        op: BinOp,
        rhs: Box<Expr>,
    },
    Not { operand: Box<Expr> },
    Literal { value: Value },
}

impl Expr {
    pub fn this() -> Self {
        Expr::This
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    /// A number literal, written without a fraction when it is whole.
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
            Expr::literal(n as i64)
        } else {
            Expr::literal(n)
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            function: name.into(),
            args,
        }
    }

    /// Property access: `self.name`.
    pub fn member(self, name: impl Into<String>) -> Self {
        Expr::Member {
            target: Box::new(self),
            name: name.into(),
            args: None,
        }
    }

    /// Method call: `self.name(args)`.
    pub fn call(self, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Member {
            target: Box::new(self),
            name: name.into(),
            args: Some(args),
        }
    }

    pub fn binary(self, op: BinOp, rhs: Expr) -> Self {
        Expr::Binary {
            lhs: Box::new(self),
            op,
            rhs: Box::new(rhs),
        }
    }

    pub fn and(self, rhs: Expr) -> Self {
        self.binary(BinOp::And, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        self.binary(BinOp::Or, rhs)
    }

    /// Logical negation, preferring a natural opposite over a `!` prefix.
    pub fn negate(self) -> Self {
        match self {
            Expr::Not { operand } => *operand,
            Expr::Literal {
                value: Value::Bool(b),
            } => Expr::literal(!b),
            Expr::Binary { lhs, op, rhs } => match op.antonym() {
                Some(antonym) => Expr::Binary {
                    lhs,
                    op: antonym,
                    rhs,
                },
                None => Expr::Not {
                    operand: Box::new(Expr::Binary { lhs, op, rhs }),
                },
            },
            Expr::Member { target, name, args } => match member_antonym(&name) {
                Some(antonym) => Expr::Member {
                    target,
                    name: antonym.to_string(),
                    args,
                },
                None => Expr::Not {
                    operand: Box::new(Expr::Member { target, name, args }),
                },
            },
            other => Expr::Not {
                operand: Box::new(other),
            },
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            _ => PRIMARY,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

fn fmt_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    f.write_str("(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    f.write_str(")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::This => f.write_str("this"),
            Expr::Member { target, name, args } => {
                target.fmt_operand(f, PRIMARY)?;
                write!(f, ".{}", name)?;
                match args {
                    Some(args) => fmt_args(f, args),
                    None => Ok(()),
                }
            }
            Expr::Call { function, args } => {
                f.write_str(function)?;
                fmt_args(f, args)
            }
            Expr::Binary { lhs, op, rhs } => {
                let precedence = op.precedence();
                lhs.fmt_operand(f, precedence)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, precedence + 1)
            }
            Expr::Not { operand } => {
                f.write_str("!")?;
                operand.fmt_operand(f, PRIMARY)
            }
            Expr::Literal { value } => write!(f, "{}", value),
        }
    }
}
