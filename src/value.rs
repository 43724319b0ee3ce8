//! A small dynamic value façade over region-managed nodes.
//!
//! [`Value`] is a closed sum of the payload shapes the arithmetic frontend
//! understands: integers, floats and functions of zero to two arguments.
//! Binary operations dispatch on the operand variant pair and fail with
//! [`ValueError::InvalidOperand`] when the variants do not match; there is
//! no implicit numeric coercion. [`combine`] evaluates an operation over
//! two node-held values and stores the result as a fresh node in the
//! output handle's region.

use core::fmt;

use crate::node::{make_node, Node};

/// Variant tag of a [`Value`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Function of no arguments.
    Fn0,
    /// Function of one argument.
    Fn1,
    /// Function of two arguments.
    Fn2,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Fn0 => "fn/0",
            Kind::Fn1 => "fn/1",
            Kind::Fn2 => "fn/2",
        };
        f.write_str(name)
    }
}

/// The binary capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Function of no arguments.
    Fn0(fn() -> Value),
    /// Function of one argument.
    Fn1(fn(Value) -> Value),
    /// Function of two arguments.
    Fn2(fn(Value, Value) -> Value),
}

impl Value {
    /// The variant tag of this value.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Fn0(_) => Kind::Fn0,
            Value::Fn1(_) => Kind::Fn1,
            Value::Fn2(_) => Kind::Fn2,
        }
    }

    /// Apply `op` to `self` and `rhs`, dispatching on the operand variant
    /// pair.
    ///
    /// # Errors
    ///
    /// Fails with [`ValueError::InvalidOperand`] when the operand dynamic
    /// types mismatch or are not numeric.
    pub fn apply(&self, op: BinOp, rhs: &Value) -> Result<Value, ValueError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
            })),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
            })),
            _ => Err(ValueError::InvalidOperand {
                op,
                lhs: self.kind(),
                rhs: rhs.kind(),
            }),
        }
    }

    /// `self + rhs`.
    ///
    /// # Errors
    ///
    /// See [`Value::apply`].
    pub fn try_add(&self, rhs: &Value) -> Result<Value, ValueError> {
        self.apply(BinOp::Add, rhs)
    }

    /// `self - rhs`.
    ///
    /// # Errors
    ///
    /// See [`Value::apply`].
    pub fn try_sub(&self, rhs: &Value) -> Result<Value, ValueError> {
        self.apply(BinOp::Sub, rhs)
    }

    /// `self * rhs`.
    ///
    /// # Errors
    ///
    /// See [`Value::apply`].
    pub fn try_mul(&self, rhs: &Value) -> Result<Value, ValueError> {
        self.apply(BinOp::Mul, rhs)
    }

    /// `self / rhs`.
    ///
    /// # Errors
    ///
    /// See [`Value::apply`].
    pub fn try_div(&self, rhs: &Value) -> Result<Value, ValueError> {
        self.apply(BinOp::Div, rhs)
    }

    /// Invoke a function value with `args`.
    ///
    /// # Errors
    ///
    /// Fails with [`ValueError::WrongArity`] when the argument count does
    /// not match the function variant, and [`ValueError::NotCallable`] for
    /// non-function values.
    pub fn call(&self, args: &[Value]) -> Result<Value, ValueError> {
        let expected = match self {
            Value::Fn0(f) => {
                if let [] = args {
                    return Ok(f());
                }
                0
            }
            Value::Fn1(f) => {
                if let [a] = args {
                    return Ok(f(*a));
                }
                1
            }
            Value::Fn2(f) => {
                if let [a, b] = args {
                    return Ok(f(*a, *b));
                }
                2
            }
            _ => return Err(ValueError::NotCallable { kind: self.kind() }),
        };
        Err(ValueError::WrongArity {
            expected,
            got: args.len(),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Fn0(_) | Value::Fn1(_) | Value::Fn2(_) => write!(f, "<{}>", self.kind()),
        }
    }
}

/// Error raised by the value façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueError {
    /// A binary operation was applied to mismatched or non-numeric
    /// operand variants.
    InvalidOperand {
        /// The attempted operation.
        op: BinOp,
        /// Variant of the left operand.
        lhs: Kind,
        /// Variant of the right operand.
        rhs: Kind,
    },
    /// A function value was called with the wrong number of arguments.
    WrongArity {
        /// Arity of the function variant.
        expected: usize,
        /// Number of arguments supplied.
        got: usize,
    },
    /// A non-function value was called.
    NotCallable {
        /// Variant of the callee.
        kind: Kind,
    },
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::InvalidOperand { op, lhs, rhs } => {
                write!(f, "invalid operands for `{op}`: {lhs} and {rhs}")
            }
            ValueError::WrongArity { expected, got } => {
                write!(f, "wrong number of arguments: expected {expected}, got {got}")
            }
            ValueError::NotCallable { kind } => write!(f, "{kind} value is not callable"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValueError {}

/// Evaluate `lhs op rhs` and store the result as a fresh node in `out`'s
/// region, replacing `out`'s previous payload.
///
/// # Errors
///
/// Fails with [`ValueError::InvalidOperand`] on mismatched operand
/// variants; `out` is left untouched.
///
/// # Panics
///
/// Panics if `lhs` or `rhs` is an empty handle.
///
/// # Safety
///
/// Same contract as [`make_node`]: the region behind `out` must be alive
/// and not destroying.
pub unsafe fn combine(
    out: &mut Node<Value>,
    op: BinOp,
    lhs: &Node<Value>,
    rhs: &Node<Value>,
) -> Result<(), ValueError> {
    let result = (**lhs).apply(op, &**rhs)?;
    let node = make_node(&*out, result);
    *out = node;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn int_arithmetic() {
        let a = Value::Int(10);
        let b = Value::Int(4);
        assert_eq!(a.try_add(&b), Ok(Value::Int(14)));
        assert_eq!(a.try_sub(&b), Ok(Value::Int(6)));
        assert_eq!(a.try_mul(&b), Ok(Value::Int(40)));
        assert_eq!(a.try_div(&b), Ok(Value::Int(2)));
    }

    #[test]
    fn float_arithmetic() {
        let a = Value::Float(1.5);
        let b = Value::Float(0.5);
        assert_eq!(a.try_add(&b), Ok(Value::Float(2.0)));
        assert_eq!(a.try_div(&b), Ok(Value::Float(3.0)));
    }

    #[test]
    fn mismatched_operands_fail() {
        let a = Value::Int(1);
        let b = Value::Float(2.0);
        assert_eq!(
            a.try_add(&b),
            Err(ValueError::InvalidOperand {
                op: BinOp::Add,
                lhs: Kind::Int,
                rhs: Kind::Float,
            })
        );
        let f = Value::Fn0(|| Value::Int(0));
        assert_eq!(
            f.try_mul(&a),
            Err(ValueError::InvalidOperand {
                op: BinOp::Mul,
                lhs: Kind::Fn0,
                rhs: Kind::Int,
            })
        );
    }

    #[test]
    fn calls_check_arity() {
        fn double(v: Value) -> Value {
            v.try_add(&v).unwrap()
        }
        let f = Value::Fn1(double);
        assert_eq!(f.call(&[Value::Int(21)]), Ok(Value::Int(42)));
        assert_eq!(
            f.call(&[]),
            Err(ValueError::WrongArity {
                expected: 1,
                got: 0
            })
        );
        assert_eq!(
            Value::Int(3).call(&[]),
            Err(ValueError::NotCallable { kind: Kind::Int })
        );
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Value::Int(-7)), "-7");
        assert_eq!(format!("{}", Value::Float(2.5)), "2.5");
        assert_eq!(format!("{}", Value::Fn2(|a, _| a)), "<fn/2>");
        let err = Value::Int(1).try_add(&Value::Float(2.0)).unwrap_err();
        assert_eq!(format!("{err}"), "invalid operands for `+`: int and float");
    }
}
