#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! The dynamic value façade evaluated over region-held nodes.

use rootrc::value::{combine, BinOp, Kind, Value, ValueError};
use rootrc::{make_node, Root};

#[test]
fn combine_allocates_result_into_the_output_region() {
    let _ = env_logger::Builder::from_env("ROOTRC_LOG").try_init();

    let root = Root::new(Value::Int(0));
    let mut out = unsafe { make_node(&root, Value::Int(0)) };
    let lhs = unsafe { make_node(&root, Value::Int(12)) };
    let rhs = unsafe { make_node(&root, Value::Int(30)) };

    unsafe { combine(&mut out, BinOp::Add, &lhs, &rhs) }.unwrap();
    assert_eq!(*out, Value::Int(42));

    let previous = out.clone();
    unsafe { combine(&mut out, BinOp::Mul, &lhs, &previous) }.unwrap();
    assert_eq!(*out, Value::Int(504));
    drop(previous);

    drop(out);
    drop(lhs);
    drop(rhs);
    drop(root);
}

#[test]
fn combine_rejects_mismatched_operands() {
    let root = Root::new(Value::Int(0));
    let mut out = unsafe { make_node(&root, Value::Int(7)) };
    let lhs = unsafe { make_node(&root, Value::Int(1)) };
    let rhs = unsafe { make_node(&root, Value::Float(2.0)) };

    let err = unsafe { combine(&mut out, BinOp::Sub, &lhs, &rhs) }.unwrap_err();
    assert_eq!(
        err,
        ValueError::InvalidOperand {
            op: BinOp::Sub,
            lhs: Kind::Int,
            rhs: Kind::Float,
        }
    );
    // the output handle is untouched on failure
    assert_eq!(*out, Value::Int(7));

    drop(out);
    drop(lhs);
    drop(rhs);
    drop(root);
}

#[test]
fn function_values_evaluate_through_nodes() {
    fn sum(a: Value, b: Value) -> Value {
        a.try_add(&b).unwrap()
    }

    let root = Root::new(Value::Fn2(sum));
    let f = root.get().unwrap();
    assert_eq!(f.call(&[Value::Int(40), Value::Int(2)]), Ok(Value::Int(42)));
    assert_eq!(
        f.call(&[Value::Int(1)]),
        Err(ValueError::WrongArity {
            expected: 2,
            got: 1
        })
    );
    drop(root);
}
