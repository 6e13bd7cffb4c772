//! Synthetic AST programs exercising the core end to end, standing in for
//! the parser this workspace doesn't implement (§6 "Core input").

use ahash::AHashMap;
use tangle_ast::{BinOp, Expr, Function, Package, Param, Program, Stmt};
use tangle_diag::SourceLoc;
use tangle_types::Info;

fn loc() -> SourceLoc {
    SourceLoc::UNKNOWN
}

fn var(name: &str) -> Expr {
    Expr::Var { package: None, name: name.into(), loc: loc() }
}

fn single_function_program(function: Function) -> Program {
    let mut functions = AHashMap::new();
    functions.insert(function.name.clone(), function);
    let mut packages = AHashMap::new();
    packages.insert("main".to_string(), Package { bindings: vec![], functions, imports: vec![] });
    Program { packages, default_package: "main".into() }
}

fn ty(bits: u32, signed: bool) -> Info {
    if signed { Info::signed(bits) } else { Info::unsigned(bits) }
}

/// `func add(a, b T) T { return a + b }`, `T` instantiated to `bits` wide.
pub fn adder_program(bits: u32, signed: bool) -> Program {
    let t = ty(bits, signed);
    single_function_program(Function {
        name: "add".into(),
        params: vec![Param { name: "a".into(), ty: t.clone() }, Param { name: "b".into(), ty: t.clone() }],
        returns: vec![t],
        body: vec![Stmt::Return {
            values: vec![Expr::Binary { op: BinOp::Add, lhs: Box::new(var("a")), rhs: Box::new(var("b")), loc: loc() }],
            loc: loc(),
        }],
        loc: loc(),
    })
}

/// `func mult(a, b T) T { return a * b }`.
pub fn multiplier_program(bits: u32, signed: bool) -> Program {
    let t = ty(bits, signed);
    single_function_program(Function {
        name: "mult".into(),
        params: vec![Param { name: "a".into(), ty: t.clone() }, Param { name: "b".into(), ty: t.clone() }],
        returns: vec![t],
        body: vec![Stmt::Return {
            values: vec![Expr::Binary { op: BinOp::Mul, lhs: Box::new(var("a")), rhs: Box::new(var("b")), loc: loc() }],
            loc: loc(),
        }],
        loc: loc(),
    })
}

/// `func hamming(a, b [N]byte) int32 { return hamming(a, b) }` — the §4.4.4
/// builtin, not the `BinOp` arithmetic path.
pub fn hamming_program(bits: u32) -> Program {
    let elem_bits = if bits % 8 == 0 { 8 } else { 1 };
    let count = bits / elem_bits;
    let elem = if elem_bits == 8 { Info::unsigned(8) } else { Info::bool() };
    let arr = Info::array(elem, count);
    single_function_program(Function {
        name: "hamming_fn".into(),
        params: vec![Param { name: "a".into(), ty: arr.clone() }, Param { name: "b".into(), ty: arr }],
        returns: vec![Info::unsigned(32)],
        body: vec![Stmt::Return {
            values: vec![Expr::Call { package: None, name: "hamming".into(), args: vec![var("a"), var("b")], loc: loc() }],
            loc: loc(),
        }],
        loc: loc(),
    })
}
