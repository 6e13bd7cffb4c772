//! Two shapes of the same `a + b` program: one where `a`/`b` are literal
//! constants (so the generator folds the whole function body away, §4.4.5),
//! one where they're function parameters bound at call time and so must
//! actually reach the circuit (§4.5).

use ahash::AHashMap;
use tangle_ast::{BinOp, Expr, Function, Package, Param, Program, Stmt};
use tangle_diag::SourceLoc;
use tangle_types::Info;

fn loc() -> SourceLoc {
    SourceLoc::UNKNOWN
}

fn ty(bits: u32, signed: bool) -> Info {
    if signed { Info::signed(bits) } else { Info::unsigned(bits) }
}

fn single_function_program(function: Function) -> Program {
    let mut functions = AHashMap::new();
    functions.insert(function.name.clone(), function);
    let mut packages = AHashMap::new();
    packages.insert("main".to_string(), Package { bindings: vec![], functions, imports: vec![] });
    Program { packages, default_package: "main".into() }
}

fn literal(value: i128, bits: u32, signed: bool) -> Expr {
    Expr::Convert {
        ty: ty(bits, signed),
        operand: Box::new(Expr::Lit { value: tangle_ast::Literal::Int(value.to_string()), loc: loc() }),
        loc: loc(),
    }
}

/// Takes no parameters: `a` and `b` are baked into the body as literals, so
/// the whole return value is a compile-time `ConstPayload` by the time the
/// lowering driver sees it (§4.4.5 constant folding).
pub fn folded_add_program(bits: u32, signed: bool, a: i128, b: i128) -> Program {
    single_function_program(Function {
        name: "folded".into(),
        params: vec![],
        returns: vec![ty(bits, signed)],
        body: vec![Stmt::Return {
            values: vec![Expr::Binary { op: BinOp::Add, lhs: Box::new(literal(a, bits, signed)), rhs: Box::new(literal(b, bits, signed)), loc: loc() }],
            loc: loc(),
        }],
        loc: loc(),
    })
}

/// Same operation, but `a`/`b` are runtime parameters — the lowering
/// driver must drive `tangle_circuit::arith::ripple_add` directly instead
/// of embedding a pre-folded constant.
pub fn runtime_add_program(bits: u32, signed: bool) -> Program {
    let t = ty(bits, signed);
    single_function_program(Function {
        name: "runtime".into(),
        params: vec![Param { name: "a".into(), ty: t.clone() }, Param { name: "b".into(), ty: t.clone() }],
        returns: vec![t],
        body: vec![Stmt::Return {
            values: vec![Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::Var { package: None, name: "a".into(), loc: loc() }),
                rhs: Box::new(Expr::Var { package: None, name: "b".into(), loc: loc() }),
                loc: loc(),
            }],
            loc: loc(),
        }],
        loc: loc(),
    })
}
