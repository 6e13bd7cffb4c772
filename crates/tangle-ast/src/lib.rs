//! The AST shape the core treats as an opaque external input (§6).
//!
//! Nothing in this crate parses source text — lexing/parsing are external
//! collaborators (§1, §6) this workspace does not implement. This crate
//! only defines the Rust types a parser would hand to `tangle-ssa`'s
//! generator: packages, functions, statements, expressions, and the type
//! descriptors from `tangle-types`. Field layout follows §6's "Core input"
//! description field for field; nothing here carries behavior beyond
//! plain data and the occasional convenience constructor.

use ahash::AHashMap;
use tangle_diag::SourceLoc;
use tangle_types::Info;

/// A whole compiled program: every package the loader resolved, keyed by
/// package name (§6: "packages (name → {bindings, functions, imports})").
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub packages: AHashMap<String, Package>,
    /// The package `main` (or whichever the external driver designates)
    /// resolves to when a variable/call reference omits a package
    /// qualifier (§4.4.6).
    pub default_package: String,
}

#[derive(Clone, Debug, Default)]
pub struct Package {
    pub bindings: Vec<ConstBinding>,
    pub functions: AHashMap<String, Function>,
    pub imports: Vec<String>,
}

/// A package-level named constant.
#[derive(Clone, Debug)]
pub struct ConstBinding {
    pub name: String,
    pub ty: Option<Info>,
    pub value: Expr,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: Info,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Vec<Info>,
    pub body: Vec<Stmt>,
    pub loc: SourceLoc,
}

/// A struct-typed composite literal field initializer, or a positional
/// array/slice element — composite literals carry both shapes (§6
/// "composite literal").
#[derive(Clone, Debug)]
pub enum CompositeElement {
    Positional(Expr),
    Keyed { field: String, value: Expr },
}

#[derive(Clone, Debug)]
pub enum Literal {
    Bool(bool),
    /// Decimal text rather than a fixed-width integer: the literal's width
    /// is not known until it is folded against a target type (§4.4.5).
    Int(String),
    Str(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    LogicalAnd,
    LogicalOr,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Lit { value: Literal, loc: SourceLoc },
    Var { package: Option<String>, name: String, loc: SourceLoc },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr>, loc: SourceLoc },
    Unary { op: UnOp, operand: Box<Expr>, loc: SourceLoc },
    /// `base.field` (§4.4.6): struct field access, lowered to a bit-range
    /// `slice` instruction.
    Field { base: Box<Expr>, field: String, loc: SourceLoc },
    /// `base[index]` (§4.4.6 array index / §4.3.2 `select_indexed`).
    Index { base: Box<Expr>, index: Box<Expr>, loc: SourceLoc },
    /// `base[lo:hi]`; a missing bound defaults to the base's own bound at
    /// lowering time.
    Slice { base: Box<Expr>, lo: Option<Box<Expr>>, hi: Option<Box<Expr>>, loc: SourceLoc },
    /// A call to a package-local or imported function, or to a builtin
    /// (`make`, `size`, `native`, `hamming`, ...) resolved via the
    /// injected builtin registry (§4.4.4, §6).
    Call { package: Option<String>, name: String, args: Vec<Expr>, loc: SourceLoc },
    /// `T(x)`: a conversion between scalar types, or an array-cast when
    /// `ty` is an array/slice shape (§4.4.5).
    Convert { ty: Info, operand: Box<Expr>, loc: SourceLoc },
    Composite { ty: Info, elements: Vec<CompositeElement>, loc: SourceLoc },
}

impl Expr {
    pub fn loc(&self) -> SourceLoc {
        match self {
            Expr::Lit { loc, .. }
            | Expr::Var { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Unary { loc, .. }
            | Expr::Field { loc, .. }
            | Expr::Index { loc, .. }
            | Expr::Slice { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::Convert { loc, .. }
            | Expr::Composite { loc, .. } => *loc,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Stmt {
    /// `name [: ty] := value` — a new binding in the current scope.
    Definition { name: String, ty: Option<Info>, value: Expr, loc: SourceLoc },
    /// `target = value`, where `target` is a variable, field, or index
    /// expression.
    Assignment { target: Expr, value: Expr, loc: SourceLoc },
    If { cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>, loc: SourceLoc },
    /// `for init; cond; inc { body }` (§4.4.3); `init`/`inc` are boxed
    /// statements so they can themselves be definitions or assignments.
    For { init: Box<Stmt>, cond: Expr, inc: Box<Stmt>, body: Vec<Stmt>, loc: SourceLoc },
    Return { values: Vec<Expr>, loc: SourceLoc },
    /// A call used for side effect only (its results, if any, are
    /// discarded).
    ExprStmt { expr: Expr, loc: SourceLoc },
    Block { body: Vec<Stmt>, loc: SourceLoc },
}

impl Stmt {
    pub fn loc(&self) -> SourceLoc {
        match self {
            Stmt::Definition { loc, .. }
            | Stmt::Assignment { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::For { loc, .. }
            | Stmt::Return { loc, .. }
            | Stmt::ExprStmt { loc, .. }
            | Stmt::Block { loc, .. } => *loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_loc_reaches_into_every_variant() {
        let loc = SourceLoc::new("f.go", 3, 1);
        let e = Expr::Var { package: None, name: "x".into(), loc };
        assert_eq!(e.loc(), loc);
    }

    #[test]
    fn program_default_package_drives_unqualified_lookup_policy() {
        let mut program = Program { default_package: "main".into(), ..Default::default() };
        program.packages.insert("main".into(), Package::default());
        assert!(program.packages.contains_key(&program.default_package));
    }
}
