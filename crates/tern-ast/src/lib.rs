//! AST node definitions and source locations for Tern.
//!
//! This crate defines the abstract syntax produced by the parser: the four
//! node families (declarations, expressions, types, patterns) plus source
//! locations and attribute groups. Every node carries a [`NodeId`] and a
//! [`Loc`]; analysis results (resolved types, emitted IR definitions) live
//! in side tables keyed by `NodeId` rather than on the nodes themselves, so
//! the tree stays immutable once built.

use std::fmt;

pub mod build;

/// Identifies a source file in the compilation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A row/column position within a source file. Both are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub row: u32,
    pub col: u32,
}

/// A source location: a file handle and a begin/end position pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Loc {
    pub file: FileId,
    pub begin: Pos,
    pub end: Pos,
}

impl Loc {
    pub fn new(file: FileId, begin: Pos, end: Pos) -> Self {
        Self { file, begin, end }
    }

    /// The concatenation of two locations: the first's begin, the last's end.
    pub fn to(self, last: Loc) -> Loc {
        debug_assert_eq!(
            self.file, last.file,
            "cannot concatenate locations from different files"
        );
        Loc {
            file: self.file,
            begin: self.begin,
            end: last.end,
        }
    }

    /// The smallest location enclosing both `self` and `other`.
    pub fn enclosing(self, other: Loc) -> Loc {
        debug_assert_eq!(self.file, other.file);
        Loc {
            file: self.file,
            begin: self.begin.min(other.begin),
            end: self.end.max(other.end),
        }
    }

    /// A location for compiler-generated nodes.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            begin: Pos { row: 0, col: 0 },
            end: Pos { row: 0, col: 0 },
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.begin.row, self.begin.col)?;
        if self.begin != self.end {
            write!(f, "-{}:{}", self.end.row, self.end.col)?;
        }
        Ok(())
    }
}

/// Stable identity of an AST node.
///
/// Ids are allocated densely by the parser (or by test builders); side
/// tables index analysis results by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Allocates fresh node ids. The parser owns one per module.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// An identifier with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub loc: Loc,
}

impl Ident {
    pub fn new(name: impl Into<String>, loc: Loc) -> Self {
        Self {
            name: name.into(),
            loc,
        }
    }

    /// Identifiers starting with `_` are anonymous: they are never inserted
    /// into the symbol table and cannot be referenced.
    pub fn is_anonymous(&self) -> bool {
        self.name.starts_with('_')
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// A parsed attribute group, e.g. `#[export, name = "main"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrList {
    pub id: NodeId,
    pub loc: Loc,
    pub attrs: Vec<Attr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    /// Bare marker attribute: `#[export]`.
    Plain { name: Ident },
    /// Attribute whose value is a path: `#[intrinsic = cpu::fma]`.
    Path { name: Ident, path: Path },
    /// Attribute carrying nested attributes: `#[cfg(any(...))]`.
    Named { name: Ident, args: Vec<Attr> },
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// A possibly-qualified reference to a declaration, e.g. `x`, `Color::Red`,
/// or `Vec[i32]`. Each element may carry type arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub id: NodeId,
    pub loc: Loc,
    pub elems: Vec<PathElem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathElem {
    pub ident: Ident,
    pub args: Vec<TypeAst>,
    pub loc: Loc,
}

impl Path {
    /// The head identifier, resolved by the name binder.
    pub fn head(&self) -> &Ident {
        &self.elems[0].ident
    }
}

// ---------------------------------------------------------------------------
// Syntactic types
// ---------------------------------------------------------------------------

/// A syntactic type annotation (not a semantic type — that's `tern-types`).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAst {
    pub id: NodeId,
    pub loc: Loc,
    pub kind: TypeAstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeAstKind {
    Prim(PrimTypeTag),
    Tuple(Vec<TypeAst>),
    /// Unsized array type: `[T]`.
    Array(Box<TypeAst>),
    Fn {
        from: Box<TypeAst>,
        to: Box<TypeAst>,
    },
    Ptr(Box<TypeAst>),
    /// A named (possibly applied) type: `S`, `S[i32]`, `E::A` never occurs
    /// here — paths in type position always denote type constructors.
    App(Path),
    /// Produced by the parser on malformed input.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimTypeTag {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(u64),
    Float(f64),
    Bool(bool),
    Char(u8),
    String(String),
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Ptrn {
    pub id: NodeId,
    pub loc: Loc,
    pub kind: PtrnKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PtrnKind {
    /// `p: T`
    Typed {
        ptrn: Box<Ptrn>,
        ty: TypeAst,
    },
    /// An identifier binding, optionally with a sub-pattern: `x` or `x as p`.
    Id {
        decl: PtrnDecl,
        sub_ptrn: Option<Box<Ptrn>>,
    },
    Literal(Literal),
    /// `S[args] { field = p, .., }`
    Record {
        path: Path,
        fields: Vec<FieldPtrn>,
        /// Whether the pattern ends with `..`, allowing missing fields.
        etc: bool,
    },
    /// `E::Variant` or `E::Variant(p)`
    Ctor {
        path: Path,
        arg: Option<Box<Ptrn>>,
    },
    Tuple(Vec<Ptrn>),
    Array(Vec<Ptrn>),
    Error,
}

/// A field inside a record pattern: `name = p` or punned `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPtrn {
    pub id: NodeId,
    pub loc: Loc,
    pub name: Ident,
    pub ptrn: Option<Box<Ptrn>>,
}

/// The value binding introduced by an identifier pattern.
///
/// This is a named declaration: the binder inserts it into the innermost
/// frame, and paths resolve to its `NodeId`.
#[derive(Debug, Clone, PartialEq)]
pub struct PtrnDecl {
    pub id: NodeId,
    pub loc: Loc,
    pub name: Ident,
    pub is_mut: bool,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub loc: Loc,
    pub attrs: Option<AttrList>,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Path(Path),
    Tuple(Vec<Expr>),
    Array(Vec<Expr>),
    /// `[elem; count]`
    RepeatArray {
        elem: Box<Expr>,
        count: u64,
    },
    /// `S[args] { field = e, ... }`
    Record {
        path: Path,
        fields: Vec<FieldExpr>,
    },
    Block {
        stmts: Vec<Stmt>,
        /// Whether the last statement ends with `;` (block types as unit).
        last_semi: bool,
    },
    /// Single-argument application; multi-argument calls take a tuple.
    Call {
        callee: Box<Expr>,
        arg: Box<Expr>,
    },
    Unary {
        op: UnOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Field projection: `e.field`.
    Proj {
        expr: Box<Expr>,
        field: Ident,
    },
    If {
        cond: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Option<Box<Expr>>,
    },
    Match {
        arg: Box<Expr>,
        cases: Vec<Case>,
    },
    While {
        cond: Box<Expr>,
        body: Box<Expr>,
    },
    /// Desugared by the parser into `iter(|x| body)(range)`; see [`ForExpr`].
    For(ForExpr),
    Break,
    Continue,
    Return,
    Fn(FnExpr),
    /// `e as T`
    Cast {
        expr: Box<Expr>,
        ty: TypeAst,
    },
    /// Inserted around an expression whose type was widened; the target type
    /// is recorded in the type table.
    ImplicitCast {
        expr: Box<Expr>,
    },
    Asm(AsmExpr),
    /// A partial-evaluation filter annotation applied to an expression.
    Filter {
        filter: Filter,
        expr: Box<Expr>,
    },
    /// `(e : T)`
    Typed {
        expr: Box<Expr>,
        ty: TypeAst,
    },
    Error,
}

/// A function literal: parameter pattern, optional return annotation,
/// optional partial-evaluation filter, and body. Foreign signatures have no
/// body.
#[derive(Debug, Clone, PartialEq)]
pub struct FnExpr {
    pub param: Option<Box<Ptrn>>,
    pub ret_type: Option<TypeAst>,
    pub filter: Option<Filter>,
    pub body: Option<Box<Expr>>,
}

/// A `for` loop in its canonical post-parse shape:
/// `iter(|x| { body })(range)` — an outer call whose callee is itself a call
/// of the iterator function to the loop-body lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct ForExpr {
    pub call: Box<Expr>,
}

/// Decomposed view of the canonical `for` shape.
pub struct ForParts<'a> {
    pub iter: &'a Expr,
    pub inner_call: &'a Expr,
    pub lambda: &'a Expr,
    pub lambda_fn: &'a FnExpr,
    pub range: &'a Expr,
}

impl ForExpr {
    /// Splits the call into `(iter, lambda, range)`. Returns `None` when the
    /// tree does not have the canonical shape the parser guarantees.
    pub fn parts(&self) -> Option<ForParts<'_>> {
        let ExprKind::Call { callee, arg: range } = &self.call.kind else {
            return None;
        };
        let ExprKind::Call {
            callee: iter,
            arg: lambda,
        } = &callee.kind
        else {
            return None;
        };
        let ExprKind::Fn(lambda_fn) = &lambda.kind else {
            return None;
        };
        Some(ForParts {
            iter,
            inner_call: callee,
            lambda,
            lambda_fn,
            range,
        })
    }
}

/// A partial-evaluation filter: `@` or `@(expr)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub id: NodeId,
    pub loc: Loc,
    pub expr: Option<Box<Expr>>,
}

/// One arm of a `match` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub id: NodeId,
    pub loc: Loc,
    pub ptrn: Ptrn,
    pub expr: Expr,
}

/// A field inside a record expression: `name = e`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    pub id: NodeId,
    pub loc: Loc,
    pub name: Ident,
    pub expr: Expr,
}

/// An inline-assembly operand: a constraint string and its expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AsmOperand {
    pub constraint: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsmExpr {
    pub src: String,
    pub ins: Vec<AsmOperand>,
    pub outs: Vec<AsmOperand>,
    pub clobbers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Minus,
    Not,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnOp {
    pub fn is_inc(self) -> bool {
        matches!(self, UnOp::PreInc | UnOp::PostInc)
    }

    pub fn is_dec(self) -> bool {
        matches!(self, UnOp::PreDec | UnOp::PostDec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    LogicAnd,
    LogicOr,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpGt,
    CmpLe,
    CmpGe,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
}

impl BinOp {
    /// Whether the operator writes to its left operand.
    pub fn has_eq(self) -> bool {
        matches!(
            self,
            BinOp::Assign
                | BinOp::AddAssign
                | BinOp::SubAssign
                | BinOp::MulAssign
                | BinOp::DivAssign
                | BinOp::RemAssign
        )
    }

    /// Whether the operator is a comparison (result type `bool`).
    pub fn has_cmp(self) -> bool {
        matches!(
            self,
            BinOp::CmpEq | BinOp::CmpNe | BinOp::CmpLt | BinOp::CmpGt | BinOp::CmpLe | BinOp::CmpGe
        )
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Decl(Decl),
    Expr(Expr),
}

impl Stmt {
    pub fn loc(&self) -> Loc {
        match self {
            Stmt::Decl(decl) => decl.loc,
            Stmt::Expr(expr) => expr.loc,
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub id: NodeId,
    pub loc: Loc,
    pub attrs: Option<AttrList>,
    /// Set by the parser on declarations directly inside a module body.
    pub is_top_level: bool,
    pub kind: DeclKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Let(LetDecl),
    Static(StaticDecl),
    Fn(FnDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    TypeAlias(TypeAliasDecl),
    Mod(ModDecl),
    Error,
}

impl Decl {
    /// The declared name, for declarations that have one.
    pub fn name(&self) -> Option<&Ident> {
        match &self.kind {
            DeclKind::Let(_) | DeclKind::Error => None,
            DeclKind::Static(decl) => Some(&decl.name),
            DeclKind::Fn(decl) => Some(&decl.name),
            DeclKind::Struct(decl) => Some(&decl.name),
            DeclKind::Enum(decl) => Some(&decl.name),
            DeclKind::TypeAlias(decl) => Some(&decl.name),
            DeclKind::Mod(decl) => decl.name.as_ref(),
        }
    }
}

/// `let p = e;`
#[derive(Debug, Clone, PartialEq)]
pub struct LetDecl {
    pub ptrn: Ptrn,
    pub init: Option<Expr>,
}

/// `static [mut] name [: T] [= e];`
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDecl {
    pub name: Ident,
    pub is_mut: bool,
    pub ty: Option<TypeAst>,
    pub init: Option<Expr>,
}

/// `fn name[T, ...](param) [-> R] { body }`
///
/// The function literal itself is an [`Expr`] with [`ExprKind::Fn`] so that
/// it owns a node id and participates in the type/def tables like any other
/// function value.
#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: Ident,
    pub type_params: Option<TypeParamList>,
    pub fn_expr: Expr,
}

impl FnDecl {
    pub fn fn_expr(&self) -> &FnExpr {
        match &self.fn_expr.kind {
            ExprKind::Fn(fn_expr) => fn_expr,
            _ => unreachable!("FnDecl body is always a function literal"),
        }
    }
}

/// `struct S[T, ...] { fields }`
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Ident,
    pub type_params: Option<TypeParamList>,
    pub fields: Vec<FieldDecl>,
}

/// A record field declaration: `name: T [= default]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub id: NodeId,
    pub loc: Loc,
    pub name: Ident,
    pub ty: TypeAst,
    pub init: Option<Expr>,
}

/// `enum E[T, ...] { options }`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    pub type_params: Option<TypeParamList>,
    pub options: Vec<OptionDecl>,
}

/// One enum option: `Name` or `Name(T)`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub id: NodeId,
    pub loc: Loc,
    pub name: Ident,
    pub param: Option<TypeAst>,
}

/// `type A[T, ...] = T2;`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: Ident,
    pub type_params: Option<TypeParamList>,
    pub aliased: TypeAst,
}

/// `mod name { decls }` — also the root of a compilation unit, in which
/// case the name is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ModDecl {
    pub name: Option<Ident>,
    pub decls: Vec<Decl>,
}

/// A single type parameter: the `T` in `struct S[T]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub id: NodeId,
    pub loc: Loc,
    pub name: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParamList {
    pub id: NodeId,
    pub loc: Loc,
    pub params: Vec<TypeParam>,
}

// ---------------------------------------------------------------------------
// Declaration index
// ---------------------------------------------------------------------------

/// A borrowed view of any named declaration, keyed by `NodeId` in a
/// [`DeclIndex`]. Resolution side tables store the target's `NodeId`; this
/// index turns the id back into the node.
#[derive(Debug, Clone, Copy)]
pub enum DeclView<'a> {
    Ptrn(&'a PtrnDecl),
    TypeParam(&'a TypeParam),
    Field(&'a FieldDecl),
    /// An enum option, together with the id of its owning enum declaration.
    Option(&'a OptionDecl, NodeId),
    Static(&'a Decl, &'a StaticDecl),
    Fn(&'a Decl, &'a FnDecl),
    Struct(&'a Decl, &'a StructDecl),
    Enum(&'a Decl, &'a EnumDecl),
    TypeAlias(&'a Decl, &'a TypeAliasDecl),
    Mod(&'a Decl, &'a ModDecl),
}

impl<'a> DeclView<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            DeclView::Ptrn(decl) => &decl.name.name,
            DeclView::TypeParam(param) => &param.name.name,
            DeclView::Field(field) => &field.name.name,
            DeclView::Option(option, _) => &option.name.name,
            DeclView::Static(_, decl) => &decl.name.name,
            DeclView::Fn(_, decl) => &decl.name.name,
            DeclView::Struct(_, decl) => &decl.name.name,
            DeclView::Enum(_, decl) => &decl.name.name,
            DeclView::TypeAlias(_, decl) => &decl.name.name,
            DeclView::Mod(_, decl) => decl.name.as_ref().map_or("", |name| &name.name),
        }
    }

    pub fn loc(&self) -> Loc {
        match self {
            DeclView::Ptrn(decl) => decl.loc,
            DeclView::TypeParam(param) => param.loc,
            DeclView::Field(field) => field.loc,
            DeclView::Option(option, _) => option.loc,
            DeclView::Static(decl, _)
            | DeclView::Fn(decl, _)
            | DeclView::Struct(decl, _)
            | DeclView::Enum(decl, _)
            | DeclView::TypeAlias(decl, _)
            | DeclView::Mod(decl, _) => decl.loc,
        }
    }

    pub fn is_top_level(&self) -> bool {
        match self {
            DeclView::Static(decl, _)
            | DeclView::Fn(decl, _)
            | DeclView::Struct(decl, _)
            | DeclView::Enum(decl, _)
            | DeclView::TypeAlias(decl, _)
            | DeclView::Mod(decl, _) => decl.is_top_level,
            _ => false,
        }
    }
}

/// Maps every named declaration's `NodeId` to a borrowed view of its node.
///
/// Built once per module by walking the whole tree; the binder, checker and
/// emitter all resolve declaration ids through it.
#[derive(Debug, Default)]
pub struct DeclIndex<'a> {
    decls: std::collections::BTreeMap<NodeId, DeclView<'a>>,
    fn_exprs: std::collections::BTreeMap<NodeId, &'a Expr>,
}

impl<'a> DeclIndex<'a> {
    pub fn build(module: &'a ModDecl) -> Self {
        let mut index = Self::default();
        index.walk_mod(module);
        index
    }

    pub fn get(&self, id: NodeId) -> Option<DeclView<'a>> {
        self.decls.get(&id).copied()
    }

    /// Look up a function-literal expression by its node id. Used to reach
    /// the enclosing function's return annotation from a `return`.
    pub fn fn_expr(&self, id: NodeId) -> Option<&'a Expr> {
        self.fn_exprs.get(&id).copied()
    }

    fn insert(&mut self, id: NodeId, view: DeclView<'a>) {
        let prev = self.decls.insert(id, view);
        debug_assert!(prev.is_none(), "node {id:?} indexed twice");
    }

    fn walk_mod(&mut self, module: &'a ModDecl) {
        for decl in &module.decls {
            self.walk_decl(decl);
        }
    }

    fn walk_decl(&mut self, decl: &'a Decl) {
        match &decl.kind {
            DeclKind::Let(let_decl) => {
                self.walk_ptrn(&let_decl.ptrn);
                if let Some(init) = &let_decl.init {
                    self.walk_expr(init);
                }
            }
            DeclKind::Static(static_decl) => {
                self.insert(decl.id, DeclView::Static(decl, static_decl));
                if let Some(init) = &static_decl.init {
                    self.walk_expr(init);
                }
            }
            DeclKind::Fn(fn_decl) => {
                self.insert(decl.id, DeclView::Fn(decl, fn_decl));
                self.walk_type_params(&fn_decl.type_params);
                self.walk_expr(&fn_decl.fn_expr);
            }
            DeclKind::Struct(struct_decl) => {
                self.insert(decl.id, DeclView::Struct(decl, struct_decl));
                self.walk_type_params(&struct_decl.type_params);
                for field in &struct_decl.fields {
                    self.insert(field.id, DeclView::Field(field));
                    if let Some(init) = &field.init {
                        self.walk_expr(init);
                    }
                }
            }
            DeclKind::Enum(enum_decl) => {
                self.insert(decl.id, DeclView::Enum(decl, enum_decl));
                self.walk_type_params(&enum_decl.type_params);
                for option in &enum_decl.options {
                    self.insert(option.id, DeclView::Option(option, decl.id));
                }
            }
            DeclKind::TypeAlias(alias_decl) => {
                self.insert(decl.id, DeclView::TypeAlias(decl, alias_decl));
                self.walk_type_params(&alias_decl.type_params);
            }
            DeclKind::Mod(mod_decl) => {
                self.insert(decl.id, DeclView::Mod(decl, mod_decl));
                self.walk_mod(mod_decl);
            }
            DeclKind::Error => {}
        }
    }

    fn walk_type_params(&mut self, params: &'a Option<TypeParamList>) {
        if let Some(list) = params {
            for param in &list.params {
                self.insert(param.id, DeclView::TypeParam(param));
            }
        }
    }

    fn walk_ptrn(&mut self, ptrn: &'a Ptrn) {
        match &ptrn.kind {
            PtrnKind::Typed { ptrn, .. } => self.walk_ptrn(ptrn),
            PtrnKind::Id { decl, sub_ptrn } => {
                self.insert(decl.id, DeclView::Ptrn(decl));
                if let Some(sub) = sub_ptrn {
                    self.walk_ptrn(sub);
                }
            }
            PtrnKind::Literal(_) | PtrnKind::Error => {}
            PtrnKind::Record { fields, .. } => {
                for field in fields {
                    if let Some(sub) = &field.ptrn {
                        self.walk_ptrn(sub);
                    }
                }
            }
            PtrnKind::Ctor { arg, .. } => {
                if let Some(arg) = arg {
                    self.walk_ptrn(arg);
                }
            }
            PtrnKind::Tuple(elems) | PtrnKind::Array(elems) => {
                for elem in elems {
                    self.walk_ptrn(elem);
                }
            }
        }
    }

    fn walk_expr(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::Literal(_)
            | ExprKind::Path(_)
            | ExprKind::Break
            | ExprKind::Continue
            | ExprKind::Return
            | ExprKind::Error => {}
            ExprKind::Tuple(elems) | ExprKind::Array(elems) => {
                for elem in elems {
                    self.walk_expr(elem);
                }
            }
            ExprKind::RepeatArray { elem, .. } => self.walk_expr(elem),
            ExprKind::Record { fields, .. } => {
                for field in fields {
                    self.walk_expr(&field.expr);
                }
            }
            ExprKind::Block { stmts, .. } => {
                for stmt in stmts {
                    match stmt {
                        Stmt::Decl(decl) => self.walk_decl(decl),
                        Stmt::Expr(expr) => self.walk_expr(expr),
                    }
                }
            }
            ExprKind::Call { callee, arg } => {
                self.walk_expr(callee);
                self.walk_expr(arg);
            }
            ExprKind::Unary { arg, .. } => self.walk_expr(arg),
            ExprKind::Binary { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            ExprKind::Proj { expr, .. } => self.walk_expr(expr),
            ExprKind::If {
                cond,
                if_true,
                if_false,
            } => {
                self.walk_expr(cond);
                self.walk_expr(if_true);
                if let Some(if_false) = if_false {
                    self.walk_expr(if_false);
                }
            }
            ExprKind::Match { arg, cases } => {
                self.walk_expr(arg);
                for case in cases {
                    self.walk_ptrn(&case.ptrn);
                    self.walk_expr(&case.expr);
                }
            }
            ExprKind::While { cond, body } => {
                self.walk_expr(cond);
                self.walk_expr(body);
            }
            ExprKind::For(for_expr) => self.walk_expr(&for_expr.call),
            ExprKind::Fn(fn_expr) => {
                self.fn_exprs.insert(expr.id, expr);
                if let Some(param) = &fn_expr.param {
                    self.walk_ptrn(param);
                }
                if let Some(filter) = &fn_expr.filter {
                    if let Some(expr) = &filter.expr {
                        self.walk_expr(expr);
                    }
                }
                if let Some(body) = &fn_expr.body {
                    self.walk_expr(body);
                }
            }
            ExprKind::Cast { expr, .. }
            | ExprKind::ImplicitCast { expr }
            | ExprKind::Typed { expr, .. } => self.walk_expr(expr),
            ExprKind::Asm(asm) => {
                for operand in asm.ins.iter().chain(asm.outs.iter()) {
                    self.walk_expr(&operand.expr);
                }
            }
            ExprKind::Filter { filter, expr } => {
                if let Some(filter_expr) = &filter.expr {
                    self.walk_expr(filter_expr);
                }
                self.walk_expr(expr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Loc {
        Loc::new(FileId(0), Pos { row: 1, col: 1 }, Pos { row: 1, col: 2 })
    }

    #[test]
    fn loc_concatenation_takes_first_begin_last_end() {
        let first = Loc::new(FileId(0), Pos { row: 1, col: 5 }, Pos { row: 1, col: 9 });
        let last = Loc::new(FileId(0), Pos { row: 3, col: 1 }, Pos { row: 3, col: 4 });
        let joined = first.to(last);
        assert_eq!(joined.begin, Pos { row: 1, col: 5 });
        assert_eq!(joined.end, Pos { row: 3, col: 4 });
    }

    #[test]
    fn node_id_gen_is_dense() {
        let mut ids = NodeIdGen::new();
        assert_eq!(ids.fresh(), NodeId(0));
        assert_eq!(ids.fresh(), NodeId(1));
        assert_eq!(ids.fresh(), NodeId(2));
    }

    #[test]
    fn decl_index_finds_nested_bindings() {
        let mut ids = NodeIdGen::new();
        let ptrn_decl = PtrnDecl {
            id: ids.fresh(),
            loc: loc(),
            name: Ident::new("x", loc()),
            is_mut: false,
        };
        let decl_id = ptrn_decl.id;
        let module = ModDecl {
            name: None,
            decls: vec![Decl {
                id: ids.fresh(),
                loc: loc(),
                attrs: None,
                is_top_level: true,
                kind: DeclKind::Let(LetDecl {
                    ptrn: Ptrn {
                        id: ids.fresh(),
                        loc: loc(),
                        kind: PtrnKind::Id {
                            decl: ptrn_decl,
                            sub_ptrn: None,
                        },
                    },
                    init: None,
                }),
            }],
        };
        let index = DeclIndex::build(&module);
        let view = index.get(decl_id).expect("binding indexed");
        assert_eq!(view.name(), "x");
        assert!(!view.is_top_level());
    }

    #[test]
    fn for_parts_decomposes_canonical_shape() {
        let mut ids = NodeIdGen::new();
        let mut mk = |kind| Expr {
            id: ids.fresh(),
            loc: loc(),
            attrs: None,
            kind,
        };
        let iter = mk(ExprKind::Error);
        let lambda = Expr {
            id: NodeId(100),
            loc: loc(),
            attrs: None,
            kind: ExprKind::Fn(FnExpr {
                param: None,
                ret_type: None,
                filter: None,
                body: None,
            }),
        };
        let range = mk(ExprKind::Error);
        let inner = Expr {
            id: NodeId(101),
            loc: loc(),
            attrs: None,
            kind: ExprKind::Call {
                callee: Box::new(iter),
                arg: Box::new(lambda),
            },
        };
        let for_expr = ForExpr {
            call: Box::new(Expr {
                id: NodeId(102),
                loc: loc(),
                attrs: None,
                kind: ExprKind::Call {
                    callee: Box::new(inner),
                    arg: Box::new(range),
                },
            }),
        };
        let parts = for_expr.parts().expect("canonical shape");
        assert_eq!(parts.range.id, NodeId(1));
    }
}
