//! Bidirectional type checking for Tern.
//!
//! The checker walks a bound module and gives every node a type. Each node
//! family supports two modes: `infer` synthesizes a type bottom-up, and
//! `check` pushes an expected type down, falling back to infer-then-compare
//! when a construct has no checking rule of its own.
//!
//! Types live in the shared [`TypeWorld`]; results land in a [`TypeTable`]
//! keyed by `NodeId`. The table is single-assignment: inference memoizes,
//! and checking asserts the node has not been visited before.
//!
//! Errors are absorbing: a subtree that failed gets the error type, and
//! anything derived from an error type stays silent, so each defect is
//! reported exactly once at its narrowest location.

use std::collections::{BTreeMap, BTreeSet};

use tern_ast::{
    Case, Decl, DeclIndex, DeclKind, DeclView, Expr, ExprKind, FieldDecl, FnDecl, Literal, Loc,
    ModDecl, NodeId, Path, PrimTypeTag, Ptrn, PtrnKind, StaticDecl, Stmt, StructDecl,
    TypeAliasDecl, TypeAst, TypeAstKind, TypeParamList, EnumDecl,
};
use tern_bind::Bindings;
use tern_diag::{Category, Reporter, style};
use tern_types::{NominalKind, TypeId, TypeWorld};

// ---------------------------------------------------------------------------
// Type table
// ---------------------------------------------------------------------------

/// Side table mapping every visited node to its resolved type.
///
/// Monotone and (value-wise) single-assignment: setting a node twice with
/// different types is a checker bug, with one documented exception — a
/// function declaration whose body fails to check replaces its eagerly
/// installed signature with the failed one.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: BTreeMap<NodeId, TypeId>,
}

impl TypeTable {
    pub fn get(&self, id: NodeId) -> Option<TypeId> {
        self.types.get(&id).copied()
    }

    fn set(&mut self, id: NodeId, ty: TypeId) -> TypeId {
        if let Some(prev) = self.types.insert(id, ty) {
            debug_assert_eq!(prev, ty, "type slot of {id:?} rewritten");
        }
        ty
    }

    /// Replace an eagerly installed declaration signature. Only the
    /// function-declaration finalizer may call this.
    fn finalize(&mut self, id: NodeId, ty: TypeId) -> TypeId {
        self.types.insert(id, ty);
        ty
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, TypeId)> + '_ {
        self.types.iter().map(|(&id, &ty)| (id, ty))
    }
}

// ---------------------------------------------------------------------------
// Type checker
// ---------------------------------------------------------------------------

/// The bidirectional type checker. One instance per module run.
pub struct TypeChecker<'a, 'w, 'r> {
    index: &'a DeclIndex<'a>,
    bindings: &'a Bindings,
    world: &'w mut TypeWorld,
    reporter: &'r mut Reporter,
    table: TypeTable,
    decls_in_progress: BTreeSet<NodeId>,
    /// Path nodes that refer to a mutable binding.
    mutable_paths: BTreeSet<NodeId>,
}

impl<'a, 'w, 'r> TypeChecker<'a, 'w, 'r> {
    pub fn new(
        index: &'a DeclIndex<'a>,
        bindings: &'a Bindings,
        world: &'w mut TypeWorld,
        reporter: &'r mut Reporter,
    ) -> Self {
        Self {
            index,
            bindings,
            world,
            reporter,
            table: TypeTable::default(),
            decls_in_progress: BTreeSet::new(),
            mutable_paths: BTreeSet::new(),
        }
    }

    /// Check a whole module. Returns the type table, the set of mutable
    /// paths, and whether the pass produced zero errors.
    pub fn run(mut self, module: &ModDecl) -> (TypeTable, BTreeSet<NodeId>, bool) {
        let errors_before = self.reporter.error_count();
        for decl in &module.decls {
            self.infer_decl_node(decl);
        }
        let ok = self.reporter.error_count() == errors_before;
        (self.table, self.mutable_paths, ok)
    }

    // -- Error helpers --

    fn should_emit_error(&mut self, ty: TypeId) -> bool {
        let error = self.world.type_error();
        !self.world.contains(ty, error)
    }

    /// When a mismatch involves the bottom type, explain where it comes
    /// from: a forgotten `()` on `break`/`continue`/`return` is the usual
    /// culprit.
    fn explain_no_ret(&mut self, ty: Option<TypeId>, expected: TypeId) {
        let no_ret = self.world.type_no_ret();
        let involved = ty.is_some_and(|t| self.world.contains(t, no_ret))
            || self.world.contains(expected, no_ret);
        if involved {
            self.reporter.note(format!(
                "the type '{}' indicates a {} or {} type, used to denote the return type of functions like {}, {}, or {}",
                self.world.display(no_ret),
                style::emphasis("bottom"),
                style::emphasis("no-return"),
                style::keyword("break"),
                style::keyword("continue"),
                style::keyword("return"),
            ));
            self.reporter.note(format!(
                "this error {} indicate that you forgot to add parentheses '()' in the call to one of those functions",
                style::emphasis("may"),
            ));
        }
    }

    fn expect(&mut self, loc: Loc, ty: TypeId, expected: TypeId) -> TypeId {
        if let Some(best) = self.world.join(ty, expected) {
            return best;
        }
        if self.should_emit_error(ty) && self.should_emit_error(expected) {
            let message = format!(
                "expected type '{}', but got type '{}'",
                self.world.display(expected),
                self.world.display(ty)
            );
            self.reporter.error(Category::TypeMismatch, loc, message);
            self.explain_no_ret(Some(ty), expected);
        }
        self.world.type_error()
    }

    fn expect_with(&mut self, loc: Loc, msg: &str, ty: TypeId, expected: TypeId) -> TypeId {
        if let Some(best) = self.world.join(ty, expected) {
            return best;
        }
        if self.should_emit_error(ty) && self.should_emit_error(expected) {
            let message = format!(
                "expected type '{}', but got {} with type '{}'",
                self.world.display(expected),
                msg,
                self.world.display(ty)
            );
            self.reporter.error(Category::TypeMismatch, loc, message);
            self.explain_no_ret(Some(ty), expected);
        }
        self.world.type_error()
    }

    fn expect_desc(&mut self, loc: Loc, msg: &str, expected: TypeId) -> TypeId {
        if self.should_emit_error(expected) {
            let message = format!(
                "expected type '{}', but got {}",
                self.world.display(expected),
                msg
            );
            self.reporter.error(Category::TypeMismatch, loc, message);
            self.explain_no_ret(None, expected);
        }
        self.world.type_error()
    }

    fn struct_expected(&mut self, loc: Loc, ty: TypeId) -> TypeId {
        if self.should_emit_error(ty) {
            let message = format!(
                "structure type expected, but got '{}'",
                self.world.display(ty)
            );
            self.reporter
                .error(Category::StructureExpected, loc, message);
        }
        self.world.type_error()
    }

    fn unknown_member(&mut self, loc: Loc, struct_ty: TypeId, member: &str) -> TypeId {
        let message = format!(
            "no field '{}' in '{}'",
            member,
            self.world.display(struct_ty)
        );
        self.reporter.error(Category::UnknownMember, loc, message);
        self.world.type_error()
    }

    fn cannot_infer(&mut self, loc: Loc, msg: &str) -> TypeId {
        self.reporter.error(
            Category::CannotInfer,
            loc,
            format!("cannot infer type for {msg}"),
        );
        self.world.type_error()
    }

    fn unreachable_code(&mut self, before: Loc, first: Loc, last: Loc) -> TypeId {
        self.reporter
            .error(Category::UnreachableCode, first.to(last), "unreachable code");
        self.reporter.note_at(before, "after this statement");
        self.world.type_error()
    }

    // -- Declaration recursion guard --

    fn enter_decl(&mut self, decl: NodeId, loc: Loc) -> bool {
        if !self.decls_in_progress.insert(decl) {
            self.reporter.error(
                Category::RecursiveInference,
                loc,
                "cannot infer type for recursive declaration",
            );
            return false;
        }
        true
    }

    fn exit_decl(&mut self, decl: NodeId) {
        self.decls_in_progress.remove(&decl);
    }

    // -- Literals --

    fn infer_lit(&mut self, lit: &Literal) -> TypeId {
        match lit {
            Literal::Int(_) => self.world.type_sint(32),
            Literal::Float(_) => self.world.type_real(64),
            Literal::Bool(_) => self.world.type_bool(),
            Literal::Char(_) => self.world.type_uint(8),
            Literal::String(_) => {
                let u8_ty = self.world.type_uint(8);
                self.world.variadic(u8_ty)
            }
        }
    }

    fn check_lit(&mut self, loc: Loc, lit: &Literal, expected: TypeId) -> TypeId {
        if self.world.is_no_ret(expected) {
            return self.infer_lit(lit);
        }
        match lit {
            Literal::Int(_) => {
                if !self.world.is_sint(expected)
                    && !self.world.is_uint(expected)
                    && !self.world.is_real(expected)
                {
                    return self.expect_desc(loc, "integer literal", expected);
                }
                expected
            }
            Literal::Float(_) => {
                if !self.world.is_real(expected) {
                    return self.expect_desc(loc, "floating point literal", expected);
                }
                expected
            }
            Literal::Bool(_) => {
                let bool_ty = self.world.type_bool();
                self.expect_with(loc, "boolean literal", bool_ty, expected)
            }
            Literal::Char(_) => {
                let u8_ty = self.world.type_uint(8);
                self.expect_with(loc, "character literal", u8_ty, expected)
            }
            Literal::String(_) => {
                let u8_ty = self.world.type_uint(8);
                let str_ty = self.world.variadic(u8_ty);
                self.expect_with(loc, "string literal", str_ty, expected)
            }
        }
    }

    // -- Mutability --

    /// Walk from an assignment target towards its root binding. Mutable
    /// bindings are accepted through projections and array indexings only.
    fn check_mut(&mut self, expr: &Expr) -> bool {
        let mut cur = expr;
        let mut decl = None;
        loop {
            match &cur.kind {
                ExprKind::Path(path) => {
                    if self.mutable_paths.contains(&path.id) {
                        return true;
                    }
                    if let Some(&target) = self.bindings.path_res.get(&path.id) {
                        decl = Some(target);
                    }
                }
                ExprKind::Proj { expr, .. } => {
                    cur = expr;
                    continue;
                }
                ExprKind::Call { callee, .. } => {
                    let callee_ty = self.table.get(callee.id);
                    if callee_ty.is_some_and(|ty| self.world.as_variadic(ty).is_some()) {
                        cur = callee;
                        continue;
                    }
                }
                _ => {}
            }
            break;
        }
        self.reporter.error(
            Category::NonMutableAssignment,
            expr.loc,
            "assignment to a non-mutable expression",
        );
        if let Some(decl) = decl {
            if let Some(view) = self.index.get(decl) {
                self.reporter.note_at(
                    view.loc(),
                    format!(
                        "this error {} be solved by adding the {} qualifier to this symbol",
                        style::emphasis("may"),
                        style::keyword("mut"),
                    ),
                );
            }
        }
        false
    }

    // -- Paths --

    fn infer_path(&mut self, path: &Path) -> TypeId {
        if let Some(ty) = self.table.get(path.id) {
            return ty;
        }
        let ty = self.infer_path_uncached(path);
        self.table.set(path.id, ty)
    }

    fn infer_path_uncached(&mut self, path: &Path) -> TypeId {
        let Some(&decl_id) = self.bindings.path_res.get(&path.id) else {
            // Unresolved: the binder already reported it.
            return self.world.type_error();
        };
        let mut ty = self.infer_decl(decl_id);

        // A path is mutable when it refers to a mutable binding.
        match self.index.get(decl_id) {
            Some(DeclView::Ptrn(ptrn_decl)) if ptrn_decl.is_mut => {
                self.mutable_paths.insert(path.id);
            }
            Some(DeclView::Static(_, static_decl)) if static_decl.is_mut => {
                self.mutable_paths.insert(path.id);
            }
            _ => {}
        }

        for (i, elem) in path.elems.iter().enumerate() {
            // Apply type arguments (if any).
            let (nominal, _) = self.world.applied_nominal(ty);
            let is_forall = self.world.nominal_kind(nominal) == Some(NominalKind::Forall);
            let is_poly = self.world.is_polymorphic(nominal) && self.world.as_app(ty).is_none();
            if is_poly {
                if elem.args.is_empty() {
                    self.reporter
                        .error(Category::BadTypeArguments, elem.loc, "missing type arguments");
                    return self.world.type_error();
                }
                let args: Vec<TypeId> = elem
                    .args
                    .iter()
                    .map(|arg| self.infer_type_ast(arg))
                    .collect();
                ty = if is_forall {
                    let params = self.world.params(nominal).to_vec();
                    match self.world.operand(nominal, 0) {
                        Some(body) => self.world.rewrite(body, &params, &args),
                        None => self.world.type_error(),
                    }
                } else {
                    self.world.app(nominal, args)
                };
            } else if !elem.args.is_empty() {
                self.reporter.error(
                    Category::BadTypeArguments,
                    elem.loc,
                    "type arguments are not allowed here",
                );
                return self.world.type_error();
            }

            // Look up the next element inside the current object.
            if i != path.elems.len() - 1 {
                let member = &path.elems[i + 1].ident.name;
                let (nominal, app_args) = self.world.applied_nominal(ty);
                if self.world.nominal_kind(nominal) == Some(NominalKind::Enum) {
                    let app_args = app_args.map(|args| args.to_vec());
                    let Some(member_index) = self.world.member_index(nominal, member) else {
                        return self.unknown_member(elem.loc, nominal, member);
                    };
                    let operand = self
                        .world
                        .operand(nominal, member_index)
                        .unwrap_or_else(|| self.world.type_error());
                    ty = match app_args {
                        Some(args) => {
                            let params = self.world.params(nominal).to_vec();
                            self.world.rewrite(operand, &params, &args)
                        }
                        None => operand,
                    };
                } else {
                    let message = format!(
                        "operator '::' not allowed on type '{}'",
                        self.world.display(ty)
                    );
                    self.reporter
                        .error(Category::StructureExpected, elem.loc, message);
                    return self.world.type_error();
                }
            }
        }
        ty
    }

    // -- Syntactic types --

    fn infer_type_ast(&mut self, ty: &TypeAst) -> TypeId {
        if let Some(resolved) = self.table.get(ty.id) {
            return resolved;
        }
        let resolved = match &ty.kind {
            TypeAstKind::Prim(tag) => self.prim_type(*tag),
            TypeAstKind::Tuple(elems) => {
                let elems = elems.iter().map(|e| self.infer_type_ast(e)).collect();
                self.world.tuple(elems)
            }
            TypeAstKind::Array(elem) => {
                let elem = self.infer_type_ast(elem);
                self.world.variadic(elem)
            }
            TypeAstKind::Fn { from, to } => {
                let dom = self.infer_type_ast(from);
                let cod = self.infer_type_ast(to);
                self.world.pi(dom, cod)
            }
            TypeAstKind::Ptr(pointee) => {
                let pointee = self.infer_type_ast(pointee);
                self.world.ptr(pointee)
            }
            TypeAstKind::App(path) => self.infer_path(path),
            // Already reported by the parser.
            TypeAstKind::Error => self.world.type_error(),
        };
        self.table.set(ty.id, resolved)
    }

    fn prim_type(&mut self, tag: PrimTypeTag) -> TypeId {
        match tag {
            PrimTypeTag::Bool => self.world.type_bool(),
            PrimTypeTag::I8 => self.world.type_sint(8),
            PrimTypeTag::I16 => self.world.type_sint(16),
            PrimTypeTag::I32 => self.world.type_sint(32),
            PrimTypeTag::I64 => self.world.type_sint(64),
            PrimTypeTag::U8 => self.world.type_uint(8),
            PrimTypeTag::U16 => self.world.type_uint(16),
            PrimTypeTag::U32 => self.world.type_uint(32),
            PrimTypeTag::U64 => self.world.type_uint(64),
            PrimTypeTag::F32 => self.world.type_real(32),
            PrimTypeTag::F64 => self.world.type_real(64),
        }
    }

    // -- Expressions --

    pub fn infer_expr(&mut self, expr: &Expr) -> TypeId {
        if let Some(ty) = self.table.get(expr.id) {
            return ty;
        }
        let ty = self.infer_expr_kind(expr);
        self.table.set(expr.id, ty)
    }

    pub fn check_expr(&mut self, expr: &Expr, expected: TypeId) -> TypeId {
        debug_assert!(
            self.table.get(expr.id).is_none(),
            "expression visited twice"
        );
        let ty = self.check_expr_kind(expr, expected);
        self.table.set(expr.id, ty)
    }

    fn infer_expr_kind(&mut self, expr: &Expr) -> TypeId {
        match &expr.kind {
            ExprKind::Literal(lit) => self.infer_lit(lit),
            ExprKind::Path(path) => self.infer_path(path),
            ExprKind::Typed { expr: inner, ty } => {
                let expected = self.infer_type_ast(ty);
                self.check_expr(inner, expected)
            }
            ExprKind::Tuple(elems) => {
                let tys: Vec<TypeId> = elems.iter().map(|e| self.infer_expr(e)).collect();
                self.world.tuple(tys)
            }
            ExprKind::Array(elems) => {
                if elems.is_empty() {
                    return self.cannot_infer(expr.loc, "array expression");
                }
                let elem_ty = self.infer_expr(&elems[0]);
                for elem in &elems[1..] {
                    self.check_expr(elem, elem_ty);
                }
                self.world.variadic(elem_ty)
            }
            ExprKind::RepeatArray { elem, .. } => {
                let elem_ty = self.infer_expr(elem);
                self.world.variadic(elem_ty)
            }
            ExprKind::Record { path, fields } => {
                let path_ty = self.infer_path(path);
                let (nominal, app_args) = self.world.applied_nominal(path_ty);
                if self.world.nominal_kind(nominal) != Some(NominalKind::Struct) {
                    return self.struct_expected(expr.loc, path_ty);
                }
                let app_args = app_args.map(|args| args.to_vec());
                let items: Vec<_> = fields
                    .iter()
                    .map(|f| (&f.name, FieldBody::Expr(&f.expr)))
                    .collect();
                self.check_record_fields(expr.loc, nominal, app_args, &items, false, "expression")
            }
            ExprKind::Block { stmts, last_semi } => self.infer_block(stmts, *last_semi),
            ExprKind::Call { callee, arg } => self.infer_call(callee, arg),
            ExprKind::Unary { op, arg } => {
                let arg_ty = self.infer_expr(arg);
                if op.is_inc() || op.is_dec() {
                    self.check_mut(arg);
                }
                arg_ty
            }
            ExprKind::Binary { op, left, right } => {
                let left_ty = self.infer_expr(left);
                let right_ty = self.check_expr(right, left_ty);
                if op.has_eq() {
                    self.check_mut(left);
                    return self.world.unit();
                }
                if op.has_cmp() {
                    return self.world.type_bool();
                }
                right_ty
            }
            ExprKind::Proj { expr: inner, field } => {
                let inner_ty = self.infer_expr(inner);
                let (nominal, app_args) = self.world.applied_nominal(inner_ty);
                let app_args = app_args.map(|args| args.to_vec());
                if self.world.nominal_kind(nominal) != Some(NominalKind::Struct) {
                    return self.struct_expected(expr.loc, inner_ty);
                }
                let Some(index) = self.world.member_index(nominal, &field.name) else {
                    return self.unknown_member(expr.loc, nominal, &field.name);
                };
                let operand = self
                    .world
                    .operand(nominal, index)
                    .unwrap_or_else(|| self.world.type_error());
                match app_args {
                    Some(args) => {
                        let params = self.world.params(nominal).to_vec();
                        self.world.rewrite(operand, &params, &args)
                    }
                    None => operand,
                }
            }
            ExprKind::If {
                cond,
                if_true,
                if_false,
            } => {
                let bool_ty = self.world.type_bool();
                self.check_expr(cond, bool_ty);
                match if_false {
                    Some(if_false) => {
                        let true_ty = self.infer_expr(if_true);
                        self.check_expr(if_false, true_ty)
                    }
                    None => {
                        let unit = self.world.unit();
                        self.check_expr(if_true, unit)
                    }
                }
            }
            ExprKind::Match { arg, cases } => self.check_match(expr.loc, arg, cases, None),
            ExprKind::While { cond, body } => {
                let bool_ty = self.world.type_bool();
                self.check_expr(cond, bool_ty);
                self.infer_expr(body);
                self.world.unit()
            }
            ExprKind::For(for_expr) => self.infer_expr(&for_expr.call),
            ExprKind::Break | ExprKind::Continue => {
                let unit = self.world.unit();
                let no_ret = self.world.type_no_ret();
                self.world.pi(unit, no_ret)
            }
            ExprKind::Return => self.infer_return(expr),
            ExprKind::Fn(_) => self.infer_fn_expr(expr),
            ExprKind::Cast { expr: inner, ty } => {
                let src = self.infer_expr(inner);
                let dst = self.infer_type_ast(ty);
                if self.world.is_prim(src) && self.world.is_prim(dst) {
                    dst
                } else {
                    self.expect(expr.loc, src, dst)
                }
            }
            ExprKind::ImplicitCast { expr: inner } => self.infer_expr(inner),
            ExprKind::Asm(asm) => {
                for operand in &asm.ins {
                    self.infer_expr(&operand.expr);
                }
                for operand in &asm.outs {
                    self.infer_expr(&operand.expr);
                    self.check_mut(&operand.expr);
                }
                self.world.unit()
            }
            ExprKind::Filter { filter, expr: inner } => {
                if let Some(filter_expr) = &filter.expr {
                    let bool_ty = self.world.type_bool();
                    self.check_expr(filter_expr, bool_ty);
                }
                self.infer_expr(inner)
            }
            ExprKind::Error => self.world.type_error(),
        }
    }

    fn check_expr_kind(&mut self, expr: &Expr, expected: TypeId) -> TypeId {
        match &expr.kind {
            ExprKind::Literal(lit) => self.check_lit(expr.loc, lit, expected),
            ExprKind::Tuple(elems) => self.check_tuple_like(
                expr.loc,
                "tuple expression",
                elems.len(),
                expected,
                |checker, i, elem_ty| {
                    checker.check_expr(&elems[i], elem_ty);
                },
            ),
            ExprKind::Array(elems) => {
                let Some(elem_ty) = self.world.as_variadic(expected) else {
                    return self.expect_desc(expr.loc, "array expression", expected);
                };
                for elem in elems {
                    self.check_expr(elem, elem_ty);
                }
                self.world.variadic(elem_ty)
            }
            ExprKind::RepeatArray { elem, .. } => {
                let Some(elem_ty) = self.world.as_variadic(expected) else {
                    return self.expect_desc(expr.loc, "array expression", expected);
                };
                self.check_expr(elem, elem_ty);
                self.world.variadic(elem_ty)
            }
            ExprKind::Fn(fn_expr) => {
                let Some((dom, cod)) = self.world.as_pi(expected) else {
                    return self.expect_desc(expr.loc, "anonymous function", expected);
                };
                let param_ty = match &fn_expr.param {
                    Some(param) => self.check_ptrn(param, dom),
                    None => {
                        let unit = self.world.unit();
                        self.expect(expr.loc, unit, dom)
                    }
                };
                let body_ty = match &fn_expr.body {
                    Some(body) => self.check_expr(body, cod),
                    None => cod,
                };
                self.world.pi(param_ty, body_ty)
            }
            ExprKind::Block { stmts, last_semi } => {
                self.check_block(expr.loc, stmts, *last_semi, expected)
            }
            ExprKind::If {
                cond,
                if_true,
                if_false,
            } => {
                let bool_ty = self.world.type_bool();
                self.check_expr(cond, bool_ty);
                let true_ty = self.check_expr(if_true, expected);
                match if_false {
                    Some(if_false) => self.check_expr(if_false, true_ty),
                    None => true_ty,
                }
            }
            ExprKind::Match { arg, cases } => self.check_match(expr.loc, arg, cases, Some(expected)),
            ExprKind::ImplicitCast { expr: inner } => {
                self.check_expr(inner, expected);
                expected
            }
            _ => {
                let ty = self.infer_expr_kind(expr);
                self.expect(expr.loc, ty, expected)
            }
        }
    }

    fn infer_call(&mut self, callee: &Expr, arg: &Expr) -> TypeId {
        let callee_ty = self.infer_expr(callee);
        if let Some((dom, cod)) = self.world.as_pi(callee_ty) {
            self.check_expr(arg, dom);
            cod
        } else if let Some(elem) = self.world.as_variadic(callee_ty) {
            let index_ty = self.infer_expr(arg);
            if !self.world.is_int(index_ty) {
                if self.should_emit_error(index_ty) {
                    let message = format!(
                        "integer type expected as array index, but got '{}'",
                        self.world.display(index_ty)
                    );
                    self.reporter.error(Category::IndexExpected, arg.loc, message);
                }
                return self.world.type_error();
            }
            elem
        } else {
            if self.should_emit_error(callee_ty) {
                let message = format!(
                    "expected function or array type in call expression, but got '{}'",
                    self.world.display(callee_ty)
                );
                self.reporter
                    .error(Category::CalleeExpected, callee.loc, message);
            }
            self.world.type_error()
        }
    }

    fn infer_return(&mut self, expr: &Expr) -> TypeId {
        if let Some(&fn_id) = self.bindings.fn_of.get(&expr.id) {
            let mut arg_ty = None;
            if let Some(fn_ty) = self.table.get(fn_id) {
                if let Some((_, cod)) = self.world.as_pi(fn_ty) {
                    arg_ty = Some(cod);
                }
            }
            if arg_ty.is_none() {
                if let Some(fn_node) = self.index.fn_expr(fn_id) {
                    if let ExprKind::Fn(fn_expr) = &fn_node.kind {
                        if let Some(ret_ast) = &fn_expr.ret_type {
                            arg_ty = self.table.get(ret_ast.id);
                        }
                    }
                }
            }
            if let Some(arg_ty) = arg_ty {
                let no_ret = self.world.type_no_ret();
                return self.world.pi(arg_ty, no_ret);
            }
        }
        self.reporter.error(
            Category::CannotInfer,
            expr.loc,
            format!("cannot infer the type of {}", style::keyword("return")),
        );
        if let Some(&fn_id) = self.bindings.fn_of.get(&expr.id) {
            if let Some(fn_node) = self.index.fn_expr(fn_id) {
                self.reporter
                    .note_at(fn_node.loc, "try annotating the return type of this function");
            }
        }
        self.world.type_error()
    }

    fn infer_fn_expr(&mut self, expr: &Expr) -> TypeId {
        let ExprKind::Fn(fn_expr) = &expr.kind else {
            unreachable!("infer_fn_expr on a non-function expression");
        };
        let annotated = fn_expr
            .ret_type
            .as_ref()
            .map(|ret_ast| self.infer_type_ast(ret_ast));
        if fn_expr.body.is_none() && annotated.is_none() {
            return self.cannot_infer(expr.loc, "function");
        }
        let param_ty = match &fn_expr.param {
            Some(param) => self.infer_ptrn(param),
            None => self.world.unit(),
        };
        let body_ty = match (&fn_expr.body, annotated) {
            (Some(body), Some(expected)) => self.check_expr(body, expected),
            (Some(body), None) => self.infer_expr(body),
            (None, Some(expected)) => expected,
            (None, None) => unreachable!(),
        };
        if let Some(filter) = &fn_expr.filter {
            if let Some(filter_expr) = &filter.expr {
                let bool_ty = self.world.type_bool();
                self.check_expr(filter_expr, bool_ty);
            }
        }
        self.world.pi(param_ty, body_ty)
    }

    fn infer_block(&mut self, stmts: &[Stmt], last_semi: bool) -> TypeId {
        if stmts.is_empty() {
            return self.world.unit();
        }
        for i in 0..stmts.len() - 1 {
            let stmt_ty = self.infer_stmt(&stmts[i]);
            if self.world.is_no_ret(stmt_ty) {
                return self.unreachable_code(
                    stmts[i].loc(),
                    stmts[i + 1].loc(),
                    stmts[stmts.len() - 1].loc(),
                );
            }
        }
        let last_ty = self.infer_stmt(&stmts[stmts.len() - 1]);
        if last_semi {
            self.world.unit()
        } else {
            last_ty
        }
    }

    fn check_block(&mut self, loc: Loc, stmts: &[Stmt], last_semi: bool, expected: TypeId) -> TypeId {
        if stmts.is_empty() {
            let unit = self.world.unit();
            return self.expect_with(loc, "block expression", unit, expected);
        }
        for i in 0..stmts.len() - 1 {
            let stmt_ty = self.infer_stmt(&stmts[i]);
            if self.world.is_no_ret(stmt_ty) {
                return self.unreachable_code(
                    stmts[i].loc(),
                    stmts[i + 1].loc(),
                    stmts[stmts.len() - 1].loc(),
                );
            }
        }
        let last = &stmts[stmts.len() - 1];
        if last_semi {
            let unit = self.world.unit();
            let last_ty = self.check_stmt(last, unit);
            self.expect_with(loc, "block expression", last_ty, expected)
        } else {
            self.check_stmt(last, expected)
        }
    }

    fn infer_stmt(&mut self, stmt: &Stmt) -> TypeId {
        match stmt {
            Stmt::Decl(decl) => self.infer_decl_node(decl),
            Stmt::Expr(expr) => self.infer_expr(expr),
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt, expected: TypeId) -> TypeId {
        match stmt {
            // Function declarations inside blocks ignore the expected type:
            // statements type as unit anyway.
            Stmt::Decl(decl) if matches!(decl.kind, DeclKind::Fn(_)) => self.infer_decl_node(decl),
            Stmt::Decl(decl) => {
                let ty = self.infer_decl_node(decl);
                self.expect(decl.loc, ty, expected)
            }
            Stmt::Expr(expr) => self.check_expr(expr, expected),
        }
    }

    fn check_match(
        &mut self,
        loc: Loc,
        arg: &Expr,
        cases: &[Case],
        expected: Option<TypeId>,
    ) -> TypeId {
        let arg_ty = self.infer_expr(arg);
        let mut ty = expected;
        for case in cases {
            self.check_ptrn(&case.ptrn, arg_ty);
            ty = Some(match ty {
                Some(expected) => self.check_expr(&case.expr, expected),
                None => self.infer_expr(&case.expr),
            });
        }
        match ty {
            Some(ty) => ty,
            None => self.cannot_infer(loc, "match expression"),
        }
    }

    /// Shared arity-checked tuple rule for expressions and patterns.
    fn check_tuple_like(
        &mut self,
        loc: Loc,
        msg: &str,
        len: usize,
        expected: TypeId,
        mut check_elem: impl FnMut(&mut Self, usize, TypeId),
    ) -> TypeId {
        let Some(elem_tys) = self.world.as_tuple(expected).map(|e| e.to_vec()) else {
            return self.expect_desc(loc, msg, expected);
        };
        if len != elem_tys.len() {
            let message = format!(
                "expected {} argument(s) in {}, but got {}",
                elem_tys.len(),
                msg,
                len
            );
            self.reporter.error(Category::TypeMismatch, loc, message);
            return self.world.type_error();
        }
        for (i, &elem_ty) in elem_tys.iter().enumerate() {
            check_elem(self, i, elem_ty);
        }
        expected
    }

    // -- Record fields (expressions and patterns) --

    fn check_record_fields(
        &mut self,
        loc: Loc,
        nominal: TypeId,
        app_args: Option<Vec<TypeId>>,
        fields: &[(&tern_ast::Ident, FieldBody<'_>)],
        etc: bool,
        msg: &str,
    ) -> TypeId {
        let num_members = self.world.num_operands(nominal);
        let mut seen = vec![false; num_members];
        for (name, body) in fields {
            let name = *name;
            let Some(index) = self.world.member_index(nominal, &name.name) else {
                return self.unknown_member(name.loc, nominal, &name.name);
            };
            if seen[index] {
                let message = format!("field '{}' specified more than once", name.name);
                self.reporter.error(Category::RecordField, loc, message);
                return self.world.type_error();
            }
            seen[index] = true;
            let mut field_ty = self
                .world
                .operand(nominal, index)
                .unwrap_or_else(|| self.world.type_error());
            if let Some(args) = &app_args {
                let params = self.world.params(nominal).to_vec();
                field_ty = self.world.rewrite(field_ty, &params, args);
            }
            match body {
                FieldBody::Expr(expr) => {
                    self.check_expr(expr, field_ty);
                }
                FieldBody::Ptrn(Some(ptrn)) => {
                    self.check_ptrn(ptrn, field_ty);
                }
                FieldBody::Ptrn(None) => {}
            }
        }
        if !etc && !seen.iter().all(|&b| b) {
            for (i, seen) in seen.iter().enumerate() {
                if !seen {
                    let member = self.world.meta(nominal)[i].clone();
                    let message = format!("missing field '{member}' in structure {msg}");
                    self.reporter.error(Category::RecordField, loc, message);
                }
            }
        }
        match app_args {
            Some(args) => self.world.app(nominal, args),
            None => nominal,
        }
    }

    // -- Patterns --

    pub fn infer_ptrn(&mut self, ptrn: &Ptrn) -> TypeId {
        if let Some(ty) = self.table.get(ptrn.id) {
            return ty;
        }
        let ty = self.infer_ptrn_kind(ptrn);
        self.table.set(ptrn.id, ty)
    }

    pub fn check_ptrn(&mut self, ptrn: &Ptrn, expected: TypeId) -> TypeId {
        debug_assert!(self.table.get(ptrn.id).is_none(), "pattern visited twice");
        let ty = self.check_ptrn_kind(ptrn, expected);
        self.table.set(ptrn.id, ty)
    }

    fn infer_ptrn_kind(&mut self, ptrn: &Ptrn) -> TypeId {
        match &ptrn.kind {
            PtrnKind::Typed { ptrn: inner, ty } => {
                let expected = self.infer_type_ast(ty);
                self.check_ptrn(inner, expected)
            }
            PtrnKind::Id { decl, sub_ptrn } => {
                // The type is attached to the declaration, which is what the
                // identifier's uses are connected to.
                if let Some(sub) = sub_ptrn {
                    let ty = self.infer_ptrn(sub);
                    return self.table.set(decl.id, ty);
                }
                match self.table.get(decl.id) {
                    Some(ty) => ty,
                    None => self.cannot_infer(ptrn.loc, "pattern"),
                }
            }
            PtrnKind::Literal(lit) => self.infer_lit(lit),
            PtrnKind::Record { path, fields, etc } => {
                let path_ty = self.infer_path(path);
                let (nominal, app_args) = self.world.applied_nominal(path_ty);
                if self.world.nominal_kind(nominal) != Some(NominalKind::Struct) {
                    return self.struct_expected(ptrn.loc, path_ty);
                }
                let app_args = app_args.map(|args| args.to_vec());
                let items: Vec<_> = fields
                    .iter()
                    .map(|f| (&f.name, FieldBody::Ptrn(f.ptrn.as_deref())))
                    .collect();
                self.check_record_fields(ptrn.loc, nominal, app_args, &items, *etc, "pattern")
            }
            PtrnKind::Ctor { path, arg } => {
                let path_ty = self.infer_path(path);
                match arg {
                    Some(arg) => {
                        if let Some((dom, cod)) = self.world.as_pi(path_ty) {
                            self.check_ptrn(arg, dom);
                            cod
                        } else {
                            if self.should_emit_error(path_ty) {
                                let message = format!(
                                    "expected constructor with an argument, but got '{}'",
                                    self.world.display(path_ty)
                                );
                                self.reporter
                                    .error(Category::CalleeExpected, arg.loc, message);
                            }
                            self.world.type_error()
                        }
                    }
                    None => path_ty,
                }
            }
            PtrnKind::Tuple(elems) => {
                let tys: Vec<TypeId> = elems.iter().map(|e| self.infer_ptrn(e)).collect();
                self.world.tuple(tys)
            }
            PtrnKind::Array(elems) => {
                if elems.is_empty() {
                    return self.cannot_infer(ptrn.loc, "array pattern");
                }
                let elem_ty = self.infer_ptrn(&elems[0]);
                for elem in &elems[1..] {
                    self.check_ptrn(elem, elem_ty);
                }
                self.world.variadic(elem_ty)
            }
            PtrnKind::Error => self.world.type_error(),
        }
    }

    fn check_ptrn_kind(&mut self, ptrn: &Ptrn, expected: TypeId) -> TypeId {
        match &ptrn.kind {
            PtrnKind::Id { decl, sub_ptrn } => {
                if let Some(sub) = sub_ptrn {
                    self.check_ptrn(sub, expected);
                }
                self.table.set(decl.id, expected)
            }
            PtrnKind::Literal(lit) => self.check_lit(ptrn.loc, lit, expected),
            PtrnKind::Tuple(elems) => self.check_tuple_like(
                ptrn.loc,
                "tuple pattern",
                elems.len(),
                expected,
                |checker, i, elem_ty| {
                    checker.check_ptrn(&elems[i], elem_ty);
                },
            ),
            PtrnKind::Array(elems) => {
                let Some(elem_ty) = self.world.as_variadic(expected) else {
                    return self.expect_desc(ptrn.loc, "array pattern", expected);
                };
                for elem in elems {
                    self.check_ptrn(elem, elem_ty);
                }
                self.world.variadic(elem_ty)
            }
            _ => {
                let ty = self.infer_ptrn_kind(ptrn);
                self.expect(ptrn.loc, ty, expected)
            }
        }
    }

    // -- Declarations --

    /// Infer the type of a declaration by id, resolving through the index.
    /// Used when a path refers to a declaration that has not been visited
    /// yet (top-level mutual recursion).
    fn infer_decl(&mut self, decl_id: NodeId) -> TypeId {
        if let Some(ty) = self.table.get(decl_id) {
            return ty;
        }
        let Some(view) = self.index.get(decl_id) else {
            return self.world.type_error();
        };
        match view {
            DeclView::Ptrn(ptrn_decl) => {
                // A binding referenced before its `let` was checked: nothing
                // to synthesize from.
                self.cannot_infer(ptrn_decl.loc, "pattern")
            }
            DeclView::TypeParam(param) => self.cannot_infer(param.loc, "type parameter"),
            DeclView::Field(field) => self.infer_field_decl(field),
            DeclView::Option(option, enum_id) => {
                self.infer_decl(enum_id);
                match self.table.get(option.id) {
                    Some(ty) => ty,
                    None => self.world.type_error(),
                }
            }
            DeclView::Static(decl, static_decl) => self.infer_static_decl(decl, static_decl),
            DeclView::Fn(decl, fn_decl) => self.infer_fn_decl(decl, fn_decl),
            DeclView::Struct(decl, struct_decl) => self.infer_struct_decl(decl, struct_decl),
            DeclView::Enum(decl, enum_decl) => self.infer_enum_decl(decl, enum_decl),
            DeclView::TypeAlias(decl, alias_decl) => self.infer_alias_decl(decl, alias_decl),
            DeclView::Mod(decl, mod_decl) => {
                for child in &mod_decl.decls {
                    self.infer_decl_node(child);
                }
                let unit = self.world.unit();
                self.table.set(decl.id, unit)
            }
        }
    }

    /// Infer a declaration node in place (statement or top-level position).
    pub fn infer_decl_node(&mut self, decl: &Decl) -> TypeId {
        if let Some(ty) = self.table.get(decl.id) {
            return ty;
        }
        match &decl.kind {
            DeclKind::Let(let_decl) => {
                match &let_decl.init {
                    Some(init) => {
                        let init_ty = self.infer_expr(init);
                        self.check_ptrn(&let_decl.ptrn, init_ty);
                    }
                    None => {
                        self.infer_ptrn(&let_decl.ptrn);
                    }
                }
                let unit = self.world.unit();
                self.table.set(decl.id, unit)
            }
            DeclKind::Static(static_decl) => self.infer_static_decl(decl, static_decl),
            DeclKind::Fn(fn_decl) => self.infer_fn_decl(decl, fn_decl),
            DeclKind::Struct(struct_decl) => self.infer_struct_decl(decl, struct_decl),
            DeclKind::Enum(enum_decl) => self.infer_enum_decl(decl, enum_decl),
            DeclKind::TypeAlias(alias_decl) => self.infer_alias_decl(decl, alias_decl),
            DeclKind::Mod(mod_decl) => {
                for child in &mod_decl.decls {
                    self.infer_decl_node(child);
                }
                let unit = self.world.unit();
                self.table.set(decl.id, unit)
            }
            DeclKind::Error => {
                let error = self.world.type_error();
                self.table.set(decl.id, error)
            }
        }
    }

    fn infer_static_decl(&mut self, decl: &Decl, static_decl: &StaticDecl) -> TypeId {
        if !self.enter_decl(decl.id, decl.loc) {
            return self.world.type_error();
        }
        let ty = match (&static_decl.ty, &static_decl.init) {
            (Some(ty_ast), Some(init)) => {
                let annotated = self.infer_type_ast(ty_ast);
                self.check_expr(init, annotated);
                annotated
            }
            (Some(ty_ast), None) => self.infer_type_ast(ty_ast),
            (None, Some(init)) => self.infer_expr(init),
            (None, None) => self.cannot_infer(decl.loc, "static variable"),
        };
        self.exit_decl(decl.id);
        self.table.set(decl.id, ty)
    }

    /// Assign rigid parameter types to the type-parameter declarations of a
    /// nominal.
    fn assign_type_params(&mut self, list: &Option<TypeParamList>, nominal: TypeId) {
        if let Some(list) = list {
            let params = self.world.params(nominal).to_vec();
            for (param, ty) in list.params.iter().zip(params) {
                self.table.set(param.id, ty);
            }
        }
    }

    fn type_param_names(list: &Option<TypeParamList>) -> Vec<String> {
        list.as_ref()
            .map(|list| {
                list.params
                    .iter()
                    .map(|param| param.name.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn infer_fn_decl(&mut self, decl: &Decl, fn_decl: &FnDecl) -> TypeId {
        let fn_body = fn_decl.fn_expr();
        let forall = fn_decl.type_params.as_ref().map(|_| {
            let names = Self::type_param_names(&fn_decl.type_params);
            let forall = self
                .world
                .forall(decl.id, fn_decl.name.name.clone(), &names);
            self.assign_type_params(&fn_decl.type_params, forall);
            forall
        });
        // With a return annotation, the signature is installed before the
        // body is visited, so recursive calls resolve.
        if let Some(ret_ast) = &fn_body.ret_type {
            let dom = match &fn_body.param {
                Some(param) => self.infer_ptrn(param),
                None => self.world.unit(),
            };
            let cod = self.infer_type_ast(ret_ast);
            let fn_ty = self.world.pi(dom, cod);
            match forall {
                Some(forall) => {
                    self.world.set_operand(forall, 0, fn_ty);
                    self.table.set(decl.id, forall);
                }
                None => {
                    self.table.set(decl.id, fn_ty);
                }
            }
        }
        if !self.enter_decl(decl.id, decl.loc) {
            return self.world.type_error();
        }
        let fn_ty = self.infer_expr(&fn_decl.fn_expr);
        if let Some(forall) = forall {
            self.world.set_operand(forall, 0, fn_ty);
        }
        self.exit_decl(decl.id);
        let result = forall.unwrap_or(fn_ty);
        self.table.finalize(decl.id, result)
    }

    fn infer_field_decl(&mut self, field: &FieldDecl) -> TypeId {
        if let Some(ty) = self.table.get(field.id) {
            return ty;
        }
        let ty = self.infer_type_ast(&field.ty);
        if let Some(init) = &field.init {
            self.check_expr(init, ty);
        }
        self.table.set(field.id, ty)
    }

    fn infer_struct_decl(&mut self, decl: &Decl, struct_decl: &StructDecl) -> TypeId {
        let field_names = struct_decl
            .fields
            .iter()
            .map(|field| field.name.name.clone())
            .collect();
        let param_names = Self::type_param_names(&struct_decl.type_params);
        let struct_ty = self.world.struct_type(
            decl.id,
            struct_decl.name.name.clone(),
            &param_names,
            field_names,
        );
        self.assign_type_params(&struct_decl.type_params, struct_ty);
        // Install the type before visiting the fields so that
        // self-referential structures work.
        self.table.set(decl.id, struct_ty);
        for (i, field) in struct_decl.fields.iter().enumerate() {
            let field_ty = self.infer_field_decl(field);
            self.world.set_operand(struct_ty, i, field_ty);
        }
        struct_ty
    }

    fn infer_enum_decl(&mut self, decl: &Decl, enum_decl: &EnumDecl) -> TypeId {
        let option_names = enum_decl
            .options
            .iter()
            .map(|option| option.name.name.clone())
            .collect();
        let param_names = Self::type_param_names(&enum_decl.type_params);
        let enum_ty = self.world.enum_type(
            decl.id,
            enum_decl.name.name.clone(),
            &param_names,
            option_names,
        );
        self.assign_type_params(&enum_decl.type_params, enum_ty);
        // Install the type before visiting the options.
        self.table.set(decl.id, enum_ty);
        let params = self.world.params(enum_ty).to_vec();
        let applied = if params.is_empty() {
            enum_ty
        } else {
            self.world.app(enum_ty, params)
        };
        for (i, option) in enum_decl.options.iter().enumerate() {
            let option_ty = match &option.param {
                Some(param) => {
                    let param_ty = self.infer_type_ast(param);
                    self.world.pi(param_ty, applied)
                }
                None => applied,
            };
            self.table.set(option.id, option_ty);
            self.world.set_operand(enum_ty, i, option_ty);
        }
        enum_ty
    }

    fn infer_alias_decl(&mut self, decl: &Decl, alias_decl: &TypeAliasDecl) -> TypeId {
        if !self.enter_decl(decl.id, decl.loc) {
            return self.world.type_error();
        }
        let ty = match &alias_decl.type_params {
            None => self.infer_type_ast(&alias_decl.aliased),
            Some(_) => {
                let names = Self::type_param_names(&alias_decl.type_params);
                let forall = self
                    .world
                    .forall(decl.id, alias_decl.name.name.clone(), &names);
                self.assign_type_params(&alias_decl.type_params, forall);
                let body = self.infer_type_ast(&alias_decl.aliased);
                self.world.set_operand(forall, 0, body);
                forall
            }
        };
        self.exit_decl(decl.id);
        self.table.set(decl.id, ty)
    }
}

/// The body of a record field, in expression or pattern position.
enum FieldBody<'a> {
    Expr(&'a Expr),
    Ptrn(Option<&'a Ptrn>),
}


#[cfg(test)]
mod prop_tests;
