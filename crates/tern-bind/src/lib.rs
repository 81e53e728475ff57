//! Name resolution for Tern.
//!
//! This crate implements the symbol table stack and the name binder. The
//! binder walks a module, resolves every path to its declaration site,
//! records which loop a `break`/`continue` belongs to and which function a
//! `return` belongs to, and reports unresolved names, redeclarations,
//! shadowing and unused identifiers.
//!
//! Resolution results are side tables keyed by `NodeId` ([`Bindings`]), so
//! nothing in the AST is mutated and no reference from a path can outlive
//! its declaration: both ends are ids into the same tree.

use std::collections::{BTreeMap, HashMap};

use tern_ast::{
    Attr, AttrList, Decl, DeclIndex, DeclKind, Expr, ExprKind, Filter, Ident, ModDecl, NodeId,
    Path, Ptrn, PtrnKind, Stmt, TypeAst, TypeAstKind,
};
use tern_diag::{Category, Reporter, style};

// ---------------------------------------------------------------------------
// Symbol table
// ---------------------------------------------------------------------------

/// The declaration set behind one name in one frame.
///
/// Normally a single declaration; multiple entries only accumulate while
/// tolerating a redeclaration, and resolution then always picks the first,
/// never an arbitrary one.
#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub decls: Vec<NodeId>,
    /// Number of paths that resolved to this symbol.
    pub uses: u32,
}

/// One lexical scope: a frame of the symbol table stack.
///
/// Entries keep insertion order so that frame-pop diagnostics are
/// deterministic.
#[derive(Debug)]
pub struct SymbolTable {
    pub top_level: bool,
    entries: Vec<Symbol>,
    by_name: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new(top_level: bool) -> Self {
        Self {
            top_level,
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        match self.by_name.get(name) {
            Some(&i) => Some(&mut self.entries[i]),
            None => None,
        }
    }

    /// Insert a declaration under `name`. On collision the declaration is
    /// merged into the existing symbol (for diagnostics) and `false` is
    /// returned.
    pub fn insert(&mut self, name: &str, decl: NodeId) -> bool {
        if let Some(&i) = self.by_name.get(name) {
            self.entries[i].decls.push(decl);
            return false;
        }
        self.by_name.insert(name.to_string(), self.entries.len());
        self.entries.push(Symbol {
            name: name.to_string(),
            decls: vec![decl],
            uses: 0,
        });
        true
    }

    /// Best entry by a caller-supplied string distance, strictly below
    /// `min`. Ties are broken by first encountered.
    pub fn find_similar<D>(&self, name: &str, mut min: usize, distance: D) -> (usize, Option<&Symbol>)
    where
        D: Fn(&str, &str) -> usize,
    {
        let mut best = None;
        for symbol in &self.entries {
            let d = distance(&symbol.name, name);
            if d < min {
                best = Some(symbol);
                min = d;
            }
        }
        (min, best)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// The binder's output: resolution side tables keyed by `NodeId`.
#[derive(Debug, Default)]
pub struct Bindings {
    /// Path node → declaration node of its head identifier.
    pub path_res: BTreeMap<NodeId, NodeId>,
    /// `break`/`continue` node → enclosing loop node.
    pub loop_of: BTreeMap<NodeId, NodeId>,
    /// `return` node → enclosing function-literal node.
    pub fn_of: BTreeMap<NodeId, NodeId>,
}

// ---------------------------------------------------------------------------
// Name binder
// ---------------------------------------------------------------------------

/// Binder configuration. Defaults mirror the compiler driver's defaults.
#[derive(Debug, Clone)]
pub struct BinderConfig {
    pub warn_on_shadowing: bool,
    pub warn_unused: bool,
    /// Maximum edit distance for "did you mean?" suggestions.
    pub max_suggestion_distance: usize,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            warn_on_shadowing: true,
            warn_unused: true,
            max_suggestion_distance: 2,
        }
    }
}

/// Stateful name-binding traversal.
pub struct NameBinder<'a, 'r> {
    index: &'a DeclIndex<'a>,
    reporter: &'r mut Reporter,
    config: BinderConfig,
    scopes: Vec<SymbolTable>,
    cur_fn: Option<NodeId>,
    cur_loop: Option<NodeId>,
    bindings: Bindings,
}

impl<'a, 'r> NameBinder<'a, 'r> {
    pub fn new(index: &'a DeclIndex<'a>, config: BinderConfig, reporter: &'r mut Reporter) -> Self {
        Self {
            index,
            reporter,
            config,
            scopes: Vec::new(),
            cur_fn: None,
            cur_loop: None,
            bindings: Bindings::default(),
        }
    }

    /// Bind a whole module. Returns the resolution tables and whether the
    /// pass produced zero errors.
    pub fn run(mut self, module: &ModDecl) -> (Bindings, bool) {
        let errors_before = self.reporter.error_count();
        self.bind_mod(module);
        let ok = self.reporter.error_count() == errors_before;
        (self.bindings, ok)
    }

    // -- Scope management --

    fn push_scope(&mut self, top_level: bool) {
        self.scopes.push(SymbolTable::new(top_level));
    }

    fn pop_scope(&mut self) {
        let frame = self.scopes.pop().expect("scope underflow");
        if !self.config.warn_unused || frame.top_level {
            return;
        }
        for symbol in frame.symbols() {
            if symbol.uses > 0 {
                continue;
            }
            let Some(view) = self.index.get(symbol.decls[0]) else {
                continue;
            };
            if matches!(
                view,
                tern_ast::DeclView::Field(_) | tern_ast::DeclView::Option(..)
            ) {
                continue;
            }
            self.reporter.warn(
                Category::UnusedIdentifier,
                view.loc(),
                format!("unused identifier '{}'", symbol.name),
            );
            self.reporter.note("prefix unused identifiers with '_'");
        }
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|frame| frame.find(name))
    }

    /// Innermost-first lookup that counts as a use of the symbol. Returns
    /// the first declaration: resolution never picks among redeclarations.
    fn resolve(&mut self, name: &str) -> Option<NodeId> {
        for frame in self.scopes.iter_mut().rev() {
            if let Some(symbol) = frame.find_mut(name) {
                symbol.uses += 1;
                return Some(symbol.decls[0]);
            }
        }
        None
    }

    /// Best symbol over all frames under the configured edit distance.
    fn find_similar_symbol(&self, name: &str) -> Option<&Symbol> {
        let mut min = self.config.max_suggestion_distance + 1;
        let mut best = None;
        for frame in self.scopes.iter().rev() {
            let (new_min, candidate) = frame.find_similar(name, min, strsim::levenshtein);
            if let Some(candidate) = candidate {
                best = Some(candidate);
                min = new_min;
            }
        }
        best
    }

    fn with_loop<F: FnOnce(&mut Self)>(&mut self, loop_id: NodeId, f: F) {
        let old = self.cur_loop.replace(loop_id);
        f(self);
        self.cur_loop = old;
    }

    // -- Symbol insertion --

    fn insert_symbol(&mut self, decl: NodeId, name: &Ident, is_value_binding: bool) {
        assert!(!self.scopes.is_empty());
        assert!(!name.name.is_empty());

        // Anonymous identifiers are never bound.
        if name.is_anonymous() {
            return;
        }

        let shadowed = self
            .lookup(&name.name)
            .map(|symbol| symbol.decls[0]);
        let frame = self.scopes.last_mut().expect("scope underflow");
        if !frame.insert(&name.name, decl) {
            let others: Vec<NodeId> = frame
                .find(&name.name)
                .map(|symbol| symbol.decls.clone())
                .unwrap_or_default();
            self.reporter.error(
                Category::Redeclaration,
                name.loc,
                format!("identifier '{}' already declared", name.name),
            );
            for other in others {
                if other != decl {
                    if let Some(view) = self.index.get(other) {
                        self.reporter.note_at(view.loc(), "previously declared here");
                    }
                }
            }
        } else if self.config.warn_on_shadowing && is_value_binding {
            if let Some(shadowed) = shadowed {
                let shadowed_view = self.index.get(shadowed);
                let shadowed_top_level = shadowed_view.is_some_and(|view| view.is_top_level());
                if !shadowed_top_level {
                    self.reporter.warn(
                        Category::Shadowing,
                        name.loc,
                        format!("declaration shadows identifier '{}'", name.name),
                    );
                    if let Some(view) = shadowed_view {
                        self.reporter.note_at(view.loc(), "previously declared here");
                    }
                }
            }
        }
    }

    // -- Paths --

    fn bind_path(&mut self, path: &Path) {
        let head = path.head();
        if head.is_anonymous() {
            self.reporter.error(
                Category::UnresolvedIdentifier,
                head.loc,
                "identifiers beginning with '_' cannot be referenced",
            );
        } else {
            match self.resolve(&head.name) {
                Some(decl) => {
                    self.bindings.path_res.insert(path.id, decl);
                }
                None => {
                    self.reporter.error(
                        Category::UnresolvedIdentifier,
                        head.loc,
                        format!("unknown identifier '{}'", head.name),
                    );
                    if let Some(similar) = self.find_similar_symbol(&head.name) {
                        let suggestion = format!("did you mean '{}'?", similar.name);
                        self.reporter.note(suggestion);
                    }
                }
            }
        }
        // Type arguments are bound on every element of the path.
        for elem in &path.elems {
            for arg in &elem.args {
                self.bind_type(arg);
            }
        }
    }

    // -- Attributes --

    fn bind_attrs(&mut self, attrs: &Option<AttrList>) {
        if let Some(list) = attrs {
            for attr in &list.attrs {
                self.bind_attr(attr);
            }
        }
    }

    fn bind_attr(&mut self, attr: &Attr) {
        match attr {
            Attr::Plain { .. } => {}
            Attr::Path { path, .. } => self.bind_path(path),
            Attr::Named { args, .. } => {
                for arg in args {
                    self.bind_attr(arg);
                }
            }
        }
    }

    // -- Types --

    fn bind_type(&mut self, ty: &TypeAst) {
        match &ty.kind {
            TypeAstKind::Prim(_) | TypeAstKind::Error => {}
            TypeAstKind::Tuple(elems) => {
                for elem in elems {
                    self.bind_type(elem);
                }
            }
            TypeAstKind::Array(elem) => self.bind_type(elem),
            TypeAstKind::Fn { from, to } => {
                self.bind_type(from);
                self.bind_type(to);
            }
            TypeAstKind::Ptr(pointee) => self.bind_type(pointee),
            TypeAstKind::App(path) => self.bind_path(path),
        }
    }

    // -- Patterns --

    fn bind_ptrn(&mut self, ptrn: &Ptrn) {
        match &ptrn.kind {
            PtrnKind::Typed { ptrn, ty } => {
                self.bind_ptrn(ptrn);
                self.bind_type(ty);
            }
            PtrnKind::Id { decl, sub_ptrn } => {
                self.insert_symbol(decl.id, &decl.name, true);
                if let Some(sub) = sub_ptrn {
                    self.bind_ptrn(sub);
                }
            }
            PtrnKind::Literal(_) | PtrnKind::Error => {}
            PtrnKind::Record { path, fields, .. } => {
                self.bind_path(path);
                for field in fields {
                    if let Some(sub) = &field.ptrn {
                        self.bind_ptrn(sub);
                    }
                }
            }
            PtrnKind::Ctor { path, arg } => {
                self.bind_path(path);
                if let Some(arg) = arg {
                    self.bind_ptrn(arg);
                }
            }
            PtrnKind::Tuple(elems) | PtrnKind::Array(elems) => {
                for elem in elems {
                    self.bind_ptrn(elem);
                }
            }
        }
    }

    // -- Expressions --

    fn bind_expr(&mut self, expr: &Expr) {
        self.bind_attrs(&expr.attrs);
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::ImplicitCast { .. } | ExprKind::Error => {}
            ExprKind::Path(path) => self.bind_path(path),
            ExprKind::Tuple(elems) | ExprKind::Array(elems) => {
                for elem in elems {
                    self.bind_expr(elem);
                }
            }
            ExprKind::RepeatArray { elem, .. } => self.bind_expr(elem),
            ExprKind::Record { path, fields } => {
                self.bind_path(path);
                for field in fields {
                    self.bind_expr(&field.expr);
                }
            }
            ExprKind::Block { stmts, .. } => {
                self.push_scope(false);
                for stmt in stmts {
                    if let Stmt::Decl(decl) = stmt {
                        self.bind_decl_head(decl);
                    }
                }
                for stmt in stmts {
                    match stmt {
                        Stmt::Decl(decl) => self.bind_decl(decl),
                        Stmt::Expr(expr) => self.bind_expr(expr),
                    }
                }
                self.pop_scope();
            }
            ExprKind::Call { callee, arg } => {
                self.bind_expr(callee);
                self.bind_expr(arg);
            }
            ExprKind::Unary { arg, .. } => self.bind_expr(arg),
            ExprKind::Binary { left, right, .. } => {
                self.bind_expr(left);
                self.bind_expr(right);
            }
            ExprKind::Proj { expr, .. } => {
                // The field cannot be bound yet: that needs type inference.
                self.bind_expr(expr);
            }
            ExprKind::If {
                cond,
                if_true,
                if_false,
            } => {
                self.push_scope(false);
                self.bind_expr(cond);
                self.bind_expr(if_true);
                self.pop_scope();
                if let Some(if_false) = if_false {
                    self.bind_expr(if_false);
                }
            }
            ExprKind::Match { arg, cases } => {
                self.bind_expr(arg);
                for case in cases {
                    self.push_scope(false);
                    self.bind_ptrn(&case.ptrn);
                    self.bind_expr(&case.expr);
                    self.pop_scope();
                }
            }
            ExprKind::While { cond, body } => {
                self.push_scope(false);
                self.bind_expr(cond);
                self.with_loop(expr.id, |binder| binder.bind_expr(body));
                self.pop_scope();
            }
            ExprKind::For(for_expr) => self.bind_for(expr.id, for_expr),
            ExprKind::Break => {
                match self.cur_loop {
                    Some(loop_id) => {
                        self.bindings.loop_of.insert(expr.id, loop_id);
                    }
                    None => self.reporter.error(
                        Category::OutsideConstruct,
                        expr.loc,
                        format!("use of {} outside of a loop", style::keyword("break")),
                    ),
                }
            }
            ExprKind::Continue => {
                match self.cur_loop {
                    Some(loop_id) => {
                        self.bindings.loop_of.insert(expr.id, loop_id);
                    }
                    None => self.reporter.error(
                        Category::OutsideConstruct,
                        expr.loc,
                        format!("use of {} outside of a loop", style::keyword("continue")),
                    ),
                }
            }
            ExprKind::Return => {
                match self.cur_fn {
                    Some(fn_id) => {
                        self.bindings.fn_of.insert(expr.id, fn_id);
                    }
                    None => self.reporter.error(
                        Category::OutsideConstruct,
                        expr.loc,
                        format!("use of {} outside of a function", style::keyword("return")),
                    ),
                }
            }
            ExprKind::Fn(_) => self.bind_fn_expr(expr, false),
            ExprKind::Cast { expr, ty } => {
                self.bind_expr(expr);
                self.bind_type(ty);
            }
            ExprKind::Asm(asm) => {
                for operand in asm.ins.iter().chain(asm.outs.iter()) {
                    self.bind_expr(&operand.expr);
                }
            }
            ExprKind::Filter { filter, expr } => {
                self.bind_filter(filter);
                self.bind_expr(expr);
            }
            ExprKind::Typed { expr, ty } => {
                self.bind_expr(expr);
                self.bind_type(ty);
            }
        }
    }

    fn bind_filter(&mut self, filter: &Filter) {
        if let Some(expr) = &filter.expr {
            self.bind_expr(expr);
        }
    }

    /// Bind a function literal. For-loop body lambdas keep the enclosing
    /// function's `return`.
    fn bind_fn_expr(&mut self, expr: &Expr, in_for_loop: bool) {
        let ExprKind::Fn(fn_expr) = &expr.kind else {
            unreachable!("bind_fn_expr on a non-function expression");
        };
        self.push_scope(false);
        if let Some(param) = &fn_expr.param {
            self.bind_ptrn(param);
        }
        if let Some(ret_type) = &fn_expr.ret_type {
            self.bind_type(ret_type);
        }
        if let Some(filter) = &fn_expr.filter {
            self.bind_filter(filter);
        }
        self.push_scope(false);
        let old_fn = if in_for_loop {
            None
        } else {
            self.cur_fn.replace(expr.id)
        };
        if let Some(body) = &fn_expr.body {
            self.bind_expr(body);
        }
        if !in_for_loop {
            self.cur_fn = old_fn;
        }
        self.pop_scope();
        self.pop_scope();
    }

    /// The call shape is `iter(|x| { ... })(range)`; `continue()` and
    /// `break()` are only available to the lambda.
    fn bind_for(&mut self, for_id: NodeId, for_expr: &tern_ast::ForExpr) {
        let Some(parts) = for_expr.parts() else {
            self.reporter.error(
                Category::CalleeExpected,
                for_expr.call.loc,
                "malformed for loop",
            );
            return;
        };
        self.bind_expr(parts.iter);
        self.with_loop(for_id, |binder| {
            binder.bind_attrs(&parts.lambda.attrs);
            binder.bind_fn_expr(parts.lambda, true);
        });
        self.bind_expr(parts.range);
    }

    // -- Declarations --

    /// Pre-register the name of a head declaration so that mutually
    /// recursive declarations in the same scope resolve.
    fn bind_decl_head(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Static(static_decl) => self.insert_symbol(decl.id, &static_decl.name, false),
            DeclKind::Fn(fn_decl) => self.insert_symbol(decl.id, &fn_decl.name, false),
            DeclKind::Struct(struct_decl) => self.insert_symbol(decl.id, &struct_decl.name, false),
            DeclKind::Enum(enum_decl) => self.insert_symbol(decl.id, &enum_decl.name, false),
            DeclKind::TypeAlias(alias_decl) => {
                self.insert_symbol(decl.id, &alias_decl.name, false)
            }
            DeclKind::Mod(mod_decl) => {
                if let Some(name) = &mod_decl.name {
                    self.insert_symbol(decl.id, name, false);
                }
            }
            DeclKind::Let(_) | DeclKind::Error => {}
        }
    }

    fn bind_decl(&mut self, decl: &Decl) {
        self.bind_attrs(&decl.attrs);
        match &decl.kind {
            DeclKind::Let(let_decl) => {
                // The initializer sees the outer binding, not the new one.
                if let Some(init) = &let_decl.init {
                    self.bind_expr(init);
                }
                self.bind_ptrn(&let_decl.ptrn);
            }
            DeclKind::Static(static_decl) => {
                if let Some(ty) = &static_decl.ty {
                    self.bind_type(ty);
                }
                if let Some(init) = &static_decl.init {
                    self.bind_expr(init);
                }
            }
            DeclKind::Fn(fn_decl) => {
                self.push_scope(false);
                self.bind_type_params(&fn_decl.type_params);
                let fn_body = fn_decl.fn_expr();
                if fn_body.body.is_some() {
                    self.bind_fn_expr(&fn_decl.fn_expr, false);
                } else {
                    // Foreign signature: parameter and return type only.
                    if let Some(param) = &fn_body.param {
                        self.bind_ptrn(param);
                    }
                    if let Some(ret_type) = &fn_body.ret_type {
                        self.bind_type(ret_type);
                    }
                }
                self.pop_scope();
            }
            DeclKind::Struct(struct_decl) => {
                self.push_scope(false);
                self.bind_type_params(&struct_decl.type_params);
                for field in &struct_decl.fields {
                    self.bind_type(&field.ty);
                    if let Some(init) = &field.init {
                        self.bind_expr(init);
                    }
                }
                self.pop_scope();
            }
            DeclKind::Enum(enum_decl) => {
                self.push_scope(false);
                self.bind_type_params(&enum_decl.type_params);
                for option in &enum_decl.options {
                    if let Some(param) = &option.param {
                        self.bind_type(param);
                    }
                    self.insert_symbol(option.id, &option.name, false);
                }
                self.pop_scope();
            }
            DeclKind::TypeAlias(alias_decl) => {
                self.push_scope(false);
                self.bind_type_params(&alias_decl.type_params);
                self.bind_type(&alias_decl.aliased);
                self.pop_scope();
            }
            DeclKind::Mod(mod_decl) => self.bind_mod(mod_decl),
            DeclKind::Error => {}
        }
    }

    fn bind_type_params(&mut self, params: &Option<tern_ast::TypeParamList>) {
        if let Some(list) = params {
            for param in &list.params {
                self.insert_symbol(param.id, &param.name, false);
            }
        }
    }

    /// Symbols defined outside a module are not visible inside it.
    fn bind_mod(&mut self, module: &ModDecl) {
        let old_scopes = std::mem::take(&mut self.scopes);
        self.push_scope(true);
        for decl in &module.decls {
            self.bind_decl_head(decl);
        }
        for decl in &module.decls {
            self.bind_decl(decl);
        }
        self.pop_scope();
        self.scopes = old_scopes;
    }
}

#[cfg(test)]
mod bind_tests;
