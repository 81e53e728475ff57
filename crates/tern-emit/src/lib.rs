//! CPS lowering for Tern.
//!
//! The emitter walks a bound, typed module and lowers it into the IR world.
//! It maintains two pieces of state: the current basic block (a lambda
//! being filled) and the current memory token. Entering a block reads the
//! block's first parameter into the token; leaving a block (by jumping or
//! by a terminal call) writes the block's body and relinquishes it.
//!
//! Control-flow constructs become basic-block lambdas: `if` allocates two
//! arms and a join block, `while` a head, a body and a break block, and
//! `for` converts the iterator call between direct style and CPS around
//! the loop body.
//!
//! Constructs that need the missing memory-slot story (assignment,
//! increment/decrement, `match` compilation, enum constructors and
//! polymorphic functions) report an error rather than miscompile.

use std::collections::BTreeMap;

use tern_ast::{
    BinOp, Decl, DeclKind, Expr, ExprKind, Literal, ModDecl, NodeId, Ptrn, PtrnKind, Stmt, UnOp,
};
use tern_bind::Bindings;
use tern_check::TypeTable;
use tern_diag::{Category, Reporter};
use tern_ir::{DefId, IrTypeId, IrWorld, PrimOp};
use tern_types::{TypeId, TypeWorld};

// ---------------------------------------------------------------------------
// Definition table
// ---------------------------------------------------------------------------

/// Side table mapping emitted nodes to their IR definition.
///
/// Value-wise single-assignment: a function head installs its definition
/// before the body is emitted, and the body emission re-installs the same
/// handle.
#[derive(Debug, Default)]
pub struct DefTable {
    defs: BTreeMap<NodeId, DefId>,
}

impl DefTable {
    pub fn get(&self, id: NodeId) -> Option<DefId> {
        self.defs.get(&id).copied()
    }

    fn set(&mut self, id: NodeId, def: DefId) -> DefId {
        if let Some(prev) = self.defs.insert(id, def) {
            debug_assert_eq!(prev, def, "def slot of {id:?} rewritten");
        }
        def
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// The break/continue targets of a loop being emitted.
#[derive(Debug, Clone, Copy)]
struct LoopDefs {
    break_: DefId,
    continue_: DefId,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

pub struct Emitter<'a, 'w, 'i, 'r> {
    bindings: &'a Bindings,
    types: &'a TypeTable,
    world: &'w TypeWorld,
    ir: &'i mut IrWorld,
    reporter: &'r mut Reporter,
    table: DefTable,
    bb: Option<DefId>,
    mem: Option<DefId>,
    loops: BTreeMap<NodeId, LoopDefs>,
    /// Function-literal node → its CPS lambda, installed before the body
    /// is emitted so `return` and recursion resolve.
    fn_lams: BTreeMap<NodeId, DefId>,
}

impl<'a, 'w, 'i, 'r> Emitter<'a, 'w, 'i, 'r> {
    pub fn new(
        bindings: &'a Bindings,
        types: &'a TypeTable,
        world: &'w TypeWorld,
        ir: &'i mut IrWorld,
        reporter: &'r mut Reporter,
    ) -> Self {
        Self {
            bindings,
            types,
            world,
            ir,
            reporter,
            table: DefTable::default(),
            bb: None,
            mem: None,
            loops: BTreeMap::new(),
            fn_lams: BTreeMap::new(),
        }
    }

    /// Emit a whole module. Returns the definition table and whether the
    /// pass produced zero errors.
    pub fn run(mut self, module: &ModDecl) -> (DefTable, bool) {
        let errors_before = self.reporter.error_count();
        for decl in &module.decls {
            self.emit_decl_head(decl);
        }
        for decl in &module.decls {
            self.emit_decl(decl);
        }
        let ok = self.reporter.error_count() == errors_before;
        (self.table, ok)
    }

    // -- Types --

    fn sem_of(&mut self, id: NodeId) -> IrTypeId {
        match self.types.get(id) {
            Some(ty) => self.ir.sem(ty),
            None => self.ir.type_bot(),
        }
    }

    fn bot_of(&mut self, id: NodeId) -> DefId {
        let ty = self.sem_of(id);
        self.ir.bot(ty)
    }

    fn unsupported(&mut self, expr: &Expr, what: &str) -> DefId {
        self.reporter.error(
            Category::Unsupported,
            expr.loc,
            format!("{what} not yet supported by the CPS emitter"),
        );
        self.bot_of(expr.id)
    }

    // -- Basic-block state --

    /// Make `lam` the current block; returns its value parameter, if any.
    fn enter(&mut self, lam: DefId) -> Option<DefId> {
        self.bb = Some(lam);
        self.mem = Some(self.ir.param(lam, 0));
        if self.ir.num_params(lam) > 1 {
            Some(self.ir.param(lam, 1))
        } else {
            None
        }
    }

    /// The standard control-flow edge: apply the current block to the
    /// target and continue in the target.
    fn jump(&mut self, target: DefId, value: Option<DefId>) -> Option<DefId> {
        if let Some(bb) = self.bb {
            let mem = self.mem.expect("jump without a memory token");
            let args = match value {
                Some(value) => vec![mem, value],
                None => vec![mem],
            };
            self.ir.set_app(bb, target, args);
        }
        self.enter(target)
    }

    /// Apply `callee` to the current memory token and `arg`. A call to a
    /// continuation is terminal: it seals the block. A direct-style call
    /// advances the memory token and yields the value.
    fn call(&mut self, callee: DefId, arg: DefId) -> DefId {
        let bb = self.bb.expect("call outside a basic block");
        let mem = self.mem.expect("call without a memory token");
        let res = self.ir.app(callee, vec![mem, arg]);
        if self.ir.is_cn(self.ir.ty_of(callee)) {
            let filter = self.ir.lit_false();
            self.ir.set_body(bb, filter, res);
            self.bb = None;
            self.mem = None;
            res
        } else {
            self.mem = Some(self.ir.extract(res, 0));
            self.ir.extract(res, 1)
        }
    }

    /// Build the CPS lambda for a function of semantic type `pi`:
    /// `cn(mem, dom, cn(mem, cod))`.
    fn emit_lam(&mut self, dom: TypeId, cod: TypeId, dbg: &str) -> DefId {
        let mem = self.ir.type_mem();
        let dom = self.ir.sem(dom);
        let cod = self.ir.sem(cod);
        let ret = self.ir.cn(vec![mem, cod]);
        let cn_ty = self.ir.cn(vec![mem, dom, ret]);
        self.ir.lam(cn_ty, dbg)
    }

    // -- Declarations --

    /// Install the definitions of head declarations so that recursive and
    /// forward references resolve.
    fn emit_decl_head(&mut self, decl: &Decl) {
        let DeclKind::Fn(fn_decl) = &decl.kind else {
            return;
        };
        debug_assert!(self.table.get(decl.id).is_none(), "head emitted twice");
        let Some(fn_ty) = self.types.get(decl.id) else {
            return;
        };
        let Some((dom, cod)) = self.world.as_pi(fn_ty) else {
            // Polymorphic functions need monomorphization first.
            self.reporter.error(
                Category::Unsupported,
                decl.loc,
                "polymorphic functions are not yet supported by the CPS emitter",
            );
            let bot = self.bot_of(decl.id);
            self.table.set(decl.id, bot);
            return;
        };
        let lam = self.emit_lam(dom, cod, &fn_decl.name.name);
        self.ir.make_external(lam);
        let ds = self.ir.cps2ds(lam);
        self.fn_lams.insert(fn_decl.fn_expr.id, lam);
        self.table.set(fn_decl.fn_expr.id, ds);
        self.table.set(decl.id, ds);
    }

    fn emit_decl(&mut self, decl: &Decl) -> DefId {
        match &decl.kind {
            DeclKind::Let(let_decl) => {
                let value = match &let_decl.init {
                    Some(init) => self.emit_expr(init),
                    None => {
                        let ty = self.sem_of(let_decl.ptrn.id);
                        self.ir.bot(ty)
                    }
                };
                self.emit_ptrn(&let_decl.ptrn, value);
                let unit = self.ir.unit();
                self.table.set(decl.id, unit)
            }
            DeclKind::Static(_) => {
                // Globals live in the backend's data segment; the analyzer
                // only reserves the handle.
                let bot = self.bot_of(decl.id);
                self.table.set(decl.id, bot)
            }
            DeclKind::Fn(fn_decl) => {
                if !self.fn_lams.contains_key(&fn_decl.fn_expr.id) {
                    // Head emission rejected this declaration.
                    return match self.table.get(decl.id) {
                        Some(def) => def,
                        None => self.bot_of(decl.id),
                    };
                }
                let def = self.emit_expr(&fn_decl.fn_expr);
                self.table.set(decl.id, def)
            }
            DeclKind::Struct(_) | DeclKind::Enum(_) | DeclKind::TypeAlias(_) => {
                let unit = self.ir.unit();
                self.table.set(decl.id, unit)
            }
            DeclKind::Mod(mod_decl) => {
                for child in &mod_decl.decls {
                    self.emit_decl_head(child);
                }
                for child in &mod_decl.decls {
                    self.emit_decl(child);
                }
                let unit = self.ir.unit();
                self.table.set(decl.id, unit)
            }
            DeclKind::Error => {
                let bot = self.bot_of(decl.id);
                self.table.set(decl.id, bot)
            }
        }
    }

    // -- Patterns --

    fn emit_ptrn(&mut self, ptrn: &Ptrn, value: DefId) {
        match &ptrn.kind {
            PtrnKind::Typed { ptrn: inner, .. } => self.emit_ptrn(inner, value),
            PtrnKind::Id { decl, sub_ptrn } => {
                self.table.set(decl.id, value);
                if let Some(sub) = sub_ptrn {
                    self.emit_ptrn(sub, value);
                }
            }
            PtrnKind::Tuple(elems) => {
                for (i, elem) in elems.iter().enumerate() {
                    let elem_value = self.ir.extract(value, i as u64);
                    self.emit_ptrn(elem, elem_value);
                }
            }
            PtrnKind::Record { fields, .. } => {
                let (nominal, _) = match self.types.get(ptrn.id) {
                    Some(ty) => self.world.applied_nominal(ty),
                    None => return,
                };
                for field in fields {
                    let Some(sub) = &field.ptrn else { continue };
                    let Some(index) = self.world.member_index(nominal, &field.name.name) else {
                        continue;
                    };
                    let field_value = self.ir.extract(value, index as u64);
                    self.emit_ptrn(sub, field_value);
                }
            }
            PtrnKind::Array(elems) => {
                for (i, elem) in elems.iter().enumerate() {
                    let elem_value = self.ir.extract(value, i as u64);
                    self.emit_ptrn(elem, elem_value);
                }
            }
            PtrnKind::Literal(_) | PtrnKind::Ctor { .. } => {
                // Refutable patterns only occur under `match`, which is
                // rejected before reaching here.
            }
            PtrnKind::Error => {}
        }
        self.table.set(ptrn.id, value);
    }

    // -- Expressions --

    fn emit_expr(&mut self, expr: &Expr) -> DefId {
        let def = self.emit_expr_kind(expr);
        self.table.set(expr.id, def)
    }

    fn emit_expr_kind(&mut self, expr: &Expr) -> DefId {
        match &expr.kind {
            ExprKind::Literal(lit) => self.emit_literal(expr, lit),
            ExprKind::Path(path) => {
                if path.elems.len() > 1 {
                    return self.unsupported(expr, "enum constructors are");
                }
                match self
                    .bindings
                    .path_res
                    .get(&path.id)
                    .and_then(|&decl| self.table.get(decl))
                {
                    Some(def) => def,
                    None => self.bot_of(expr.id),
                }
            }
            ExprKind::Typed { expr: inner, .. }
            | ExprKind::ImplicitCast { expr: inner }
            | ExprKind::Filter { expr: inner, .. } => self.emit_expr(inner),
            ExprKind::Tuple(elems) => {
                let defs: Vec<DefId> = elems.iter().map(|e| self.emit_expr(e)).collect();
                self.ir.tuple(defs)
            }
            ExprKind::Array(elems) => {
                let defs: Vec<DefId> = elems.iter().map(|e| self.emit_expr(e)).collect();
                self.ir.tuple(defs)
            }
            ExprKind::RepeatArray { elem, count } => {
                let elem_def = self.emit_expr(elem);
                self.ir.tuple(vec![elem_def; *count as usize])
            }
            ExprKind::Record { fields, .. } => {
                let (nominal, _) = match self.types.get(expr.id) {
                    Some(ty) => self.world.applied_nominal(ty),
                    None => return self.bot_of(expr.id),
                };
                // Field values in declaration order, whatever the source
                // order was.
                let mut slots = vec![None; self.world.num_operands(nominal)];
                for field in fields {
                    let def = self.emit_expr(&field.expr);
                    if let Some(index) = self.world.member_index(nominal, &field.name.name) {
                        slots[index] = Some(def);
                    }
                }
                let defs: Vec<DefId> = slots.into_iter().map(|slot| slot.expect("checked record")).collect();
                self.ir.tuple(defs)
            }
            ExprKind::Proj { expr: inner, field } => {
                let value = self.emit_expr(inner);
                let (nominal, _) = match self.types.get(inner.id) {
                    Some(ty) => self.world.applied_nominal(ty),
                    None => return self.bot_of(expr.id),
                };
                match self.world.member_index(nominal, &field.name) {
                    Some(index) => self.ir.extract(value, index as u64),
                    None => self.bot_of(expr.id),
                }
            }
            ExprKind::Block { stmts, last_semi } => {
                for stmt in stmts {
                    if let Stmt::Decl(decl) = stmt {
                        self.emit_decl_head(decl);
                    }
                }
                let mut last = None;
                for stmt in stmts {
                    last = Some(match stmt {
                        Stmt::Decl(decl) => self.emit_decl(decl),
                        Stmt::Expr(expr) => self.emit_expr(expr),
                    });
                }
                match last {
                    Some(def) if !*last_semi => def,
                    _ => self.ir.unit(),
                }
            }
            ExprKind::Call { callee, arg } => {
                let callee_sem = self.types.get(callee.id);
                let is_index = callee_sem.is_some_and(|ty| self.world.as_variadic(ty).is_some());
                let callee_def = self.emit_expr(callee);
                let arg_def = self.emit_expr(arg);
                if is_index {
                    let elem_ty = self.sem_of(expr.id);
                    self.ir.extract_at(callee_def, arg_def, elem_ty)
                } else {
                    self.call(callee_def, arg_def)
                }
            }
            ExprKind::Unary { op, arg } => {
                if op.is_inc() || op.is_dec() {
                    return self.unsupported(expr, "increment and decrement are");
                }
                let arg_def = self.emit_expr(arg);
                let ty = self.sem_of(expr.id);
                match op {
                    UnOp::Plus => arg_def,
                    UnOp::Minus => self.ir.primop(PrimOp::Neg, vec![arg_def], ty),
                    UnOp::Not => self.ir.primop(PrimOp::Not, vec![arg_def], ty),
                    _ => unreachable!(),
                }
            }
            ExprKind::Binary { op, left, right } => {
                if op.has_eq() {
                    return self.unsupported(expr, "assignment is");
                }
                let left_def = self.emit_expr(left);
                let right_def = self.emit_expr(right);
                let ty = self.sem_of(expr.id);
                let prim = match op {
                    BinOp::Add => PrimOp::Add,
                    BinOp::Sub => PrimOp::Sub,
                    BinOp::Mul => PrimOp::Mul,
                    BinOp::Div => PrimOp::Div,
                    BinOp::Rem => PrimOp::Rem,
                    BinOp::And | BinOp::LogicAnd => PrimOp::And,
                    BinOp::Or | BinOp::LogicOr => PrimOp::Or,
                    BinOp::Xor => PrimOp::Xor,
                    BinOp::Shl => PrimOp::Shl,
                    BinOp::Shr => PrimOp::Shr,
                    BinOp::CmpEq => PrimOp::CmpEq,
                    BinOp::CmpNe => PrimOp::CmpNe,
                    BinOp::CmpLt => PrimOp::CmpLt,
                    BinOp::CmpGt => PrimOp::CmpGt,
                    BinOp::CmpLe => PrimOp::CmpLe,
                    BinOp::CmpGe => PrimOp::CmpGe,
                    _ => unreachable!(),
                };
                self.ir.primop(prim, vec![left_def, right_def], ty)
            }
            ExprKind::If {
                cond,
                if_true,
                if_false,
            } => {
                let if_ty = self.types.get(expr.id);
                let t_ty = self.ir.type_bb(None);
                let j_ty = self.ir.type_bb(if_ty);
                let t = self.ir.lam(t_ty, "if_true");
                let f = self.ir.lam(t_ty, "if_false");
                let j = self.ir.lam(j_ty, "if_join");
                let c = self.emit_expr(cond);
                if let (Some(bb), Some(mem)) = (self.bb, self.mem) {
                    self.ir.set_branch(bb, c, t, f, mem);
                }

                self.enter(t);
                let true_def = self.emit_expr(if_true);
                self.jump(j, Some(true_def));

                self.enter(f);
                let false_def = match if_false {
                    Some(if_false) => self.emit_expr(if_false),
                    None => self.ir.unit(),
                };
                self.jump(j, Some(false_def));

                self.enter(j).expect("join block carries the value")
            }
            ExprKind::While { cond, body } => {
                let bb_ty = self.ir.type_bb(None);
                let hd = self.ir.lam(bb_ty, "while_head");
                let bd = self.ir.lam(bb_ty, "while_body");
                let brk = self.ir.lam(bb_ty, "while_break");
                self.loops.insert(
                    expr.id,
                    LoopDefs {
                        break_: brk,
                        continue_: hd,
                    },
                );

                self.jump(hd, None);
                let c = self.emit_expr(cond);
                if let Some(mem) = self.mem {
                    self.ir.set_branch(hd, c, bd, brk, mem);
                }

                self.enter(bd);
                self.emit_expr(body);
                self.jump(hd, None);

                self.enter(brk);
                self.ir.unit()
            }
            ExprKind::For(for_expr) => self.emit_for(expr, for_expr),
            ExprKind::Break => {
                let target = self
                    .bindings
                    .loop_of
                    .get(&expr.id)
                    .and_then(|loop_id| self.loops.get(loop_id))
                    .copied();
                match target {
                    Some(defs) => defs.break_,
                    None => self.bot_of(expr.id),
                }
            }
            ExprKind::Continue => {
                let target = self
                    .bindings
                    .loop_of
                    .get(&expr.id)
                    .and_then(|loop_id| self.loops.get(loop_id))
                    .copied();
                match target {
                    Some(defs) => defs.continue_,
                    None => self.bot_of(expr.id),
                }
            }
            ExprKind::Return => {
                match self
                    .bindings
                    .fn_of
                    .get(&expr.id)
                    .and_then(|fn_id| self.fn_lams.get(fn_id))
                    .copied()
                {
                    Some(lam) => self.ir.ret_param(lam),
                    None => self.bot_of(expr.id),
                }
            }
            ExprKind::Fn(_) => self.emit_fn_expr(expr),
            ExprKind::Cast { expr: inner, .. } => {
                let value = self.emit_expr(inner);
                let ty = self.sem_of(expr.id);
                self.ir.primop(PrimOp::Bitcast, vec![value], ty)
            }
            ExprKind::Match { .. } => self.unsupported(expr, "match expressions are"),
            // Opaque to the optimizer; the backend fills these in.
            ExprKind::Asm(_) => self.bot_of(expr.id),
            ExprKind::Error => self.bot_of(expr.id),
        }
    }

    fn emit_literal(&mut self, expr: &Expr, lit: &Literal) -> DefId {
        let ty = self.sem_of(expr.id);
        match lit {
            Literal::Bool(true) => self.ir.lit_true(),
            Literal::Bool(false) => self.ir.lit_false(),
            Literal::Int(value) => self.ir.lit(ty, *value),
            Literal::Char(value) => self.ir.lit(ty, u64::from(*value)),
            Literal::Float(value) => {
                let width = self.types.get(expr.id).and_then(|t| self.world.real_width(t));
                match width {
                    Some(32) => self.ir.lit(ty, u64::from((*value as f32).to_bits())),
                    _ => self.ir.lit(ty, value.to_bits()),
                }
            }
            Literal::String(text) => {
                let u8_sem = match self.types.get(expr.id).and_then(|t| self.world.as_variadic(t)) {
                    Some(elem) => self.ir.sem(elem),
                    None => self.ir.type_bot(),
                };
                let bytes: Vec<DefId> = text
                    .bytes()
                    .map(|byte| self.ir.lit(u8_sem, u64::from(byte)))
                    .collect();
                self.ir.tuple(bytes)
            }
        }
    }

    fn emit_fn_expr(&mut self, expr: &Expr) -> DefId {
        let ExprKind::Fn(fn_expr) = &expr.kind else {
            unreachable!("emit_fn_expr on a non-function expression");
        };
        // Named functions get their lambda from head emission; anonymous
        // ones create it here.
        let lam = match self.fn_lams.get(&expr.id).copied() {
            Some(lam) => lam,
            None => {
                let Some((dom, cod)) = self.types.get(expr.id).and_then(|ty| self.world.as_pi(ty))
                else {
                    return self.bot_of(expr.id);
                };
                let lam = self.emit_lam(dom, cod, "fn");
                self.fn_lams.insert(expr.id, lam);
                lam
            }
        };
        // Remember the enclosing block to restore it afterwards.
        let old_bb = self.bb;
        let old_mem = self.mem;
        self.enter(lam);
        if let Some(param) = &fn_expr.param {
            let param_def = self.ir.param(lam, 1);
            self.emit_ptrn(param, param_def);
        }
        if let Some(body) = &fn_expr.body {
            let res = self.emit_expr(body);
            if let (Some(bb), Some(mem)) = (self.bb, self.mem) {
                let ret = self.ir.ret_param(lam);
                self.ir.set_app(bb, ret, vec![mem, res]);
            }
        }
        self.bb = old_bb;
        self.mem = old_mem;
        self.ir.cps2ds(lam)
    }

    /// `(iter(|x| body))(range)` becomes
    /// `(ds2cps (iter (cps2ds body_lam))) (mem, range, break_lam)`.
    fn emit_for(&mut self, expr: &Expr, for_expr: &tern_ast::ForExpr) -> DefId {
        let Some(parts) = for_expr.parts() else {
            return self.bot_of(expr.id);
        };
        let Some((lam_dom, lam_cod)) = self
            .types
            .get(parts.lambda.id)
            .and_then(|ty| self.world.as_pi(ty))
        else {
            return self.bot_of(expr.id);
        };
        // A stub for the loop body; its return continuation is `continue`.
        let bd = self.emit_lam(lam_dom, lam_cod, "for_body");
        let cnt = self.ir.ret_param(bd);
        let break_value = self
            .types
            .get(parts.inner_call.id)
            .and_then(|ty| self.world.as_pi(ty))
            .map(|(_, cod)| cod);
        let brk_ty = self.ir.type_bb(break_value);
        let brk = self.ir.lam(brk_ty, "for_break");

        // Emit the innermost call: iter(|..., cont| { ... }).
        let iter_def = self.emit_expr(parts.iter);
        let bd_ds = self.ir.cps2ds(bd);
        let inner = self.call(iter_def, bd_ds);
        // Convert the resulting direct-style function into CPS and call it
        // with the range and the break continuation. `inner` is typed
        // semantically, so its continuation type is rebuilt here.
        let range_def = self.emit_expr(parts.range);
        let inner_pi = self
            .types
            .get(parts.inner_call.id)
            .and_then(|ty| self.world.as_pi(ty));
        if let (Some(bb), Some(mem), Some((dom, cod))) = (self.bb, self.mem, inner_pi) {
            let mem_ty = self.ir.type_mem();
            let dom_ty = self.ir.sem(dom);
            let cod_ty = self.ir.sem(cod);
            let ret_cn = self.ir.cn(vec![mem_ty, cod_ty]);
            let cn_ty = self.ir.cn(vec![mem_ty, dom_ty, ret_cn]);
            let inner_cps = self.ir.ds2cps_typed(inner, cn_ty);
            self.ir.set_app(bb, inner_cps, vec![mem, range_def, brk]);
        }

        self.loops.insert(
            expr.id,
            LoopDefs {
                break_: brk,
                continue_: cnt,
            },
        );

        self.enter(bd);
        if let Some(param) = &parts.lambda_fn.param {
            let param_def = self.ir.param(bd, 1);
            self.emit_ptrn(param, param_def);
        }
        if let Some(body) = &parts.lambda_fn.body {
            let res = self.emit_expr(body);
            if self.bb.is_some() {
                self.call(cnt, res);
            }
        }

        match self.enter(brk) {
            Some(value) => value,
            None => self.ir.unit(),
        }
    }
}

#[cfg(test)]
mod emit_tests;
