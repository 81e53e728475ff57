//! The continuation-passing IR world for Tern.
//!
//! The CPS emitter lowers typed ASTs into this graph. Every basic block is
//! a lambda whose first parameter is a memory token; value-producing blocks
//! take the value as a second parameter; functions carry a return
//! continuation as their last parameter.
//!
//! Structural definitions (applications, tuples, extracts, literals,
//! primitive ops, wrappers) are hash-consed. Lambdas are nominal: they are
//! created empty and their body is set exactly once. The world serializes
//! deterministically — creation order is traversal order, so two runs over
//! the same AST produce byte-identical dumps.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use tern_types::TypeId;

/// Handle to an IR definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(u32);

/// Handle to an IR type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrTypeId(u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IrTypeData {
    /// The memory token type threaded through effects.
    Mem,
    /// Bottom: the "return type" of continuations.
    Bot,
    Bool,
    /// An embedded semantic type from the checker's world.
    Sem(TypeId),
    /// Continuation type: a function that never returns.
    Cn(Vec<IrTypeId>),
    /// Direct-style function type, as produced by `cps2ds`.
    Fn {
        params: Vec<IrTypeId>,
        ret: IrTypeId,
    },
    Tuple(Vec<IrTypeId>),
}

/// Primitive operations on values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
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
    CmpEq,
    CmpNe,
    CmpLt,
    CmpGt,
    CmpLe,
    CmpGe,
    Not,
    Neg,
    Bitcast,
}

impl PrimOp {
    fn name(self) -> &'static str {
        match self {
            PrimOp::Add => "add",
            PrimOp::Sub => "sub",
            PrimOp::Mul => "mul",
            PrimOp::Div => "div",
            PrimOp::Rem => "rem",
            PrimOp::And => "and",
            PrimOp::Or => "or",
            PrimOp::Xor => "xor",
            PrimOp::Shl => "shl",
            PrimOp::Shr => "shr",
            PrimOp::CmpEq => "cmp_eq",
            PrimOp::CmpNe => "cmp_ne",
            PrimOp::CmpLt => "cmp_lt",
            PrimOp::CmpGt => "cmp_gt",
            PrimOp::CmpLe => "cmp_le",
            PrimOp::CmpGe => "cmp_ge",
            PrimOp::Not => "not",
            PrimOp::Neg => "neg",
            PrimOp::Bitcast => "bitcast",
        }
    }
}

/// The shape of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefData {
    /// A nominal lambda. Its body lives in the world's body table.
    Lam,
    /// The `index`-th parameter of a lambda.
    Param { lam: DefId, index: u32 },
    App { callee: DefId, args: Vec<DefId> },
    Tuple(Vec<DefId>),
    Extract { tuple: DefId, index: DefId },
    Lit { bits: u64 },
    Bot,
    /// Expose a CPS lambda as a direct-style function.
    Cps2Ds(DefId),
    /// Convert a direct-style function back to CPS.
    Ds2Cps(DefId),
    PrimOp { op: PrimOp, args: Vec<DefId> },
    /// Two-way branch on a condition; only valid as a lambda body.
    Branch {
        cond: DefId,
        if_true: DefId,
        if_false: DefId,
        mem: DefId,
    },
}

#[derive(Debug)]
struct Def {
    ty: IrTypeId,
    data: DefData,
    dbg: Option<String>,
}

/// A lambda body: partial-evaluation filter plus terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LamBody {
    pub filter: DefId,
    pub body: DefId,
}

/// The IR world: interner for types and structural defs, arena for lambdas.
#[derive(Debug, Default)]
pub struct IrWorld {
    types: Vec<IrTypeData>,
    interned_types: HashMap<IrTypeData, IrTypeId>,
    defs: Vec<Def>,
    interned_defs: HashMap<(IrTypeId, DefData), DefId>,
    lam_bodies: BTreeMap<DefId, LamBody>,
    externals: Vec<DefId>,
}

impl IrWorld {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Types --

    fn intern_type(&mut self, data: IrTypeData) -> IrTypeId {
        if let Some(&id) = self.interned_types.get(&data) {
            return id;
        }
        let id = IrTypeId(self.types.len() as u32);
        self.types.push(data.clone());
        self.interned_types.insert(data, id);
        id
    }

    pub fn type_mem(&mut self) -> IrTypeId {
        self.intern_type(IrTypeData::Mem)
    }

    pub fn type_bot(&mut self) -> IrTypeId {
        self.intern_type(IrTypeData::Bot)
    }

    pub fn type_bool(&mut self) -> IrTypeId {
        self.intern_type(IrTypeData::Bool)
    }

    /// Embed a semantic type.
    pub fn sem(&mut self, ty: TypeId) -> IrTypeId {
        self.intern_type(IrTypeData::Sem(ty))
    }

    pub fn cn(&mut self, params: Vec<IrTypeId>) -> IrTypeId {
        self.intern_type(IrTypeData::Cn(params))
    }

    pub fn fn_type(&mut self, params: Vec<IrTypeId>, ret: IrTypeId) -> IrTypeId {
        self.intern_type(IrTypeData::Fn { params, ret })
    }

    pub fn tuple_type(&mut self, elems: Vec<IrTypeId>) -> IrTypeId {
        self.intern_type(IrTypeData::Tuple(elems))
    }

    /// Basic-block type: `cn(mem)` or `cn(mem, T)` when the block carries a
    /// value.
    pub fn type_bb(&mut self, value: Option<TypeId>) -> IrTypeId {
        let mem = self.type_mem();
        match value {
            None => self.cn(vec![mem]),
            Some(ty) => {
                let val = self.sem(ty);
                self.cn(vec![mem, val])
            }
        }
    }

    pub fn is_cn(&self, ty: IrTypeId) -> bool {
        matches!(self.types[ty.0 as usize], IrTypeData::Cn(_))
    }

    fn cn_params(&self, ty: IrTypeId) -> Option<&[IrTypeId]> {
        match &self.types[ty.0 as usize] {
            IrTypeData::Cn(params) => Some(params),
            _ => None,
        }
    }

    fn fn_parts(&self, ty: IrTypeId) -> Option<(&[IrTypeId], IrTypeId)> {
        match &self.types[ty.0 as usize] {
            IrTypeData::Fn { params, ret } => Some((params, *ret)),
            _ => None,
        }
    }

    fn tuple_elems(&self, ty: IrTypeId) -> Option<&[IrTypeId]> {
        match &self.types[ty.0 as usize] {
            IrTypeData::Tuple(elems) => Some(elems),
            _ => None,
        }
    }

    // -- Definitions --

    fn intern_def(&mut self, ty: IrTypeId, data: DefData, dbg: Option<String>) -> DefId {
        let key = (ty, data.clone());
        if let Some(&id) = self.interned_defs.get(&key) {
            return id;
        }
        let id = DefId(self.defs.len() as u32);
        self.defs.push(Def { ty, data, dbg });
        self.interned_defs.insert(key, id);
        id
    }

    pub fn ty_of(&self, def: DefId) -> IrTypeId {
        self.defs[def.0 as usize].ty
    }

    pub fn data(&self, def: DefId) -> &DefData {
        &self.defs[def.0 as usize].data
    }

    pub fn dbg(&self, def: DefId) -> Option<&str> {
        self.defs[def.0 as usize].dbg.as_deref()
    }

    /// Allocate a nominal lambda of continuation type `ty`.
    pub fn lam(&mut self, ty: IrTypeId, dbg: impl Into<String>) -> DefId {
        debug_assert!(self.is_cn(ty), "lambdas have continuation type");
        let id = DefId(self.defs.len() as u32);
        self.defs.push(Def {
            ty,
            data: DefData::Lam,
            dbg: Some(dbg.into()),
        });
        id
    }

    pub fn num_params(&self, lam: DefId) -> usize {
        self.cn_params(self.ty_of(lam)).map_or(0, |p| p.len())
    }

    pub fn param(&mut self, lam: DefId, index: u32) -> DefId {
        let ty = self.cn_params(self.ty_of(lam)).expect("param of a non-lambda")
            [index as usize];
        self.intern_def(ty, DefData::Param { lam, index }, None)
    }

    /// The return continuation: the last parameter of a function lambda.
    pub fn ret_param(&mut self, lam: DefId) -> DefId {
        let last = self.num_params(lam) as u32 - 1;
        self.param(lam, last)
    }

    /// Set a lambda's body. Bodies are single-assignment.
    pub fn set_body(&mut self, lam: DefId, filter: DefId, body: DefId) {
        debug_assert!(matches!(self.data(lam), DefData::Lam));
        let prev = self.lam_bodies.insert(lam, LamBody { filter, body });
        debug_assert!(prev.is_none(), "lambda body set twice");
    }

    pub fn lam_body(&self, lam: DefId) -> Option<LamBody> {
        self.lam_bodies.get(&lam).copied()
    }

    /// Build an application. A continuation applied to arguments has type
    /// bottom; a direct-style function application has the function's
    /// return type.
    pub fn app(&mut self, callee: DefId, args: Vec<DefId>) -> DefId {
        let callee_ty = self.ty_of(callee);
        let ty = if let Some((_, ret)) = self.fn_parts(callee_ty) {
            ret
        } else {
            self.type_bot()
        };
        self.intern_def(ty, DefData::App { callee, args }, None)
    }

    /// Make `app(callee, args)` the body of `lam`.
    pub fn set_app(&mut self, lam: DefId, callee: DefId, args: Vec<DefId>) {
        let app = self.app(callee, args);
        let filter = self.lit_false();
        self.set_body(lam, filter, app);
    }

    /// Make a two-way branch the body of `lam`.
    pub fn set_branch(&mut self, lam: DefId, cond: DefId, if_true: DefId, if_false: DefId, mem: DefId) {
        let bot = self.type_bot();
        let branch = self.intern_def(
            bot,
            DefData::Branch {
                cond,
                if_true,
                if_false,
                mem,
            },
            None,
        );
        let filter = self.lit_false();
        self.set_body(lam, filter, branch);
    }

    pub fn tuple(&mut self, elems: Vec<DefId>) -> DefId {
        let elem_tys = elems.iter().map(|&e| self.ty_of(e)).collect();
        let ty = self.tuple_type(elem_tys);
        self.intern_def(ty, DefData::Tuple(elems), None)
    }

    /// The empty tuple.
    pub fn unit(&mut self) -> DefId {
        self.tuple(Vec::new())
    }

    /// Extract at a constant index. The result type follows the tuple type
    /// when it is known.
    pub fn extract(&mut self, tuple: DefId, index: u64) -> DefId {
        let elem_ty = self
            .tuple_elems(self.ty_of(tuple))
            .and_then(|elems| elems.get(index as usize))
            .copied();
        let ty = match elem_ty {
            Some(ty) => ty,
            None => self.type_bot(),
        };
        let idx = self.lit_index(index);
        self.intern_def(ty, DefData::Extract { tuple, index: idx }, None)
    }

    /// Extract at a computed index, with the element type supplied by the
    /// caller (the IR does not know semantic array element types).
    pub fn extract_at(&mut self, tuple: DefId, index: DefId, ty: IrTypeId) -> DefId {
        self.intern_def(ty, DefData::Extract { tuple, index }, None)
    }

    fn lit_index(&mut self, value: u64) -> DefId {
        let ty = self.type_bot();
        self.intern_def(ty, DefData::Lit { bits: value }, None)
    }

    pub fn lit(&mut self, ty: IrTypeId, bits: u64) -> DefId {
        self.intern_def(ty, DefData::Lit { bits }, None)
    }

    pub fn lit_true(&mut self) -> DefId {
        let ty = self.type_bool();
        self.lit(ty, 1)
    }

    pub fn lit_false(&mut self) -> DefId {
        let ty = self.type_bool();
        self.lit(ty, 0)
    }

    pub fn bot(&mut self, ty: IrTypeId) -> DefId {
        self.intern_def(ty, DefData::Bot, None)
    }

    pub fn primop(&mut self, op: PrimOp, args: Vec<DefId>, ty: IrTypeId) -> DefId {
        self.intern_def(ty, DefData::PrimOp { op, args }, None)
    }

    /// Wrap a CPS lambda `cn(mem, D, cn(mem, C))` as a direct-style
    /// function `fn(mem, D) -> (mem, C)`.
    pub fn cps2ds(&mut self, cps: DefId) -> DefId {
        let params = self
            .cn_params(self.ty_of(cps))
            .expect("cps2ds of a non-continuation")
            .to_vec();
        debug_assert_eq!(params.len(), 3, "function lambdas take mem, arg, ret");
        let ret_params = self
            .cn_params(params[2])
            .expect("return continuation type")
            .to_vec();
        let ret = self.tuple_type(ret_params);
        let ty = self.fn_type(vec![params[0], params[1]], ret);
        self.intern_def(ty, DefData::Cps2Ds(cps), None)
    }

    /// Unwrap `cps2ds`, when the definition is such a wrapper.
    pub fn cps_of(&self, def: DefId) -> Option<DefId> {
        match self.data(def) {
            DefData::Cps2Ds(cps) => Some(*cps),
            _ => None,
        }
    }

    /// Convert a direct-style function back into a continuation that takes
    /// the argument and a return continuation.
    pub fn ds2cps(&mut self, ds: DefId) -> DefId {
        let (params, ret) = self.fn_parts(self.ty_of(ds)).expect("ds2cps of a non-function");
        let (params, ret) = (params.to_vec(), ret);
        let ret_elems = self.tuple_elems(ret).map(|e| e.to_vec()).unwrap_or_default();
        let ret_cn = self.cn(ret_elems);
        let mut cn_params = params;
        cn_params.push(ret_cn);
        let ty = self.cn(cn_params);
        self.intern_def(ty, DefData::Ds2Cps(ds), None)
    }

    /// Like [`ds2cps`](Self::ds2cps), for values whose function type is
    /// only known semantically: the caller supplies the continuation type.
    pub fn ds2cps_typed(&mut self, ds: DefId, cn_ty: IrTypeId) -> DefId {
        debug_assert!(self.is_cn(cn_ty));
        self.intern_def(cn_ty, DefData::Ds2Cps(ds), None)
    }

    // -- Externals and serialization --

    pub fn make_external(&mut self, lam: DefId) {
        if !self.externals.contains(&lam) {
            self.externals.push(lam);
        }
    }

    pub fn externals(&self) -> &[DefId] {
        &self.externals
    }

    /// Canonical textual dump: definitions in creation order, then lambda
    /// bodies. Byte-identical across runs on the same input.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, def) in self.defs.iter().enumerate() {
            let _ = write!(out, "d{i}: {} = ", self.type_str(def.ty));
            match &def.data {
                DefData::Lam => out.push_str("lam"),
                DefData::Param { lam, index } => {
                    let _ = write!(out, "param({}, {index})", lam.0);
                }
                DefData::App { callee, args } => {
                    let _ = write!(out, "app(d{}", callee.0);
                    for arg in args {
                        let _ = write!(out, ", d{}", arg.0);
                    }
                    out.push(')');
                }
                DefData::Tuple(elems) => {
                    out.push('(');
                    for (j, elem) in elems.iter().enumerate() {
                        if j > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "d{}", elem.0);
                    }
                    out.push(')');
                }
                DefData::Extract { tuple, index } => {
                    let _ = write!(out, "extract(d{}, d{})", tuple.0, index.0);
                }
                DefData::Lit { bits } => {
                    let _ = write!(out, "lit {bits}");
                }
                DefData::Bot => out.push_str("bot"),
                DefData::Cps2Ds(cps) => {
                    let _ = write!(out, "cps2ds(d{})", cps.0);
                }
                DefData::Ds2Cps(ds) => {
                    let _ = write!(out, "ds2cps(d{})", ds.0);
                }
                DefData::PrimOp { op, args } => {
                    let _ = write!(out, "{}(", op.name());
                    for (j, arg) in args.iter().enumerate() {
                        if j > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "d{}", arg.0);
                    }
                    out.push(')');
                }
                DefData::Branch {
                    cond,
                    if_true,
                    if_false,
                    mem,
                } => {
                    let _ = write!(
                        out,
                        "branch(d{}, d{}, d{}, d{})",
                        cond.0, if_true.0, if_false.0, mem.0
                    );
                }
            }
            if let Some(dbg) = &def.dbg {
                let _ = write!(out, " [{dbg}]");
            }
            out.push('\n');
        }
        for (lam, body) in &self.lam_bodies {
            let _ = writeln!(out, "d{}.body = d{} if d{}", lam.0, body.body.0, body.filter.0);
        }
        for ext in &self.externals {
            let _ = writeln!(out, "external d{}", ext.0);
        }
        out
    }

    fn type_str(&self, ty: IrTypeId) -> String {
        match &self.types[ty.0 as usize] {
            IrTypeData::Mem => "mem".to_string(),
            IrTypeData::Bot => "!".to_string(),
            IrTypeData::Bool => "bool".to_string(),
            IrTypeData::Sem(sem) => format!("sem{}", sem.as_u32()),
            IrTypeData::Cn(params) => {
                let inner: Vec<String> = params.iter().map(|&p| self.type_str(p)).collect();
                format!("cn[{}]", inner.join(", "))
            }
            IrTypeData::Fn { params, ret } => {
                let inner: Vec<String> = params.iter().map(|&p| self.type_str(p)).collect();
                format!("fn[{}] -> {}", inner.join(", "), self.type_str(*ret))
            }
            IrTypeData::Tuple(elems) => {
                let inner: Vec<String> = elems.iter().map(|&e| self.type_str(e)).collect();
                format!("({})", inner.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_types::TypeWorld;

    #[test]
    fn structural_defs_are_interned() {
        let mut world = IrWorld::new();
        let a = world.lit_true();
        let b = world.lit_true();
        assert_eq!(a, b);
        let t1 = world.tuple(vec![a, b]);
        let t2 = world.tuple(vec![a, a]);
        assert_eq!(t1, t2);
    }

    #[test]
    fn lambdas_are_nominal() {
        let mut world = IrWorld::new();
        let bb = world.type_bb(None);
        let l1 = world.lam(bb, "a");
        let l2 = world.lam(bb, "a");
        assert_ne!(l1, l2);
    }

    #[test]
    fn cps2ds_round_trip_types() {
        let mut types = TypeWorld::new();
        let i32_ty = types.type_sint(32);
        let mut world = IrWorld::new();
        let mem = world.type_mem();
        let arg = world.sem(i32_ty);
        let ret_cn = world.cn(vec![mem, arg]);
        let fn_cn = world.cn(vec![mem, arg, ret_cn]);
        let lam = world.lam(fn_cn, "f");
        let ds = world.cps2ds(lam);
        assert!(!world.is_cn(world.ty_of(ds)));
        let cps_again = world.ds2cps(ds);
        assert_eq!(world.ty_of(cps_again), fn_cn);
        assert_eq!(world.cps_of(ds), Some(lam));
    }

    #[test]
    fn app_of_continuation_is_bottom_typed() {
        let mut world = IrWorld::new();
        let bb = world.type_bb(None);
        let lam = world.lam(bb, "bb");
        let mem_lam = world.lam(bb, "entry");
        let mem = world.param(mem_lam, 0);
        let app = world.app(lam, vec![mem]);
        let bot = world.type_bot();
        assert_eq!(world.ty_of(app), bot);
    }

    #[test]
    fn serialization_is_deterministic() {
        let build = || {
            let mut types = TypeWorld::new();
            let i32_ty = types.type_sint(32);
            let mut world = IrWorld::new();
            let bb = world.type_bb(Some(i32_ty));
            let lam = world.lam(bb, "join");
            let val = world.param(lam, 1);
            let mem = world.param(lam, 0);
            let other = world.lam(bb, "target");
            world.set_app(lam, other, vec![mem, val]);
            world.make_external(lam);
            world.serialize()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn set_body_is_single_assignment() {
        let mut world = IrWorld::new();
        let bb = world.type_bb(None);
        let lam = world.lam(bb, "bb");
        let target = world.lam(bb, "t");
        let mem = world.param(lam, 0);
        world.set_app(lam, target, vec![mem]);
        assert!(world.lam_body(lam).is_some());
    }
}
