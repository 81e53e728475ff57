//! Convenience constructors for building ASTs without a parser.
//!
//! The analysis passes consume trees the parser would normally produce;
//! tests (and embedders) build them through an [`AstBuilder`], which hands
//! out fresh node ids and a uniform location.

use crate::*;

/// Builds AST nodes with fresh ids. One builder per module.
pub struct AstBuilder {
    ids: NodeIdGen,
    file: FileId,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            ids: NodeIdGen::new(),
            file: FileId(0),
        }
    }

    pub fn loc(&self) -> Loc {
        Loc::new(self.file, Pos { row: 1, col: 1 }, Pos { row: 1, col: 1 })
    }

    pub fn ident(&self, name: &str) -> Ident {
        Ident::new(name, self.loc())
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.ids.fresh(),
            loc: self.loc(),
            attrs: None,
            kind,
        }
    }

    // -- Paths --

    pub fn path_expr(&mut self, name: &str) -> Expr {
        let path = self.path(&[name]);
        self.expr(ExprKind::Path(path))
    }

    pub fn path(&mut self, names: &[&str]) -> Path {
        let elems = names
            .iter()
            .map(|name| PathElem {
                ident: self.ident(name),
                args: Vec::new(),
                loc: self.loc(),
            })
            .collect();
        Path {
            id: self.ids.fresh(),
            loc: self.loc(),
            elems,
        }
    }

    pub fn path_with_args(&mut self, names: &[&str], args: Vec<TypeAst>) -> Path {
        let mut path = self.path(names);
        path.elems[0].args = args;
        path
    }

    pub fn path_expr_args(&mut self, name: &str, args: Vec<TypeAst>) -> Expr {
        let path = self.path_with_args(&[name], args);
        self.expr(ExprKind::Path(path))
    }

    // -- Expressions --

    pub fn int(&mut self, value: u64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int(value)))
    }

    pub fn float(&mut self, value: f64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Float(value)))
    }

    pub fn bool_lit(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.expr(ExprKind::Literal(Literal::String(value.to_string())))
    }

    pub fn tuple(&mut self, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Tuple(elems))
    }

    pub fn unit(&mut self) -> Expr {
        self.tuple(Vec::new())
    }

    pub fn array(&mut self, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Array(elems))
    }

    pub fn block(&mut self, stmts: Vec<Stmt>, last_semi: bool) -> Expr {
        self.expr(ExprKind::Block { stmts, last_semi })
    }

    pub fn call(&mut self, callee: Expr, arg: Expr) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            arg: Box::new(arg),
        })
    }

    pub fn unary(&mut self, op: UnOp, arg: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            arg: Box::new(arg),
        })
    }

    pub fn binary(&mut self, op: BinOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn proj(&mut self, expr: Expr, field: &str) -> Expr {
        let field = self.ident(field);
        self.expr(ExprKind::Proj {
            expr: Box::new(expr),
            field,
        })
    }

    pub fn if_(&mut self, cond: Expr, if_true: Expr, if_false: Option<Expr>) -> Expr {
        self.expr(ExprKind::If {
            cond: Box::new(cond),
            if_true: Box::new(if_true),
            if_false: if_false.map(Box::new),
        })
    }

    pub fn case(&mut self, ptrn: Ptrn, expr: Expr) -> Case {
        Case {
            id: self.ids.fresh(),
            loc: self.loc(),
            ptrn,
            expr,
        }
    }

    pub fn match_(&mut self, arg: Expr, cases: Vec<Case>) -> Expr {
        self.expr(ExprKind::Match {
            arg: Box::new(arg),
            cases,
        })
    }

    pub fn while_(&mut self, cond: Expr, body: Expr) -> Expr {
        self.expr(ExprKind::While {
            cond: Box::new(cond),
            body: Box::new(body),
        })
    }

    /// Builds the canonical `for` shape `iter(|param| body)(range)`.
    pub fn for_(&mut self, iter: Expr, param: Option<Ptrn>, body: Expr, range: Expr) -> Expr {
        let lambda = self.fn_expr(param, None, Some(body));
        let inner = self.call(iter, lambda);
        let call = self.call(inner, range);
        self.expr(ExprKind::For(ForExpr {
            call: Box::new(call),
        }))
    }

    pub fn break_(&mut self) -> Expr {
        self.expr(ExprKind::Break)
    }

    pub fn continue_(&mut self) -> Expr {
        self.expr(ExprKind::Continue)
    }

    pub fn return_(&mut self) -> Expr {
        self.expr(ExprKind::Return)
    }

    /// `break()` / `continue()` / `return(arg)` call forms.
    pub fn call0(&mut self, callee: Expr) -> Expr {
        let arg = self.unit();
        self.call(callee, arg)
    }

    pub fn fn_expr(&mut self, param: Option<Ptrn>, ret_type: Option<TypeAst>, body: Option<Expr>) -> Expr {
        self.expr(ExprKind::Fn(FnExpr {
            param: param.map(Box::new),
            ret_type,
            filter: None,
            body: body.map(Box::new),
        }))
    }

    pub fn record(&mut self, path: Path, fields: Vec<(&str, Expr)>) -> Expr {
        let fields = fields
            .into_iter()
            .map(|(name, expr)| FieldExpr {
                id: self.ids.fresh(),
                loc: self.loc(),
                name: self.ident(name),
                expr,
            })
            .collect();
        self.expr(ExprKind::Record { path, fields })
    }

    pub fn cast(&mut self, expr: Expr, ty: TypeAst) -> Expr {
        self.expr(ExprKind::Cast {
            expr: Box::new(expr),
            ty,
        })
    }

    pub fn typed(&mut self, expr: Expr, ty: TypeAst) -> Expr {
        self.expr(ExprKind::Typed {
            expr: Box::new(expr),
            ty,
        })
    }

    // -- Types --

    fn type_ast(&mut self, kind: TypeAstKind) -> TypeAst {
        TypeAst {
            id: self.ids.fresh(),
            loc: self.loc(),
            kind,
        }
    }

    pub fn prim_ty(&mut self, tag: PrimTypeTag) -> TypeAst {
        self.type_ast(TypeAstKind::Prim(tag))
    }

    pub fn i32_ty(&mut self) -> TypeAst {
        self.prim_ty(PrimTypeTag::I32)
    }

    pub fn bool_ty(&mut self) -> TypeAst {
        self.prim_ty(PrimTypeTag::Bool)
    }

    pub fn f64_ty(&mut self) -> TypeAst {
        self.prim_ty(PrimTypeTag::F64)
    }

    pub fn tuple_ty(&mut self, elems: Vec<TypeAst>) -> TypeAst {
        self.type_ast(TypeAstKind::Tuple(elems))
    }

    pub fn unit_ty(&mut self) -> TypeAst {
        self.tuple_ty(Vec::new())
    }

    pub fn array_ty(&mut self, elem: TypeAst) -> TypeAst {
        self.type_ast(TypeAstKind::Array(Box::new(elem)))
    }

    pub fn ptr_ty(&mut self, pointee: TypeAst) -> TypeAst {
        self.type_ast(TypeAstKind::Ptr(Box::new(pointee)))
    }

    pub fn fn_ty(&mut self, from: TypeAst, to: TypeAst) -> TypeAst {
        self.type_ast(TypeAstKind::Fn {
            from: Box::new(from),
            to: Box::new(to),
        })
    }

    pub fn named_ty(&mut self, name: &str) -> TypeAst {
        let path = self.path(&[name]);
        self.type_ast(TypeAstKind::App(path))
    }

    pub fn applied_ty(&mut self, name: &str, args: Vec<TypeAst>) -> TypeAst {
        let path = self.path_with_args(&[name], args);
        self.type_ast(TypeAstKind::App(path))
    }

    // -- Patterns --

    fn ptrn(&mut self, kind: PtrnKind) -> Ptrn {
        Ptrn {
            id: self.ids.fresh(),
            loc: self.loc(),
            kind,
        }
    }

    pub fn id_ptrn(&mut self, name: &str) -> Ptrn {
        self.binding_ptrn(name, false)
    }

    pub fn mut_ptrn(&mut self, name: &str) -> Ptrn {
        self.binding_ptrn(name, true)
    }

    fn binding_ptrn(&mut self, name: &str, is_mut: bool) -> Ptrn {
        let decl = PtrnDecl {
            id: self.ids.fresh(),
            loc: self.loc(),
            name: self.ident(name),
            is_mut,
        };
        self.ptrn(PtrnKind::Id {
            decl,
            sub_ptrn: None,
        })
    }

    pub fn typed_ptrn(&mut self, ptrn: Ptrn, ty: TypeAst) -> Ptrn {
        self.ptrn(PtrnKind::Typed {
            ptrn: Box::new(ptrn),
            ty,
        })
    }

    pub fn tuple_ptrn(&mut self, elems: Vec<Ptrn>) -> Ptrn {
        self.ptrn(PtrnKind::Tuple(elems))
    }

    pub fn lit_ptrn(&mut self, lit: Literal) -> Ptrn {
        self.ptrn(PtrnKind::Literal(lit))
    }

    pub fn ctor_ptrn(&mut self, path: Path, arg: Option<Ptrn>) -> Ptrn {
        self.ptrn(PtrnKind::Ctor {
            path,
            arg: arg.map(Box::new),
        })
    }

    pub fn record_ptrn(&mut self, path: Path, fields: Vec<(&str, Option<Ptrn>)>, etc: bool) -> Ptrn {
        let fields = fields
            .into_iter()
            .map(|(name, ptrn)| FieldPtrn {
                id: self.ids.fresh(),
                loc: self.loc(),
                name: self.ident(name),
                ptrn: ptrn.map(Box::new),
            })
            .collect();
        self.ptrn(PtrnKind::Record { path, fields, etc })
    }

    // -- Declarations --

    fn decl(&mut self, kind: DeclKind) -> Decl {
        Decl {
            id: self.ids.fresh(),
            loc: self.loc(),
            attrs: None,
            is_top_level: false,
            kind,
        }
    }

    pub fn let_(&mut self, ptrn: Ptrn, init: Option<Expr>) -> Decl {
        self.decl(DeclKind::Let(LetDecl { ptrn, init }))
    }

    pub fn static_(&mut self, name: &str, is_mut: bool, ty: Option<TypeAst>, init: Option<Expr>) -> Decl {
        let name = self.ident(name);
        self.decl(DeclKind::Static(StaticDecl {
            name,
            is_mut,
            ty,
            init,
        }))
    }

    pub fn fn_decl(
        &mut self,
        name: &str,
        type_params: &[&str],
        param: Option<Ptrn>,
        ret_type: Option<TypeAst>,
        body: Option<Expr>,
    ) -> Decl {
        let fn_expr = self.fn_expr(param, ret_type, body);
        let type_params = self.type_params(type_params);
        let name = self.ident(name);
        self.decl(DeclKind::Fn(FnDecl {
            name,
            type_params,
            fn_expr,
        }))
    }

    pub fn struct_decl(
        &mut self,
        name: &str,
        type_params: &[&str],
        fields: Vec<(&str, TypeAst)>,
    ) -> Decl {
        let fields = fields
            .into_iter()
            .map(|(field_name, ty)| FieldDecl {
                id: self.ids.fresh(),
                loc: self.loc(),
                name: self.ident(field_name),
                ty,
                init: None,
            })
            .collect();
        let type_params = self.type_params(type_params);
        let name = self.ident(name);
        self.decl(DeclKind::Struct(StructDecl {
            name,
            type_params,
            fields,
        }))
    }

    pub fn enum_decl(
        &mut self,
        name: &str,
        type_params: &[&str],
        options: Vec<(&str, Option<TypeAst>)>,
    ) -> Decl {
        let options = options
            .into_iter()
            .map(|(option_name, param)| OptionDecl {
                id: self.ids.fresh(),
                loc: self.loc(),
                name: self.ident(option_name),
                param,
            })
            .collect();
        let type_params = self.type_params(type_params);
        let name = self.ident(name);
        self.decl(DeclKind::Enum(EnumDecl {
            name,
            type_params,
            options,
        }))
    }

    pub fn alias_decl(&mut self, name: &str, type_params: &[&str], aliased: TypeAst) -> Decl {
        let type_params = self.type_params(type_params);
        let name = self.ident(name);
        self.decl(DeclKind::TypeAlias(TypeAliasDecl {
            name,
            type_params,
            aliased,
        }))
    }

    pub fn mod_decl(&mut self, name: Option<&str>, decls: Vec<Decl>) -> Decl {
        let name = name.map(|n| self.ident(n));
        self.decl(DeclKind::Mod(ModDecl { name, decls }))
    }

    fn type_params(&mut self, names: &[&str]) -> Option<TypeParamList> {
        if names.is_empty() {
            return None;
        }
        let params = names
            .iter()
            .map(|name| TypeParam {
                id: self.ids.fresh(),
                loc: self.loc(),
                name: self.ident(name),
            })
            .collect();
        Some(TypeParamList {
            id: self.ids.fresh(),
            loc: self.loc(),
            params,
        })
    }

    /// Wrap declarations into a root module, marking them top-level.
    pub fn module(&mut self, mut decls: Vec<Decl>) -> ModDecl {
        for decl in &mut decls {
            decl.is_top_level = true;
        }
        ModDecl { name: None, decls }
    }
}
