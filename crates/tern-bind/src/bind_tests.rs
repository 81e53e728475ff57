//! Tests for name resolution.
//!
//! Each test builds a module by hand, runs the binder, and checks the
//! resolution tables and diagnostics.

use tern_ast::build::AstBuilder;
use tern_ast::{DeclIndex, DeclKind, ExprKind, ModDecl, PtrnKind, Stmt};
use tern_diag::{Category, Reporter, Severity};

use crate::{BinderConfig, Bindings, NameBinder};

fn bind(module: &ModDecl) -> (Bindings, bool, Reporter) {
    bind_with(module, BinderConfig::default())
}

fn bind_with(module: &ModDecl, config: BinderConfig) -> (Bindings, bool, Reporter) {
    let index = DeclIndex::build(module);
    let mut reporter = Reporter::new();
    let binder = NameBinder::new(&index, config, &mut reporter);
    let (bindings, ok) = binder.run(module);
    (bindings, ok, reporter)
}

fn messages(reporter: &Reporter) -> Vec<String> {
    reporter
        .diagnostics()
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn path_resolves_to_let_binding() {
    // fn use_x() { let x = 1; x }
    let mut b = AstBuilder::new();
    let ptrn = b.id_ptrn("x");
    let decl_id = match &ptrn.kind {
        PtrnKind::Id { decl, .. } => decl.id,
        _ => unreachable!(),
    };
    let one = b.int(1);
    let let_decl = b.let_(ptrn, Some(one));
    let use_x = b.path_expr("x");
    let path_id = match &use_x.kind {
        ExprKind::Path(path) => path.id,
        _ => unreachable!(),
    };
    let body = b.block(vec![Stmt::Decl(let_decl), Stmt::Expr(use_x)], false);
    let f = b.fn_decl("use_x", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let (bindings, ok, _) = bind(&module);
    assert!(ok);
    assert_eq!(bindings.path_res.get(&path_id), Some(&decl_id));
}

#[test]
fn while_loop_captures_break_and_continue() {
    // fn loop_() { while true { break() } }
    let mut b = AstBuilder::new();
    let brk = b.break_();
    let brk_id = brk.id;
    let brk_call = b.call0(brk);
    let body = b.block(vec![Stmt::Expr(brk_call)], false);
    let cond = b.bool_lit(true);
    let while_expr = b.while_(cond, body);
    let while_id = while_expr.id;
    let fn_body = b.block(vec![Stmt::Expr(while_expr)], false);
    let f = b.fn_decl("loop_", &[], None, None, Some(fn_body));
    let module = b.module(vec![f]);

    let (bindings, ok, reporter) = bind(&module);
    assert!(ok, "{:?}", messages(&reporter));
    assert_eq!(reporter.error_count(), 0);
    assert_eq!(bindings.loop_of.get(&brk_id), Some(&while_id));
}

#[test]
fn break_outside_loop_is_an_error() {
    let mut b = AstBuilder::new();
    let brk = b.break_();
    let brk_call = b.call0(brk);
    let body = b.block(vec![Stmt::Expr(brk_call)], false);
    let f = b.fn_decl("bad", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let (_, ok, reporter) = bind(&module);
    assert!(!ok);
    assert!(
        messages(&reporter)
            .iter()
            .any(|m| m == "use of 'break' outside of a loop"),
        "{:?}",
        messages(&reporter)
    );
}

#[test]
fn return_outside_function_is_an_error() {
    let mut b = AstBuilder::new();
    let ret = b.return_();
    let init = b.call0(ret);
    let ptrn = b.id_ptrn("_r");
    let let_decl = b.let_(ptrn, Some(init));
    let mut module = b.module(vec![let_decl]);
    // Keep the declaration top-level so no function encloses the return.
    module.decls[0].is_top_level = true;

    let (_, ok, reporter) = bind(&module);
    assert!(!ok);
    assert!(
        messages(&reporter)
            .iter()
            .any(|m| m == "use of 'return' outside of a function")
    );
}

#[test]
fn return_in_for_body_binds_enclosing_function() {
    // fn f() { for x in iter(range) { return() } } — the body lambda does
    // not capture `return`.
    let mut b = AstBuilder::new();
    let ret = b.return_();
    let ret_id = ret.id;
    let ret_call = b.call0(ret);
    let loop_body = b.block(vec![Stmt::Expr(ret_call)], false);
    let iter = b.path_expr("iterate");
    let param = b.id_ptrn("x");
    let range = b.int(10);
    let for_expr = b.for_(iter, Some(param), loop_body, range);
    let for_id = for_expr.id;
    let fn_body = b.block(vec![Stmt::Expr(for_expr)], false);
    let iter_param = b.id_ptrn("_n");
    let iterate = b.fn_decl("iterate", &[], Some(iter_param), None, None);
    let f = b.fn_decl("f", &[], None, None, Some(fn_body));
    let fn_expr_id = match &f.kind {
        DeclKind::Fn(fn_decl) => fn_decl.fn_expr.id,
        _ => unreachable!(),
    };
    let module = b.module(vec![iterate, f]);

    let (bindings, ok, reporter) = bind(&module);
    assert!(ok, "{:?}", messages(&reporter));
    assert_eq!(bindings.fn_of.get(&ret_id), Some(&fn_expr_id));
    // `break`/`continue` would bind to the for loop itself.
    assert!(bindings.loop_of.values().all(|&l| l == for_id) || bindings.loop_of.is_empty());
}

#[test]
fn unknown_identifier_suggests_similar_name() {
    // fn f() { let banana = 1; banan }
    let mut b = AstBuilder::new();
    let ptrn = b.id_ptrn("banana");
    let one = b.int(1);
    let let_decl = b.let_(ptrn, Some(one));
    let use_bad = b.path_expr("banan");
    let body = b.block(vec![Stmt::Decl(let_decl), Stmt::Expr(use_bad)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let (_, ok, reporter) = bind(&module);
    assert!(!ok);
    let diag = reporter
        .diagnostics()
        .iter()
        .find(|d| d.category == Category::UnresolvedIdentifier)
        .expect("unresolved identifier reported");
    assert_eq!(diag.message, "unknown identifier 'banan'");
    assert!(diag.notes.iter().any(|n| n.message == "did you mean 'banana'?"));
}

#[test]
fn redeclaration_in_same_frame_is_an_error() {
    // fn f(x: i32) { let x = 1; let x = 2; } — the two lets redeclare only
    // if they land in the same frame; use a tuple pattern instead.
    let mut b = AstBuilder::new();
    let first = b.id_ptrn("x");
    let second = b.id_ptrn("x");
    let ptrn = b.tuple_ptrn(vec![first, second]);
    let one = b.int(1);
    let two = b.int(2);
    let init = b.tuple(vec![one, two]);
    let let_decl = b.let_(ptrn, Some(init));
    let use_x = b.path_expr("x");
    let body = b.block(vec![Stmt::Decl(let_decl), Stmt::Expr(use_x)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let (_, ok, reporter) = bind(&module);
    assert!(!ok);
    let diag = reporter
        .diagnostics()
        .iter()
        .find(|d| d.category == Category::Redeclaration)
        .expect("redeclaration reported");
    assert_eq!(diag.message, "identifier 'x' already declared");
    assert!(diag.notes.iter().any(|n| n.message == "previously declared here"));
}

#[test]
fn value_binding_shadowing_warns_once() {
    // fn f() { let x = 1; { let x = 2; x } }
    let mut b = AstBuilder::new();
    let outer_ptrn = b.id_ptrn("x");
    let one = b.int(1);
    let outer_let = b.let_(outer_ptrn, Some(one));
    let inner_ptrn = b.id_ptrn("x");
    let two = b.int(2);
    let inner_let = b.let_(inner_ptrn, Some(two));
    let use_x = b.path_expr("x");
    let inner_block = b.block(vec![Stmt::Decl(inner_let), Stmt::Expr(use_x)], false);
    let use_outer = b.path_expr("x");
    let body = b.block(
        vec![
            Stmt::Decl(outer_let),
            Stmt::Expr(inner_block),
            Stmt::Expr(use_outer),
        ],
        false,
    );
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let (_, ok, reporter) = bind(&module);
    assert!(ok);
    let shadowing: Vec<_> = reporter
        .diagnostics()
        .iter()
        .filter(|d| d.category == Category::Shadowing)
        .collect();
    assert_eq!(shadowing.len(), 1);
    assert_eq!(shadowing[0].message, "declaration shadows identifier 'x'");
    assert_eq!(shadowing[0].severity, Severity::Warning);
}

#[test]
fn shadowing_a_top_level_function_does_not_warn() {
    // fn g() {} fn f() { let g = 1; g }
    let mut b = AstBuilder::new();
    let unit_body = b.block(Vec::new(), false);
    let g = b.fn_decl("g", &[], None, None, Some(unit_body));
    let ptrn = b.id_ptrn("g");
    let one = b.int(1);
    let let_decl = b.let_(ptrn, Some(one));
    let use_g = b.path_expr("g");
    let body = b.block(vec![Stmt::Decl(let_decl), Stmt::Expr(use_g)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![g, f]);

    let (_, ok, reporter) = bind(&module);
    assert!(ok);
    assert!(
        reporter
            .diagnostics()
            .iter()
            .all(|d| d.category != Category::Shadowing)
    );
}

#[test]
fn unused_identifier_warns_with_prefix_hint() {
    // fn f() { let unused = 1; () }
    let mut b = AstBuilder::new();
    let ptrn = b.id_ptrn("unused");
    let one = b.int(1);
    let let_decl = b.let_(ptrn, Some(one));
    let unit = b.unit();
    let body = b.block(vec![Stmt::Decl(let_decl), Stmt::Expr(unit)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let (_, ok, reporter) = bind(&module);
    assert!(ok);
    let diag = reporter
        .diagnostics()
        .iter()
        .find(|d| d.category == Category::UnusedIdentifier)
        .expect("unused identifier reported");
    assert_eq!(diag.message, "unused identifier 'unused'");
    assert!(
        diag.notes
            .iter()
            .any(|n| n.message == "prefix unused identifiers with '_'")
    );
}

#[test]
fn unused_warning_count_matches_unreferenced_bindings() {
    // fn f(used: i32) { let a = used; let b = 1; let _c = 2; () }
    // Exactly one warning: `b`. `a` is... also unused. Two warnings.
    let mut b = AstBuilder::new();
    let param = b.id_ptrn("used");
    let a_ptrn = b.id_ptrn("a");
    let use_used = b.path_expr("used");
    let a_let = b.let_(a_ptrn, Some(use_used));
    let b_ptrn = b.id_ptrn("b");
    let one = b.int(1);
    let b_let = b.let_(b_ptrn, Some(one));
    let c_ptrn = b.id_ptrn("_c");
    let two = b.int(2);
    let c_let = b.let_(c_ptrn, Some(two));
    let unit = b.unit();
    let body = b.block(
        vec![
            Stmt::Decl(a_let),
            Stmt::Decl(b_let),
            Stmt::Decl(c_let),
            Stmt::Expr(unit),
        ],
        false,
    );
    let f = b.fn_decl("f", &[], Some(param), None, Some(body));
    let module = b.module(vec![f]);

    let (_, _, reporter) = bind(&module);
    let unused = reporter
        .diagnostics()
        .iter()
        .filter(|d| d.category == Category::UnusedIdentifier)
        .count();
    // `a` and `b` are never referenced; `used` is; `_c` is anonymous.
    assert_eq!(unused, 2);
    assert_eq!(reporter.warning_count(), 2);
    assert_eq!(reporter.error_count(), 0);
}

#[test]
fn record_fields_and_enum_options_are_exempt_from_unused() {
    let mut b = AstBuilder::new();
    let field_ty = b.i32_ty();
    let s = b.struct_decl("S", &[], vec![("x", field_ty)]);
    let payload = b.i32_ty();
    let e = b.enum_decl("E", &[], vec![("A", None), ("B", Some(payload))]);
    let module = b.module(vec![s, e]);

    let (_, ok, reporter) = bind(&module);
    assert!(ok);
    assert_eq!(reporter.warning_count(), 0);
}

#[test]
fn anonymous_identifiers_cannot_be_referenced() {
    let mut b = AstBuilder::new();
    let use_anon = b.path_expr("_x");
    let body = b.block(vec![Stmt::Expr(use_anon)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let (_, ok, reporter) = bind(&module);
    assert!(!ok);
    assert!(
        messages(&reporter)
            .iter()
            .any(|m| m == "identifiers beginning with '_' cannot be referenced")
    );
}

#[test]
fn module_scope_is_isolated_from_outer_scope() {
    // fn outer() {}  mod m { fn f() { outer } }
    let mut b = AstBuilder::new();
    let unit_body = b.block(Vec::new(), false);
    let outer = b.fn_decl("outer", &[], None, None, Some(unit_body));
    let use_outer = b.path_expr("outer");
    let inner_body = b.block(vec![Stmt::Expr(use_outer)], false);
    let inner_fn = b.fn_decl("f", &[], None, None, Some(inner_body));
    let m = b.mod_decl(Some("m"), vec![inner_fn]);
    let module = b.module(vec![outer, m]);

    let (_, ok, reporter) = bind(&module);
    assert!(!ok);
    assert!(
        messages(&reporter)
            .iter()
            .any(|m| m == "unknown identifier 'outer'")
    );
}

#[test]
fn block_heads_allow_forward_references() {
    // fn f() { g(); fn g() {} } — calling before the declaration works
    // because heads are pre-registered.
    let mut b = AstBuilder::new();
    let use_g = b.path_expr("g");
    let unit = b.unit();
    let call_g = b.call(use_g, unit);
    let unit_body = b.block(Vec::new(), false);
    let g = b.fn_decl("g", &[], None, None, Some(unit_body));
    let body = b.block(vec![Stmt::Expr(call_g), Stmt::Decl(g)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let (_, ok, reporter) = bind(&module);
    assert!(ok, "{:?}", messages(&reporter));
}

#[test]
fn top_level_symbols_never_warn_unused() {
    let mut b = AstBuilder::new();
    let unit_body = b.block(Vec::new(), false);
    let f = b.fn_decl("never_called", &[], None, None, Some(unit_body));
    let module = b.module(vec![f]);

    let (_, ok, reporter) = bind(&module);
    assert!(ok);
    assert_eq!(reporter.warning_count(), 0);
}

#[test]
fn shadowing_warning_can_be_disabled() {
    let mut b = AstBuilder::new();
    let outer_ptrn = b.id_ptrn("x");
    let one = b.int(1);
    let outer_let = b.let_(outer_ptrn, Some(one));
    let inner_ptrn = b.id_ptrn("x");
    let two = b.int(2);
    let inner_let = b.let_(inner_ptrn, Some(two));
    let use_x = b.path_expr("x");
    let inner_block = b.block(vec![Stmt::Decl(inner_let), Stmt::Expr(use_x)], false);
    let use_outer = b.path_expr("x");
    let body = b.block(
        vec![
            Stmt::Decl(outer_let),
            Stmt::Expr(inner_block),
            Stmt::Expr(use_outer),
        ],
        false,
    );
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let config = BinderConfig {
        warn_on_shadowing: false,
        ..BinderConfig::default()
    };
    let (_, ok, reporter) = bind_with(&module, config);
    assert!(ok);
    assert!(
        reporter
            .diagnostics()
            .iter()
            .all(|d| d.category != Category::Shadowing)
    );
}
