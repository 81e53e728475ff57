//! End-to-end pipeline tests: bind, check and emit over hand-built
//! modules, plus the cross-pass invariants (determinism, idempotence,
//! warning accounting).

use tern::{AnalyzerConfig, analyze_module};
use tern_ast::build::AstBuilder;
use tern_ast::{ModDecl, Stmt};
use tern_diag::Severity;

/// `fn f(x: i32) -> i32 { x }`
fn identity_module(b: &mut AstBuilder) -> ModDecl {
    let x = b.id_ptrn("x");
    let i32_ty = b.i32_ty();
    let param = b.typed_ptrn(x, i32_ty);
    let ret = b.i32_ty();
    let use_x = b.path_expr("x");
    let body = b.block(vec![Stmt::Expr(use_x)], false);
    let f = b.fn_decl("f", &[], Some(param), Some(ret), Some(body));
    b.module(vec![f])
}

#[test]
fn clean_module_passes_all_three_passes() {
    let mut b = AstBuilder::new();
    let module = identity_module(&mut b);
    let analysis = analyze_module(&module, &AnalyzerConfig::default());
    assert!(analysis.ok(), "{:?}", analysis.diagnostics);
    assert!(analysis.diagnostics.is_empty());
    assert_eq!(analysis.ir.externals().len(), 1);
    assert!(!analysis.types.is_empty());
    assert!(!analysis.defs.is_empty());
}

#[test]
fn every_resolved_path_gets_a_type_and_a_def() {
    let mut b = AstBuilder::new();
    let module = identity_module(&mut b);
    let analysis = analyze_module(&module, &AnalyzerConfig::default());
    assert!(analysis.ok());
    for (&path_id, _) in analysis.bindings.path_res.iter() {
        assert!(analysis.types.get(path_id).is_some());
        assert!(analysis.defs.get(path_id).is_some());
    }
}

#[test]
fn analysis_is_idempotent_across_runs() {
    let run = || {
        let mut b = AstBuilder::new();
        let module = identity_module(&mut b);
        let analysis = analyze_module(&module, &AnalyzerConfig::default());
        let diagnostics: Vec<String> = analysis
            .diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect();
        (diagnostics, analysis.ir.serialize())
    };
    let (diags_a, ir_a) = run();
    let (diags_b, ir_b) = run();
    assert_eq!(diags_a, diags_b);
    assert_eq!(ir_a, ir_b);
}

#[test]
fn binding_failure_stops_the_pipeline() {
    // fn f() { ghost }
    let mut b = AstBuilder::new();
    let use_ghost = b.path_expr("ghost");
    let body = b.block(vec![Stmt::Expr(use_ghost)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let analysis = analyze_module(&module, &AnalyzerConfig::default());
    assert!(!analysis.bind_ok);
    assert!(!analysis.check_ok);
    assert!(!analysis.emit_ok);
    assert!(analysis.types.is_empty());
    assert!(analysis.defs.is_empty());
    assert!(!analysis.diagnostics.is_empty());
}

#[test]
fn warnings_do_not_fail_the_pipeline() {
    // fn f() { let dead = 1; () }
    let mut b = AstBuilder::new();
    let ptrn = b.id_ptrn("dead");
    let one = b.int(1);
    let let_decl = b.let_(ptrn, Some(one));
    let unit = b.unit();
    let body = b.block(vec![Stmt::Decl(let_decl), Stmt::Expr(unit)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let analysis = analyze_module(&module, &AnalyzerConfig::default());
    assert!(analysis.ok(), "{:?}", analysis.diagnostics);
    let warnings = analysis
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    assert_eq!(warnings, 1);
}

#[test]
fn unused_warning_count_matches_dead_bindings() {
    // fn f() { let a = 1; let b = 2; let _c = 3; () } — two warnings.
    let mut b = AstBuilder::new();
    let a_ptrn = b.id_ptrn("a");
    let one = b.int(1);
    let a_let = b.let_(a_ptrn, Some(one));
    let b_ptrn = b.id_ptrn("b");
    let two = b.int(2);
    let b_let = b.let_(b_ptrn, Some(two));
    let c_ptrn = b.id_ptrn("_c");
    let three = b.int(3);
    let c_let = b.let_(c_ptrn, Some(three));
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
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let analysis = analyze_module(&module, &AnalyzerConfig::default());
    let unused: Vec<_> = analysis
        .diagnostics
        .iter()
        .filter(|d| d.message.starts_with("unused identifier"))
        .collect();
    assert_eq!(unused.len(), 2);
}

#[test]
fn warnings_can_be_turned_off() {
    let mut b = AstBuilder::new();
    let ptrn = b.id_ptrn("dead");
    let one = b.int(1);
    let let_decl = b.let_(ptrn, Some(one));
    let unit = b.unit();
    let body = b.block(vec![Stmt::Decl(let_decl), Stmt::Expr(unit)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let config = AnalyzerConfig {
        warn_unused: false,
        warn_on_shadowing: false,
        ..AnalyzerConfig::default()
    };
    let analysis = analyze_module(&module, &config);
    assert!(analysis.ok());
    assert!(analysis.diagnostics.is_empty());
}

#[test]
fn rendered_diagnostics_carry_codes_and_locations() {
    let mut b = AstBuilder::new();
    let use_ghost = b.path_expr("ghost");
    let body = b.block(vec![Stmt::Expr(use_ghost)], false);
    let f = b.fn_decl("f", &[], None, None, Some(body));
    let module = b.module(vec![f]);

    let analysis = analyze_module(&module, &AnalyzerConfig::default());
    let rendered = analysis.diagnostics[0].to_string();
    assert!(rendered.starts_with("error[E0001]: unknown identifier 'ghost'"));
}
