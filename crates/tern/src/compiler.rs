//! The analysis pipeline: bind → check → emit.
//!
//! Each pass runs to completion on the calling thread; a failing pass
//! stops the pipeline, since later passes would only amplify its errors.
//! The result carries every side table plus the diagnostics in emission
//! order, so callers can render or assert on them.

use tern_ast::{DeclIndex, ModDecl};
use tern_bind::{BinderConfig, Bindings, NameBinder};
use tern_check::{TypeChecker, TypeTable};
use tern_diag::{Diagnostic, Reporter};
use tern_emit::{DefTable, Emitter};
use tern_ir::IrWorld;
use tern_types::TypeWorld;

/// Analyzer configuration.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub warn_on_shadowing: bool,
    pub warn_unused: bool,
    /// Maximum edit distance for "did you mean?" suggestions.
    pub max_suggestion_distance: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            warn_on_shadowing: true,
            warn_unused: true,
            max_suggestion_distance: 2,
        }
    }
}

impl AnalyzerConfig {
    fn binder_config(&self) -> BinderConfig {
        BinderConfig {
            warn_on_shadowing: self.warn_on_shadowing,
            warn_unused: self.warn_unused,
            max_suggestion_distance: self.max_suggestion_distance,
        }
    }
}

/// Everything the analysis produced: resolution, types, IR, diagnostics.
#[derive(Debug)]
pub struct Analysis {
    pub bindings: Bindings,
    pub types: TypeTable,
    pub defs: DefTable,
    pub type_world: TypeWorld,
    pub ir: IrWorld,
    pub diagnostics: Vec<Diagnostic>,
    pub bind_ok: bool,
    pub check_ok: bool,
    pub emit_ok: bool,
}

impl Analysis {
    /// Whether all three passes ran without errors.
    pub fn ok(&self) -> bool {
        self.bind_ok && self.check_ok && self.emit_ok
    }
}

/// Run the semantic analysis over an already-parsed module.
pub fn analyze_module(module: &ModDecl, config: &AnalyzerConfig) -> Analysis {
    let index = DeclIndex::build(module);
    let mut reporter = Reporter::new();
    let mut type_world = TypeWorld::new();
    let mut ir = IrWorld::new();

    let binder = NameBinder::new(&index, config.binder_config(), &mut reporter);
    let (bindings, bind_ok) = binder.run(module);
    if !bind_ok {
        return Analysis {
            bindings,
            types: TypeTable::default(),
            defs: DefTable::default(),
            type_world,
            ir,
            diagnostics: reporter.into_diagnostics(),
            bind_ok,
            check_ok: false,
            emit_ok: false,
        };
    }

    let checker = TypeChecker::new(&index, &bindings, &mut type_world, &mut reporter);
    let (types, _mutable_paths, check_ok) = checker.run(module);
    if !check_ok {
        return Analysis {
            bindings,
            types,
            defs: DefTable::default(),
            type_world,
            ir,
            diagnostics: reporter.into_diagnostics(),
            bind_ok,
            check_ok,
            emit_ok: false,
        };
    }

    let emitter = Emitter::new(&bindings, &types, &type_world, &mut ir, &mut reporter);
    let (defs, emit_ok) = emitter.run(module);
    Analysis {
        bindings,
        types,
        defs,
        type_world,
        ir,
        diagnostics: reporter.into_diagnostics(),
        bind_ok,
        check_ok,
        emit_ok,
    }
}
