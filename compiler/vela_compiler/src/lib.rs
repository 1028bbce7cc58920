//! The Vela compilation pipeline in one object.
//!
//! `Compilation` runs lex → parse → bind/solve → flow → lower, each phase
//! lazily and at most once, and aggregates diagnostics from every stage.
//! There is no global state: intrinsics, the type pool, and the symbol
//! store all live inside the compilation. A host may run any number of
//! compilations in parallel.
//!
//! Cancellation is cooperative: the token is consulted between phases and
//! between solver passes. A cancelled compilation stays usable — already
//! computed phases keep their results, later phases return empty results.
//!
//! # Exit codes
//!
//! Drivers map compilations to process exit codes: `0` success, `1` when
//! any error-severity diagnostic was produced, `2` for driver failures
//! outside the core (argument parsing, IO).

use std::sync::Arc;

use tracing::debug;
use vela_diagnostic::{Diagnostic, DiagnosticBag, ErrorCode, Severity, Span};
use vela_sema::{analyze, Analysis, AnalyzeOptions, CancellationToken, Lazy, SymbolProvider};
use vela_syntax::{StringInterner, SyntaxTree};

/// Exit code contract for drivers.
pub const EXIT_SUCCESS: i32 = 0;
/// At least one error-severity diagnostic.
pub const EXIT_DIAGNOSTICS: i32 = 1;
/// Driver failure outside the compiler core.
pub const EXIT_DRIVER_FAILURE: i32 = 2;

/// Configuration for one compilation.
#[derive(Default)]
pub struct CompileOptions {
    /// Logical file path used in messages; never opened by the core.
    pub file_path: String,
    /// Symbol providers for external assemblies.
    pub providers: Vec<Arc<dyn SymbolProvider>>,
    /// Assembly names resolvable through the providers.
    pub references: Vec<String>,
}

impl CompileOptions {
    pub fn new(file_path: impl Into<String>) -> Self {
        CompileOptions {
            file_path: file_path.into(),
            providers: Vec::new(),
            references: Vec::new(),
        }
    }
}

/// One compilation of one source text.
pub struct Compilation {
    source: String,
    options: CompileOptions,
    interner: Arc<StringInterner>,
    cancellation: CancellationToken,
    /// Every phase reports here; appends only, phase order preserved.
    bag: DiagnosticBag,
    tree: Lazy<SyntaxTree>,
    analysis: Lazy<Analysis>,
    ir: Lazy<vela_ir::Module>,
}

impl Compilation {
    /// Create a compilation. Sources larger than `u32::MAX` bytes are
    /// rejected here (spans are 32-bit); the compilation then holds one
    /// diagnostic and an empty tree.
    pub fn new(source: impl Into<String>, options: CompileOptions) -> Self {
        let mut source = source.into();
        let bag = DiagnosticBag::new();
        if u32::try_from(source.len()).is_err() {
            source.clear();
            bag.report(Diagnostic::error(
                ErrorCode::E0004,
                format!(
                    "source file `{}` exceeds the 4 GiB limit",
                    options.file_path
                ),
                Span::DUMMY,
            ));
        }
        Compilation {
            source,
            options,
            interner: Arc::new(StringInterner::new()),
            cancellation: CancellationToken::new(),
            bag,
            tree: Lazy::new(),
            analysis: Lazy::new(),
            ir: Lazy::new(),
        }
    }

    /// The source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The shared interner.
    pub fn interner(&self) -> &Arc<StringInterner> {
        &self.interner
    }

    /// A token that cancels this compilation between phases.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Lex and parse, at most once.
    pub fn syntax_tree(&self) -> Arc<SyntaxTree> {
        self.tree.get_or_init(|| {
            debug!(file = %self.options.file_path, "parsing");
            let tree = vela_parse::parse(&self.source, Arc::clone(&self.interner));
            self.bag.report_all(tree.diagnostics());
            tree
        })
    }

    /// Bind, solve, and flow-check, at most once.
    pub fn analysis(&self) -> Arc<Analysis> {
        self.analysis.get_or_init(|| {
            let tree = self.syntax_tree();
            debug!(file = %self.options.file_path, "analyzing");
            let options = AnalyzeOptions {
                providers: self.options.providers.clone(),
                references: self.options.references.clone(),
            };
            let analysis = analyze(&tree, &options, &self.cancellation);
            self.bag.report_all(analysis.diagnostics.iter().cloned());
            analysis
        })
    }

    /// Lower to IR, at most once. Procedures with error nodes are skipped.
    pub fn ir(&self) -> Arc<vela_ir::Module> {
        self.ir.get_or_init(|| {
            let analysis = self.analysis();
            if self.cancellation.is_cancelled() {
                return vela_ir::Module::default();
            }
            debug!(file = %self.options.file_path, "lowering");
            vela_ir::lower(&analysis)
        })
    }

    /// All diagnostics from every phase, in phase order.
    ///
    /// Forces parsing and analysis (lowering produces no diagnostics of
    /// its own), then snapshots the bag.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.syntax_tree();
        self.analysis();
        self.bag.to_vec()
    }

    /// True when any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics()
            .iter()
            .any(|d| d.severity() == Severity::Error)
    }

    /// The exit code a driver should report for this compilation.
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            EXIT_DIAGNOSTICS
        } else {
            EXIT_SUCCESS
        }
    }

    /// Render the IR module in its textual form.
    ///
    /// Display-time resolution path-compresses, so it runs on a scratch
    /// clone of the pool; the cached analysis stays untouched.
    pub fn print_ir(&self) -> String {
        let module = self.ir();
        let analysis = self.analysis();
        let mut pool = analysis.pool.clone();
        vela_ir::print_module(&module, &analysis.store, &mut pool, &self.interner)
    }
}
