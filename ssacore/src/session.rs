//! Compile sessions.
//!
//! A [`CompileSession`] owns one [`Program`] and drives language builders over
//! the files of a project. Every file is built behind its own panic boundary:
//! a front-end failure is reported for that file, the editor stack is
//! restored, deferred builds it interrupted are settled and the session
//! carries on with the next one.
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
};

use semver::Version;
use ssair::{
    builder::FunctionBuilder,
    operand::{FunctionId, InstId},
    program::Program,
    range::SourceEditor,
};

use crate::{
    config::CompileConfig,
    ext::ssalog::{HasLogSink, LogSink},
    language::{LanguageBuilder, LanguageRegistry},
    magic::MAIN_FUNCTION_NAME,
    ssadebug, ssaerror, ssainfo, ssatrace, ssawarn,
    utils::error::{CoreError, CoreResult},
};

/// Progress callback, called with `(handled, total)` after every file.
pub type ProgressFn = Box<dyn FnMut(usize, usize)>;

pub struct CompileSession {
    pub version: Version,
    config: CompileConfig,
    sink: Arc<LogSink>,
    program: Program,
    main: FunctionId,
    registry: LanguageRegistry,
    progress: Option<ProgressFn>,
    handled: usize,
    total: usize,
}

impl HasLogSink for CompileSession {
    fn log_sink(&self) -> &LogSink {
        &self.sink
    }
}

/// Version of this crate, stamped into snapshots.
pub fn crate_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl CompileSession {
    pub fn new(config: CompileConfig, registry: LanguageRegistry) -> Self {
        let mut program = Program::new(config.program_name.clone());
        let main = program.new_function(MAIN_FUNCTION_NAME, None);
        Self {
            version: crate_version(),
            config,
            sink: Arc::new(LogSink::default()),
            program,
            main,
            registry,
            progress: None,
            handled: 0,
            total: 0,
        }
    }

    /// Route session messages through a shared sink.
    pub fn with_log_sink(mut self, sink: Arc<LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_progress(mut self, progress: impl FnMut(usize, usize) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn main_function(&self) -> FunctionId {
        self.main
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    pub fn into_program(self) -> Program {
        self.program
    }

    /// `(handled, total)` file counters.
    pub fn progress(&self) -> (usize, usize) {
        (self.handled, self.total)
    }

    pub fn set_total_files(&mut self, total: usize) {
        self.total = total;
    }

    /// Declare a value provided by the host environment. It is bound to
    /// `name` in the main function and flagged `EXTERN`.
    pub fn define_extern(&mut self, name: &str) -> InstId {
        let mut builder = FunctionBuilder::new(&mut self.program, self.main);
        let id = builder.emit_undefined(name);
        builder.assign_variable(name, id);
        if let Some(inst) = self.program.get_mut(id) {
            inst.set_extern(true);
        }
        ssatrace!(self, "Defined extern value `{}` as {}", name, id);
        id
    }

    /// Run every builder's project-level pre-handler on `root`.
    pub fn pre_handle_project(&mut self, root: &str) -> CoreResult<()> {
        let mut builder = FunctionBuilder::new(&mut self.program, self.main);
        for language in self.registry.builders() {
            language.pre_handler_project(root, &mut builder)?;
        }
        Ok(())
    }

    /// Pre-handle `path` if some builder asks for it. Returns whether it did.
    pub fn pre_handle_file(&mut self, path: &str, source: &str) -> CoreResult<bool> {
        let Some(language) = self.registry.select_pre_handler(path).map(|b| b.create()) else {
            return Ok(false);
        };

        ssatrace!(self, "Pre-handling \"{}\" as {}", path, language.language());
        let editor = Arc::new(SourceEditor::new(source).with_url(path));
        self.program.push_editor(editor.clone());
        let main = self.main;
        let program = &mut self.program;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut builder = FunctionBuilder::new(program, main);
            language.pre_handler_file(source, &mut builder)
        }));
        self.unwind_editors(&editor);

        match result {
            Ok(result) => result.map(|_| true),
            Err(payload) => Err(self.panicked(path, &*payload)),
        }
    }

    fn select_builder(&self, path: &str) -> CoreResult<Box<dyn LanguageBuilder>> {
        if path.is_empty() {
            return self.registry.get(self.config.default_language()).map(|b| b.create());
        }
        if self.config.is_skipped_path(path) {
            return Err(CoreError::Skipped { path: path.to_string() });
        }
        self.registry.select(path).map(|b| b.create())
    }

    /// Build one file into the main function.
    ///
    /// Returns the include files known to the program afterwards, so that the
    /// caller can avoid entering them twice. An empty `path` builds with the
    /// configured language.
    pub fn compile_file(&mut self, path: &str, source: &str) -> CoreResult<Vec<String>> {
        let language = match self.select_builder(path) {
            Ok(language) => language,
            Err(e) => {
                ssadebug!(self, "Not compiling \"{}\": {}", path, e);
                return Err(e);
            }
        };

        ssatrace!(self, "Compiling \"{}\" as {}", path, language.language());
        let editor = Arc::new(SourceEditor::new(source).with_url(path));
        self.program.push_editor(editor.clone());

        let ignore_syntax_errors = self.config.ignore_syntax_errors;
        let main = self.main;
        let program = &mut self.program;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut builder = FunctionBuilder::new(program, main);
            language.init_handler(&mut builder);
            language.build(source, ignore_syntax_errors, &mut builder)
        }));
        self.unwind_editors(&editor);

        self.handled += 1;
        if let Some(progress) = self.progress.as_mut() {
            progress(self.handled, self.total);
        }

        match result {
            Ok(Ok(())) => {
                ssadebug!(self, "Compiled \"{}\" ({}/{})", path, self.handled, self.total);
                Ok(self.program.include_files().map(str::to_string).collect())
            }
            Ok(Err(e)) => {
                ssaerror!(self, "Failed to compile \"{}\": {}", path, e);
                Err(e)
            }
            Err(payload) => Err(self.panicked(path, &*payload)),
        }
    }

    /// Build a source that carries no path, with the configured language.
    pub fn compile_source(&mut self, source: &str) -> CoreResult<Vec<String>> {
        self.compile_file("", source)
    }

    /// Build every file under `root`.
    ///
    /// Skipped directories are not descended into; files no builder accepts
    /// are ignored; files already recorded as includes are not built again.
    /// Per-file failures are collected and returned, I/O errors abort.
    pub fn compile_dir(&mut self, root: &Path) -> CoreResult<Vec<(String, CoreError)>> {
        let mut files = Vec::new();
        self.collect_files(root, &mut files)?;
        files.sort();

        self.pre_handle_project(&root.display().to_string())?;
        let mut sources = Vec::with_capacity(files.len());
        for file in files {
            let source = std::fs::read_to_string(&file)?;
            let path = file.display().to_string();
            self.pre_handle_file(&path, &source)?;
            sources.push((path, source));
        }

        self.set_total_files(sources.len());
        let mut failures = Vec::new();
        for (path, source) in &sources {
            if self.program.include_files().any(|included| included == path) {
                ssatrace!(self, "\"{}\" already included, not compiling it again", path);
                self.handled += 1;
                continue;
            }
            match self.compile_file(path, source) {
                Ok(_) => {}
                Err(e) if e.is_skipped() => {}
                Err(e) => failures.push((path.clone(), e)),
            }
        }

        ssainfo!(
            self,
            "Compiled {} files from \"{}\", {} failed",
            self.handled,
            root.display(),
            failures.len()
        );
        Ok(failures)
    }

    fn collect_files(&self, dir: &Path, files: &mut Vec<PathBuf>) -> CoreResult<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                let name = path.file_name().map(|n| n.to_string_lossy().to_string());
                if name.is_some_and(|n| self.config.skip_dirs.contains(&n)) {
                    continue;
                }
                self.collect_files(&path, files)?;
            } else {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Force every pending deferred build. Returns how many were started.
    pub fn finish(&mut self) -> usize {
        let built = self.program.finish();
        ssainfo!(
            self,
            "Program `{}` finished with {} instructions, {} deferred builds forced",
            self.program.name(),
            self.program.instruction_count(),
            built
        );
        built
    }

    /// Pop editors until `editor` is off the stack. A builder that panicked
    /// may have left its own entries above it.
    fn unwind_editors(&mut self, editor: &Arc<SourceEditor>) {
        while let Some(top) = self.program.pop_editor() {
            if Arc::ptr_eq(&top, editor) {
                return;
            }
            ssawarn!(self, "Editor \"{}\" was left open by a language builder", top.url());
        }
    }

    /// Report a front-end panic and settle the deferred builds it cut short.
    fn panicked(&mut self, path: &str, payload: &(dyn Any + Send)) -> CoreError {
        let message = panic_message(payload);
        ssaerror!(self, "Language builder panicked on \"{}\": {}", path, message);
        let settled = self.program.settle_interrupted_builds();
        if settled > 0 {
            ssawarn!(self, "Settled {} deferred builds interrupted in \"{}\"", settled, path);
        }
        CoreError::BuildPanicked {
            path: path.to_string(),
            message,
        }
    }
}
