//! Language front-ends and their selection.
//!
//! A [`LanguageBuilder`] turns the source of one file into graph nodes through
//! a [`FunctionBuilder`] positioned in the program's main function. Builders
//! are registered in a [`LanguageRegistry`]; for every file the registry is
//! walked in registration order and the first builder whose filter accepts the
//! path handles it.
use serde::{Deserialize, Serialize};
use ssair::builder::FunctionBuilder;
use strum::{Display, EnumIter, EnumString};

use crate::utils::error::{CoreError, CoreResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Yak,
    Js,
    Php,
    Java,
    Go,
}

pub trait LanguageBuilder {
    fn language(&self) -> Language;

    /// Whether this builder handles `path`.
    fn filter_file(&self, path: &str) -> bool;

    /// Whether `path` should go through [`LanguageBuilder::pre_handler_file`]
    /// before any file is built.
    fn filter_pre_handler_file(&self, _path: &str) -> bool {
        false
    }

    /// Called once per file, before [`LanguageBuilder::build`].
    fn init_handler(&self, _builder: &mut FunctionBuilder<'_>) {}

    /// Project-wide preparation, given the project root.
    fn pre_handler_project(&self, _path: &str, _builder: &mut FunctionBuilder<'_>) -> CoreResult<()> {
        Ok(())
    }

    fn pre_handler_file(&self, _source: &str, _builder: &mut FunctionBuilder<'_>) -> CoreResult<()> {
        Ok(())
    }

    /// Build the graph for `source`. Syntax errors are reported as
    /// [`CoreError::SyntaxError`] unless `ignore_syntax_errors` is set.
    fn build(&self, source: &str, ignore_syntax_errors: bool, builder: &mut FunctionBuilder<'_>) -> CoreResult<()>;

    /// Fresh instance with no per-file state.
    fn create(&self) -> Box<dyn LanguageBuilder>;
}

#[derive(Default)]
pub struct LanguageRegistry {
    builders: Vec<Box<dyn LanguageBuilder>>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, builder: Box<dyn LanguageBuilder>) {
        self.builders.push(builder);
    }

    pub fn with(mut self, builder: Box<dyn LanguageBuilder>) -> Self {
        self.register(builder);
        self
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// First builder registered for `language`.
    pub fn get(&self, language: Language) -> CoreResult<&dyn LanguageBuilder> {
        self.builders
            .iter()
            .find(|b| b.language() == language)
            .map(|b| b.as_ref())
            .ok_or(CoreError::UnsupportedLanguage(language))
    }

    /// First builder accepting `path`.
    pub fn select(&self, path: &str) -> CoreResult<&dyn LanguageBuilder> {
        self.builders
            .iter()
            .find(|b| b.filter_file(path))
            .map(|b| b.as_ref())
            .ok_or_else(|| CoreError::Skipped { path: path.to_string() })
    }

    pub fn select_pre_handler(&self, path: &str) -> Option<&dyn LanguageBuilder> {
        self.builders
            .iter()
            .find(|b| b.filter_pre_handler_file(path))
            .map(|b| b.as_ref())
    }

    pub fn builders(&self) -> impl Iterator<Item = &dyn LanguageBuilder> {
        self.builders.iter().map(|b| b.as_ref())
    }
}
