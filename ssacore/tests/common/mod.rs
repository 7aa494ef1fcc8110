//! A toy line-oriented front-end.
//!
//! ```text
//! const NAME INT     bind NAME to an integer constant
//! object NAME        bind NAME to a fresh object
//! set NAME FIELD INT NAME.FIELD = INT
//! include PATH       record PATH as included
//! lazy NAME [panic]  bind NAME to a deferred object whose `self` member is
//!                    NAME itself; with `panic` the build gives up midway
//! build NAME         force the deferred build of NAME
//! panic              make the front-end panic
//! ```
#![allow(dead_code)]

use std::collections::HashMap;

use ssacore::{
    CoreError, CoreResult,
    language::{Language, LanguageBuilder, LanguageRegistry},
};
use ssair::{builder::FunctionBuilder, operand::InstId};

pub struct ToyBuilder {
    pub language: Language,
    pub extension: &'static str,
}

impl ToyBuilder {
    pub fn yak() -> Box<dyn LanguageBuilder> {
        Box::new(ToyBuilder {
            language: Language::Yak,
            extension: ".toy",
        })
    }

    pub fn js() -> Box<dyn LanguageBuilder> {
        Box::new(ToyBuilder {
            language: Language::Js,
            extension: ".js",
        })
    }
}

impl LanguageBuilder for ToyBuilder {
    fn language(&self) -> Language {
        self.language
    }

    fn filter_file(&self, path: &str) -> bool {
        path.ends_with(self.extension)
    }

    fn filter_pre_handler_file(&self, path: &str) -> bool {
        path.ends_with(".prelude")
    }

    fn pre_handler_file(&self, source: &str, builder: &mut FunctionBuilder<'_>) -> CoreResult<()> {
        for name in source.split_whitespace() {
            builder.program_mut().push_include_file(name);
        }
        Ok(())
    }

    fn build(&self, source: &str, ignore_syntax_errors: bool, builder: &mut FunctionBuilder<'_>) -> CoreResult<()> {
        let mut names: HashMap<String, InstId> = HashMap::new();
        let mut offset = 0;

        for line in source.lines() {
            let range = builder.range_of(offset, offset + line.len());
            builder.set_range(range);
            offset += line.len() + 1;

            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                [] => {}
                ["const", name, value] if value.parse::<i64>().is_ok() => {
                    let id = builder.emit_const(value.parse::<i64>().unwrap_or_default());
                    builder.assign_variable(*name, id);
                    names.insert(name.to_string(), id);
                }
                ["object", name] => {
                    let id = builder.emit_make();
                    builder.assign_variable(*name, id);
                    names.insert(name.to_string(), id);
                }
                ["set", name, field, value] if names.contains_key(*name) => {
                    let object = names[*name];
                    let key = builder.emit_const(*field);
                    let value = builder.emit_const(value.parse::<i64>().unwrap_or_default());
                    builder.assign_member(object, key, value);
                }
                ["lazy", name, rest @ ..] => {
                    let id = builder.emit_undefined(*name);
                    let function = builder.function();
                    let gives_up = matches!(rest, ["panic"]);
                    builder.set_ordinal_build(id, move |program| {
                        let me = program.build(id)?;
                        let mut inner = FunctionBuilder::new(program, function);
                        let object = inner.emit_make();
                        let key = inner.emit_const("self");
                        inner.assign_member(object, key, me);
                        if gives_up {
                            panic!("toy lazy value gave up");
                        }
                        Some(object)
                    });
                    builder.assign_variable(*name, id);
                    names.insert(name.to_string(), id);
                }
                ["build", name] if names.contains_key(*name) => {
                    builder.build_value(names[*name]);
                }
                ["include", path] => {
                    builder.program_mut().push_include_file(*path);
                }
                ["panic"] => panic!("toy front-end gave up"),
                _ if ignore_syntax_errors => {}
                _ => {
                    return Err(CoreError::SyntaxError {
                        path: builder
                            .program()
                            .current_editor()
                            .map(|e| e.url().to_string())
                            .unwrap_or_default(),
                        message: format!("unexpected line `{}`", line),
                    });
                }
            }
        }
        Ok(())
    }

    fn create(&self) -> Box<dyn LanguageBuilder> {
        Box::new(ToyBuilder {
            language: self.language,
            extension: self.extension,
        })
    }
}

pub fn registry() -> LanguageRegistry {
    LanguageRegistry::new().with(ToyBuilder::yak()).with(ToyBuilder::js())
}
