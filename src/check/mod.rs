/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The type-check service: analyzes a handle set against the environment and
//! returns new diagnostics. Workers only read; resolved define signatures are
//! returned alongside the errors for the dispatcher to install.

pub mod ignores;

use starlark_map::small_map::SmallMap;

use crate::environment::Environment;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::heap::DefineSignature;
use crate::heap::SharedHeap;
use crate::module::handle::FileHandle;
use crate::module::qualifier::Qualifier;
use crate::parse::ast::Expression;
use crate::parse::ast::FunctionStatement;
use crate::parse::ast::ParsedSource;
use crate::parse::ast::Statement;
use crate::scheduler::Scheduler;
use crate::types::Type;

/// What one worker hands back for one handle.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub errors: Vec<Error>,
    pub defines: Vec<(Qualifier, String, DefineSignature)>,
}

/// Analyze every handle, fanning out through the scheduler. Handles without
/// a parsed source contribute nothing.
pub fn check_handles(
    scheduler: &Scheduler,
    environment: &Environment,
    heap: &SharedHeap,
    handles: &[FileHandle],
) -> Vec<CheckOutcome> {
    let sources: Vec<_> = handles
        .iter()
        .filter_map(|handle| heap.get_source(handle))
        .collect();
    scheduler.map(sources, |source| check_source(environment, heap, &source))
}

fn check_source(
    environment: &Environment,
    heap: &SharedHeap,
    source: &ParsedSource,
) -> CheckOutcome {
    let mut checker = Checker {
        environment,
        path: source.handle.as_str(),
        qualifier: &source.qualifier,
        errors: Vec::new(),
        defines: Vec::new(),
    };
    let mut bindings = SmallMap::new();
    for statement in &source.statements {
        checker.check_statement(statement, &mut bindings, true);
    }
    let mut errors = checker.errors;
    errors.retain(|error| !heap.is_ignored(&source.handle, error.line));
    CheckOutcome {
        errors,
        defines: checker.defines,
    }
}

struct Checker<'a> {
    environment: &'a Environment,
    path: &'a str,
    qualifier: &'a Qualifier,
    errors: Vec<Error>,
    defines: Vec<(Qualifier, String, DefineSignature)>,
}

/// Modules always importable regardless of the populated environment.
const AMBIENT_MODULES: &[&str] = &["typing"];

impl<'a> Checker<'a> {
    fn check_statement(
        &mut self,
        statement: &Statement,
        bindings: &mut SmallMap<String, Type>,
        top_level: bool,
    ) {
        match statement {
            Statement::Import { qualifier, span }
            | Statement::FromImport {
                qualifier, span, ..
            } => {
                let known = self.environment.module_definition(qualifier).is_some()
                    || AMBIENT_MODULES.contains(&qualifier.as_str());
                if !known {
                    self.errors.push(Error::new(
                        self.path,
                        span.start.line,
                        span.start.column,
                        ErrorKind::UndefinedImport,
                        format!(
                            "Could not find a module corresponding to import `{qualifier}`."
                        ),
                    ));
                }
            }
            Statement::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let Some(declared) = self.resolve_annotation(&annotation.text, annotation.span)
                else {
                    return;
                };
                if let Some(value) = value {
                    if let Some(actual) = self.infer(value, bindings) {
                        let order = self.environment.type_order();
                        if !order.less_or_equal(&actual, &declared) {
                            self.errors.push(Error::new(
                                self.path,
                                target.span.start.line,
                                target.span.start.column,
                                ErrorKind::IncompatibleVariableType,
                                format!(
                                    "{} is declared to have type `{}` but is used as type `{}`.",
                                    target.name, declared, actual
                                ),
                            ));
                        }
                    }
                }
                bindings.insert(target.name.clone(), declared);
            }
            Statement::Assign { target, value } => {
                if let Some(actual) = self.infer(value, bindings) {
                    bindings.insert(target.name.clone(), actual);
                }
            }
            Statement::ClassDef(class) => {
                let mut class_bindings = bindings.clone();
                for member in &class.body {
                    match member {
                        Statement::FunctionDef(def) => {
                            self.check_function(def, &class_bindings, Some(&class.name.name));
                        }
                        Statement::AnnAssign { .. } => {
                            self.check_statement(member, &mut class_bindings, false);
                        }
                        _ => {}
                    }
                }
                bindings.insert(class.name.name.clone(), Type::class(&class.name.name));
            }
            Statement::FunctionDef(def) => {
                let signature = self.check_function(def, bindings, None);
                if top_level {
                    self.defines
                        .push((self.qualifier.clone(), def.name.name.clone(), signature));
                }
            }
            Statement::Return { .. } | Statement::Pass => {}
        }
    }

    fn check_function(
        &mut self,
        def: &FunctionStatement,
        outer: &SmallMap<String, Type>,
        enclosing_class: Option<&str>,
    ) -> DefineSignature {
        let mut bindings = outer.clone();
        let mut parameters = Vec::new();
        for (i, parameter) in def.parameters.iter().enumerate() {
            let ty = match enclosing_class {
                Some(class) if i == 0 && parameter.name.name == "self" => Type::class(class),
                _ => match &parameter.annotation {
                    Some(annotation) => self
                        .resolve_annotation(&annotation.text, annotation.span)
                        .unwrap_or_else(Type::object),
                    None => Type::object(),
                },
            };
            parameters.push(ty.clone());
            bindings.insert(parameter.name.name.clone(), ty);
        }
        let declared_return = def
            .returns
            .as_ref()
            .and_then(|r| self.resolve_annotation(&r.text, r.span));
        self.check_body(&def.body, &mut bindings, declared_return.as_ref());
        DefineSignature {
            parameters,
            returns: declared_return.unwrap_or(Type::None),
        }
    }

    fn check_body(
        &mut self,
        body: &[Statement],
        bindings: &mut SmallMap<String, Type>,
        declared_return: Option<&Type>,
    ) {
        for statement in body {
            match statement {
                Statement::Return { value, span } => {
                    let Some(declared) = declared_return else {
                        continue;
                    };
                    let actual = match value {
                        Some(expression) => self.infer(expression, bindings),
                        None => Some(Type::None),
                    };
                    if let Some(actual) = actual {
                        let order = self.environment.type_order();
                        if !order.less_or_equal(&actual, declared) {
                            self.errors.push(Error::new(
                                self.path,
                                span.start.line,
                                span.start.column,
                                ErrorKind::IncompatibleReturnType,
                                format!("Expected `{declared}` but got `{actual}`."),
                            ));
                        }
                    }
                }
                other => self.check_statement(other, bindings, false),
            }
        }
    }

    fn resolve_annotation(
        &mut self,
        text: &str,
        span: crate::parse::ast::SourceSpan,
    ) -> Option<Type> {
        let parsed = Type::parse(text);
        let valid = parsed
            .as_ref()
            .map_or(false, |ty| self.environment.type_order().is_instantiated(ty));
        if !valid {
            self.errors.push(Error::new(
                self.path,
                span.start.line,
                span.start.column,
                ErrorKind::InvalidType,
                format!("Annotation `{text}` is not defined as a type."),
            ));
            return None;
        }
        parsed
    }

    fn infer(&self, expression: &Expression, bindings: &SmallMap<String, Type>) -> Option<Type> {
        match expression {
            Expression::IntLiteral(_) => Some(Type::class("int")),
            Expression::FloatLiteral(_) => Some(Type::class("float")),
            Expression::StrLiteral(_) => Some(Type::class("str")),
            Expression::BoolLiteral(_) => Some(Type::class("bool")),
            Expression::NoneLiteral(_) => Some(Type::None),
            Expression::Name(name) => bindings.get(&name.name).cloned(),
            Expression::Opaque(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::parse::parser::parse_module;

    fn check(text: &str) -> Vec<Error> {
        let handle = FileHandle::new(Path::new("m.py"), Path::new("/root")).unwrap();
        let source = Arc::new(parse_module(handle, Arc::new(text.to_owned())).unwrap());
        let mut environment = Environment::new();
        environment.populate(std::slice::from_ref(&source));
        let mut heap = SharedHeap::new(1 << 20);
        heap.store_source(source.clone());
        let scheduler = Scheduler::new(NonZeroUsize::new(2).unwrap()).with_parallel(false);
        check_handles(&scheduler, &environment, &heap, &[source.handle.clone()])
            .into_iter()
            .flat_map(|outcome| outcome.errors)
            .collect()
    }

    #[test]
    fn test_incompatible_variable_type() {
        let errors = check("x: int = 'oops'\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::IncompatibleVariableType);
        assert_eq!(
            errors[0].description,
            "x is declared to have type `int` but is used as type `str`."
        );
    }

    #[test]
    fn test_compatible_assignments_are_clean() {
        assert!(check("x: int = 3\ny: float = 3\nz: object = 'fine'\n").is_empty());
    }

    #[test]
    fn test_incompatible_return_type() {
        let errors = check("def f() -> int:\n    return 'no'\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::IncompatibleReturnType);
        assert_eq!(errors[0].description, "Expected `int` but got `str`.");
    }

    #[test]
    fn test_undefined_annotation() {
        let errors = check("x: Missing = 3\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InvalidType);
    }

    #[test]
    fn test_undefined_import() {
        let errors = check("import nowhere\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::UndefinedImport);
    }

    #[test]
    fn test_method_return_uses_self_type() {
        let errors = check(
            "class Foo:\n    def id(self) -> Foo:\n        return self\n",
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_name_binding_flows_through_assignment() {
        let errors = check("x = 'text'\ny: int = x\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::IncompatibleVariableType);
    }

    #[test]
    fn test_top_level_defines_are_reported() {
        let handle = FileHandle::new(Path::new("m.py"), Path::new("/root")).unwrap();
        let source = Arc::new(
            parse_module(
                handle,
                Arc::new("def f(a: int) -> str:\n    return 'x'\n".to_owned()),
            )
            .unwrap(),
        );
        let mut environment = Environment::new();
        environment.populate(std::slice::from_ref(&source));
        let mut heap = SharedHeap::new(1 << 20);
        heap.store_source(source.clone());
        let scheduler = Scheduler::new(NonZeroUsize::new(2).unwrap()).with_parallel(false);
        let outcomes = check_handles(&scheduler, &environment, &heap, &[source.handle.clone()]);
        let defines: Vec<_> = outcomes.into_iter().flat_map(|o| o.defines).collect();
        assert_eq!(defines.len(), 1);
        assert_eq!(defines[0].1, "f");
        assert_eq!(defines[0].2.returns, Type::class("str"));
    }
}
