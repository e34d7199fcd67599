/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Synchronous type queries against the environment and the type order.
//! Faults are recovered locally into the response text.

use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;

use crate::lookup::LookupTable;
use crate::module::handle::FileHandle;
use crate::parse::ast::SourcePosition;
use crate::server::dispatcher::Server;
use crate::server::protocol::TypeQuery;
use crate::types::Type;

/// A type reference the order does not know about.
struct Untracked(Type);

impl Untracked {
    fn render(&self) -> String {
        format!("Error: Type `{}` was not found in the type order.", self.0)
    }
}

impl Server {
    pub(crate) fn handle_type_query(&mut self, query: TypeQuery) -> String {
        match query {
            TypeQuery::Attributes(class) => match self.parse_and_validate(&class) {
                Err(fault) => fault.render(),
                Ok(_) => match self.flattened_attributes(&class) {
                    Some(attributes) => attributes
                        .iter()
                        .map(|(name, annotation)| format!("{name}: {annotation}"))
                        .join("\n"),
                    None => format!("Error: No class definition found for {class}"),
                },
            },
            TypeQuery::Methods(class) => match self.parse_and_validate(&class) {
                Err(fault) => fault.render(),
                Ok(_) => match self.flattened_methods(&class) {
                    Some(methods) => methods
                        .iter()
                        .map(|(name, parameters, returns)| {
                            let parameters = std::iter::once("self".to_owned())
                                .chain(parameters.iter().map(Type::to_string))
                                .join(", ");
                            format!("{name}: ({parameters}) -> {returns}")
                        })
                        .join("\n"),
                    None => format!("Error: No class definition found for {class}"),
                },
            },
            TypeQuery::Superclasses(class) => match self.parse_and_validate(&class) {
                Err(fault) => fault.render(),
                Ok(_) => {
                    if self.state().environment.class_definition(&class).is_none() {
                        // Unlike Attributes/Methods, no `Error: ` prefix.
                        format!("No class definition found for {class}")
                    } else {
                        self.state()
                            .environment
                            .type_order()
                            .ancestors(&class)
                            .iter()
                            .join(", ")
                    }
                }
            },
            TypeQuery::Join(left, right) => self.binary_order_query(&left, &right, |order, l, r| {
                order.join(l, r).to_string()
            }),
            TypeQuery::Meet(left, right) => self.binary_order_query(&left, &right, |order, l, r| {
                order.meet(l, r).to_string()
            }),
            TypeQuery::LessOrEqual(left, right) => {
                self.binary_order_query(&left, &right, |order, l, r| {
                    if order.less_or_equal(l, r) {
                        "true".to_owned()
                    } else {
                        "false".to_owned()
                    }
                })
            }
            TypeQuery::NormalizeType(expression) => match self.parse_and_validate(&expression) {
                Ok(ty) => ty.to_string(),
                Err(fault) => fault.render(),
            },
            TypeQuery::TypeAtLocation { path, line, column } => {
                self.type_at_location(&path, line, column)
            }
        }
    }

    fn parse_and_validate(&self, text: &str) -> Result<Type, Untracked> {
        let ty = Type::parse(text).unwrap_or_else(|| Type::class(text.trim()));
        if self.state().environment.type_order().is_instantiated(&ty) {
            Ok(ty)
        } else {
            Err(Untracked(ty))
        }
    }

    fn binary_order_query(
        &self,
        left: &str,
        right: &str,
        operation: impl FnOnce(
            &crate::environment::type_order::TypeOrderHandler<'_>,
            &Type,
            &Type,
        ) -> String,
    ) -> String {
        let left = match self.parse_and_validate(left) {
            Ok(ty) => ty,
            Err(fault) => return fault.render(),
        };
        let right = match self.parse_and_validate(right) {
            Ok(ty) => ty,
            Err(fault) => return fault.render(),
        };
        let environment = &self.state().environment;
        operation(&environment.type_order(), &left, &right)
    }

    /// Own attributes first, then inherited ones, memoized process-wide in
    /// the shared heap.
    fn flattened_attributes(&mut self, class: &str) -> Option<Arc<Vec<(String, Type)>>> {
        self.state().environment.class_definition(class)?;
        if let Some(memoized) = self.state().heap.memoized_class_attributes(class) {
            return Some(memoized);
        }
        let environment = &self.state().environment;
        let mut attributes: Vec<(String, Type)> = Vec::new();
        let mut chain = vec![class.to_owned()];
        chain.extend(environment.type_order().ancestors(class));
        for ancestor in &chain {
            if let Some(definition) = environment.class_definition(ancestor) {
                for attribute in &definition.attributes {
                    if !attributes.iter().any(|(name, _)| name == &attribute.name) {
                        attributes.push((attribute.name.clone(), attribute.annotation.clone()));
                    }
                }
            }
        }
        let attributes = Arc::new(attributes);
        self.state_mut()
            .heap
            .memoize_class_attributes(class.to_owned(), attributes.clone());
        Some(attributes)
    }

    fn flattened_methods(&self, class: &str) -> Option<Vec<(String, Vec<Type>, Type)>> {
        self.state().environment.class_definition(class)?;
        let environment = &self.state().environment;
        let mut methods: Vec<(String, Vec<Type>, Type)> = Vec::new();
        let mut chain = vec![class.to_owned()];
        chain.extend(environment.type_order().ancestors(class));
        for ancestor in &chain {
            if let Some(definition) = environment.class_definition(ancestor) {
                for method in &definition.methods {
                    if !methods.iter().any(|(name, _, _)| name == &method.name) {
                        methods.push((
                            method.name.clone(),
                            method.parameters.clone(),
                            method.returns.clone(),
                        ));
                    }
                }
            }
        }
        Some(methods)
    }

    fn type_at_location(&self, path: &str, line: usize, column: usize) -> String {
        let failure = || format!("Error: Not able to get lookup at {path}:{line}:{column}");
        let source_root = &self.configuration().source_root;
        let Some(handle) = FileHandle::new(Path::new(path), source_root) else {
            return failure();
        };
        let text = std::fs::read_to_string(handle.to_path(source_root)).unwrap_or_default();
        let Some(source) = self.state().heap.get_source(&handle) else {
            return failure();
        };
        let table = LookupTable::create_of_source(&self.state().environment, &source);
        match table.get_annotation(SourcePosition::new(line, column), &text) {
            Some(annotation) => annotation.to_string(),
            None => failure(),
        }
    }
}
