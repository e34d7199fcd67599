/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The subtype lattice over the environment's classes.
//!
//! `object` is the top, `typing.NoReturn` the bottom. User classes order by
//! their (linearized) bases, builtins by the registered numeric tower, and
//! protocols subsume structurally once inferred.

use starlark_map::small_set::SmallSet;

use crate::environment::Environment;
use crate::types::Type;

pub struct TypeOrderHandler<'a> {
    environment: &'a Environment,
}

impl<'a> TypeOrderHandler<'a> {
    pub(crate) fn new(environment: &'a Environment) -> TypeOrderHandler<'a> {
        TypeOrderHandler { environment }
    }

    /// Whether the type exists in the order at all. Queries over types that
    /// fail this check are answered with an `Untracked` fault.
    pub fn is_instantiated(&self, ty: &Type) -> bool {
        match ty {
            Type::None | Type::NoReturn => true,
            Type::Class(name) => {
                self.environment.is_builtin_class(name)
                    || self.environment.class_definition(name).is_some()
            }
        }
    }

    /// Linearized proper ancestors of a class, ending in `object`. Unknown
    /// bases terminate the walk at `object`.
    pub fn ancestors(&self, class: &str) -> Vec<String> {
        let mut seen = SmallSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<String> = self.direct_bases(class);
        stack.reverse();
        while let Some(current) = stack.pop() {
            if current == "Protocol" || current == "typing.Protocol" {
                continue;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            let mut bases = self.direct_bases(&current);
            out.push(current);
            bases.reverse();
            stack.extend(bases);
        }
        if !out.iter().any(|a| a == "object") && class != "object" {
            out.push("object".to_owned());
        }
        out
    }

    fn direct_bases(&self, class: &str) -> Vec<String> {
        if let Some(definition) = self.environment.class_definition(class) {
            definition.bases.clone()
        } else if let Some(base) = self.environment.builtin_base(class) {
            if class == "object" {
                Vec::new()
            } else {
                vec![base.to_owned()]
            }
        } else {
            Vec::new()
        }
    }

    pub fn less_or_equal(&self, left: &Type, right: &Type) -> bool {
        match (left, right) {
            _ if left == right => true,
            (Type::NoReturn, _) => true,
            (_, Type::Class(name)) if name.as_ref() == "object" => true,
            (Type::None, _) | (_, Type::None) => false,
            (Type::Class(_), Type::NoReturn) => false,
            (Type::Class(left), Type::Class(right)) => {
                self.ancestors(left).iter().any(|a| a == right.as_ref())
                    || self.implements_protocol(left, right)
            }
        }
    }

    pub fn join(&self, left: &Type, right: &Type) -> Type {
        if self.less_or_equal(left, right) {
            return right.clone();
        }
        if self.less_or_equal(right, left) {
            return left.clone();
        }
        if let Type::Class(left) = left {
            for ancestor in self.ancestors(left) {
                let candidate = Type::class(&ancestor);
                if self.less_or_equal(right, &candidate) {
                    return candidate;
                }
            }
        }
        Type::object()
    }

    pub fn meet(&self, left: &Type, right: &Type) -> Type {
        if self.less_or_equal(left, right) {
            return left.clone();
        }
        if self.less_or_equal(right, left) {
            return right.clone();
        }
        Type::NoReturn
    }

    /// Structural check: does `class` provide every method a protocol names?
    fn implements_protocol(&self, class: &str, protocol: &str) -> bool {
        let Some(definition) = self.environment.class_definition(protocol) else {
            return false;
        };
        if !definition.is_protocol || definition.methods.is_empty() {
            return false;
        }
        let mut provided = SmallSet::new();
        if let Some(own) = self.environment.class_definition(class) {
            for method in &own.methods {
                provided.insert(method.name.clone());
            }
        } else {
            return false;
        }
        for ancestor in self.ancestors(class) {
            if let Some(ancestor) = self.environment.class_definition(&ancestor) {
                for method in &ancestor.methods {
                    provided.insert(method.name.clone());
                }
            }
        }
        definition
            .methods
            .iter()
            .all(|method| provided.contains(&method.name))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::module::handle::FileHandle;
    use crate::parse::ast::ParsedSource;
    use crate::parse::parser::parse_module;

    fn env_with(sources: &[(&str, &str)]) -> Environment {
        let mut env = Environment::new();
        let parsed: Vec<Arc<ParsedSource>> = sources
            .iter()
            .map(|(name, text)| {
                let handle = FileHandle::new(Path::new(name), Path::new("/root")).unwrap();
                Arc::new(parse_module(handle, Arc::new((*text).to_owned())).unwrap())
            })
            .collect();
        env.populate(&parsed);
        env
    }

    #[test]
    fn test_builtin_tower() {
        let env = Environment::new();
        let order = env.type_order();
        assert!(order.less_or_equal(&Type::class("bool"), &Type::class("int")));
        assert!(order.less_or_equal(&Type::class("int"), &Type::class("float")));
        assert!(order.less_or_equal(&Type::class("int"), &Type::object()));
        assert!(!order.less_or_equal(&Type::class("int"), &Type::class("str")));
    }

    #[test]
    fn test_user_class_hierarchy() {
        let env = env_with(&[(
            "m.py",
            "class Animal:\n    pass\n\nclass Dog(Animal):\n    pass\n\nclass Cat(Animal):\n    pass\n",
        )]);
        let order = env.type_order();
        assert!(order.less_or_equal(&Type::class("Dog"), &Type::class("Animal")));
        assert!(!order.less_or_equal(&Type::class("Animal"), &Type::class("Dog")));
        assert_eq!(
            order.join(&Type::class("Dog"), &Type::class("Cat")),
            Type::class("Animal")
        );
        assert_eq!(
            order.meet(&Type::class("Dog"), &Type::class("Cat")),
            Type::NoReturn
        );
        assert_eq!(
            order.meet(&Type::class("Dog"), &Type::class("Animal")),
            Type::class("Dog")
        );
    }

    #[test]
    fn test_join_of_unrelated_is_object() {
        let env = Environment::new();
        let order = env.type_order();
        assert_eq!(
            order.join(&Type::class("str"), &Type::class("bool")),
            Type::object()
        );
    }

    #[test]
    fn test_noreturn_is_bottom() {
        let env = Environment::new();
        let order = env.type_order();
        assert!(order.less_or_equal(&Type::NoReturn, &Type::class("int")));
        assert!(!order.less_or_equal(&Type::class("int"), &Type::NoReturn));
        assert_eq!(
            order.meet(&Type::class("int"), &Type::NoReturn),
            Type::NoReturn
        );
    }

    #[test]
    fn test_is_instantiated() {
        let env = env_with(&[("m.py", "class Foo:\n    pass\n")]);
        let order = env.type_order();
        assert!(order.is_instantiated(&Type::class("Foo")));
        assert!(order.is_instantiated(&Type::class("int")));
        assert!(order.is_instantiated(&Type::None));
        assert!(!order.is_instantiated(&Type::class("Missing")));
    }

    #[test]
    fn test_protocol_structural_subsumption() {
        let mut env = env_with(&[(
            "m.py",
            "class Sized(Protocol):\n    def size(self) -> int:\n        return 0\n\nclass Box:\n    def size(self) -> int:\n        return 1\n\nclass Empty:\n    pass\n",
        )]);
        env.infer_protocols(&["Sized".to_owned()]);
        let order = env.type_order();
        assert!(order.less_or_equal(&Type::class("Box"), &Type::class("Sized")));
        assert!(!order.less_or_equal(&Type::class("Empty"), &Type::class("Sized")));
    }

    #[test]
    fn test_superclass_listing() {
        let env = env_with(&[(
            "m.py",
            "class A:\n    pass\n\nclass B(A):\n    pass\n\nclass C(B):\n    pass\n",
        )]);
        let order = env.type_order();
        assert_eq!(
            order.ancestors("C"),
            vec!["B".to_owned(), "A".to_owned(), "object".to_owned()]
        );
        assert_eq!(order.ancestors("int"), vec![
            "float".to_owned(),
            "complex".to_owned(),
            "object".to_owned()
        ]);
    }
}
