/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The mutable analysis environment: module and class indices, dependency
//! edges, and the type order. Mutated only by the dispatcher during recheck
//! steps; workers read.

pub mod type_order;

use starlark_map::small_map::SmallMap;
use starlark_map::small_set::SmallSet;

use crate::environment::type_order::TypeOrderHandler;
use crate::module::handle::FileHandle;
use crate::module::qualifier::Qualifier;
use crate::parse::ast::ParsedSource;
use crate::parse::ast::Statement;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub annotation: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    /// Parameter types excluding the leading `self`.
    pub parameters: Vec<Type>,
    pub returns: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefinition {
    pub name: String,
    pub qualifier: Qualifier,
    pub bases: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub methods: Vec<Method>,
    pub is_protocol: bool,
}

#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    pub qualifier: Qualifier,
    pub handle: FileHandle,
    pub imports: Vec<Qualifier>,
    pub classes: Vec<String>,
    pub defines: Vec<String>,
}

#[derive(Debug)]
pub struct Environment {
    modules: SmallMap<Qualifier, ModuleDefinition>,
    classes: SmallMap<String, ClassDefinition>,
    /// Classes whose bases could not be fully registered yet keep working;
    /// the order treats unknown bases as `object`.
    builtin_bases: SmallMap<&'static str, &'static str>,
}

impl Environment {
    pub fn new() -> Environment {
        // The numeric tower is registered the way the analysis sees it:
        // bool < int < float < complex < object.
        let mut builtin_bases = SmallMap::new();
        builtin_bases.insert("bool", "int");
        builtin_bases.insert("int", "float");
        builtin_bases.insert("float", "complex");
        builtin_bases.insert("complex", "object");
        builtin_bases.insert("str", "object");
        builtin_bases.insert("bytes", "object");
        builtin_bases.insert("object", "object");
        builtin_bases.insert("typing.Protocol", "object");
        builtin_bases.insert("Protocol", "object");
        Environment {
            modules: SmallMap::new(),
            classes: SmallMap::new(),
            builtin_bases,
        }
    }

    pub fn class_definition(&self, name: &str) -> Option<&ClassDefinition> {
        self.classes.get(name)
    }

    pub fn module_definition(&self, qualifier: &Qualifier) -> Option<&ModuleDefinition> {
        self.modules.get(qualifier)
    }

    /// The handle currently owning a qualifier, if any. A stub and a source
    /// for the same module share a qualifier; whichever populated last owns
    /// it, and stubs are populated first so sources lose.
    pub fn owner(&self, qualifier: &Qualifier) -> Option<&FileHandle> {
        self.modules.get(qualifier).map(|m| &m.handle)
    }

    pub fn is_builtin_class(&self, name: &str) -> bool {
        self.builtin_bases.contains_key(name)
    }

    pub(crate) fn builtin_base(&self, name: &str) -> Option<&'static str> {
        self.builtin_bases.get(name).copied()
    }

    /// Transitive set of modules whose analysis depends on `qualifier`
    /// (i.e. importers, importers of importers, ...).
    pub fn dependencies(&self, qualifier: &Qualifier) -> SmallSet<Qualifier> {
        let mut importers: SmallMap<&Qualifier, Vec<&Qualifier>> = SmallMap::new();
        for module in self.modules.values() {
            for import in &module.imports {
                match importers.get_mut(import) {
                    Some(known) => known.push(&module.qualifier),
                    None => {
                        importers.insert(import, vec![&module.qualifier]);
                    }
                }
            }
        }
        let mut dependents = SmallSet::new();
        let mut frontier = vec![qualifier];
        while let Some(current) = frontier.pop() {
            if let Some(direct) = importers.get(current) {
                for &dependent in direct {
                    if dependents.insert(dependent.clone()) {
                        frontier.push(dependent);
                    }
                }
            }
        }
        dependents
    }

    pub fn purge(&mut self, handles: &[FileHandle]) {
        let doomed: Vec<Qualifier> = self
            .modules
            .values()
            .filter(|m| handles.contains(&m.handle))
            .map(|m| m.qualifier.clone())
            .collect();
        for qualifier in doomed {
            if let Some(module) = self.modules.shift_remove(&qualifier) {
                for class in module.classes {
                    self.classes.shift_remove(&class);
                }
            }
        }
    }

    /// Install module and class definitions for freshly parsed sources.
    /// Populating the same qualifier again replaces its previous definition.
    pub fn populate(&mut self, sources: &[std::sync::Arc<ParsedSource>]) {
        for source in sources {
            let module = build_module_definition(source);
            if let Some(previous) = self.modules.get(&module.qualifier) {
                let stale: Vec<String> = previous.classes.clone();
                for class in stale {
                    self.classes.shift_remove(&class);
                }
            }
            for statement in &source.statements {
                if let Statement::ClassDef(class) = statement {
                    let definition = build_class_definition(class, &source.qualifier);
                    self.classes.insert(definition.name.clone(), definition);
                }
            }
            self.modules.insert(module.qualifier.clone(), module);
        }
    }

    /// Mark the named classes as protocols when their bases say so. Run after
    /// `populate` over the classes the repopulated handles declared.
    pub fn infer_protocols(&mut self, class_names: &[String]) {
        for name in class_names {
            let is_protocol = self.classes.get(name).map_or(false, |class| {
                class
                    .bases
                    .iter()
                    .any(|base| base == "Protocol" || base == "typing.Protocol")
            });
            if is_protocol {
                if let Some(class) = self.classes.get_mut(name) {
                    class.is_protocol = true;
                }
            }
        }
    }

    pub fn type_order(&self) -> TypeOrderHandler<'_> {
        TypeOrderHandler::new(self)
    }
}

impl Default for Environment {
    fn default() -> Environment {
        Environment::new()
    }
}

fn build_module_definition(source: &ParsedSource) -> ModuleDefinition {
    let mut imports = Vec::new();
    let mut classes = Vec::new();
    let mut defines = Vec::new();
    for statement in &source.statements {
        match statement {
            Statement::Import { qualifier, .. } | Statement::FromImport { qualifier, .. } => {
                imports.push(qualifier.clone());
            }
            Statement::ClassDef(class) => {
                classes.push(class.name.name.clone());
                defines.push(class.name.name.clone());
            }
            Statement::FunctionDef(def) => defines.push(def.name.name.clone()),
            _ => {}
        }
    }
    ModuleDefinition {
        qualifier: source.qualifier.clone(),
        handle: source.handle.clone(),
        imports,
        classes,
        defines,
    }
}

fn build_class_definition(
    class: &crate::parse::ast::ClassStatement,
    qualifier: &Qualifier,
) -> ClassDefinition {
    let mut attributes = Vec::new();
    let mut methods = Vec::new();
    for statement in &class.body {
        match statement {
            Statement::AnnAssign {
                target, annotation, ..
            } => {
                attributes.push(Attribute {
                    name: target.name.clone(),
                    annotation: Type::parse(&annotation.text).unwrap_or_else(Type::object),
                });
            }
            Statement::FunctionDef(def) => {
                let parameters = def
                    .parameters
                    .iter()
                    .skip(1) // self
                    .map(|p| {
                        p.annotation
                            .as_ref()
                            .and_then(|a| Type::parse(&a.text))
                            .unwrap_or_else(Type::object)
                    })
                    .collect();
                let returns = def
                    .returns
                    .as_ref()
                    .and_then(|r| Type::parse(&r.text))
                    .unwrap_or(Type::None);
                methods.push(Method {
                    name: def.name.name.clone(),
                    parameters,
                    returns,
                });
            }
            _ => {}
        }
    }
    ClassDefinition {
        name: class.name.name.clone(),
        qualifier: qualifier.clone(),
        bases: class.bases.clone(),
        attributes,
        methods,
        is_protocol: false,
    }
}
