/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Positioned syntax for the analyzed Python subset.

use std::sync::Arc;

use dupe::Dupe;
use serde::Deserialize;
use serde::Serialize;

use crate::module::handle::FileHandle;
use crate::module::qualifier::Qualifier;

/// 1-based line, 0-based column.
#[derive(
    Debug, Clone, Copy, Dupe, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize) -> SourcePosition {
        SourcePosition { line, column }
    }
}

/// Half-open span on a single line: `[start, end)` by column.
#[derive(Debug, Clone, Copy, Dupe, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceSpan {
    pub fn on_line(line: usize, start_column: usize, end_column: usize) -> SourceSpan {
        SourceSpan {
            start: SourcePosition::new(line, start_column),
            end: SourcePosition::new(line, end_column),
        }
    }

    pub fn contains(&self, position: SourcePosition) -> bool {
        position.line == self.start.line
            && position.column >= self.start.column
            && position.column < self.end.column
    }

    pub fn width(&self) -> usize {
        self.end.column.saturating_sub(self.start.column)
    }
}

/// A name occurrence together with where it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRef {
    pub name: String,
    pub span: SourceSpan,
}

/// The raw text of an annotation, resolved against the environment later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRef {
    pub text: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    IntLiteral(SourceSpan),
    FloatLiteral(SourceSpan),
    StrLiteral(SourceSpan),
    BoolLiteral(SourceSpan),
    NoneLiteral(SourceSpan),
    Name(NameRef),
    /// Anything the subset does not model; carries no type information.
    Opaque(SourceSpan),
}

impl Expression {
    pub fn span(&self) -> SourceSpan {
        match self {
            Expression::IntLiteral(span)
            | Expression::FloatLiteral(span)
            | Expression::StrLiteral(span)
            | Expression::BoolLiteral(span)
            | Expression::NoneLiteral(span)
            | Expression::Opaque(span) => *span,
            Expression::Name(name) => name.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: NameRef,
    pub annotation: Option<AnnotationRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionStatement {
    pub name: NameRef,
    pub parameters: Vec<Parameter>,
    pub returns: Option<AnnotationRef>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassStatement {
    pub name: NameRef,
    pub bases: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Import {
        qualifier: Qualifier,
        span: SourceSpan,
    },
    FromImport {
        qualifier: Qualifier,
        names: Vec<NameRef>,
        span: SourceSpan,
    },
    ClassDef(ClassStatement),
    FunctionDef(FunctionStatement),
    AnnAssign {
        target: NameRef,
        annotation: AnnotationRef,
        value: Option<Expression>,
    },
    Assign {
        target: NameRef,
        value: Expression,
    },
    Return {
        value: Option<Expression>,
        span: SourceSpan,
    },
    Pass,
}

/// A successfully parsed source, as stored in the shared heap.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub handle: FileHandle,
    pub qualifier: Qualifier,
    pub text: Arc<String>,
    pub statements: Vec<Statement>,
}

impl ParsedSource {
    /// Top-level define names, classes included; the type-resolution table
    /// is keyed by these.
    pub fn top_level_defines(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::FunctionDef(def) => Some(def.name.name.as_str()),
                Statement::ClassDef(class) => Some(class.name.name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::ClassDef(class) => Some(class.name.name.as_str()),
                _ => None,
            })
            .collect()
    }
}
