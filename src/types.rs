/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The rendered type surface shared by queries, lookups and diagnostics.

use std::fmt;
use std::sync::Arc;

use dupe::Dupe;

/// A type as the analysis sees it: a nominal class, `None`, or the bottom
/// type. Generics and unions are out of scope for this analysis surface.
#[derive(Debug, Clone, Dupe, PartialEq, Eq, Hash)]
pub enum Type {
    Class(ClassName),
    None,
    NoReturn,
}

pub type ClassName = Arc<str>;

impl Type {
    pub fn class(name: &str) -> Type {
        Type::Class(Arc::from(name))
    }

    pub fn object() -> Type {
        Type::class("object")
    }

    /// Parse a textual annotation. Returns `None` only for text that is not
    /// even shaped like a type; unknown names still parse and are rejected
    /// later by the instantiation check.
    pub fn parse(text: &str) -> Option<Type> {
        let text = text.trim();
        match text {
            "" => None,
            "None" => Some(Type::None),
            "typing.NoReturn" | "NoReturn" => Some(Type::NoReturn),
            _ => {
                if text
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
                    && !text.starts_with(|c: char| c.is_ascii_digit())
                {
                    Some(Type::class(text))
                } else {
                    None
                }
            }
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            Type::None | Type::NoReturn => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Class(name) => f.write_str(name),
            Type::None => f.write_str("None"),
            Type::NoReturn => f.write_str("typing.NoReturn"),
        }
    }
}
