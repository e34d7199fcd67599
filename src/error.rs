/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Diagnostics produced by the analysis, grouped per file.

use std::fmt;

use lsp_types::Diagnostic;
use lsp_types::DiagnosticSeverity;
use lsp_types::Position;
use lsp_types::Range;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    IncompatibleReturnType,
    IncompatibleVariableType,
    UndefinedImport,
    InvalidType,
}

impl ErrorKind {
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::IncompatibleReturnType => 7,
            ErrorKind::IncompatibleVariableType => 9,
            ErrorKind::UndefinedImport => 21,
            ErrorKind::InvalidType => 31,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::IncompatibleReturnType => "Incompatible return type",
            ErrorKind::IncompatibleVariableType => "Incompatible variable type",
            ErrorKind::UndefinedImport => "Undefined import",
            ErrorKind::InvalidType => "Invalid type",
        }
    }
}

/// One diagnostic. `path` is always `source_root`-relative; `line` is 1-based
/// and `column` 0-based, matching editor conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    pub path: String,
    pub line: usize,
    pub column: usize,
    pub kind: ErrorKind,
    pub description: String,
}

impl Error {
    pub fn new(
        path: &str,
        line: usize,
        column: usize,
        kind: ErrorKind,
        description: String,
    ) -> Error {
        Error {
            path: path.to_owned(),
            line,
            column,
            kind,
            description,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let position = Position {
            line: self.line.saturating_sub(1) as u32,
            character: self.column as u32,
        };
        Diagnostic {
            range: Range {
                start: position,
                end: position,
            },
            severity: Some(DiagnosticSeverity::ERROR),
            code: Some(lsp_types::NumberOrString::Number(self.kind.code() as i32)),
            message: self.description.clone(),
            ..Default::default()
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} {} [{}]: {}",
            self.path,
            self.line,
            self.column,
            self.kind.name(),
            self.kind.code(),
            self.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_diagnostic_is_zero_indexed() {
        let error = Error::new(
            "a.py",
            3,
            4,
            ErrorKind::IncompatibleVariableType,
            "x is declared to have type `int` but is used as type `str`.".to_owned(),
        );
        let diagnostic = error.to_diagnostic();
        assert_eq!(diagnostic.range.start.line, 2);
        assert_eq!(diagnostic.range.start.character, 4);
        assert_eq!(
            diagnostic.code,
            Some(lsp_types::NumberOrString::Number(9))
        );
    }

    #[test]
    fn test_display_carries_code_and_position() {
        let error = Error::new("a.py", 1, 0, ErrorKind::UndefinedImport, "nope".to_owned());
        assert_eq!(
            error.to_string(),
            "a.py:1:0 Undefined import [21]: nope"
        );
    }
}
