/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Statement-level parser for the analyzed Python subset.
//!
//! The grammar covers what the environment and the checker consume: imports,
//! class and function definitions, annotated and plain assignments, returns
//! and literals. Everything else parses as an opaque expression or fails the
//! file, in which case the file simply does not enter the environment.

use std::sync::Arc;

use crate::module::handle::FileHandle;
use crate::module::qualifier::Qualifier;
use crate::parse::ast::AnnotationRef;
use crate::parse::ast::ClassStatement;
use crate::parse::ast::Expression;
use crate::parse::ast::FunctionStatement;
use crate::parse::ast::NameRef;
use crate::parse::ast::Parameter;
use crate::parse::ast::ParsedSource;
use crate::parse::ast::SourceSpan;
use crate::parse::ast::Statement;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

struct Line<'a> {
    number: usize,
    indent: usize,
    /// Comment-stripped, right-trimmed slice of the full line.
    content: &'a str,
}

pub fn parse_module(handle: FileHandle, text: Arc<String>) -> Result<ParsedSource, ParseError> {
    let lines = significant_lines(&text);
    let mut index = 0;
    let statements = parse_block(&lines, &mut index, 0)?;
    if index < lines.len() {
        return Err(ParseError::new(
            lines[index].number,
            "unexpected indentation",
        ));
    }
    Ok(ParsedSource {
        qualifier: Qualifier::of_handle(&handle),
        handle,
        text,
        statements,
    })
}

fn significant_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let stripped = strip_comment(raw).trim_end();
        if stripped.trim().is_empty() {
            continue;
        }
        let indent = stripped.len() - stripped.trim_start().len();
        lines.push(Line {
            number: i + 1,
            indent,
            content: stripped,
        });
    }
    lines
}

fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '#' => return &line[..i],
                _ => {}
            },
        }
    }
    line
}

fn parse_block(
    lines: &[Line<'_>],
    index: &mut usize,
    indent: usize,
) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();
    while let Some(line) = lines.get(*index) {
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(ParseError::new(line.number, "unexpected indentation"));
        }
        statements.push(parse_statement(lines, index)?);
    }
    Ok(statements)
}

fn parse_statement(lines: &[Line<'_>], index: &mut usize) -> Result<Statement, ParseError> {
    let line = &lines[*index];
    let content = line.content.trim_start();
    let statement = if let Some(rest) = content.strip_prefix("import ") {
        *index += 1;
        parse_import(line, rest)?
    } else if let Some(rest) = content.strip_prefix("from ") {
        *index += 1;
        parse_from_import(line, rest)?
    } else if let Some(rest) = content.strip_prefix("class ") {
        let header = parse_class_header(line, rest)?;
        *index += 1;
        let body = parse_child_block(lines, index, line.indent)?;
        Statement::ClassDef(ClassStatement {
            name: header.0,
            bases: header.1,
            body,
        })
    } else if let Some(rest) = content.strip_prefix("def ") {
        let (name, parameters, returns) = parse_def_header(line, rest)?;
        *index += 1;
        let body = parse_child_block(lines, index, line.indent)?;
        Statement::FunctionDef(FunctionStatement {
            name,
            parameters,
            returns,
            body,
        })
    } else if content == "return" || content.starts_with("return ") {
        *index += 1;
        let span = SourceSpan::on_line(line.number, line.indent, line.content.len());
        let value = content
            .strip_prefix("return")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| parse_expression(line, v));
        Statement::Return { value, span }
    } else if content == "pass" {
        *index += 1;
        Statement::Pass
    } else {
        *index += 1;
        parse_assignment(line, content)?
    };
    Ok(statement)
}

/// The indented block following a `class`/`def` header; empty when the next
/// significant line does not indent further.
fn parse_child_block(
    lines: &[Line<'_>],
    index: &mut usize,
    parent_indent: usize,
) -> Result<Vec<Statement>, ParseError> {
    match lines.get(*index) {
        Some(line) if line.indent > parent_indent => parse_block(lines, index, line.indent),
        _ => Ok(Vec::new()),
    }
}

fn parse_import(line: &Line<'_>, rest: &str) -> Result<Statement, ParseError> {
    let module = rest.split(" as ").next().unwrap_or(rest).trim();
    if !is_dotted_name(module) {
        return Err(ParseError::new(line.number, "malformed import"));
    }
    Ok(Statement::Import {
        qualifier: Qualifier::from_str(module),
        span: SourceSpan::on_line(line.number, line.indent, line.content.len()),
    })
}

fn parse_from_import(line: &Line<'_>, rest: &str) -> Result<Statement, ParseError> {
    let Some((module, imported)) = rest.split_once(" import ") else {
        return Err(ParseError::new(line.number, "malformed from-import"));
    };
    let module = module.trim();
    if !is_dotted_name(module) {
        return Err(ParseError::new(line.number, "malformed from-import"));
    }
    let mut names = Vec::new();
    // Column arithmetic works on the full line; `rest` starts after "from ".
    let imported_offset = line.content.len() - imported.len();
    let mut cursor = 0;
    for piece in imported.split(',') {
        let bound = piece.split(" as ").last().unwrap_or(piece);
        let trimmed = bound.trim();
        if trimmed.is_empty() || !is_identifier(trimmed) {
            return Err(ParseError::new(line.number, "malformed from-import"));
        }
        let start = imported_offset + cursor + piece.rfind(trimmed).unwrap_or(0);
        names.push(NameRef {
            name: trimmed.to_owned(),
            span: SourceSpan::on_line(line.number, start, start + trimmed.len()),
        });
        cursor += piece.len() + 1;
    }
    Ok(Statement::FromImport {
        qualifier: Qualifier::from_str(module),
        names,
        span: SourceSpan::on_line(line.number, line.indent, line.content.len()),
    })
}

fn parse_class_header(
    line: &Line<'_>,
    rest: &str,
) -> Result<(NameRef, Vec<String>), ParseError> {
    let rest = rest.trim_end();
    let Some(rest) = rest.strip_suffix(':') else {
        return Err(ParseError::new(line.number, "class header must end in `:`"));
    };
    let (name, bases) = match rest.split_once('(') {
        Some((name, bases)) => {
            let Some(bases) = bases.strip_suffix(')') else {
                return Err(ParseError::new(line.number, "unbalanced class bases"));
            };
            let bases = bases
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_owned)
                .collect();
            (name.trim(), bases)
        }
        None => (rest.trim(), Vec::new()),
    };
    if !is_identifier(name) {
        return Err(ParseError::new(line.number, "malformed class name"));
    }
    let start = line.indent + "class ".len();
    Ok((
        NameRef {
            name: name.to_owned(),
            span: SourceSpan::on_line(line.number, start, start + name.len()),
        },
        bases,
    ))
}

fn parse_def_header(
    line: &Line<'_>,
    rest: &str,
) -> Result<(NameRef, Vec<Parameter>, Option<AnnotationRef>), ParseError> {
    let rest = rest.trim_end();
    let Some(rest) = rest.strip_suffix(':') else {
        return Err(ParseError::new(line.number, "def header must end in `:`"));
    };
    let Some(open) = rest.find('(') else {
        return Err(ParseError::new(line.number, "def header missing `(`"));
    };
    let Some(close) = rest.rfind(')') else {
        return Err(ParseError::new(line.number, "def header missing `)`"));
    };
    let name = rest[..open].trim();
    if !is_identifier(name) {
        return Err(ParseError::new(line.number, "malformed def name"));
    }
    let name_start = line.indent + "def ".len();
    let params_offset = line.indent + "def ".len() + open + 1;
    let parameters = parse_parameters(line, &rest[open + 1..close], params_offset)?;
    let returns = rest[close + 1..].trim().strip_prefix("->").map(|annotation| {
        let text = annotation.trim().to_owned();
        // The annotation sits at the very end of `rest` (the `:` is gone).
        let start = line.indent + "def ".len() + rest.len() - text.len();
        AnnotationRef {
            span: SourceSpan::on_line(line.number, start, start + text.len()),
            text,
        }
    });
    Ok((
        NameRef {
            name: name.to_owned(),
            span: SourceSpan::on_line(line.number, name_start, name_start + name.len()),
        },
        parameters,
        returns,
    ))
}

fn parse_parameters(
    line: &Line<'_>,
    params: &str,
    offset: usize,
) -> Result<Vec<Parameter>, ParseError> {
    let mut parameters = Vec::new();
    if params.trim().is_empty() {
        return Ok(parameters);
    }
    let mut cursor = 0;
    for piece in params.split(',') {
        let leading = piece.len() - piece.trim_start().len();
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            cursor += piece.len() + 1;
            continue;
        }
        let (name, annotation) = match trimmed.split_once(':') {
            Some((name, annotation)) => (name.trim(), Some(annotation.trim())),
            None => (trimmed.split('=').next().unwrap_or(trimmed).trim(), None),
        };
        if !is_identifier(name) {
            return Err(ParseError::new(line.number, "malformed parameter"));
        }
        let start = offset + cursor + leading;
        let annotation = annotation.map(|text| {
            let ann_start = offset + cursor + piece.len() - text.len();
            AnnotationRef {
                text: text.to_owned(),
                span: SourceSpan::on_line(line.number, ann_start, ann_start + text.len()),
            }
        });
        parameters.push(Parameter {
            name: NameRef {
                name: name.to_owned(),
                span: SourceSpan::on_line(line.number, start, start + name.len()),
            },
            annotation,
        });
        cursor += piece.len() + 1;
    }
    Ok(parameters)
}

fn parse_assignment(line: &Line<'_>, content: &str) -> Result<Statement, ParseError> {
    let colon = content.find(':');
    let equals = content.find('=');
    match (colon, equals) {
        // `name: Ann` or `name: Ann = value`
        (Some(colon), equals) if equals.map_or(true, |eq| colon < eq) => {
            let target = content[..colon].trim();
            if !is_identifier(target) {
                return Err(ParseError::new(line.number, "unsupported statement"));
            }
            let after = &content[colon + 1..];
            let (annotation_text, value_text) = match after.split_once('=') {
                Some((annotation, value)) => (annotation.trim(), Some(value.trim())),
                None => (after.trim(), None),
            };
            if annotation_text.is_empty() {
                return Err(ParseError::new(line.number, "empty annotation"));
            }
            let ann_start = line.indent + colon + 1 + (after.len() - after.trim_start().len());
            let value = value_text.filter(|v| !v.is_empty()).map(|v| {
                let value_start = line.content.len() - v.len();
                parse_expression_at(line, v, value_start)
            });
            Ok(Statement::AnnAssign {
                target: NameRef {
                    name: target.to_owned(),
                    span: SourceSpan::on_line(line.number, line.indent, line.indent + target.len()),
                },
                annotation: AnnotationRef {
                    text: annotation_text.to_owned(),
                    span: SourceSpan::on_line(
                        line.number,
                        ann_start,
                        ann_start + annotation_text.len(),
                    ),
                },
                value,
            })
        }
        // `name = value`
        (_, Some(equals)) => {
            let target = content[..equals].trim();
            if !is_identifier(target) {
                return Err(ParseError::new(line.number, "unsupported statement"));
            }
            let value_text = content[equals + 1..].trim();
            if value_text.is_empty() {
                return Err(ParseError::new(line.number, "assignment missing value"));
            }
            let value_start = line.content.len() - value_text.len();
            Ok(Statement::Assign {
                target: NameRef {
                    name: target.to_owned(),
                    span: SourceSpan::on_line(line.number, line.indent, line.indent + target.len()),
                },
                value: parse_expression_at(line, value_text, value_start),
            })
        }
        _ => Err(ParseError::new(line.number, "unsupported statement")),
    }
}

fn parse_expression(line: &Line<'_>, text: &str) -> Expression {
    let start = line.content.len() - text.len();
    parse_expression_at(line, text, start)
}

fn parse_expression_at(line: &Line<'_>, text: &str, start: usize) -> Expression {
    let span = SourceSpan::on_line(line.number, start, start + text.len());
    if text == "None" {
        Expression::NoneLiteral(span)
    } else if text == "True" || text == "False" {
        Expression::BoolLiteral(span)
    } else if text.starts_with('"') || text.starts_with('\'') {
        Expression::StrLiteral(span)
    } else if is_int_literal(text) {
        Expression::IntLiteral(span)
    } else if is_float_literal(text) {
        Expression::FloatLiteral(span)
    } else if is_identifier(text) {
        Expression::Name(NameRef {
            name: text.to_owned(),
            span,
        })
    } else {
        Expression::Opaque(span)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn is_dotted_name(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_identifier)
}

fn is_int_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_float_literal(s: &str) -> bool {
    s.contains('.') && s.parse::<f64>().is_ok()
}
