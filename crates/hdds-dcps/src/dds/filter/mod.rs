// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Content Filter Expression Parser and Evaluator
//!
//! SQL-like filter expressions used by content-filtered topics and query
//! conditions, plus the per-reader delivery [`pipeline`].
//!
//! # Supported Syntax
//!
//! ```text
//! expression ::= condition
//!              | expression AND expression
//!              | expression OR expression
//!              | NOT expression
//!              | '(' expression ')'
//!
//! condition  ::= value operator value
//! operator   ::= '>' | '<' | '>=' | '<=' | '=' | '==' | '<>' | '!='
//! value      ::= field_name | parameter | literal
//! parameter  ::= '%' digit+
//! literal    ::= integer | float | 'string' | TRUE | FALSE
//! ```
//!
//! String comparison is literal. Unlike partition names, a parameter such as
//! `'B*'` only matches the exact text `B*`.
//!
//! # Parameters
//!
//! Each parameter string is converted once, when set: `'text'` is a string,
//! otherwise the first of integer, float, boolean that parses wins, and
//! anything else is a string. Replacement swaps the whole set atomically.
//!
//! ```
//! use hdds_dcps::dds::filter::ContentFilter;
//! use hdds_dcps::Data;
//!
//! let filter = ContentFilter::new("x < %0", vec!["4".to_string()])?;
//! assert!(filter.matches(&Data::new().with("x", 3))?);
//!
//! filter.set_parameters(vec!["2".to_string()])?;
//! assert!(!filter.matches(&Data::new().with("x", 3))?);
//! # Ok::<(), hdds_dcps::dds::filter::FilterError>(())
//! ```

mod evaluator;
mod parser;
/// Per-reader filter chain: content filter then time-based filter.
pub mod pipeline;

pub use evaluator::{FilterEvaluator, FilterSnapshot};
pub use parser::{parse_expression, Expression, Operator, Value};
pub use pipeline::{FilterPipeline, Verdict};

use crate::core::types::{Data, FieldValue, TypeDescriptor};
use crate::dds::Error;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// A parameter set as supplied and as converted for evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParameters {
    pub raw: Vec<String>,
    pub values: Vec<FieldValue>,
}

impl FilterParameters {
    #[must_use]
    pub fn parse(raw: Vec<String>) -> Self {
        let values = raw.iter().map(|p| parse_parameter(p)).collect();
        Self { raw, values }
    }
}

fn parse_parameter(raw: &str) -> FieldValue {
    let text = raw.trim();
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return FieldValue::String(text[1..text.len() - 1].to_string());
    }
    if let Ok(n) = text.parse::<i64>() {
        FieldValue::Integer(n)
    } else if let Ok(f) = text.parse::<f64>() {
        FieldValue::Float(f)
    } else if text.eq_ignore_ascii_case("true") {
        FieldValue::Boolean(true)
    } else if text.eq_ignore_ascii_case("false") {
        FieldValue::Boolean(false)
    } else {
        FieldValue::String(text.to_string())
    }
}

/// Predicate of a user-defined filter: the payload and the current
/// parameter strings.
pub type FilterFn = dyn Fn(&Data, &[String]) -> bool + Send + Sync;

/// How a [`ContentFilter`] decides.
#[derive(Clone)]
pub(crate) enum FilterKind {
    Sql(Arc<Expression>),
    Custom {
        parameter_count: usize,
        predicate: Arc<FilterFn>,
    },
}

impl FilterKind {
    fn parameter_count(&self) -> usize {
        match self {
            FilterKind::Sql(expression) => expression.parameter_count(),
            FilterKind::Custom {
                parameter_count, ..
            } => *parameter_count,
        }
    }
}

impl std::fmt::Debug for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterKind::Sql(expression) => f.debug_tuple("Sql").field(expression).finish(),
            FilterKind::Custom {
                parameter_count, ..
            } => f
                .debug_struct("Custom")
                .field("parameter_count", parameter_count)
                .finish_non_exhaustive(),
        }
    }
}

/// Compiled filter with replaceable parameters.
///
/// Either an SQL-like expression or a user predicate. Clones share the
/// parameter set: replacing the parameters through one clone is seen by
/// every reader evaluating through another.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    expression_str: String,
    kind: FilterKind,
    parameters: Arc<ArcSwap<FilterParameters>>,
}

impl ContentFilter {
    /// Parse `expression` and bind `parameters` (one per `%n`).
    pub fn new(expression: &str, parameters: Vec<String>) -> Result<Self, FilterError> {
        let parsed = parse_expression(expression)?;
        check_count(parsed.parameter_count(), parameters.len())?;
        Ok(Self {
            expression_str: expression.to_string(),
            kind: FilterKind::Sql(Arc::new(parsed)),
            parameters: Arc::new(ArcSwap::from_pointee(FilterParameters::parse(parameters))),
        })
    }

    /// Like [`ContentFilter::new`], also rejecting fields `descriptor` lacks.
    pub fn compile(
        expression: &str,
        parameters: Vec<String>,
        descriptor: &TypeDescriptor,
    ) -> Result<Self, FilterError> {
        let filter = Self::new(expression, parameters)?;
        if let FilterKind::Sql(parsed) = &filter.kind {
            parsed.check_fields(descriptor)?;
        }
        Ok(filter)
    }

    /// User-defined filter. `expression` is informational; the predicate
    /// receives the current parameters on every evaluation, and their
    /// count stays fixed at `parameters.len()`.
    ///
    /// ```
    /// use hdds_dcps::dds::filter::ContentFilter;
    /// use hdds_dcps::{Data, FieldValue};
    ///
    /// let filter = ContentFilter::custom("%0 divides x", vec!["3".into()], |data, params| {
    ///     let divisor: i64 = params[0].parse().unwrap_or(1);
    ///     matches!(data.get("x"), Some(FieldValue::Integer(x)) if x % divisor == 0)
    /// });
    /// assert!(filter.matches(&Data::new().with("x", 9))?);
    /// assert!(!filter.matches(&Data::new().with("x", 10))?);
    /// # Ok::<(), hdds_dcps::dds::filter::FilterError>(())
    /// ```
    pub fn custom<F>(expression: &str, parameters: Vec<String>, predicate: F) -> Self
    where
        F: Fn(&Data, &[String]) -> bool + Send + Sync + 'static,
    {
        Self {
            expression_str: expression.to_string(),
            kind: FilterKind::Custom {
                parameter_count: parameters.len(),
                predicate: Arc::new(predicate),
            },
            parameters: Arc::new(ArcSwap::from_pointee(FilterParameters::parse(parameters))),
        }
    }

    /// Parameterless filter from a closure over the payload.
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&Data) -> bool + Send + Sync + 'static,
    {
        Self::custom("<lambda>", Vec::new(), move |data, _| predicate(data))
    }

    /// Replace the parameter set. The count must stay the same.
    pub fn set_parameters(&self, parameters: Vec<String>) -> Result<(), FilterError> {
        check_count(self.kind.parameter_count(), parameters.len())?;
        self.parameters
            .store(Arc::new(FilterParameters::parse(parameters)));
        Ok(())
    }

    #[must_use]
    pub fn parameters(&self) -> Vec<String> {
        self.parameters.load().raw.clone()
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression_str
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.kind.parameter_count()
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self.kind, FilterKind::Custom { .. })
    }

    #[must_use]
    pub fn evaluator(&self) -> FilterEvaluator {
        FilterEvaluator::new(self.kind.clone(), Arc::clone(&self.parameters))
    }

    pub fn matches(&self, data: &Data) -> Result<bool, FilterError> {
        self.evaluator().matches(data)
    }
}

fn check_count(expected: usize, provided: usize) -> Result<(), FilterError> {
    if expected == provided {
        Ok(())
    } else {
        Err(FilterError::ParameterCountMismatch { expected, provided })
    }
}

/// Errors that can occur during filter operations.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Invalid filter expression syntax.
    ParseError(String),
    /// Unknown field name in expression.
    UnknownField(String),
    /// Parameter index out of range.
    ParameterOutOfRange(usize),
    /// Number of supplied parameters differs from the expression's.
    ParameterCountMismatch { expected: usize, provided: usize },
    /// Type mismatch during evaluation.
    TypeMismatch(String),
    /// Empty expression.
    EmptyExpression,
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::ParseError(msg) => write!(f, "Filter parse error: {}", msg),
            FilterError::UnknownField(name) => write!(f, "Unknown field: {}", name),
            FilterError::ParameterOutOfRange(idx) => write!(f, "Parameter %{} not provided", idx),
            FilterError::ParameterCountMismatch { expected, provided } => write!(
                f,
                "Expression expects {} parameter(s), {} provided",
                expected, provided
            ),
            FilterError::TypeMismatch(msg) => write!(f, "Type mismatch: {}", msg),
            FilterError::EmptyExpression => write!(f, "Empty filter expression"),
        }
    }
}

impl std::error::Error for FilterError {}

impl From<FilterError> for Error {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::ParameterCountMismatch { .. } => Error::PreconditionNotMet(e.to_string()),
            other => Error::BadParameter(other.to_string()),
        }
    }
}
