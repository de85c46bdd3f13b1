// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Filter Expression Evaluator
//!
//! Evaluates parsed filter expressions against sample payloads.

use super::parser::{Expression, Operator, Value};
use super::{FilterError, FilterKind, FilterParameters};
use crate::core::types::{Data, FieldValue};
use arc_swap::ArcSwap;
use std::cmp::Ordering;
use std::sync::Arc;

const FLOAT_EPSILON: f64 = 1e-9;

/// Evaluates one compiled filter against payloads.
///
/// Parameters are read through an [`ArcSwap`]. A scan over several samples
/// takes one [`FilterSnapshot`] so that every sample sees the same set even
/// while another thread replaces it.
#[derive(Clone, Debug)]
pub struct FilterEvaluator {
    kind: FilterKind,
    parameters: Arc<ArcSwap<FilterParameters>>,
}

impl FilterEvaluator {
    pub(crate) fn new(kind: FilterKind, parameters: Arc<ArcSwap<FilterParameters>>) -> Self {
        Self { kind, parameters }
    }

    /// Pin the current parameter set.
    #[must_use]
    pub fn snapshot(&self) -> FilterSnapshot<'_> {
        FilterSnapshot {
            kind: &self.kind,
            parameters: self.parameters.load_full(),
        }
    }

    /// `Ok(true)` if `data` satisfies the filter under the current parameters.
    pub fn matches(&self, data: &Data) -> Result<bool, FilterError> {
        self.snapshot().matches(data)
    }
}

/// A filter bound to one parameter set.
#[derive(Debug)]
pub struct FilterSnapshot<'a> {
    kind: &'a FilterKind,
    parameters: Arc<FilterParameters>,
}

impl FilterSnapshot<'_> {
    pub fn matches(&self, data: &Data) -> Result<bool, FilterError> {
        match self.kind {
            FilterKind::Sql(expression) => evaluate(expression, data, &self.parameters.values),
            FilterKind::Custom { predicate, .. } => Ok(predicate(data, &self.parameters.raw)),
        }
    }

    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters.raw
    }
}

fn evaluate(expr: &Expression, data: &Data, params: &[FieldValue]) -> Result<bool, FilterError> {
    match expr {
        Expression::True => Ok(true),
        Expression::Comparison { left, op, right } => {
            let left = resolve(left, data, params)?;
            let right = resolve(right, data, params)?;
            compare(&left, *op, &right)
        }
        Expression::And(a, b) => Ok(evaluate(a, data, params)? && evaluate(b, data, params)?),
        Expression::Or(a, b) => Ok(evaluate(a, data, params)? || evaluate(b, data, params)?),
        Expression::Not(inner) => Ok(!evaluate(inner, data, params)?),
    }
}

fn resolve(value: &Value, data: &Data, params: &[FieldValue]) -> Result<FieldValue, FilterError> {
    match value {
        Value::Integer(n) => Ok(FieldValue::Integer(*n)),
        Value::Float(f) => Ok(FieldValue::Float(*f)),
        Value::String(s) => Ok(FieldValue::String(s.clone())),
        Value::Boolean(b) => Ok(FieldValue::Boolean(*b)),
        Value::Parameter(idx) => params
            .get(*idx)
            .cloned()
            .ok_or(FilterError::ParameterOutOfRange(*idx)),
        Value::Field(name) => data
            .get(name)
            .cloned()
            .ok_or_else(|| FilterError::UnknownField(name.clone())),
    }
}

/// Promote mixed numeric operands to a common representation.
fn coerce(left: &FieldValue, right: &FieldValue) -> (FieldValue, FieldValue) {
    use FieldValue::*;

    match (left, right) {
        (Integer(a), Float(b)) => (Float(*a as f64), Float(*b)),
        (Float(a), Integer(b)) => (Float(*a), Float(*b as f64)),
        (Unsigned(a), Float(b)) => (Float(*a as f64), Float(*b)),
        (Float(a), Unsigned(b)) => (Float(*a), Float(*b as f64)),
        (Unsigned(a), Integer(b)) => (Integer(saturating_i64(*a)), Integer(*b)),
        (Integer(a), Unsigned(b)) => (Integer(*a), Integer(saturating_i64(*b))),
        _ => (left.clone(), right.clone()),
    }
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn compare(left: &FieldValue, op: Operator, right: &FieldValue) -> Result<bool, FilterError> {
    use FieldValue::*;

    let (left, right) = coerce(left, right);
    match (&left, &right) {
        (Integer(a), Integer(b)) => Ok(apply(a.cmp(b), op)),
        (Unsigned(a), Unsigned(b)) => Ok(apply(a.cmp(b), op)),
        // Literal comparison: '*' and '?' have no special meaning here.
        (String(a), String(b)) => Ok(apply(a.as_str().cmp(b.as_str()), op)),
        (Float(a), Float(b)) => Ok(compare_float(*a, op, *b)),
        (Boolean(a), Boolean(b)) => match op {
            Operator::Eq => Ok(a == b),
            Operator::Ne => Ok(a != b),
            _ => Err(FilterError::TypeMismatch(
                "Boolean only supports = and <>".to_string(),
            )),
        },
        _ => Err(FilterError::TypeMismatch(format!(
            "Cannot compare {:?} with {:?}",
            left, right
        ))),
    }
}

fn apply(ordering: Ordering, op: Operator) -> bool {
    match op {
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Ge => ordering != Ordering::Less,
        Operator::Le => ordering != Ordering::Greater,
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Ne => ordering != Ordering::Equal,
    }
}

fn compare_float(a: f64, op: Operator, b: f64) -> bool {
    let close = (a - b).abs() < FLOAT_EPSILON;
    match op {
        Operator::Gt => a > b && !close,
        Operator::Lt => a < b && !close,
        Operator::Ge => a >= b || close,
        Operator::Le => a <= b || close,
        Operator::Eq => close,
        Operator::Ne => !close,
    }
}
