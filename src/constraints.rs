//! Runtime constraints implied by a schema.
//!
//! Constraints are grouped by the schema's [`Shape`]: number bounds and
//! `multipleOf`, string length and pattern, array and object size. Literal
//! restrictions (`const`, `enum`) and `not` apply to every shape. Bounds
//! are folded into the most compact predicate available, so `minLength: 1`
//! becomes `!this.isEmpty` rather than `this.length >= 1`.

use serde_json::Value;

use crate::error::MergeConflict;
use crate::expr::{BinOp, Expr};
use crate::loader::Document;
use crate::merge::{collate, inline_reference};
use crate::resolver::{Diagnostic, Resolver};
use crate::schema::{Schema, SchemaObject};
use crate::synth::Shape;

/// Compute the constraints `schema` places on values of the given shape.
///
/// An `allOf` is collated first and the constraints of the merged schema
/// are returned. `not` sub-schemas nested more than `max_depth` deep are
/// reported as `S001` and contribute nothing.
///
/// # Errors
///
/// Returns `MergeConflict` if an `allOf` (here or under `not`) cannot be
/// merged.
pub fn constraints_for(
    resolver: &mut Resolver<'_>,
    document: &Document,
    schema: &SchemaObject,
    shape: Shape,
    max_depth: usize,
) -> Result<Vec<Expr>, MergeConflict> {
    Constraints {
        resolver,
        document,
        max_depth,
        depth: 0,
    }
    .collect(schema, shape)
}

struct Constraints<'a, 's> {
    resolver: &'a mut Resolver<'s>,
    document: &'a Document,
    max_depth: usize,
    depth: usize,
}

impl Constraints<'_, '_> {
    fn collect(
        &mut self,
        schema: &SchemaObject,
        shape: Shape,
    ) -> Result<Vec<Expr>, MergeConflict> {
        if schema.all_of.as_ref().is_some_and(|branches| !branches.is_empty()) {
            return match collate(self.resolver, self.document, schema)? {
                Schema::Bool(true) => Ok(Vec::new()),
                Schema::Bool(false) => Ok(vec![Expr::literal(false)]),
                Schema::Object(merged) => self.collect(&merged, shape),
            };
        }

        let mut out = Vec::new();
        match shape {
            Shape::Number => number_constraints(schema, &mut out),
            Shape::String => {
                size_constraints("length", schema.min_length, schema.max_length, &mut out);
                if let Some(pattern) = &schema.pattern {
                    out.push(matches(pattern));
                }
                if schema.format.as_deref() == Some("regex") {
                    out.push(Expr::this().member("isRegex"));
                }
            }
            Shape::Array => {
                size_constraints("size", schema.min_items, schema.max_items, &mut out);
                if schema.unique_items == Some(true) {
                    out.push(Expr::this().member("isDistinct"));
                }
            }
            Shape::Object => {
                size_constraints("size", schema.min_properties, schema.max_properties, &mut out);
            }
            Shape::Boolean | Shape::Union | Shape::Any => {}
        }
        literal_constraints(schema, &mut out);
        self.negated(schema, shape, &mut out)?;
        Ok(out)
    }

    /// Constraints of `not`, computed under the parent's type and inverted
    /// one by one.
    fn negated(
        &mut self,
        schema: &SchemaObject,
        shape: Shape,
        out: &mut Vec<Expr>,
    ) -> Result<(), MergeConflict> {
        let negated = match &schema.not {
            None | Some(Schema::Bool(false)) => return Ok(()),
            Some(Schema::Bool(true)) => {
                out.push(Expr::literal(false));
                return Ok(());
            }
            Some(Schema::Object(negated)) => negated,
        };

        if self.depth >= self.max_depth {
            self.resolver.report(Diagnostic::new(
                "S001",
                negated.reference.clone().unwrap_or_default(),
                format!("`not` nesting deeper than {}", self.max_depth),
            ));
            return Ok(());
        }

        let negated = if negated.reference.is_some() {
            match self.resolver.resolve(self.document, negated) {
                Some(resolved) => {
                    inline_reference(self.resolver, self.document, negated, resolved.schema)?
                }
                None => return Ok(()),
            }
        } else {
            Schema::Object(negated.clone())
        };

        let negated = match negated {
            Schema::Bool(false) => return Ok(()),
            Schema::Bool(true) => {
                out.push(Expr::literal(false));
                return Ok(());
            }
            Schema::Object(mut negated) => {
                negated.type_ = schema.type_.clone();
                negated
            }
        };

        self.depth += 1;
        let inner = self.collect(&negated, shape);
        self.depth -= 1;
        out.extend(inner?.into_iter().map(Expr::negate));
        Ok(())
    }
}

/// `this.matches(Regex(pattern))`
pub(crate) fn matches(pattern: &str) -> Expr {
    Expr::this().call(
        "matches",
        vec![Expr::function("Regex", vec![Expr::literal(pattern)])],
    )
}

/// Lower bound with `exclusiveMinimum` folded in, for integral schemas.
pub(crate) fn inclusive_minimum(schema: &SchemaObject) -> Option<f64> {
    let exclusive = schema.exclusive_minimum.map(|x| x.floor() + 1.0);
    fold_bound(schema.minimum, exclusive, f64::max)
}

/// Upper bound with `exclusiveMaximum` folded in, for integral schemas.
pub(crate) fn inclusive_maximum(schema: &SchemaObject) -> Option<f64> {
    let exclusive = schema.exclusive_maximum.map(|x| x.ceil() - 1.0);
    fold_bound(schema.maximum, exclusive, f64::min)
}

fn fold_bound(a: Option<f64>, b: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

fn compare(op: BinOp, bound: f64) -> Expr {
    Expr::this().binary(op, Expr::number(bound))
}

fn number_constraints(schema: &SchemaObject, out: &mut Vec<Expr>) {
    let integral = schema.is_integral();
    let exclusive = schema.exclusive_minimum.is_some() || schema.exclusive_maximum.is_some();

    if integral || !exclusive {
        let lo = inclusive_minimum(schema);
        let hi = inclusive_maximum(schema);
        match (lo, hi) {
            (Some(lo), Some(hi)) => out.push(
                Expr::this().call("isBetween", vec![Expr::number(lo), Expr::number(hi)]),
            ),
            (Some(lo), None) if lo == 0.0 => out.push(Expr::this().member("isPositive")),
            (None, Some(hi)) if hi == -1.0 && integral => {
                out.push(Expr::this().member("isPositive").negate())
            }
            (Some(lo), None) => out.push(compare(BinOp::Ge, lo)),
            (None, Some(hi)) => out.push(compare(BinOp::Le, hi)),
            (None, None) => {}
        }
    } else {
        // Fractional exclusive bounds have no inclusive form.
        if let Some(min) = schema.minimum {
            out.push(compare(BinOp::Ge, min));
        }
        if let Some(min) = schema.exclusive_minimum {
            out.push(compare(BinOp::Gt, min));
        }
        if let Some(max) = schema.maximum {
            out.push(compare(BinOp::Le, max));
        }
        if let Some(max) = schema.exclusive_maximum {
            out.push(compare(BinOp::Lt, max));
        }
    }

    match schema.multiple_of {
        Some(m) if m == 1.0 && integral => {}
        Some(m) if m == 2.0 => out.push(Expr::this().member("isEven")),
        Some(m) => out.push(
            Expr::this()
                .binary(BinOp::Rem, Expr::number(m))
                .binary(BinOp::Eq, Expr::number(0.0)),
        ),
        None => {}
    }
}

/// Length or size bounds; `property` is the member holding the count.
fn size_constraints(property: &str, min: Option<u64>, max: Option<u64>, out: &mut Vec<Expr>) {
    let count = || Expr::this().member(property);
    match (min, max) {
        (None | Some(0), Some(0)) => out.push(Expr::this().member("isEmpty")),
        (Some(1), None) => out.push(Expr::this().member("isEmpty").negate()),
        (None | Some(0), None) => {}
        (Some(lo), Some(hi)) => out.push(count().call(
            "isBetween",
            vec![Expr::number(lo as f64), Expr::number(hi as f64)],
        )),
        (Some(lo), None) => out.push(count().binary(BinOp::Ge, Expr::number(lo as f64))),
        (None, Some(hi)) => out.push(count().binary(BinOp::Le, Expr::number(hi as f64))),
    }
}

fn literal_constraints(schema: &SchemaObject, out: &mut Vec<Expr>) {
    let Some(values) = schema.literal_values() else {
        return;
    };
    let both_booleans = values.len() == 2
        && values.contains(&&Value::Bool(true))
        && values.contains(&&Value::Bool(false));
    if both_booleans {
        return;
    }

    let mut tests = values
        .into_iter()
        .map(|value| Expr::this().binary(BinOp::Eq, Expr::literal(value.clone())));
    match tests.next() {
        Some(first) => out.push(tests.fold(first, Expr::or)),
        // `enum: []` admits nothing
        None => out.push(Expr::literal(false)),
    }
}
