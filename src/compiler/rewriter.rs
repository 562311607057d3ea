//! # Rewrite driver
//!
//! Applies a set of memref lowering rules across a module until a full walk
//! performs no rewrite.
//!
//! ## Algorithm
//!
//! Each walk visits a region's operations in program order. A memref op whose
//! kind is in the rule set is handed to its lowering through a
//! [`PatternRewriter`]; the ops the lowering inserted before it and its
//! replacement are spliced in place. Ops that are not rewritten have their
//! nested regions walked (depth-first) and are kept as they are.
//!
//! A failing lowering aborts the walk, leaving the failing op and everything
//! after it in its region untouched.

use super::address::InstructionSink;
use super::ir::{BufferType, MemrefOpKind, Module, Operation, Region, Type, Value, ValueTable};
use super::lowering::{lower, PassContext};
use crate::{Error, Result};

/// Rewrite handle given to one lowering invocation
pub struct PatternRewriter<'a> {
    values: &'a mut ValueTable,
    annotate: bool,
    before: Vec<Operation>,
    replacement: Option<Vec<Operation>>,
}

impl<'a> PatternRewriter<'a> {
    /// Create a rewriter allocating values from `values`
    pub fn new(values: &'a mut ValueTable, annotate: bool) -> Self {
        Self {
            values,
            annotate,
            before: Vec::new(),
            replacement: None,
        }
    }

    /// Fresh instruction sink over this rewriter's value table
    pub fn sink(&mut self) -> InstructionSink<'_> {
        InstructionSink::new(&mut *self.values).annotate(self.annotate)
    }

    /// Declared type of a value
    pub fn type_of(&self, value: Value) -> Result<Type> {
        self.values.type_of(value).cloned()
    }

    /// Declared type of a value that must be a buffer
    pub fn buffer_type_of(&self, value: Value) -> Result<BufferType> {
        let ty = self.values.type_of(value)?;
        ty.as_buffer().cloned().ok_or_else(|| {
            Error::malformed(format!("expected {} to be a memref, found {}", value, ty))
        })
    }

    /// Insert operations immediately before the matched op
    pub fn insert_before_matched_op(&mut self, ops: Vec<Operation>) {
        self.before.extend(ops);
    }

    /// Replace the matched op with the given sequence
    pub fn replace_matched_op(&mut self, ops: Vec<Operation>) {
        self.replacement = Some(ops);
    }

    /// Returns true once the matched op has been replaced
    pub fn has_replaced(&self) -> bool {
        self.replacement.is_some()
    }

    /// Inserted ops followed by the replacement, or None if the matched op
    /// was never replaced
    pub fn finish(self) -> Option<Vec<Operation>> {
        let mut ops = self.before;
        ops.extend(self.replacement?);
        Some(ops)
    }
}

/// Walks a module applying one rule set to fixpoint
pub struct RewriteWalker<'r> {
    rules: &'r [MemrefOpKind],
    max_iterations: usize,
}

impl<'r> RewriteWalker<'r> {
    /// Create a walker for the given rules
    pub fn new(rules: &'r [MemrefOpKind], max_iterations: usize) -> Self {
        Self {
            rules,
            max_iterations,
        }
    }

    /// Rewrite until a walk makes no change; returns the number of ops rewritten
    pub fn rewrite_module(&self, module: &mut Module, ctx: &mut PassContext<'_>) -> Result<usize> {
        let mut total = 0;
        for iteration in 0..self.max_iterations {
            let rewritten = self.rewrite_region(&mut module.body, &mut module.values, ctx)?;
            tracing::trace!(iteration, rewritten, "rewrite walk finished");
            if rewritten == 0 {
                return Ok(total);
            }
            total += rewritten;
        }
        Err(Error::IterationLimit {
            limit: self.max_iterations,
        })
    }

    fn rewrite_region(
        &self,
        region: &mut Region,
        values: &mut ValueTable,
        ctx: &mut PassContext<'_>,
    ) -> Result<usize> {
        let mut pending = std::mem::take(&mut region.ops).into_iter();
        let mut out = Vec::with_capacity(pending.len());
        let mut rewritten = 0;

        while let Some(mut op) = pending.next() {
            let outcome = match &op {
                Operation::Memref(memref_op) if self.rules.contains(&memref_op.kind()) => {
                    let mut rewriter = PatternRewriter::new(values, ctx.options.annotate);
                    lower(memref_op, &mut rewriter, ctx).map(|()| rewriter.finish())
                }
                _ => Ok(None),
            };

            match outcome {
                Ok(Some(replacement)) => {
                    rewritten += 1;
                    out.extend(replacement);
                }
                Ok(None) => {
                    let mut nested = Ok(0);
                    for inner in op.regions_mut() {
                        nested = self.rewrite_region(inner, values, ctx);
                        match &nested {
                            Ok(count) => rewritten += count,
                            Err(_) => break,
                        }
                    }
                    out.push(op);
                    if let Err(err) = nested {
                        out.extend(pending);
                        region.ops = out;
                        return Err(err);
                    }
                }
                Err(err) => {
                    out.push(op);
                    out.extend(pending);
                    region.ops = out;
                    return Err(err);
                }
            }
        }

        region.ops = out;
        Ok(rewritten)
    }
}
