// src/variant/expand.rs

//! Cartesian expansion of a variant table

use crate::error::Result;
use crate::selector::SelectorEvaluator;
use crate::variant::{VariantCombination, VariantTable};
use tracing::debug;

/// One independent axis of the product: a lone dimension, or a zip group
/// whose members advance together
#[derive(Debug, Clone)]
struct Axis {
    names: Vec<String>,
    tuples: Vec<Vec<String>>,
}

/// Expands a variant table into the combinations to build
///
/// The first declared dimension varies slowest. A zip group occupies the
/// position of its first declared member. Combinations matching the skip
/// selector are left out.
pub struct VariantExpander<'a> {
    axes: Vec<Axis>,
    evaluator: &'a dyn SelectorEvaluator,
    skip: Option<String>,
}

impl<'a> VariantExpander<'a> {
    pub fn new(table: &VariantTable, evaluator: &'a dyn SelectorEvaluator) -> Result<Self> {
        table.validate()?;

        let mut axes: Vec<Axis> = Vec::new();
        for dim in table.dimensions() {
            match table.zip_groups().iter().find(|g| g.contains(&dim.name)) {
                Some(group) => {
                    if axes.iter().any(|a| a.names.contains(&dim.name)) {
                        continue;
                    }
                    let members: Vec<_> = table
                        .dimensions()
                        .iter()
                        .filter(|d| group.contains(&d.name))
                        .collect();
                    let tuples = (0..dim.values.len())
                        .map(|i| members.iter().map(|m| m.values[i].clone()).collect())
                        .collect();
                    axes.push(Axis {
                        names: members.iter().map(|m| m.name.clone()).collect(),
                        tuples,
                    });
                }
                None => axes.push(Axis {
                    names: vec![dim.name.clone()],
                    tuples: dim.values.iter().map(|v| vec![v.clone()]).collect(),
                }),
            }
        }

        Ok(Self {
            axes,
            evaluator,
            skip: None,
        })
    }

    /// Leave out combinations for which `expr` holds
    pub fn with_skip(mut self, expr: Option<&str>) -> Self {
        self.skip = expr.map(String::from);
        self
    }

    /// Size of the product before skipping
    pub fn candidate_count(&self) -> usize {
        self.axes.iter().map(|a| a.tuples.len()).product()
    }

    /// Every combination of the product, ignoring the skip selector
    pub fn candidates(&self) -> Candidates<'_> {
        Candidates {
            axes: &self.axes,
            indices: vec![0; self.axes.len()],
            done: self.axes.iter().any(|a| a.tuples.is_empty()),
        }
    }

    /// Combinations to build, in order
    ///
    /// Each call starts a fresh pass over the product.
    pub fn iter(&self) -> impl Iterator<Item = VariantCombination> + '_ {
        self.candidates().filter(move |combo| match &self.skip {
            Some(expr) if self.evaluator.evaluate(expr, combo) => {
                debug!("Skipping variant {}", combo);
                false
            }
            _ => true,
        })
    }

    /// Collect all combinations to build
    pub fn expand(&self) -> Vec<VariantCombination> {
        self.iter().collect()
    }
}

/// Odometer over the axes of a [`VariantExpander`]
pub struct Candidates<'e> {
    axes: &'e [Axis],
    indices: Vec<usize>,
    done: bool,
}

impl Iterator for Candidates<'_> {
    type Item = VariantCombination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut combo = VariantCombination::new();
        for (axis, &i) in self.axes.iter().zip(&self.indices) {
            for (name, value) in axis.names.iter().zip(&axis.tuples[i]) {
                combo.insert(name.clone(), value.clone());
            }
        }

        // Advance the last axis fastest; wrapping every axis ends the pass
        self.done = true;
        for pos in (0..self.axes.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.axes[pos].tuples.len() {
                self.done = false;
                break;
            }
            self.indices[pos] = 0;
        }

        Some(combo)
    }
}
