// src/spec/simplify.rs

//! Collapsing duplicate requirements
//!
//! Build and host sections often name the same package several times: once
//! from the recipe, once from a variant pin, once from a compiler
//! activation. Duplicates are collapsed to the single most specific spec,
//! and an exact pin always wins. Build and host end up agreeing on every
//! package they share.

use crate::error::{Error, Result};
use crate::spec::RequirementSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Requirement sections of a rendered package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub build: Vec<RequirementSpec>,
    #[serde(default)]
    pub host: Vec<RequirementSpec>,
    #[serde(default)]
    pub run: Vec<RequirementSpec>,
    #[serde(default)]
    pub run_constrained: Vec<RequirementSpec>,
}

impl Requirements {
    /// Whether every section is empty
    pub fn is_empty(&self) -> bool {
        self.build.is_empty()
            && self.host.is_empty()
            && self.run.is_empty()
            && self.run_constrained.is_empty()
    }

    /// The environment run pins are resolved against: host, or build when
    /// the recipe has no host section
    pub fn pin_source(&self) -> &[RequirementSpec] {
        if self.host.is_empty() {
            &self.build
        } else {
            &self.host
        }
    }
}

/// Pick the spec every occurrence of one package collapses to
fn choose<'a>(name: &str, occurrences: &[&'a RequirementSpec]) -> Result<&'a RequirementSpec> {
    let mut exact: Option<&'a RequirementSpec> = None;
    for spec in occurrences.iter().copied().filter(|s| s.is_exact()) {
        match exact {
            None => exact = Some(spec),
            Some(first) if first.to_string() != spec.to_string() => {
                return Err(Error::ConstraintConflict {
                    name: name.to_string(),
                    first: first.to_string(),
                    second: spec.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    if let Some(spec) = exact {
        return Ok(spec);
    }

    // Strictly greater replaces, so ties keep the first occurrence
    let mut best = occurrences[0];
    for spec in occurrences[1..].iter().copied() {
        if spec.kind() > best.kind() {
            best = spec;
        }
    }
    Ok(best)
}

/// Collapse duplicate build/host requirements in place
///
/// Every package named more than once across the build and host sections
/// is replaced, in both sections, by one spec: the exact pin when there is
/// one, otherwise the most specific occurrence (first seen on ties). The
/// replacement takes the position of the package's first occurrence in each
/// section. Disagreeing exact pins are a [`Error::ConstraintConflict`].
/// Run sections are left untouched.
pub fn simplify_to_exact_constraints(requirements: &mut Requirements) -> Result<()> {
    let mut order: Vec<&str> = Vec::new();
    let mut occurrences: HashMap<&str, Vec<&RequirementSpec>> = HashMap::new();

    for spec in requirements.build.iter().chain(requirements.host.iter()) {
        let entry = occurrences.entry(spec.name.as_str()).or_default();
        if entry.is_empty() {
            order.push(spec.name.as_str());
        }
        entry.push(spec);
    }

    let mut winners: HashMap<String, RequirementSpec> = HashMap::new();
    for name in order {
        let specs = &occurrences[name];
        if specs.len() < 2 {
            continue;
        }
        let winner = choose(name, specs)?;
        debug!("Collapsed {} occurrences of {} to '{}'", specs.len(), name, winner);
        winners.insert(name.to_string(), winner.clone());
    }

    if winners.is_empty() {
        return Ok(());
    }

    let collapse = |section: &[RequirementSpec]| -> Vec<RequirementSpec> {
        let mut emitted: Vec<&str> = Vec::new();
        let mut out = Vec::with_capacity(section.len());
        for spec in section {
            match winners.get(&spec.name) {
                Some(winner) => {
                    if !emitted.contains(&spec.name.as_str()) {
                        emitted.push(spec.name.as_str());
                        out.push(winner.clone());
                    }
                }
                None => out.push(spec.clone()),
            }
        }
        out
    };

    let build = collapse(&requirements.build);
    let host = collapse(&requirements.host);
    requirements.build = build;
    requirements.host = host;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(items: &[&str]) -> Vec<RequirementSpec> {
        items.iter().map(|s| RequirementSpec::parse(s).unwrap()).collect()
    }

    fn strings(section: &[RequirementSpec]) -> Vec<String> {
        section.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_reduce_duplicate_specs() {
        let mut reqs = Requirements {
            build: specs(&["exact", "exact 1.2.3 1", "exact >1.0,<2"]),
            host: specs(&["exact", "exact 1.2.3 1"]),
            ..Default::default()
        };

        simplify_to_exact_constraints(&mut reqs).unwrap();

        assert_eq!(reqs.build, reqs.host);
        assert_eq!(strings(&reqs.build), vec!["exact 1.2.3 1"]);
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let mut reqs = Requirements {
            build: specs(&["cmake", "exact", "exact 1.2.3 1", "exact >1.0,<2"]),
            host: specs(&["python 3.10.*", "exact", "exact 1.2.3 1"]),
            ..Default::default()
        };

        simplify_to_exact_constraints(&mut reqs).unwrap();
        let once = reqs.clone();
        simplify_to_exact_constraints(&mut reqs).unwrap();

        assert_eq!(reqs, once);
        assert_eq!(strings(&reqs.build), vec!["cmake", "exact 1.2.3 1"]);
        assert_eq!(strings(&reqs.host), vec!["python 3.10.*", "exact 1.2.3 1"]);
    }

    #[test]
    fn test_cross_section_exact_pin() {
        let mut reqs = Requirements {
            build: specs(&["zlib"]),
            host: specs(&["zlib 1.2.13 h5eee18b_0"]),
            ..Default::default()
        };

        simplify_to_exact_constraints(&mut reqs).unwrap();

        assert_eq!(strings(&reqs.build), vec!["zlib 1.2.13 h5eee18b_0"]);
        assert_eq!(reqs.build, reqs.host);
    }

    #[test]
    fn test_most_specific_range_wins() {
        let mut reqs = Requirements {
            build: specs(&["numpy", "numpy >=1.20", "numpy >=1.20,<2"]),
            host: specs(&["numpy >=1.22"]),
            ..Default::default()
        };

        simplify_to_exact_constraints(&mut reqs).unwrap();

        assert_eq!(strings(&reqs.build), vec!["numpy >=1.20,<2"]);
        assert_eq!(strings(&reqs.host), vec!["numpy >=1.20,<2"]);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let mut reqs = Requirements {
            build: specs(&["pkg >=1.0", "pkg <3"]),
            ..Default::default()
        };

        simplify_to_exact_constraints(&mut reqs).unwrap();
        assert_eq!(strings(&reqs.build), vec!["pkg >=1.0"]);
    }

    #[test]
    fn test_conflicting_exact_pins() {
        let mut reqs = Requirements {
            build: specs(&["pkg 1.0 0"]),
            host: specs(&["pkg 2.0 0"]),
            ..Default::default()
        };

        let err = simplify_to_exact_constraints(&mut reqs).unwrap_err();
        assert!(matches!(err, Error::ConstraintConflict { ref name, .. } if name == "pkg"));
        // Sections are untouched on failure
        assert_eq!(strings(&reqs.build), vec!["pkg 1.0 0"]);
    }

    #[test]
    fn test_run_sections_untouched() {
        let mut reqs = Requirements {
            build: specs(&["pkg", "pkg 1.0 0"]),
            run: specs(&["pkg", "pkg >=1.0"]),
            run_constrained: specs(&["pkg <2", "pkg <3"]),
            ..Default::default()
        };

        simplify_to_exact_constraints(&mut reqs).unwrap();

        assert_eq!(strings(&reqs.build), vec!["pkg 1.0 0"]);
        assert_eq!(strings(&reqs.run), vec!["pkg", "pkg >=1.0"]);
        assert_eq!(strings(&reqs.run_constrained), vec!["pkg <2", "pkg <3"]);
    }

    #[test]
    fn test_single_occurrences_unchanged() {
        let mut reqs = Requirements {
            build: specs(&["cmake", "ninja"]),
            host: specs(&["python"]),
            ..Default::default()
        };
        let before = reqs.clone();

        simplify_to_exact_constraints(&mut reqs).unwrap();
        assert_eq!(reqs, before);
    }
}
