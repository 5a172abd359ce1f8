//! Distinct filterable values present in a catalog.
//!
//! GPU families come from an ordered table of `(pattern, label)` rules. The
//! first rule whose pattern matches a record's GPU text decides its family;
//! GPUs no rule matches contribute nothing. Adding a family is a table entry.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::CatalogRecord;
use crate::normalize::PriceBounds;

/// Default GPU family rules, highest priority first.
pub const DEFAULT_GPU_FAMILIES: &[(&str, &str)] = &[
    (r"\brtx\s*40", "RTX 40-series"),
    (r"\brtx\s*30", "RTX 30-series"),
    (r"iris\s*xe|radeon", "Integrated"),
];

/// GPU filter substrings that select each default family.
pub const DEFAULT_GPU_FAMILY_TOKENS: &[(&str, &[&str])] = &[
    ("RTX 40-series", &["rtx 40"]),
    ("RTX 30-series", &["rtx 30"]),
    ("Integrated", &["iris xe", "radeon"]),
];

lazy_static! {
    static ref DEFAULT_TABLE: GpuFamilyTable = DEFAULT_GPU_FAMILY_TOKENS.iter().fold(
        GpuFamilyTable::new(DEFAULT_GPU_FAMILIES.iter().copied()).expect("valid default GPU patterns"),
        |table, (label, tokens)| table.with_filter_tokens(label, tokens.iter().copied()),
    );
}

#[derive(Debug, Clone)]
struct GpuFamilyRule {
    pattern: Regex,
    label: String,
    tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GpuFamilyTable {
    rules: Vec<GpuFamilyRule>,
}

impl GpuFamilyTable {
    /// Compile `(pattern, label)` pairs; patterns match case-insensitively.
    pub fn new<I, P, L>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, L)>,
        P: AsRef<str>,
        L: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(pattern, label)| {
                let pattern = pattern.as_ref();
                let compiled = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid GPU family pattern {pattern:?}"))?;
                Ok(GpuFamilyRule { pattern: compiled, label: label.into(), tokens: Vec::new() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Attach GPU filter substrings to every rule labelled `label`.
    pub fn with_filter_tokens<I, T>(mut self, label: &str, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        for rule in self.rules.iter_mut().filter(|r| r.label == label) {
            rule.tokens = tokens.clone();
        }
        self
    }

    /// Filter substrings for a family label, in rule order, deduplicated.
    pub fn filter_tokens(&self, label: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for token in self.rules.iter().filter(|r| r.label == label).flat_map(|r| r.tokens.iter()) {
            if !out.contains(&token.as_str()) {
                out.push(token);
            }
        }
        out
    }

    /// Label of the first matching rule.
    pub fn classify(&self, gpu: &str) -> Option<&str> {
        self.rule_index(gpu).map(|i| self.rules[i].label.as_str())
    }

    fn rule_index(&self, gpu: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.pattern.is_match(gpu))
    }

    pub fn len(&self) -> usize { self.rules.len() }

    pub fn is_empty(&self) -> bool { self.rules.is_empty() }
}

impl Default for GpuFamilyTable {
    fn default() -> Self { DEFAULT_TABLE.clone() }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facets {
    /// Sorted, distinct.
    pub brands: Vec<String>,
    /// Distinct family labels in rule-priority order.
    pub gpu_families: Vec<String>,
    /// GPU filter substrings for each family in `gpu_families`.
    pub gpu_family_tokens: BTreeMap<String, Vec<String>>,
    /// `None` for an empty catalog.
    pub price: Option<PriceBounds>,
}

pub struct FacetExtractor<'t> {
    table: &'t GpuFamilyTable,
    round_price_bounds: bool,
}

impl<'t> FacetExtractor<'t> {
    pub fn new(table: &'t GpuFamilyTable, round_price_bounds: bool) -> Self {
        Self { table, round_price_bounds }
    }

    pub fn extract(&self, catalog: &[CatalogRecord]) -> Facets {
        let brands: BTreeSet<&str> = catalog.iter().map(|r| r.brand.as_str()).collect();

        let matched: BTreeSet<usize> = catalog.iter().filter_map(|r| self.table.rule_index(&r.gpu)).collect();
        let mut gpu_families: Vec<String> = Vec::with_capacity(matched.len());
        for i in matched {
            let label = &self.table.rules[i].label;
            if !gpu_families.contains(label) {
                gpu_families.push(label.clone());
            }
        }

        let gpu_family_tokens: BTreeMap<String, Vec<String>> = gpu_families
            .iter()
            .map(|label| (label.clone(), self.table.filter_tokens(label).into_iter().map(str::to_owned).collect::<Vec<_>>()))
            .collect();

        let price = PriceBounds::of_catalog(catalog).map(|b| if self.round_price_bounds { b.rounded_to_hundreds() } else { b });

        Facets { brands: brands.into_iter().map(str::to_owned).collect(), gpu_families, gpu_family_tokens, price }
    }
}
