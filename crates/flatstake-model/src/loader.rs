//! Ownership edge loader: column mapping + normalization.
//!
//! Two stages. [`RecordMapping`] turns raw string-keyed rows into
//! [`RawOwnershipRecord`]s using an explicit per-field configuration
//! (recognized keys: `source`, `value`, `prefix`, `suffix`), validated
//! eagerly before any row is read. [`load_edges`] then normalizes the
//! records into a deduplicated [`OwnershipEdge`] set, rejecting anything
//! that would corrupt the downstream closure.

use std::collections::HashMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::edge::{Name, OwnershipEdge, RawOwnershipRecord};

/// Slack allowed above 1.0 when summing direct ownership of one entity.
/// The upstream books regularly carry rounding residue from per-class
/// percentages, so the cap is 1.02 rather than exactly 1.0.
pub const OWNERSHIP_SUM_TOLERANCE: f64 = 0.02;

/// Entities whose direct ownership sums below this are flagged (warning
/// only): usually a missing owner row rather than a real partial book.
pub const UNDER_OWNED_FLOOR: f64 = 0.98;

// ============================================================================
// Errors
// ============================================================================

/// Malformed input. Fatal: the loader surfaces the first violation and
/// produces no partial edge set.
#[derive(Debug, Error)]
pub enum DataIntegrityError {
    #[error("mapping for `{field}` sets both `source` and `value`")]
    ConflictingMapping { field: &'static str },

    #[error("mapping for `{field}` sets neither `source` nor `value`")]
    EmptyMapping { field: &'static str },

    #[error("mapping for `{field}` applies prefix/suffix to a constant `value`")]
    AffixOnConstant { field: &'static str },

    #[error("row {row}: column `{column}` not present in input")]
    MissingColumn { row: usize, column: String },

    #[error("row {row}: percentage `{raw}` is not a number")]
    UnparseablePercentage { row: usize, raw: String },

    #[error("row {row}: empty `{field}` identifier")]
    MissingIdentifier { row: usize, field: &'static str },

    #[error("row {row}: entity `{entity}` owns itself")]
    SelfLoop { row: usize, entity: Name },

    #[error(
        "row {row}: percentage {percentage} for `{owner}` -> `{owned}` is outside [0.0, 1.0]"
    )]
    PercentageOutOfRange {
        row: usize,
        owner: Name,
        owned: Name,
        percentage: f64,
    },

    #[error("entity `{owned}` is {total:.4} owned in aggregate, above the 1.0 cap")]
    OverOwned { owned: Name, total: f64 },
}

// ============================================================================
// Column mapping
// ============================================================================

/// How one logical field is produced from a raw row.
///
/// Exactly one of `source` (read the named input column) or `value`
/// (emit a constant) must be set. `prefix`/`suffix` wrap the source
/// value and are rejected on constants, where they would be ambiguous
/// (the caller can bake affixes into the constant itself).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl ColumnSpec {
    /// Read the field from an input column.
    pub fn from_source(column: impl Into<String>) -> Self {
        Self {
            source: Some(column.into()),
            ..Self::default()
        }
    }

    /// Emit a constant for every row.
    pub fn constant(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Wrap the source value in affixes, e.g. `"{client_id}_fund"`.
    pub fn with_affixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.suffix = suffix.into();
        self
    }

    fn validate(&self, field: &'static str) -> Result<(), DataIntegrityError> {
        match (&self.source, &self.value) {
            (Some(_), Some(_)) => Err(DataIntegrityError::ConflictingMapping { field }),
            (None, None) => Err(DataIntegrityError::EmptyMapping { field }),
            (None, Some(_)) if !self.prefix.is_empty() || !self.suffix.is_empty() => {
                Err(DataIntegrityError::AffixOnConstant { field })
            }
            _ => Ok(()),
        }
    }

    fn extract(
        &self,
        row: &HashMap<String, String>,
        row_idx: usize,
    ) -> Result<String, DataIntegrityError> {
        if let Some(value) = &self.value {
            return Ok(value.clone());
        }
        // `validate` has already ruled out the no-source case.
        let column = self.source.as_deref().unwrap_or_default();
        let raw = row
            .get(column)
            .ok_or_else(|| DataIntegrityError::MissingColumn {
                row: row_idx,
                column: column.to_string(),
            })?;
        Ok(format!("{}{}{}", self.prefix, raw, self.suffix))
    }
}

/// One [`ColumnSpec`] per logical ownership field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMapping {
    pub owner_id: ColumnSpec,
    pub owned_id: ColumnSpec,
    pub percentage: ColumnSpec,
    pub owner_type: ColumnSpec,
    pub owned_type: ColumnSpec,
}

impl RecordMapping {
    /// Check every field configuration before any row is touched.
    pub fn validate(&self) -> Result<(), DataIntegrityError> {
        self.owner_id.validate("owner_id")?;
        self.owned_id.validate("owned_id")?;
        self.percentage.validate("percentage")?;
        self.owner_type.validate("owner_type")?;
        self.owned_type.validate("owned_type")?;
        Ok(())
    }

    /// Map raw rows into shaped records.
    pub fn apply(
        &self,
        rows: &[HashMap<String, String>],
    ) -> Result<Vec<RawOwnershipRecord>, DataIntegrityError> {
        self.validate()?;
        let mut records = Vec::with_capacity(rows.len());
        for (row_idx, row) in rows.iter().enumerate() {
            let raw_pct = self.percentage.extract(row, row_idx)?;
            let percentage = raw_pct.trim().parse::<f64>().map_err(|_| {
                DataIntegrityError::UnparseablePercentage {
                    row: row_idx,
                    raw: raw_pct.clone(),
                }
            })?;
            records.push(RawOwnershipRecord {
                owner_id: self.owner_id.extract(row, row_idx)?,
                owned_id: self.owned_id.extract(row, row_idx)?,
                percentage,
                owner_type: self.owner_type.extract(row, row_idx)?,
                owned_type: self.owned_type.extract(row, row_idx)?,
            });
        }
        Ok(records)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Normalize shaped records into a validated, deduplicated edge set.
///
/// Duplicate `(owner_id, owned_id)` pairs are merged by **summing**
/// their percentages: duplicates represent multiple share classes of
/// the same relationship, not distinct edges. Rejecting them instead
/// would also be defensible; the summing policy is the one the
/// production books assume, and anyone relying on this for
/// reconciliation should confirm it matches their share-class
/// semantics.
///
/// Rejections (fatal, first one wins):
/// - empty `owner_id` / `owned_id`,
/// - self-loops,
/// - percentages outside `[0.0, 1.0]` (NaN included),
/// - entities owned more than `1.0 + OWNERSHIP_SUM_TOLERANCE` in
///   aggregate.
///
/// Entities owned less than [`UNDER_OWNED_FLOOR`] in aggregate are kept
/// but logged, as are conflicting type labels (first-seen label wins).
/// Output is sorted by `(owned_id, owner_id)`.
pub fn load_edges(
    records: &[RawOwnershipRecord],
) -> Result<Vec<OwnershipEdge>, DataIntegrityError> {
    let mut merged: AHashMap<(Name, Name), OwnershipEdge> = AHashMap::new();

    for (row, rec) in records.iter().enumerate() {
        if rec.owner_id.is_empty() {
            return Err(DataIntegrityError::MissingIdentifier {
                row,
                field: "owner_id",
            });
        }
        if rec.owned_id.is_empty() {
            return Err(DataIntegrityError::MissingIdentifier {
                row,
                field: "owned_id",
            });
        }
        if rec.owner_id == rec.owned_id {
            return Err(DataIntegrityError::SelfLoop {
                row,
                entity: rec.owner_id.clone(),
            });
        }
        if !(0.0..=1.0).contains(&rec.percentage) {
            return Err(DataIntegrityError::PercentageOutOfRange {
                row,
                owner: rec.owner_id.clone(),
                owned: rec.owned_id.clone(),
                percentage: rec.percentage,
            });
        }

        let key = (rec.owner_id.clone(), rec.owned_id.clone());
        match merged.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let edge = entry.get_mut();
                edge.percentage += rec.percentage;
                if edge.owner_type != rec.owner_type || edge.owned_type != rec.owned_type {
                    tracing::warn!(
                        owner = %rec.owner_id,
                        owned = %rec.owned_id,
                        kept_owner_type = %edge.owner_type,
                        kept_owned_type = %edge.owned_type,
                        "conflicting type labels on duplicate edge; keeping first-seen"
                    );
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(OwnershipEdge {
                    owner_id: rec.owner_id.clone(),
                    owned_id: rec.owned_id.clone(),
                    percentage: rec.percentage,
                    owner_type: rec.owner_type.clone(),
                    owned_type: rec.owned_type.clone(),
                });
            }
        }
    }

    // Aggregate cap per owned entity, checked in name order so the
    // reported violation is deterministic.
    let mut totals: AHashMap<&Name, f64> = AHashMap::new();
    for edge in merged.values() {
        *totals.entry(&edge.owned_id).or_insert(0.0) += edge.percentage;
    }
    let mut totals: Vec<(&Name, f64)> = totals.into_iter().collect();
    totals.sort_by(|a, b| a.0.cmp(b.0));
    for (owned, total) in totals {
        if total > 1.0 + OWNERSHIP_SUM_TOLERANCE {
            return Err(DataIntegrityError::OverOwned {
                owned: owned.clone(),
                total,
            });
        }
        if total < UNDER_OWNED_FLOOR {
            tracing::warn!(
                owned = %owned,
                total,
                "entity is under-owned; ownership rows may be missing"
            );
        }
    }

    let mut edges: Vec<OwnershipEdge> = merged.into_values().collect();
    edges.sort_by(|a, b| {
        (&a.owned_id, &a.owner_id).cmp(&(&b.owned_id, &b.owner_id))
    });
    Ok(edges)
}
