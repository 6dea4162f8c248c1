//! Field priority ranking.
//!
//! [`rank`] is the closed-form priority of a field. A [`PriorityStrategy`]
//! may recompute priorities for a whole batch (for example in parallel);
//! its result is only accepted when it keeps the relative order produced by
//! the serial formula.

use std::cmp::Reverse;

use crate::data::field::{FieldGroup, FieldModel};

const BASE: i32 = 1000;
const DEPTH_STEP: i32 = 100;
const REQUIRED_BOOST: i32 = 10;

fn group_offset(group: FieldGroup) -> i32 {
    match group {
        FieldGroup::Object => 80,
        FieldGroup::Reference => 60,
        FieldGroup::Definition => 40,
        FieldGroup::Primitive => 20,
    }
}

/// Priority of a field: shallower first, then by group, then required first.
pub fn rank(depth: usize, group: FieldGroup, required: bool) -> i32 {
    let depth = i32::try_from(depth).unwrap_or(i32::MAX / DEPTH_STEP);
    let boost = if required { REQUIRED_BOOST } else { 0 };
    BASE - depth.saturating_mul(DEPTH_STEP) + group_offset(group) + boost
}

/// Stable sort, highest priority first.
pub fn sort_by_priority(fields: &mut [FieldModel]) {
    fields.sort_by_key(|f| Reverse(f.priority));
}

/// Bulk priority recomputation over a whole field list.
pub trait PriorityStrategy: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Recompute priorities and return the re-sorted list.
    fn recompute(&self, fields: &[FieldModel]) -> anyhow::Result<Vec<FieldModel>>;
}

/// Recomputes the closed form on the rayon thread pool.
#[cfg(feature = "parallel")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelRanker;

#[cfg(feature = "parallel")]
impl PriorityStrategy for ParallelRanker {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn recompute(&self, fields: &[FieldModel]) -> anyhow::Result<Vec<FieldModel>> {
        use rayon::prelude::*;

        let mut out = fields.to_vec();
        out.par_iter_mut().for_each(|f| {
            let boost = if f.required { REQUIRED_BOOST } else { 0 };
            let depth = i32::try_from(f.depth).unwrap_or(i32::MAX / DEPTH_STEP);
            f.priority = (BASE + group_offset(f.group) + boost) - depth.saturating_mul(DEPTH_STEP);
        });
        out.par_sort_by_key(|f| Reverse(f.priority));
        Ok(out)
    }
}

/// Whether `candidate` lists the same fields as `serial`, in the same order.
pub fn preserves_order(serial: &[FieldModel], candidate: &[FieldModel]) -> bool {
    serial.len() == candidate.len()
        && serial.iter().zip(candidate).all(|(a, b)| {
            a.name == b.name && a.depth == b.depth && a.group == b.group && a.required == b.required
        })
}

/// Run `strategy` over the serially ranked `fields`.
///
/// The serial list is returned untouched when the strategy fails or changes
/// the order; otherwise the whole list is replaced.
pub fn rerank(fields: Vec<FieldModel>, strategy: &dyn PriorityStrategy) -> Vec<FieldModel> {
    if fields.is_empty() {
        return fields;
    }
    match strategy.recompute(&fields) {
        Ok(candidate) if preserves_order(&fields, &candidate) => {
            debug!("{} ranking accepted for {} fields", strategy.name(), candidate.len());
            candidate
        }
        Ok(_) => {
            warn!("{} ranking changed field order, keeping serial ranking", strategy.name());
            fields
        }
        Err(e) => {
            warn!("{} ranking failed, keeping serial ranking: {e}", strategy.name());
            fields
        }
    }
}
