//! Rules shared by modules that take either inline plan fields or plan refs

use crate::error::ModuleError;
use faultline_fluent::{DurationSpec, FloatSpec, SizeSpec};
use faultline_planner::{PhaseSpec, PlanSpec};

/// Build a single-phase plan from inline fields; `None` when the driving
/// value is absent
pub(crate) fn inline_plan(
    percentage: Option<&FloatSpec>,
    size: Option<&SizeSpec>,
    interval: Option<&DurationSpec>,
    duration: Option<&DurationSpec>,
) -> Option<PlanSpec> {
    if percentage.is_none() && size.is_none() {
        return None;
    }

    Some(PlanSpec::single(PhaseSpec {
        percentage: percentage.cloned(),
        size: size.cloned(),
        interval: interval.cloned(),
        duration: duration.cloned(),
    }))
}

/// Exactly one plan source: an inline plan or a single plan ref
pub(crate) fn require_single_source(
    plan_refs: &[String],
    inline: Option<&PlanSpec>,
    what: &'static str,
) -> Result<(), ModuleError> {
    if plan_refs.is_empty() && inline.is_none() {
        return Err(ModuleError::MissingPlan { what });
    }
    if plan_refs.len() > 1 {
        return Err(ModuleError::TooManyPlanRefs);
    }
    if let Some(plan) = inline {
        plan.validate()?;
    }
    Ok(())
}
