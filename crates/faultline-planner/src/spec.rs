//! Declarative plan shapes as they appear in configuration
//!
//! A plan is either a single phase declared inline (`percentage`, `size`,
//! `interval`, `duration` at the top level) or an ordered list of
//! `subPlans`. Mixing the two is rejected by [`PlanSpec::validate`].

use crate::error::PlanError;
use faultline_fluent::{DurationSpec, FloatSpec, SizeSpec};
use serde::{Deserialize, Serialize};

/// One phase of a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSpec {
    /// Fault probability, `0..=100`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<FloatSpec>,

    /// Byte quantity published alongside the percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeSpec>,

    /// Sleep between pre- and post-sleep hooks; falls back to the planner default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<DurationSpec>,

    /// Phase length; absent means the phase never ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationSpec>,
}

impl PhaseSpec {
    /// Set the percentage specification
    #[must_use]
    pub fn with_percentage(mut self, spec: FloatSpec) -> Self {
        self.percentage = Some(spec);
        self
    }

    /// Set the size specification
    #[must_use]
    pub fn with_size(mut self, spec: SizeSpec) -> Self {
        self.size = Some(spec);
        self
    }

    /// Set the interval specification
    #[must_use]
    pub fn with_interval(mut self, spec: DurationSpec) -> Self {
        self.interval = Some(spec);
        self
    }

    /// Set the duration specification
    #[must_use]
    pub fn with_duration(mut self, spec: DurationSpec) -> Self {
        self.duration = Some(spec);
        self
    }

    /// No field set at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.percentage.is_none()
            && self.size.is_none()
            && self.interval.is_none()
            && self.duration.is_none()
    }

    /// Runs until the process ends
    #[inline]
    #[must_use]
    pub fn is_endless(&self) -> bool {
        self.duration.is_none()
    }

    /// Check that percentage and size sequences can be zipped
    ///
    /// # Errors
    /// Returns `PlanError::SequenceLengthMismatch` when both are present
    /// with different lengths.
    pub fn validate(&self, phase: usize) -> Result<(), PlanError> {
        if let (Some(percentage), Some(size)) = (&self.percentage, &self.size) {
            let (percentage, size) = (percentage.snapshot_len(), size.snapshot_len());
            if percentage != size {
                return Err(PlanError::SequenceLengthMismatch {
                    phase,
                    percentage,
                    size,
                });
            }
        }
        Ok(())
    }
}

/// A named or anonymous plan declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSpec {
    /// Identity used by `planRefs`; required only when referenced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Single-phase shorthand
    #[serde(flatten)]
    pub phase: PhaseSpec,

    /// Ordered phases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_plans: Vec<PhaseSpec>,
}

impl PlanSpec {
    /// Single-phase plan
    #[must_use]
    pub fn single(phase: PhaseSpec) -> Self {
        Self {
            name: None,
            phase,
            sub_plans: Vec::new(),
        }
    }

    /// Multi-phase plan
    #[must_use]
    pub fn phased(phases: Vec<PhaseSpec>) -> Self {
        Self {
            name: None,
            phase: PhaseSpec::default(),
            sub_plans: phases,
        }
    }

    /// Set the plan name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Phases in execution order
    #[must_use]
    pub fn phases(&self) -> Vec<PhaseSpec> {
        if self.sub_plans.is_empty() {
            vec![self.phase.clone()]
        } else {
            self.sub_plans.clone()
        }
    }

    /// Structural checks that need no randomness
    ///
    /// # Errors
    /// - `PlanError::MixedDeclaration` when top-level fields sit next to `subPlans`
    /// - `PlanError::SequenceLengthMismatch` for any phase that cannot zip its lists
    /// - `PlanError::EndlessPhaseNotLast` when an endless phase shadows later ones
    pub fn validate(&self) -> Result<(), PlanError> {
        if !self.sub_plans.is_empty() && !self.phase.is_empty() {
            return Err(PlanError::MixedDeclaration);
        }

        let phases = self.phases();
        let count = phases.len();
        for (index, phase) in phases.iter().enumerate() {
            phase.validate(index)?;
            if phase.is_endless() && index + 1 < count {
                return Err(PlanError::EndlessPhaseNotLast {
                    phase: index,
                    remaining: count - index - 1,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_single_phase_shorthand() {
        let spec: PlanSpec = serde_yaml::from_str(
            "name: spiky\npercentage: 0, 30, 70\ninterval: 50ms\nduration: 250ms\n",
        )
        .unwrap();

        assert_eq!(spec.name.as_deref(), Some("spiky"));
        assert_eq!(spec.phases().len(), 1);
        assert_eq!(spec.phase.percentage.as_ref().unwrap().snapshot_len(), 3);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn deserializes_sub_plans() {
        let spec: PlanSpec = serde_yaml::from_str(
            "subPlans:\n  - percentage: 10\n    duration: 1s\n  - percentage: 90\n",
        )
        .unwrap();

        assert_eq!(spec.phases().len(), 2);
        assert!(spec.phases()[1].is_endless());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn rejects_mixed_declaration() {
        let spec: PlanSpec =
            serde_yaml::from_str("percentage: 5\nsubPlans:\n  - percentage: 10\n").unwrap();
        assert_eq!(spec.validate(), Err(PlanError::MixedDeclaration));
    }

    #[test]
    fn rejects_mismatched_lists() {
        let spec = PlanSpec::single(
            PhaseSpec::default()
                .with_percentage("10, 20, 30".parse().unwrap())
                .with_size("1Mi, 2Mi".parse().unwrap()),
        );
        assert_eq!(
            spec.validate(),
            Err(PlanError::SequenceLengthMismatch {
                phase: 0,
                percentage: 3,
                size: 2
            })
        );
    }

    #[test]
    fn ranged_size_zips_with_any_single_value() {
        let spec = PlanSpec::single(
            PhaseSpec::default()
                .with_percentage("50".parse().unwrap())
                .with_size("1Mi to 4Mi".parse().unwrap()),
        );
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn rejects_endless_phase_before_others() {
        let spec = PlanSpec::phased(vec![
            PhaseSpec::default().with_percentage("10".parse().unwrap()),
            PhaseSpec::default()
                .with_percentage("20".parse().unwrap())
                .with_duration("1s".parse().unwrap()),
        ]);
        assert_eq!(
            spec.validate(),
            Err(PlanError::EndlessPhaseNotLast {
                phase: 0,
                remaining: 1
            })
        );
    }

    #[test]
    fn serializes_camel_case_without_empty_fields() {
        let spec = PlanSpec::phased(vec![
            PhaseSpec::default().with_duration("2s".parse().unwrap())
        ])
        .named("p");
        let yaml = serde_yaml::to_string(&spec).unwrap();
        assert!(yaml.contains("subPlans"));
        assert!(!yaml.contains("percentage"));
    }
}
