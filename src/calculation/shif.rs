//! SHIF (Social Health Insurance Fund) and legacy NHIF contributions.
//!
//! Both live in the `shif` formula category: the NHIF flat-rate table for
//! periods before October 2024 and the SHIF percentage (with its minimum)
//! afterwards. The formula data decides which applies.

use crate::error::EngineResult;
use crate::models::Component;

use super::contributions::{
    ContributionCalculator, ContributionContext, ContributionResult, simple_contribution,
};

/// Calculator for SHIF/NHIF health contributions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShifCalculator;

impl ContributionCalculator for ShifCalculator {
    fn component(&self) -> Component {
        Component::Shif
    }

    fn calculate(&self, ctx: &ContributionContext<'_>) -> EngineResult<ContributionResult> {
        simple_contribution("SHIF/NHIF", Component::Shif, ctx)
    }
}
