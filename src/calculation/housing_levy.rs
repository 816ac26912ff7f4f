//! Affordable Housing Levy.
//!
//! A flat percentage of gross pay, matched by the employer.

use crate::error::EngineResult;
use crate::models::Component;

use super::contributions::{
    ContributionCalculator, ContributionContext, ContributionResult, simple_contribution,
};

/// Calculator for the housing levy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HousingLevyCalculator;

impl ContributionCalculator for HousingLevyCalculator {
    fn component(&self) -> Component {
        Component::HousingLevy
    }

    fn calculate(&self, ctx: &ContributionContext<'_>) -> EngineResult<ContributionResult> {
        simple_contribution("Housing Levy", Component::HousingLevy, ctx)
    }
}
