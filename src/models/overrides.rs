//! Per-run formula pins.

use serde::{Deserialize, Serialize};

use super::Component;

/// Explicit formula ids to use instead of date resolution.
///
/// Pinning makes a run reproducible: the same ids give the same amounts for
/// any payment period. Unknown keys are rejected when deserializing.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{Component, FormulaOverrides};
///
/// let overrides: FormulaOverrides =
///     serde_json::from_str(r#"{"nhif": "nhif-2015-04"}"#).unwrap();
/// assert_eq!(overrides.for_component(&Component::Shif), Some("nhif-2015-04"));
/// assert!(serde_json::from_str::<FormulaOverrides>(r#"{"pension": "x"}"#).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormulaOverrides {
    /// Income-tax formula id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<String>,
    /// NSSF formula id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nssf: Option<String>,
    /// SHIF or NHIF formula id.
    #[serde(default, alias = "nhif", skip_serializing_if = "Option::is_none")]
    pub shif: Option<String>,
    /// Housing levy formula id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub housing_levy: Option<String>,
}

impl FormulaOverrides {
    /// No pins: every formula is resolved by date.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if no formula is pinned.
    pub fn is_empty(&self) -> bool {
        self.income.is_none()
            && self.nssf.is_none()
            && self.shif.is_none()
            && self.housing_levy.is_none()
    }

    /// The pinned formula id for a deduction component.
    pub fn for_component(&self, component: &Component) -> Option<&str> {
        match component {
            Component::Nssf => self.nssf.as_deref(),
            Component::Shif => self.shif.as_deref(),
            Component::HousingLevy => self.housing_levy.as_deref(),
            Component::Paye => self.income.as_deref(),
            Component::Custom(_) => None,
        }
    }
}
