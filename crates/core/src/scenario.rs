//! What-if customer profiles for the risk simulator
//!
//! A profile carries the six fields a user can adjust. It is turned into a
//! named scenario using the indicator names the encoder produces for the
//! telco dataset; fields the simulator does not expose are left for the
//! projector to zero-fill.

use crate::errors::{ChurnError, Result};
use crate::projector::Scenario;
use crate::schema::indicator_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Contract term of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    MonthToMonth,
    OneYear,
    TwoYear,
}

/// Internet service of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternetService {
    FiberOptic,
    Dsl,
    None,
}

impl ContractType {
    pub const ALL: [Self; 3] = [Self::MonthToMonth, Self::OneYear, Self::TwoYear];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonthToMonth => "Month-to-month",
            Self::OneYear => "One year",
            Self::TwoYear => "Two year",
        }
    }
}

impl InternetService {
    pub const ALL: [Self; 3] = [Self::FiberOptic, Self::Dsl, Self::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FiberOptic => "Fiber optic",
            Self::Dsl => "DSL",
            Self::None => "No",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for InternetService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = ChurnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChurnError::SchemaMismatch(format!("unknown contract type '{s}'")))
    }
}

impl FromStr for InternetService {
    type Err = ChurnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChurnError::SchemaMismatch(format!("unknown internet service '{s}'")))
    }
}

/// Simulator input for a single hypothetical customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Months as a customer
    pub tenure: u32,
    pub monthly_charges: f64,
    pub contract: ContractType,
    pub internet_service: InternetService,
    pub paperless_billing: bool,
    pub senior_citizen: bool,
}

impl CustomerProfile {
    /// Named feature values for this profile.
    ///
    /// Lifetime charges are estimated as `tenure × monthly_charges`.
    pub fn to_scenario(&self) -> Scenario {
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        let tenure = f64::from(self.tenure);

        Scenario::new()
            .with("tenure", tenure)
            .with("MonthlyCharges", self.monthly_charges)
            .with("TotalCharges", tenure * self.monthly_charges)
            .with("SeniorCitizen", flag(self.senior_citizen))
            .with(indicator_name("PaperlessBilling", "Yes"), flag(self.paperless_billing))
            .with(
                indicator_name("Contract", ContractType::OneYear.as_str()),
                flag(self.contract == ContractType::OneYear),
            )
            .with(
                indicator_name("Contract", ContractType::TwoYear.as_str()),
                flag(self.contract == ContractType::TwoYear),
            )
            .with(
                indicator_name("InternetService", InternetService::FiberOptic.as_str()),
                flag(self.internet_service == InternetService::FiberOptic),
            )
            .with(
                indicator_name("InternetService", InternetService::None.as_str()),
                flag(self.internet_service == InternetService::None),
            )
    }
}
