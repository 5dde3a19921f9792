//! Cost arithmetic for supply curve points.
//!
//! All functions work on a single site; callers map them across table columns. Capacities are in
//! MW, capital and operating costs in $/kW, transmission capital costs in $/MW and levelised
//! costs in $/MWh.

/// Hours in a (non-leap) year, for converting capacity to annual energy
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Conversion factor between $/kW costs and MW capacities
pub const KW_PER_MW: f64 = 1000.0;

/// The cost assumptions a levelised cost is computed under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EconomicParams {
    /// Capital cost in $/kW
    pub capex: f64,
    /// Fixed operating cost in $/kW-yr
    pub opex: f64,
    /// Fixed charge rate. May be a percentage; normalise with [`to_decimal`] before pricing.
    pub fcr: f64,
    /// Generation losses. May be a percentage; normalise with [`to_decimal`] before pricing.
    pub losses: f64,
}

impl EconomicParams {
    /// A copy with percentage-scale fcr and losses converted to decimal fractions
    pub fn normalised(&self) -> EconomicParams {
        EconomicParams {
            fcr: to_decimal(self.fcr),
            losses: to_decimal(self.losses),
            ..*self
        }
    }
}

/// Calculates the levelised cost of energy for a site in $/MWh.
///
/// Annualised capital plus fixed operating costs, over the annual energy production implied by
/// the capacity factor.
pub fn lcoe(capacity: f64, capacity_factor: f64, params: &EconomicParams) -> f64 {
    let capital_cost = params.capex * capacity * KW_PER_MW;
    let operating_cost = params.opex * capacity * KW_PER_MW;
    (params.fcr * capital_cost + operating_cost) / (capacity * capacity_factor * HOURS_PER_YEAR)
}

/// Calculates the levelised cost of transmission for a site in $/MWh.
///
/// Only the annualised transmission capital cost is included; `trans_cap_cost` is in $/MW so no
/// kW conversion applies.
pub fn lcot(
    capacity: f64,
    trans_cap_cost: f64,
    capacity_factor: f64,
    params: &EconomicParams,
) -> f64 {
    (trans_cap_cost * capacity * params.fcr) / (capacity * capacity_factor * HOURS_PER_YEAR)
}

/// Recovers the capacity factor implied by a levelised cost of energy.
///
/// This is [`lcoe`] solved for the capacity factor, used to back out the production a stored cost
/// was computed from before pricing the site under different assumptions.
pub fn capacity_factor_from_lcoe(capacity: f64, lcoe: f64, params: &EconomicParams) -> f64 {
    let capital_cost = params.capex * capacity * KW_PER_MW;
    let operating_cost = params.opex * capacity * KW_PER_MW;
    (params.fcr * capital_cost + operating_cost) / (lcoe * capacity * HOURS_PER_YEAR)
}

/// Moves a capacity factor from one generation loss assumption to another.
///
/// The gross resource is recovered by undoing the original losses, then the new losses are
/// applied. Callers must reject original losses of 100% or more.
pub fn adjust_cf_for_losses(capacity_factor: f64, new_losses: f64, original_losses: f64) -> f64 {
    capacity_factor / (1.0 - original_losses) * (1.0 - new_losses)
}

/// Normalises a rate that may be given as a percentage.
///
/// Values above 1 are divided by 100; values of 1 or below are returned unchanged. Note that this
/// misreads a literal percentage of 1% or less (e.g. losses given as `0.5` meaning 0.5%) as an
/// already-decimal rate; datasets relying on this function must express such rates as decimals.
pub fn to_decimal(value: f64) -> f64 {
    if value > 1.0 { value / 100.0 } else { value }
}
