use crate::config::CrossSectionPolicy;
use crate::types::{Demand, EPSILON, StockElement};

/// Whether `stock` can physically and structurally serve `demand` right now.
pub fn feasible(demand: &Demand, stock: &StockElement, policy: &CrossSectionPolicy) -> bool {
    if stock.current_leftover_length + EPSILON < demand.length {
        return false;
    }
    if !demand.section.fits_in(&stock.section) {
        return false;
    }
    if stock.class < demand.class {
        return false;
    }
    cross_section_compatible(demand.cross_section_area(), stock.cross_section_area(), policy)
}

pub fn cross_section_compatible(
    demand_area: f64,
    stock_area: f64,
    policy: &CrossSectionPolicy,
) -> bool {
    if demand_area.abs() < EPSILON {
        return stock_area.abs() < EPSILON;
    }
    if stock_area.abs() < EPSILON {
        return false;
    }
    match *policy {
        CrossSectionPolicy::RatioCeiling {
            max_stock_to_demand_area_ratio,
        } => stock_area / demand_area <= max_stock_to_demand_area_ratio + EPSILON,
        CrossSectionPolicy::RatioFloor {
            min_cross_section_ratio,
        } => demand_area / stock_area + EPSILON >= min_cross_section_ratio,
    }
}
