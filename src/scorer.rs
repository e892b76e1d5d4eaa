use crate::types::{Demand, EPSILON, StockElement};

const LEFTOVER_WEIGHT: f64 = 1000.0;
const SECTION_WEIGHT: f64 = 100.0;
const CLASS_WEIGHT: f64 = 10.0;

/// Higher is better. Tightest length fit dominates, then the closest
/// cross-section, then the least class over-provisioning.
pub fn score(demand: &Demand, stock: &StockElement) -> f64 {
    let leftover = stock.current_leftover_length - demand.length;

    let demand_area = demand.cross_section_area();
    let section_match = if demand_area.abs() < EPSILON {
        0.0
    } else {
        let ratio = stock.cross_section_area() / demand_area;
        if ratio.abs() < EPSILON { 0.0 } else { 1.0 / ratio }
    };

    let over_class = stock.class.rank() - demand.class.rank();

    -leftover * LEFTOVER_WEIGHT + section_match * SECTION_WEIGHT - over_class * CLASS_WEIGHT
}
