use crate::config::CrossSectionPolicy;
use crate::feasibility::feasible;
use crate::scorer::score;
use crate::types::{Assignment, Demand, StockElement};

/// Picks the best feasible piece for one demand. Earlier pool entries win
/// exact score ties. The pool is not touched.
///
/// Returns the winner's position in `pool` with the assignment, so callers
/// can resolve the piece even when ids repeat.
pub fn select_best<'a, I>(
    demand: &Demand,
    pool: I,
    policy: &CrossSectionPolicy,
) -> Option<(usize, Assignment)>
where
    I: IntoIterator<Item = &'a StockElement>,
{
    let mut best: Option<(usize, &StockElement, f64)> = None;

    for (position, stock) in pool.into_iter().enumerate() {
        if !feasible(demand, stock, policy) {
            continue;
        }
        let s = score(demand, stock);
        if best.is_none_or(|(_, _, best_score)| s > best_score) {
            best = Some((position, stock, s));
        }
    }

    best.map(|(position, stock, s)| {
        let remaining = stock.current_leftover_length - demand.length;
        let assignment = Assignment {
            stock_id: stock.id,
            demand_ids: vec![demand.id],
            remaining_length: remaining,
            score: s,
            utilization: utilization(stock.original_length, remaining),
        };
        (position, assignment)
    })
}

pub(crate) fn utilization(original_length: f64, remaining_length: f64) -> f64 {
    if original_length <= 0.0 {
        return 0.0;
    }
    (original_length - remaining_length) / original_length
}
