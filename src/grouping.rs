use crate::config::{CrossSectionPolicy, GroupingConfig};
use crate::feasibility::cross_section_compatible;
use crate::scorer::score;
use crate::selector::utilization;
use crate::types::{Assignment, Demand, EPSILON, StockElement, StrengthClass};

const SIZE_TIERS: [f64; 3] = [0.8, 0.6, 0.4];

/// Packs further unassigned demands onto `stock` after `lead` was chosen for it.
///
/// Followers are bucketed by how much of the stock's cross-section they
/// occupy. Demands whose ratio sits within the tolerance of the lead's come
/// first, then xlarge (>= 0.8), large (>= 0.6), medium (>= 0.4) and small.
/// Each bucket is walked longest-first and a demand is taken whenever it
/// still fits the remaining length.
///
/// Followers must pass the same cross-section `policy` as the lead and, when
/// a class `band` is running, must not be above it.
pub fn simulate_grouping(
    lead: &Demand,
    stock: &StockElement,
    demands: &[Demand],
    config: &GroupingConfig,
    policy: &CrossSectionPolicy,
    band: Option<StrengthClass>,
) -> Assignment {
    let mut demand_ids = vec![lead.id];
    let mut remaining = stock.current_leftover_length - lead.length;
    let lead_score = score(lead, stock);

    let stock_area = stock.cross_section_area();
    if remaining <= EPSILON || stock_area.abs() < EPSILON {
        return Assignment {
            stock_id: stock.id,
            demand_ids,
            remaining_length: remaining,
            score: lead_score,
            utilization: utilization(stock.original_length, remaining),
        };
    }

    let lead_ratio = lead.cross_section_area() / stock_area;

    // [lead-compatible, xlarge, large, medium, small]
    let mut tiers: [Vec<&Demand>; 5] = Default::default();
    for d in demands {
        if d.assigned || d.id == lead.id {
            continue;
        }
        if !d.section.fits_in(&stock.section) || d.class > stock.class {
            continue;
        }
        if band.is_some_and(|c| d.class > c) {
            continue;
        }
        if !cross_section_compatible(d.cross_section_area(), stock_area, policy) {
            continue;
        }
        if d.length > remaining + EPSILON {
            continue;
        }
        let ratio = d.cross_section_area() / stock_area;
        if ratio + EPSILON < config.min_cross_section_ratio {
            continue;
        }
        tiers[tier_index(ratio, lead_ratio, config.cross_section_tolerance)].push(d);
    }

    'tiers: for tier in tiers.iter_mut() {
        tier.sort_by(|a, b| b.length.total_cmp(&a.length));
        for d in tier.iter() {
            if d.length <= remaining + EPSILON {
                demand_ids.push(d.id);
                remaining = (remaining - d.length).max(0.0);
            }
            if remaining < EPSILON {
                break 'tiers;
            }
        }
    }

    Assignment {
        stock_id: stock.id,
        demand_ids,
        remaining_length: remaining,
        score: lead_score,
        utilization: utilization(stock.original_length, remaining),
    }
}

fn tier_index(ratio: f64, lead_ratio: f64, tolerance: f64) -> usize {
    if (ratio - lead_ratio).abs() <= tolerance + EPSILON {
        return 0;
    }
    SIZE_TIERS
        .iter()
        .position(|&floor| ratio >= floor)
        .map_or(4, |i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Section, StrengthClass};

    const CONFIG: GroupingConfig = GroupingConfig {
        min_cross_section_ratio: 0.0,
        cross_section_tolerance: 0.05,
    };

    const CEILING: CrossSectionPolicy = CrossSectionPolicy::RatioCeiling {
        max_stock_to_demand_area_ratio: 10.0,
    };

    fn demand(id: u64, length: f64, w: f64) -> Demand {
        Demand::new(id, length, Section::new(w, 100.0), StrengthClass(1))
    }

    fn stock(length: f64) -> StockElement {
        StockElement::original(10, length, Section::new(100.0, 100.0), StrengthClass(2))
    }

    #[test]
    fn test_tier_index() {
        assert_eq!(tier_index(0.5, 0.52, 0.05), 0);
        assert_eq!(tier_index(0.85, 0.3, 0.05), 1);
        assert_eq!(tier_index(0.6, 0.3, 0.05), 2);
        assert_eq!(tier_index(0.45, 0.9, 0.05), 3);
        assert_eq!(tier_index(0.1, 0.9, 0.05), 4);
    }

    #[test]
    fn test_lead_compatible_before_size_tiers() {
        let demands = vec![
            demand(1, 400.0, 100.0),
            demand(2, 300.0, 100.0),
            demand(3, 500.0, 90.0),
            demand(4, 250.0, 50.0),
        ];
        let a = simulate_grouping(&demands[0], &stock(1000.0), &demands, &CONFIG, &CEILING, None);
        // 600 left after the lead: 2 (lead-compatible) takes 300, 3 no longer fits, 4 takes 250
        assert_eq!(a.demand_ids, vec![1, 2, 4]);
        assert!((a.remaining_length - 50.0).abs() < EPSILON);
        assert!((a.utilization - 0.95).abs() < EPSILON);
    }

    #[test]
    fn test_longest_first_within_tier() {
        let demands = vec![
            demand(1, 500.0, 100.0),
            demand(2, 200.0, 100.0),
            demand(3, 450.0, 100.0),
            demand(4, 300.0, 100.0),
        ];
        let a = simulate_grouping(&demands[0], &stock(1000.0), &demands, &CONFIG, &CEILING, None);
        assert_eq!(a.demand_ids, vec![1, 3]);
    }

    #[test]
    fn test_min_ratio_excludes_slim_demands() {
        let config = GroupingConfig {
            min_cross_section_ratio: 0.5,
            cross_section_tolerance: 0.05,
        };
        let demands = vec![demand(1, 400.0, 100.0), demand(2, 300.0, 30.0)];
        let a = simulate_grouping(&demands[0], &stock(1000.0), &demands, &config, &CEILING, None);
        assert_eq!(a.demand_ids, vec![1]);
    }

    #[test]
    fn test_skips_assigned_and_higher_class() {
        let mut demands = vec![demand(1, 400.0, 100.0), demand(2, 300.0, 100.0), demand(3, 200.0, 100.0)];
        demands[1].assigned = true;
        demands[2].class = StrengthClass(5);
        let a = simulate_grouping(&demands[0], &stock(1000.0), &demands, &CONFIG, &CEILING, None);
        assert_eq!(a.demand_ids, vec![1]);
    }

    #[test]
    fn test_full_lead_returns_alone() {
        let demands = vec![demand(1, 1000.0, 100.0), demand(2, 10.0, 100.0)];
        let a = simulate_grouping(&demands[0], &stock(1000.0), &demands, &CONFIG, &CEILING, None);
        assert_eq!(a.demand_ids, vec![1]);
        assert!((a.utilization - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_partially_used_stock_limits_packing() {
        let mut s = stock(1000.0);
        s.current_leftover_length = 500.0;
        let demands = vec![demand(1, 300.0, 100.0), demand(2, 300.0, 100.0), demand(3, 150.0, 100.0)];
        let a = simulate_grouping(&demands[0], &s, &demands, &CONFIG, &CEILING, None);
        assert_eq!(a.demand_ids, vec![1, 3]);
        assert!((a.remaining_length - 50.0).abs() < EPSILON);
        assert!((a.utilization - 0.95).abs() < EPSILON);
    }

    #[test]
    fn test_follower_must_pass_area_ceiling() {
        // 10x10 on 100x100 is a ratio of 100, far over the cap of 10
        let demands = vec![
            demand(1, 600.0, 100.0),
            Demand::new(2, 300.0, Section::new(10.0, 10.0), StrengthClass(1)),
        ];
        let a = simulate_grouping(&demands[0], &stock(1000.0), &demands, &CONFIG, &CEILING, None);
        assert_eq!(a.demand_ids, vec![1]);
        assert!((a.remaining_length - 400.0).abs() < EPSILON);
    }

    #[test]
    fn test_follower_must_pass_area_floor() {
        let floor = CrossSectionPolicy::RatioFloor {
            min_cross_section_ratio: 0.6,
        };
        let demands = vec![demand(1, 400.0, 100.0), demand(2, 300.0, 50.0), demand(3, 200.0, 80.0)];
        let a = simulate_grouping(&demands[0], &stock(1000.0), &demands, &CONFIG, &floor, None);
        assert_eq!(a.demand_ids, vec![1, 3]);
    }

    #[test]
    fn test_follower_above_band_is_left_for_its_own_pass() {
        let mut demands = vec![demand(1, 400.0, 100.0), demand(2, 300.0, 100.0), demand(3, 200.0, 100.0)];
        demands[1].class = StrengthClass(2);
        let a = simulate_grouping(
            &demands[0],
            &stock(1000.0),
            &demands,
            &CONFIG,
            &CEILING,
            Some(StrengthClass(1)),
        );
        assert_eq!(a.demand_ids, vec![1, 3]);

        let a = simulate_grouping(
            &demands[0],
            &stock(1000.0),
            &demands,
            &CONFIG,
            &CEILING,
            Some(StrengthClass(2)),
        );
        assert_eq!(a.demand_ids, vec![1, 2, 3]);
    }
}
