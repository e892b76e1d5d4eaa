use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::grouping::simulate_grouping;
use crate::ids::IdMint;
use crate::leftover::derive_leftovers;
use crate::selector::select_best;
use crate::types::{
    Assignment, Demand, DemandId, EPSILON, Placement, Section, Solution, StockElement, StockId,
    StockKind, StrengthClass, Tier, group_by_class,
};

/// Greedy multi-tier assignment of demands to stock.
///
/// Tiers run in order: reclaimed originals, recovered leftovers, market stock
/// (only with a market pool) and synthesized custom pieces (only when
/// synthesis is configured). Within a tier, each class band is one pass. In
/// every pass a demand first tries pieces opened in an earlier pass, then
/// untouched ones. A piece opened during a pass is closed for the rest of it.
pub struct Engine {
    config: EngineConfig,
    demands: Vec<Demand>,
    /// Demand indices, largest volume first. Fixed for the whole run.
    order: Vec<usize>,
    demand_index: HashMap<DemandId, usize>,
    /// Arena of every stock element: inputs first, minted pieces appended.
    stock: Vec<StockElement>,
    original_index: HashMap<StockId, usize>,
    market_enabled: bool,
    ids: IdMint,
    locked: HashSet<usize>,
    placements: Vec<Placement>,
    max_input_stock_id: Option<StockId>,
}

impl Engine {
    pub fn new(
        demands: Vec<Demand>,
        reclaimed: Vec<StockElement>,
        market: Option<Vec<StockElement>>,
        config: EngineConfig,
    ) -> Self {
        let market_enabled = market.is_some();

        let mut stock: Vec<StockElement> = Vec::with_capacity(reclaimed.len());
        stock.extend(reclaimed.into_iter().map(|s| StockElement {
            kind: StockKind::Original,
            parent_id: s.id,
            ..s
        }));
        stock.extend(market.into_iter().flatten().map(|s| StockElement {
            kind: StockKind::MarketTemplate,
            parent_id: s.id,
            ..s
        }));

        let max_input_stock_id = stock.iter().map(|s| s.id).max();
        let ids = IdMint::above(stock.iter().map(|s| s.id));

        let original_index = stock
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind == StockKind::Original)
            .map(|(i, s)| (s.id, i))
            .collect();
        let demand_index = demands.iter().enumerate().map(|(i, d)| (d.id, i)).collect();
        let order = priority_order(&demands);

        Self {
            config,
            demands,
            order,
            demand_index,
            stock,
            original_index,
            market_enabled,
            ids,
            locked: HashSet::new(),
            placements: Vec::new(),
            max_input_stock_id,
        }
    }

    pub fn run(mut self) -> Result<Solution, EngineError> {
        info!(
            demands = self.demands.len(),
            stock = self.stock.len(),
            market = self.market_enabled,
            "starting assignment"
        );

        for tier in self.tiers() {
            if self.demands.iter().all(|d| d.assigned) {
                break;
            }
            let before = self.placements.len();
            self.run_tier(tier)?;
            info!(
                tier = %tier,
                placed = self.placements.len() - before,
                unassigned = self.demands.iter().filter(|d| !d.assigned).count(),
                "tier complete"
            );
        }

        Ok(Solution {
            demands: self.demands,
            stock: self.stock,
            placements: self.placements,
            max_input_stock_id: self.max_input_stock_id,
        })
    }

    fn tiers(&self) -> Vec<Tier> {
        let mut tiers = vec![Tier::Reclaimed, Tier::Recovered];
        if self.market_enabled {
            tiers.push(Tier::Market);
        }
        if self.config.synthesis.is_some() {
            tiers.push(Tier::Synthesized);
        }
        tiers
    }

    fn run_tier(&mut self, tier: Tier) -> Result<(), EngineError> {
        match tier {
            Tier::Synthesized => return self.synthesize_remaining(),
            Tier::Recovered => {
                let leftovers = derive_leftovers(
                    &self.stock,
                    self.config.minimum_significant_leftover_length,
                    &mut self.ids,
                );
                debug!(count = leftovers.len(), "recovered leftovers");
                self.stock.extend(leftovers);
            }
            Tier::Reclaimed | Tier::Market => {}
        }

        for band in self.class_bands(tier) {
            self.locked.clear();
            for pos in 0..self.order.len() {
                let d = self.order[pos];
                let demand = &self.demands[d];
                if demand.assigned || band.is_some_and(|c| demand.class > c) {
                    continue;
                }
                self.place(tier, d, band)?;
            }
        }
        Ok(())
    }

    /// `None` is the single unbanded pass of the hard-minimum policy.
    fn class_bands(&self, tier: Tier) -> Vec<Option<StrengthClass>> {
        use crate::config::ClassPolicy;

        match self.config.class_policy {
            ClassPolicy::HardMinimum => vec![None],
            ClassPolicy::Upgrade => {
                let open = self.demands.iter().filter(|d| !d.assigned);
                let pool = self.stock.iter().filter(|s| tier_accepts(tier, s.kind));
                let classes: BTreeSet<StrengthClass> = group_by_class(open)
                    .into_keys()
                    .chain(group_by_class(pool).into_keys())
                    .collect();
                classes.into_iter().map(Some).collect()
            }
        }
    }

    /// Tries consolidation into opened pieces, then untouched ones.
    fn place(
        &mut self,
        tier: Tier,
        d: usize,
        band: Option<StrengthClass>,
    ) -> Result<bool, EngineError> {
        let pool: Vec<usize> = (0..self.stock.len())
            .filter(|i| !self.locked.contains(i))
            .filter(|&i| {
                let s = &self.stock[i];
                tier_accepts(tier, s.kind) && band.is_none_or(|c| s.class >= c)
            })
            .collect();

        let policy = self.config.cross_section_policy;
        let demand = &self.demands[d];

        let (opened, fresh): (Vec<usize>, Vec<usize>) =
            pool.into_iter().partition(|&i| self.stock[i].is_opened());

        for candidates in [opened, fresh] {
            let best = select_best(demand, candidates.iter().map(|&i| &self.stock[i]), &policy);
            if let Some((position, assignment)) = best {
                self.commit(tier, band, candidates[position], assignment)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Cuts the selected demand, plus its group when grouping is on, from
    /// the arena piece at `idx`.
    fn commit(
        &mut self,
        tier: Tier,
        band: Option<StrengthClass>,
        mut idx: usize,
        assignment: Assignment,
    ) -> Result<(), EngineError> {
        if self.stock[idx].kind == StockKind::MarketTemplate {
            idx = self.instantiate(idx);
        }

        let demand_ids = match self.config.grouping {
            Some(grouping) => {
                let lead_id = assignment.demand_ids[0];
                let lead = self
                    .demand_index
                    .get(&lead_id)
                    .map(|&i| &self.demands[i])
                    .ok_or(EngineError::UnknownDemand(lead_id))?;
                simulate_grouping(
                    lead,
                    &self.stock[idx],
                    &self.demands,
                    &grouping,
                    &self.config.cross_section_policy,
                    band,
                )
                .demand_ids
            }
            None => assignment.demand_ids,
        };

        for demand_id in demand_ids {
            self.cut(idx, demand_id, tier, assignment.score)?;
        }
        self.locked.insert(idx);
        Ok(())
    }

    /// Buys a full-length piece from a market template.
    fn instantiate(&mut self, template: usize) -> usize {
        let id = self.ids.mint();
        let t = &self.stock[template];
        let piece = StockElement::new(id, t.original_length, t.section, t.class, StockKind::MarketInstance);
        debug!(template = t.id, instance = id, "market instance created");
        self.stock.push(piece);
        self.stock.len() - 1
    }

    /// Cuts one demand from `idx`, mirroring leftover cuts onto the parent
    /// original, and records the demand on the root piece.
    fn cut(&mut self, idx: usize, demand_id: DemandId, tier: Tier, score: f64) -> Result<(), EngineError> {
        let d = *self
            .demand_index
            .get(&demand_id)
            .ok_or(EngineError::UnknownDemand(demand_id))?;
        if self.demands[d].assigned {
            error!(demand = demand_id, "demand already assigned");
            return Err(EngineError::DoubleAssignment(demand_id));
        }
        let length = self.demands[d].length;

        let root = match self.stock[idx].kind {
            StockKind::Leftover => {
                let parent_id = self.stock[idx].parent_id;
                *self
                    .original_index
                    .get(&parent_id)
                    .ok_or(EngineError::UnknownStock(parent_id))?
            }
            _ => idx,
        };

        shorten(&mut self.stock[idx], length)?;
        if root != idx {
            shorten(&mut self.stock[root], length)?;
        }

        self.demands[d].assigned = true;
        let piece = &mut self.stock[root];
        piece.assigned_demand_ids.push(demand_id);
        piece.used_at_all = true;

        debug!(
            demand = demand_id,
            stock = piece.id,
            tier = %tier,
            score,
            leftover = piece.current_leftover_length,
            "placed"
        );
        self.placements.push(Placement {
            demand_id,
            stock_id: piece.id,
            tier,
        });
        Ok(())
    }

    fn synthesize_remaining(&mut self) -> Result<(), EngineError> {
        let Some(buffer) = self.config.synthesis else {
            return Ok(());
        };
        for pos in 0..self.order.len() {
            let d = self.order[pos];
            if self.demands[d].assigned {
                continue;
            }
            let demand = &self.demands[d];
            let id = self.ids.mint();
            let section = Section::new(
                demand.section.width * (1.0 + buffer.section_buffer),
                demand.section.height * (1.0 + buffer.section_buffer),
            );
            let piece = StockElement::new(
                id,
                demand.length * (1.0 + buffer.length_buffer),
                section,
                demand.class,
                StockKind::Custom,
            );
            let demand_id = demand.id;
            self.stock.push(piece);
            self.cut(self.stock.len() - 1, demand_id, Tier::Synthesized, 0.0)?;
        }
        Ok(())
    }
}

/// Convenience wrapper: builds an engine and runs it.
pub fn assign(
    demands: Vec<Demand>,
    reclaimed: Vec<StockElement>,
    market: Option<Vec<StockElement>>,
    config: EngineConfig,
) -> Result<Solution, EngineError> {
    Engine::new(demands, reclaimed, market, config).run()
}

fn tier_accepts(tier: Tier, kind: StockKind) -> bool {
    match tier {
        Tier::Reclaimed => kind == StockKind::Original,
        Tier::Recovered => kind == StockKind::Leftover,
        Tier::Market => matches!(kind, StockKind::MarketTemplate | StockKind::MarketInstance),
        Tier::Synthesized => false,
    }
}

fn shorten(piece: &mut StockElement, length: f64) -> Result<(), EngineError> {
    let leftover = piece.current_leftover_length - length;
    if leftover < -EPSILON {
        error!(stock = piece.id, leftover, "negative leftover");
        return Err(EngineError::NegativeLeftover {
            stock_id: piece.id,
            leftover,
        });
    }
    piece.current_leftover_length = leftover.max(0.0);
    Ok(())
}

/// Volume, then class, then length, all descending. Ties keep input order.
fn priority_order(demands: &[Demand]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..demands.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&demands[a], &demands[b]);
        b.volume()
            .total_cmp(&a.volume())
            .then(b.class.cmp(&a.class))
            .then(b.length.total_cmp(&a.length))
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassPolicy;

    fn demand(id: u64, length: f64, class: u32) -> Demand {
        Demand::new(id, length, Section::new(50.0, 50.0), StrengthClass(class))
    }

    fn stock(id: u64, length: f64, class: u32) -> StockElement {
        StockElement::original(id, length, Section::new(50.0, 50.0), StrengthClass(class))
    }

    fn find(sol: &Solution, id: StockId) -> &StockElement {
        sol.stock.iter().find(|s| s.id == id).unwrap()
    }

    /// Validates the bookkeeping of a finished run:
    /// 1. every demand is assigned or unassigned exactly once
    /// 2. no stock has negative leftover
    /// 3. `used_at_all` matches the recorded demands
    /// 4. no leftover view holds demands
    fn assert_solution_valid(sol: &Solution) {
        let recorded: Vec<DemandId> = sol
            .stock
            .iter()
            .flat_map(|s| s.assigned_demand_ids.iter().copied())
            .collect();
        let unique: HashSet<DemandId> = recorded.iter().copied().collect();
        assert_eq!(recorded.len(), unique.len(), "a demand is recorded twice");
        assert_eq!(recorded.len(), sol.assigned_count());
        assert_eq!(sol.assigned_count() + sol.unassigned().count(), sol.demands.len());

        for s in &sol.stock {
            assert!(s.current_leftover_length >= 0.0, "stock {} negative", s.id);
            assert!(s.current_leftover_length <= s.original_length + EPSILON);
            assert_eq!(s.used_at_all, !s.assigned_demand_ids.is_empty(), "stock {}", s.id);
            if s.kind == StockKind::Leftover {
                assert!(s.assigned_demand_ids.is_empty());
            }
        }
    }

    #[test]
    fn test_priority_order() {
        let demands = vec![
            demand(1, 500.0, 1),
            demand(2, 900.0, 1),
            demand(3, 500.0, 2),
            demand(4, 500.0, 1),
        ];
        let order: Vec<u64> = priority_order(&demands).iter().map(|&i| demands[i].id).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_single_demand() {
        let sol = assign(vec![demand(1, 1000.0, 1)], vec![stock(10, 1500.0, 1)], None, EngineConfig::default())
            .unwrap();
        assert_solution_valid(&sol);
        assert_eq!(find(&sol, 10).assigned_demand_ids, vec![1]);
        assert!((find(&sol, 10).current_leftover_length - 500.0).abs() < EPSILON);
        assert_eq!(sol.placements[0].tier, Tier::Reclaimed);
    }

    #[test]
    fn test_without_grouping_second_demand_goes_through_recovery() {
        let sol = assign(
            vec![demand(1, 600.0, 1), demand(2, 300.0, 1)],
            vec![stock(10, 1000.0, 1)],
            None,
            EngineConfig::default(),
        )
        .unwrap();
        assert_solution_valid(&sol);
        let s = find(&sol, 10);
        assert_eq!(s.assigned_demand_ids, vec![1, 2]);
        assert!((s.current_leftover_length - 100.0).abs() < EPSILON);
        assert_eq!(sol.tier_count(Tier::Reclaimed), 1);
        assert_eq!(sol.tier_count(Tier::Recovered), 1);
    }

    #[test]
    fn test_grouping_packs_in_one_pass() {
        let sol = assign(
            vec![demand(1, 600.0, 1), demand(2, 300.0, 1)],
            vec![stock(10, 1000.0, 1)],
            None,
            EngineConfig::default().with_grouping(0.0, 0.05),
        )
        .unwrap();
        assert_solution_valid(&sol);
        assert_eq!(find(&sol, 10).assigned_demand_ids, vec![1, 2]);
        assert_eq!(sol.tier_count(Tier::Reclaimed), 2);
    }

    #[test]
    fn test_used_piece_preferred_in_later_band() {
        // Band C1 opens stock 10; in band C2 demand 2 consolidates into it
        // even though untouched stock 11 would fit tighter.
        let config = EngineConfig::default().with_class_policy(ClassPolicy::Upgrade);
        let sol = assign(
            vec![demand(1, 400.0, 1), demand(2, 300.0, 2)],
            vec![stock(10, 2000.0, 2), stock(11, 300.0, 2)],
            None,
            config,
        )
        .unwrap();
        assert_solution_valid(&sol);
        assert_eq!(find(&sol, 11).assigned_demand_ids, Vec::<u64>::new());
        assert_eq!(find(&sol, 10).assigned_demand_ids, vec![1, 2]);
    }

    #[test]
    fn test_leftover_consumption_mirrors_parent() {
        // 40 leaves 110 on stock 10; the 30 can only reach it through the leftover
        let sol = assign(
            vec![demand(1, 40.0, 1), demand(2, 30.0, 1)],
            vec![stock(10, 150.0, 1)],
            None,
            EngineConfig::default(),
        )
        .unwrap();
        assert_solution_valid(&sol);
        let parent = find(&sol, 10);
        assert_eq!(parent.assigned_demand_ids, vec![1, 2]);
        assert!((parent.current_leftover_length - 80.0).abs() < EPSILON);
        let view = sol.stock.iter().find(|s| s.kind == StockKind::Leftover).unwrap();
        assert_eq!(view.parent_id, 10);
        assert!(view.id > 10);
        assert_eq!(view.original_length, 110.0);
        assert!((view.current_leftover_length - 80.0).abs() < EPSILON);
    }

    #[test]
    fn test_market_template_stays_reusable() {
        let market = vec![StockElement::market_template(
            50,
            1000.0,
            Section::new(50.0, 50.0),
            StrengthClass(1),
        )];
        let sol = assign(
            vec![demand(1, 900.0, 1), demand(2, 800.0, 1)],
            vec![],
            Some(market),
            EngineConfig::default(),
        )
        .unwrap();
        assert_solution_valid(&sol);
        let template = find(&sol, 50);
        assert!(!template.used_at_all);
        assert_eq!(template.current_leftover_length, 1000.0);
        let instances: Vec<&StockElement> = sol
            .stock
            .iter()
            .filter(|s| s.kind == StockKind::MarketInstance)
            .collect();
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|s| s.id > 50 && s.original_length == 1000.0));
        assert_eq!(sol.tier_count(Tier::Market), 2);
    }

    #[test]
    fn test_synthesis_never_fails() {
        let config = EngineConfig::default().with_synthesis(Default::default());
        let sol = assign(vec![demand(1, 1000.0, 3)], vec![stock(10, 5000.0, 2)], None, config).unwrap();
        assert_solution_valid(&sol);
        let custom = sol.stock.iter().find(|s| s.kind == StockKind::Custom).unwrap();
        assert_eq!(custom.assigned_demand_ids, vec![1]);
        assert!((custom.original_length - 1050.0).abs() < EPSILON);
        assert!((custom.section.width - 52.5).abs() < EPSILON);
        assert_eq!(custom.class, StrengthClass(3));
        assert_eq!(custom.parent_id, custom.id);
    }

    #[test]
    fn test_reclaimed_preferred_over_market() {
        let market = vec![StockElement::market_template(
            50,
            1000.0,
            Section::new(50.0, 50.0),
            StrengthClass(1),
        )];
        let sol = assign(vec![demand(1, 900.0, 1)], vec![stock(10, 3000.0, 1)], Some(market), EngineConfig::default())
            .unwrap();
        assert_eq!(sol.placements[0].stock_id, 10);
    }

    #[test]
    fn test_double_assignment_is_rejected() {
        let mut engine = Engine::new(vec![demand(1, 100.0, 1)], vec![stock(10, 1000.0, 1)], None, EngineConfig::default());
        engine.cut(0, 1, Tier::Reclaimed, 0.0).unwrap();
        assert_eq!(
            engine.cut(0, 1, Tier::Reclaimed, 0.0),
            Err(EngineError::DoubleAssignment(1))
        );
    }

    #[test]
    fn test_negative_leftover_is_rejected() {
        let mut engine = Engine::new(vec![demand(1, 2000.0, 1)], vec![stock(10, 1000.0, 1)], None, EngineConfig::default());
        assert!(matches!(
            engine.cut(0, 1, Tier::Reclaimed, 0.0),
            Err(EngineError::NegativeLeftover { stock_id: 10, .. })
        ));
        assert!(!engine.demands[0].assigned);
    }

    #[test]
    fn test_grouping_respects_area_ceiling() {
        // the 10x10 follower is 100x smaller than the stock, over the default cap of 10
        let sol = assign(
            vec![
                Demand::new(1, 600.0, Section::new(100.0, 100.0), StrengthClass(1)),
                Demand::new(2, 300.0, Section::new(10.0, 10.0), StrengthClass(1)),
            ],
            vec![StockElement::original(10, 1000.0, Section::new(100.0, 100.0), StrengthClass(1))],
            None,
            EngineConfig::default().with_grouping(0.0, 0.05),
        )
        .unwrap();
        assert_solution_valid(&sol);
        assert_eq!(find(&sol, 10).assigned_demand_ids, vec![1]);
        assert_eq!(sol.unassigned().map(|d| d.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_grouping_stays_inside_class_band() {
        // Band C1 groups only demand 3 behind the lead; the C3 demand waits
        // for its own band and then consolidates into the opened piece.
        let config = EngineConfig::default()
            .with_class_policy(ClassPolicy::Upgrade)
            .with_grouping(0.0, 0.05);
        let sol = assign(
            vec![demand(1, 2000.0, 1), demand(2, 500.0, 3), demand(3, 400.0, 1)],
            vec![stock(10, 3000.0, 3)],
            None,
            config,
        )
        .unwrap();
        assert_solution_valid(&sol);
        let order: Vec<DemandId> = sol.placements.iter().map(|p| p.demand_id).collect();
        assert_eq!(order, vec![1, 3, 2]);
        assert_eq!(find(&sol, 10).assigned_demand_ids, vec![1, 3, 2]);
        assert!((find(&sol, 10).current_leftover_length - 100.0).abs() < EPSILON);
    }

    #[test]
    fn test_repeated_stock_ids_cut_the_selected_piece() {
        let sol = Engine::new(
            vec![demand(1, 1000.0, 1)],
            vec![stock(10, 100.0, 1), stock(10, 2000.0, 1)],
            None,
            EngineConfig::default(),
        )
        .run()
        .unwrap();
        assert_solution_valid(&sol);
        assert!(sol.stock[0].assigned_demand_ids.is_empty());
        assert_eq!(sol.stock[0].current_leftover_length, 100.0);
        assert_eq!(sol.stock[1].assigned_demand_ids, vec![1]);
        assert!((sol.stock[1].current_leftover_length - 1000.0).abs() < EPSILON);
    }
}
