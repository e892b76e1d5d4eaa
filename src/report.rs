use serde::Serialize;

use crate::types::{Solution, StockId, StockKind, StrengthClass, Tier};

/// One cut: a demand and the stock piece it comes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub stock_id: StockId,
    pub demand_id: u64,
    pub final_leftover_length: f64,
    pub stock_original_length: f64,
    pub stock_height: f64,
    pub stock_width: f64,
    pub stock_class: StrengthClass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub matched: usize,
    pub unmatched: usize,
    pub reclaimed: usize,
    pub recovered: usize,
    pub market: usize,
    pub synthesized: usize,
    pub stock_pieces_used: usize,
    pub total_used_length: f64,
    pub total_leftover_length: f64,
    pub waste_percent: f64,
    /// First and last id minted during the run. Unmatched placeholders count
    /// up from the same base and can repeat ids inside this range.
    pub minted_ids: Option<(StockId, StockId)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub matched: Vec<ReportRow>,
    pub unmatched: Vec<ReportRow>,
    pub summary: Summary,
}

pub fn build(solution: &Solution) -> Report {
    let mut used: Vec<_> = solution.used_stock().collect();
    used.sort_by_key(|s| s.id);

    let matched = used
        .into_iter()
        .flat_map(|s| {
            let mut ids = s.assigned_demand_ids.clone();
            ids.sort_unstable();
            ids.into_iter().map(move |demand_id| ReportRow {
                stock_id: s.id,
                demand_id,
                final_leftover_length: s.current_leftover_length,
                stock_original_length: s.original_length,
                stock_height: s.section.height,
                stock_width: s.section.width,
                stock_class: s.class,
            })
        })
        .collect::<Vec<_>>();

    // Unmatched demands get placeholder stock ids counting up from the
    // largest input stock id, and describe the piece that would be needed.
    let mut open: Vec<_> = solution.unassigned().collect();
    open.sort_by_key(|d| d.id);
    let base = solution.max_input_stock_id.unwrap_or(0);
    let unmatched = open
        .into_iter()
        .enumerate()
        .map(|(i, d)| ReportRow {
            stock_id: base + 1 + i as u64,
            demand_id: d.id,
            final_leftover_length: 0.0,
            stock_original_length: d.length,
            stock_height: d.section.height,
            stock_width: d.section.width,
            stock_class: d.class,
        })
        .collect::<Vec<_>>();

    let minted = solution
        .stock
        .iter()
        .filter(|s| !matches!(s.kind, StockKind::Original | StockKind::MarketTemplate))
        .map(|s| s.id);
    let minted_ids = minted.clone().min().zip(minted.max());

    let summary = Summary {
        matched: matched.len(),
        unmatched: unmatched.len(),
        reclaimed: solution.tier_count(Tier::Reclaimed),
        recovered: solution.tier_count(Tier::Recovered),
        market: solution.tier_count(Tier::Market),
        synthesized: solution.tier_count(Tier::Synthesized),
        stock_pieces_used: solution.used_stock().count(),
        total_used_length: solution.total_used_length(),
        total_leftover_length: solution.total_leftover_length(),
        waste_percent: solution.total_waste_percent(),
        minted_ids,
    };

    Report {
        matched,
        unmatched,
        summary,
    }
}

impl Report {
    /// Plain-text rendering for the command line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut current = None;
        for row in &self.matched {
            if current != Some(row.stock_id) {
                out.push_str(&format!(
                    "Stock {} ({} {}x{} {}), leftover {}:\n",
                    row.stock_id,
                    row.stock_original_length,
                    row.stock_width,
                    row.stock_height,
                    row.stock_class,
                    row.final_leftover_length,
                ));
                current = Some(row.stock_id);
            }
            out.push_str(&format!("  demand {}\n", row.demand_id));
        }
        if !self.unmatched.is_empty() {
            out.push_str("Unmatched:\n");
            for row in &self.unmatched {
                out.push_str(&format!(
                    "  demand {} -> {} ({} {}x{} {})\n",
                    row.demand_id,
                    row.stock_id,
                    row.stock_original_length,
                    row.stock_width,
                    row.stock_height,
                    row.stock_class,
                ));
            }
        }
        let s = &self.summary;
        out.push_str(&format!(
            "Summary: {} matched, {} unmatched, {} piece{} used, {:.1}% waste\n",
            s.matched,
            s.unmatched,
            s.stock_pieces_used,
            if s.stock_pieces_used == 1 { "" } else { "s" },
            s.waste_percent,
        ));
        if let Some((first, last)) = s.minted_ids
            && !self.unmatched.is_empty()
        {
            out.push_str(&format!(
                "Placeholder ids are not stock; minted pieces use {first}..={last}\n"
            ));
        }
        out
    }
}
