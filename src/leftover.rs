use crate::ids::IdMint;
use crate::types::{StockElement, StockKind};

/// Builds one `Leftover` view per used original whose remaining length is at
/// least `threshold`. Master pieces are left untouched; the views point back
/// at them through `parent_id`.
pub fn derive_leftovers(
    master: &[StockElement],
    threshold: f64,
    ids: &mut IdMint,
) -> Vec<StockElement> {
    master
        .iter()
        .filter(|s| s.kind == StockKind::Original)
        .filter(|s| s.used_at_all && s.current_leftover_length >= threshold)
        .map(|parent| StockElement {
            id: ids.mint(),
            original_length: parent.current_leftover_length,
            current_leftover_length: parent.current_leftover_length,
            section: parent.section,
            class: parent.class,
            kind: StockKind::Leftover,
            parent_id: parent.id,
            used_at_all: false,
            assigned_demand_ids: Vec::new(),
        })
        .collect()
}
