use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type DemandId = u64;
pub type StockId = u64;

/// Tolerance for every length and area comparison.
pub const EPSILON: f64 = 1e-6;

/// Ordered structural-capacity rating. Stock must meet or exceed a demand's class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrengthClass(pub u32);

impl StrengthClass {
    pub fn rank(&self) -> f64 {
        self.0 as f64
    }
}

impl std::fmt::Display for StrengthClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Anything carrying a strength class. Class grouping is written against this.
pub trait HasClass {
    fn strength_class(&self) -> StrengthClass;
}

/// Buckets items by class, ascending, keeping input order within a bucket.
pub fn group_by_class<'a, T, I>(items: I) -> BTreeMap<StrengthClass, Vec<&'a T>>
where
    T: HasClass + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut groups: BTreeMap<StrengthClass, Vec<&'a T>> = BTreeMap::new();
    for item in items {
        groups.entry(item.strength_class()).or_default().push(item);
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub width: f64,
    pub height: f64,
}

impl Section {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn fits_in(&self, other: &Section) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Demand {
    pub id: DemandId,
    pub length: f64,
    pub section: Section,
    pub class: StrengthClass,
    pub assigned: bool,
}

impl Demand {
    pub fn new(id: DemandId, length: f64, section: Section, class: StrengthClass) -> Self {
        Self {
            id,
            length,
            section,
            class,
            assigned: false,
        }
    }

    pub fn cross_section_area(&self) -> f64 {
        self.section.area()
    }

    pub fn volume(&self) -> f64 {
        self.length * self.cross_section_area()
    }
}

impl HasClass for Demand {
    fn strength_class(&self) -> StrengthClass {
        self.class
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockKind {
    /// Reclaimed input stock.
    Original,
    /// Virtual remnant of a used original.
    Leftover,
    /// Purchasable catalogue entry, never cut itself.
    MarketTemplate,
    /// Piece bought from a template.
    MarketInstance,
    /// Piece synthesized to the exact needs of one demand.
    Custom,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockElement {
    pub id: StockId,
    pub original_length: f64,
    pub current_leftover_length: f64,
    pub section: Section,
    pub class: StrengthClass,
    pub kind: StockKind,
    pub parent_id: StockId,
    pub used_at_all: bool,
    pub assigned_demand_ids: Vec<DemandId>,
}

impl StockElement {
    pub fn new(
        id: StockId,
        length: f64,
        section: Section,
        class: StrengthClass,
        kind: StockKind,
    ) -> Self {
        Self {
            id,
            original_length: length,
            current_leftover_length: length,
            section,
            class,
            kind,
            parent_id: id,
            used_at_all: false,
            assigned_demand_ids: Vec::new(),
        }
    }

    pub fn original(id: StockId, length: f64, section: Section, class: StrengthClass) -> Self {
        Self::new(id, length, section, class, StockKind::Original)
    }

    pub fn market_template(
        id: StockId,
        length: f64,
        section: Section,
        class: StrengthClass,
    ) -> Self {
        Self::new(id, length, section, class, StockKind::MarketTemplate)
    }

    pub fn cross_section_area(&self) -> f64 {
        self.section.area()
    }

    pub fn consumed_length(&self) -> f64 {
        self.original_length - self.current_leftover_length
    }

    /// A piece counts as opened once anything was cut from it. Leftover views
    /// never hold demands themselves, so their own length is the signal.
    pub fn is_opened(&self) -> bool {
        match self.kind {
            StockKind::Leftover => self.consumed_length() > EPSILON,
            _ => self.used_at_all,
        }
    }
}

impl HasClass for StockElement {
    fn strength_class(&self) -> StrengthClass {
        self.class
    }
}

/// Ephemeral selection result, consumed by the engine right after it is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub stock_id: StockId,
    pub demand_ids: Vec<DemandId>,
    pub remaining_length: f64,
    pub score: f64,
    pub utilization: f64,
}

/// Fallback tier that produced a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Reclaimed,
    Recovered,
    Market,
    Synthesized,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::Reclaimed => "reclaimed",
            Tier::Recovered => "recovered",
            Tier::Market => "market",
            Tier::Synthesized => "synthesized",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub demand_id: DemandId,
    /// Root stock the demand is recorded on.
    pub stock_id: StockId,
    pub tier: Tier,
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub demands: Vec<Demand>,
    /// Every stock element the run knew about, input order first, then minted pieces.
    pub stock: Vec<StockElement>,
    pub placements: Vec<Placement>,
    pub max_input_stock_id: Option<StockId>,
}

impl Solution {
    pub fn assigned_count(&self) -> usize {
        self.demands.iter().filter(|d| d.assigned).count()
    }

    pub fn unassigned(&self) -> impl Iterator<Item = &Demand> {
        self.demands.iter().filter(|d| !d.assigned)
    }

    pub fn used_stock(&self) -> impl Iterator<Item = &StockElement> {
        self.stock.iter().filter(|s| s.used_at_all)
    }

    pub fn tier_count(&self, tier: Tier) -> usize {
        self.placements.iter().filter(|p| p.tier == tier).count()
    }

    pub fn total_used_length(&self) -> f64 {
        self.used_stock().map(|s| s.original_length).sum()
    }

    pub fn total_leftover_length(&self) -> f64 {
        self.used_stock().map(|s| s.current_leftover_length).sum()
    }

    pub fn total_waste_percent(&self) -> f64 {
        let total = self.total_used_length();
        if total <= EPSILON {
            return 0.0;
        }
        self.total_leftover_length() / total * 100.0
    }
}
