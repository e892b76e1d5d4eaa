use crate::types::StockId;

/// Hands out stock ids for pieces created during a run. Every id is above
/// all input stock ids and above every id handed out before it.
#[derive(Debug, Clone)]
pub struct IdMint {
    next: StockId,
}

impl IdMint {
    pub fn above<I: IntoIterator<Item = StockId>>(input_ids: I) -> Self {
        let next = input_ids.into_iter().max().map_or(1, |max| max + 1);
        Self { next }
    }

    pub fn mint(&mut self) -> StockId {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> StockId {
        self.next
    }
}
