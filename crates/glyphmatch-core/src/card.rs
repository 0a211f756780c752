use serde::{Deserialize, Serialize};

/// Identifier of a symbol in the shipped art alphabet.
pub type SymbolId = u32;

/// One symbol stamped on a card face. Geometry is relative to a 150x150 card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPlacement {
    pub symbol: SymbolId,
    pub size: u32,
    pub vertical: i32,
    pub horizontal: i32,
    pub rotation: f64,
}

/// A card: an unordered set of symbol placements. Immutable once the round
/// begins; the only mutation ever applied is the one-time symbol-id
/// displacement at deck construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub symbols: Vec<SymbolPlacement>,
}

impl Card {
    pub fn new(symbols: Vec<SymbolPlacement>) -> Self {
        Self { symbols }
    }

    /// Whether the given symbol appears on this card.
    pub fn contains(&self, symbol: SymbolId) -> bool {
        self.symbols.iter().any(|s| s.symbol == symbol)
    }

    /// Shift every symbol id on the card by a fixed offset.
    pub fn shift_symbols(&mut self, offset: u32) {
        for placement in &mut self.symbols {
            placement.symbol += offset;
        }
    }
}
