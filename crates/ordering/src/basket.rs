use serde::{Deserialize, Serialize};

use storefront_core::{ProductId, ValueObject};

/// One basket line: a product and how many units of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl ValueObject for OrderLine {}

/// Product → quantity mapping owned by an order.
///
/// Invariant: every stored line has `quantity >= 1`. The only mutation
/// methods are `increase_quantity` and `decrease_quantity`, and the latter
/// drops the line when it reaches zero, so a zero-quantity entry can never be
/// observed. Lines keep first-insertion order; a product removed down to zero
/// and added again goes to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    lines: Vec<OrderLine>,
}

impl Basket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity of `product_id`; 0 when the product is not in the basket.
    pub fn quantity(&self, product_id: ProductId) -> u32 {
        self.position(product_id)
            .map(|idx| self.lines[idx].quantity)
            .unwrap_or(0)
    }

    /// Add one unit. Returns the new quantity, which stays at `u32::MAX` once
    /// reached; the order rejects adds at that limit.
    pub fn increase_quantity(&mut self, product_id: ProductId) -> u32 {
        match self.position(product_id) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.quantity = line.quantity.saturating_add(1);
                line.quantity
            }
            None => {
                self.lines.push(OrderLine {
                    product_id,
                    quantity: 1,
                });
                1
            }
        }
    }

    /// Remove one unit, deleting the line when it hits zero. Returns the new
    /// quantity. Decreasing an absent product is a no-op returning 0.
    pub fn decrease_quantity(&mut self, product_id: ProductId) -> u32 {
        let Some(idx) = self.position(product_id) else {
            return 0;
        };

        let remaining = self.lines[idx].quantity.saturating_sub(1);
        if remaining == 0 {
            self.lines.remove(idx);
        } else {
            self.lines[idx].quantity = remaining;
        }
        remaining
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Owned snapshot of the lines, e.g. for an `OrderSubmitted` payload.
    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.lines.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    #[cfg(test)]
    pub(crate) fn with_line(product_id: ProductId, quantity: u32) -> Self {
        Self {
            lines: vec![OrderLine {
                product_id,
                quantity,
            }],
        }
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.lines.iter().position(|l| l.product_id == product_id)
    }
}
