//! Order-book allocator
//!
//! Splits one hop's input across several sub-orders (strategies) of the
//! same order-book source. Amounts are integer wei and the split conserves
//! the requested input exactly: any rounding difference is a defect.
//!
//! Created: 2026-10-18
//!
//! Notes:
//!     - Weights come from an aggregate quote that spends the input where
//!       the marginal rate is best, so every used sub-order ends at the
//!       same marginal rate or depleted
//!     - Initial shares are proportional to the weights (floor), the
//!       rounding remainder goes to the last sub-order with weight
//!     - A share above a sub-order's depleting input is clamped and the
//!       excess carried forward; excess left at the end is pushed back
//!       onto earlier sub-orders with spare capacity

use alloy::primitives::U256;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use tracing::debug;

use crate::error::{AllocationError, QuoteError};
use crate::math::{decimal_to_wei, fraction_to_decimal, mul_div, RateCurve};
use crate::pool::Order;
use crate::types::Token;

/// One order of one strategy, as seen from a trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubOrder {
    pub strategy_id: U256,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubAllocation {
    pub strategy_id: U256,
    pub amount_in: U256,
    pub amount_out: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub subs: Vec<SubAllocation>,
}

impl Allocation {
    pub fn total_in(&self) -> U256 {
        self.subs.iter().fold(U256::ZERO, |acc, s| acc + s.amount_in)
    }

    pub fn total_out(&self) -> U256 {
        self.subs.iter().fold(U256::ZERO, |acc, s| acc + s.amount_out)
    }
}

/// Weight precision used to turn decimal shares into integer ratios
const WEIGHT_DECIMALS: u8 = 18;

/// Bisection steps over the common marginal rate
const RATE_SEARCH_STEPS: usize = 100;

/// Input a sub-order takes before its marginal rate falls to `rate`
fn depth_at(curve: &RateCurve, capacity: Decimal, rate: Decimal) -> Decimal {
    if rate >= curve.k {
        return Decimal::ZERO;
    }
    if rate <= Decimal::ZERO || curve.e <= Decimal::ZERO {
        return capacity;
    }
    curve
        .k
        .checked_div(rate)
        .and_then(|ratio| ratio.sqrt())
        .and_then(|root| (root - Decimal::ONE).checked_div(curve.e))
        .map_or(capacity, |x| x.min(capacity).max(Decimal::ZERO))
}

fn total(values: &[Decimal]) -> Decimal {
    values.iter().copied().sum()
}

#[derive(Debug, Clone, Copy)]
pub struct OrderBookAllocator {
    fee_ppm: u32,
}

impl OrderBookAllocator {
    pub fn new(fee_ppm: u32) -> Self {
        Self { fee_ppm }
    }

    /// Each sub-order's share of the input that depletes all of them
    pub fn depletion_weights(&self, orders: &[SubOrder]) -> Result<Vec<Decimal>, AllocationError> {
        if orders.is_empty() {
            return Err(AllocationError::NoSubOrders);
        }
        let capacities = orders
            .iter()
            .map(|s| s.order.capacity_in())
            .collect::<Result<Vec<_>, QuoteError>>()?;
        let total = capacities.iter().fold(U256::ZERO, |acc, c| acc + *c);
        if total.is_zero() {
            return Err(QuoteError::ZeroLiquidity.into());
        }
        Ok(capacities
            .iter()
            .map(|c| fraction_to_decimal(*c, total))
            .collect::<Result<Vec<_>, QuoteError>>()?)
    }

    /// Each sub-order's share of `total_in` from an aggregate quote.
    ///
    /// Finds the common marginal rate at which the orders together absorb
    /// `total_in`; orders priced below it get nothing, orders above it
    /// fill to that rate or deplete. Falls back to `depletion_weights`
    /// when the input depletes every order.
    pub fn quote_weights(
        &self,
        orders: &[SubOrder],
        total_in: U256,
        token_in: &Token,
        token_out: &Token,
    ) -> Result<Vec<Decimal>, AllocationError> {
        if orders.is_empty() {
            return Err(AllocationError::NoSubOrders);
        }
        let depths = orders
            .iter()
            .map(|s| -> Result<(RateCurve, Decimal), QuoteError> {
                let curve = s.order.curve(self.fee_ppm, token_in, token_out)?;
                Ok((curve, token_in.to_decimal(s.order.capacity_in()?)?))
            })
            .collect::<Result<Vec<_>, QuoteError>>()?;
        let wanted = token_in.to_decimal(total_in)?;
        let capacity: Decimal = depths.iter().map(|(_, c)| *c).sum();
        if wanted <= Decimal::ZERO || wanted >= capacity {
            return self.depletion_weights(orders);
        }

        let fills_at = |rate: Decimal| -> Vec<Decimal> {
            depths
                .iter()
                .map(|(curve, cap)| depth_at(curve, *cap, rate))
                .collect()
        };
        // total(fills_at(lo)) >= wanted > total(fills_at(hi))
        let mut lo = Decimal::ZERO;
        let mut hi = depths.iter().map(|(c, _)| c.k).fold(Decimal::ZERO, Decimal::max);
        for _ in 0..RATE_SEARCH_STEPS {
            let mid = (lo + hi) / dec!(2);
            if mid <= lo || mid >= hi {
                break;
            }
            if total(&fills_at(mid)) >= wanted {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let above = fills_at(hi);
        let below = fills_at(lo);
        let leftover = wanted - total(&above);
        let spread = total(&below) - total(&above);
        if spread <= Decimal::ZERO || leftover <= Decimal::ZERO {
            return self.depletion_weights(orders);
        }
        debug!("Common marginal rate ~{} across {} sub-orders", hi, orders.len());
        Ok(above
            .iter()
            .zip(&below)
            .map(|(a, b)| *a + leftover * (*b - *a) / spread)
            .collect())
    }

    /// Split `total_in` across `orders` and fill each share exactly
    pub fn allocate(
        &self,
        orders: &[SubOrder],
        total_in: U256,
        weights: &[Decimal],
    ) -> Result<Allocation, AllocationError> {
        if orders.is_empty() {
            return Err(AllocationError::NoSubOrders);
        }
        if weights.len() != orders.len() {
            return Err(AllocationError::WeightMismatch {
                weights: weights.len(),
                orders: orders.len(),
            });
        }

        let capacities = orders
            .iter()
            .map(|s| s.order.capacity_in())
            .collect::<Result<Vec<_>, QuoteError>>()?;
        let capacity = capacities.iter().fold(U256::ZERO, |acc, c| acc + *c);
        if total_in > capacity {
            return Err(AllocationError::InsufficientCapacity {
                requested: total_in,
                capacity,
            });
        }

        let shares = self.proportional_shares(total_in, weights)?;
        let amounts = Self::fit_to_capacity(&shares, &capacities, total_in)?;

        let mut subs = Vec::with_capacity(orders.len());
        for (sub, amount) in orders.iter().zip(amounts) {
            if amount.is_zero() {
                continue;
            }
            let fill = sub.order.fill(amount, self.fee_ppm)?;
            debug!(
                "Sub-order {}: in={} out={} depleted={}",
                sub.strategy_id, fill.amount_in, fill.amount_out, fill.depleted
            );
            subs.push(SubAllocation {
                strategy_id: sub.strategy_id,
                amount_in: fill.amount_in,
                amount_out: fill.amount_out,
            });
        }

        let allocation = Allocation { subs };
        let allocated = allocation.total_in();
        if allocated != total_in {
            return Err(AllocationError::ConservationViolated {
                requested: total_in,
                allocated,
            });
        }
        Ok(allocation)
    }

    /// Floor shares of `total_in`; the last weighted sub-order takes the remainder
    fn proportional_shares(&self, total_in: U256, weights: &[Decimal]) -> Result<Vec<U256>, AllocationError> {
        let sum: Decimal = weights.iter().copied().sum();
        let scaled = if sum <= Decimal::ZERO {
            vec![U256::from(1u8); weights.len()]
        } else {
            weights
                .iter()
                .map(|w| decimal_to_wei((*w).max(Decimal::ZERO) / sum, WEIGHT_DECIMALS))
                .collect::<Result<Vec<_>, QuoteError>>()?
        };
        let denom = scaled.iter().fold(U256::ZERO, |acc, w| acc + *w);
        if denom.is_zero() {
            return Err(QuoteError::DivisionByZero.into());
        }

        let last = scaled
            .iter()
            .rposition(|w| !w.is_zero())
            .unwrap_or(scaled.len() - 1);
        let mut shares = Vec::with_capacity(scaled.len());
        let mut assigned = U256::ZERO;
        for (i, w) in scaled.iter().enumerate() {
            let share = if i == last {
                total_in - assigned
            } else {
                mul_div(total_in, *w, denom)?
            };
            assigned += share;
            shares.push(share);
        }
        Ok(shares)
    }

    /// Clamp shares to capacities, carrying the excess forward and then
    /// back onto earlier sub-orders
    fn fit_to_capacity(shares: &[U256], capacities: &[U256], total_in: U256) -> Result<Vec<U256>, AllocationError> {
        let mut amounts = Vec::with_capacity(shares.len());
        let mut carry = U256::ZERO;
        for (share, cap) in shares.iter().zip(capacities) {
            let want = *share + carry;
            let take = want.min(*cap);
            carry = want - take;
            amounts.push(take);
        }

        for i in (0..amounts.len()).rev() {
            if carry.is_zero() {
                break;
            }
            let spare = capacities[i] - amounts[i];
            let extra = spare.min(carry);
            amounts[i] += extra;
            carry -= extra;
        }
        if !carry.is_zero() {
            let capacity = capacities.iter().fold(U256::ZERO, |acc, c| acc + *c);
            return Err(AllocationError::InsufficientCapacity {
                requested: total_in,
                capacity,
            });
        }
        Ok(amounts)
    }
}
