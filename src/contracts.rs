//! Centralized Contract Definitions
//!
//! Wire types of the arbitrage settlement contract, defined using
//! alloy's `sol!` macro. Settlement records are mapped onto `Route`
//! structs and ABI-encoded here.
//!
//! Created: 2026-02-01
//! Modified: 2026-10-18 - Settlement route, trade action and flashloan types

use alloy::sol;

// ── Settlement contract ───────────────────────────────────────────────

sol! {
    /// Amount taken from one order-book strategy
    #[derive(Debug, PartialEq, Eq)]
    struct TradeAction {
        uint256 strategyId;
        uint128 amount;
    }

    /// One hop as executed by the settlement contract.
    /// `sourceAmount == 0` spends the contract's whole balance of `sourceToken`.
    #[derive(Debug, PartialEq, Eq)]
    struct Route {
        uint32 platformId;
        address sourceToken;
        address targetToken;
        uint256 sourceAmount;
        uint256 minTargetAmount;
        uint256 deadline;
        address customAddress;
        uint256 customInt;
        bytes customData;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Flashloan {
        uint32 platformId;
        address[] sourceTokens;
        uint256[] sourceAmounts;
    }

    interface IArbitrageSettlement {
        function flashloanAndArbV2(Flashloan[] memory flashloans, Route[] memory routes) external;
    }
}
