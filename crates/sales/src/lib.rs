//! Sales orders domain module.
//!
//! Orders as placed by branch staff, their payment/summary data and the transfer
//! information that decides how an order's revenue is attributed across branches.
//! Deterministic domain logic only (no IO, no storage).

pub mod events;
pub mod order;
pub mod transfer;

pub use events::OrderEvent;
pub use order::{
    Order, OrderDraft, OrderLine, OrderStatus, OrderSummary, Orderer, Payment, PaymentStatus,
};
pub use transfer::{AmountSplit, RevenueShares, TransferInfo, TransferStatus, split_amount};
