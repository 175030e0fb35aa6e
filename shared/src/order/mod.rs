//! Ordering domain logic
//!
//! - `money`: tip/tax/total calculation
//! - `receipt`: receipt codes and transaction ids
//! - `cart`: pre-submission selection
//! - `flow`: chat state machine
//! - `chat`: session transcript

pub mod cart;
pub mod chat;
pub mod flow;
pub mod money;
pub mod receipt;

// Re-exports
pub use cart::{Cart, CartError, MAX_LINE_QUANTITY};
pub use chat::{ChatMessage, Sender, Transcript};
pub use flow::{
    ActionKind, Affordance, ChatAction, ChatStep, Checkout, FlowController, FlowError, FlowTable,
    PaymentPath, PaymentSettlement, TipChoice,
};
pub use money::{
    MAX_TIP_AMOUNT, MAX_TIP_PERCENT, MoneyError, OrderTotals, TAX_RATE, TIP_PRESETS,
    calculate_order_total, calculate_tip, round_money, subtotal_of, totals_with_tip_amount,
};
pub use receipt::{
    generate_receipt_code, generate_transaction_id, is_valid_receipt_code, RECEIPT_ALPHABET,
    RECEIPT_PREFIX,
};
