//! Conversational ordering flow
//!
//! The chat walks a fixed state machine:
//!
//! ```text
//! welcome ──start/browse_menu──▶ menu ◀──browse_menu── cart_review
//!                                 │  ──view_cart──────────▶ │
//!                                 └──proceed_to_tip──▶ tip ◀┘
//!                                        tip ──select_tip/skip_tip──▶ payment_choice
//!                              payment_choice ──choose_payment──▶ done ──restart──▶ welcome
//! ```
//!
//! Transitions live in a [`FlowTable`] validated at construction. The
//! [`FlowController`] owns the session's cart and tip choice and refuses to
//! enter `tip`, `payment_choice` or `done` with an empty cart.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, LazyLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cart::{Cart, CartError};
use super::money::{
    MAX_TIP_AMOUNT, MAX_TIP_PERCENT, MoneyError, OrderTotals, calculate_tip, require_at_most,
    round_money, totals_with_tip_amount,
};
use super::receipt::generate_transaction_id;
use crate::error::{AppError, ErrorCode};
use crate::models::{
    MenuItem, OrderDraft, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, PaymentType,
};

// ============================================================================
// Steps, actions, affordances
// ============================================================================

/// Chat step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStep {
    Welcome,
    Menu,
    CartReview,
    Tip,
    PaymentChoice,
    Done,
}

impl ChatStep {
    pub const ALL: [ChatStep; 6] = [
        Self::Welcome,
        Self::Menu,
        Self::CartReview,
        Self::Tip,
        Self::PaymentChoice,
        Self::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Menu => "menu",
            Self::CartReview => "cart_review",
            Self::Tip => "tip",
            Self::PaymentChoice => "payment_choice",
            Self::Done => "done",
        }
    }

    /// Steps that may only be entered with a non-empty cart
    pub fn requires_items(&self) -> bool {
        matches!(self, Self::Tip | Self::PaymentChoice | Self::Done)
    }

    /// UI affordances eligible at this step
    pub fn affordances(&self) -> &'static [Affordance] {
        match self {
            Self::Welcome => &[],
            Self::Menu => &[Affordance::MenuGrid],
            Self::CartReview => &[Affordance::CartEditor],
            Self::Tip => &[Affordance::TipButtons],
            Self::PaymentChoice => &[Affordance::PaymentChoices],
            Self::Done => &[Affordance::Receipt],
        }
    }
}

impl fmt::Display for ChatStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interactive element a client may render for the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affordance {
    MenuGrid,
    CartEditor,
    TipButtons,
    PaymentChoices,
    Receipt,
}

/// Action discriminant, the key of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Start,
    BrowseMenu,
    ViewCart,
    AddItem,
    RemoveItem,
    AdjustQuantity,
    ProceedToTip,
    SelectTip,
    SkipTip,
    ChoosePayment,
    Restart,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::BrowseMenu => "browse_menu",
            Self::ViewCart => "view_cart",
            Self::AddItem => "add_item",
            Self::RemoveItem => "remove_item",
            Self::AdjustQuantity => "adjust_quantity",
            Self::ProceedToTip => "proceed_to_tip",
            Self::SelectTip => "select_tip",
            Self::SkipTip => "skip_tip",
            Self::ChoosePayment => "choose_payment",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer action with its arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatAction {
    Start,
    BrowseMenu,
    ViewCart,
    AddItem { menu_item_id: i64 },
    RemoveItem { menu_item_id: i64 },
    AdjustQuantity { menu_item_id: i64, delta: i32 },
    ProceedToTip,
    SelectTip { tip: TipChoice },
    SkipTip,
    ChoosePayment { path: PaymentPath },
    Restart,
}

impl ChatAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Start => ActionKind::Start,
            Self::BrowseMenu => ActionKind::BrowseMenu,
            Self::ViewCart => ActionKind::ViewCart,
            Self::AddItem { .. } => ActionKind::AddItem,
            Self::RemoveItem { .. } => ActionKind::RemoveItem,
            Self::AdjustQuantity { .. } => ActionKind::AdjustQuantity,
            Self::ProceedToTip => ActionKind::ProceedToTip,
            Self::SelectTip { .. } => ActionKind::SelectTip,
            Self::SkipTip => ActionKind::SkipTip,
            Self::ChoosePayment { .. } => ActionKind::ChoosePayment,
            Self::Restart => ActionKind::Restart,
        }
    }
}

// ============================================================================
// Tip and payment choices
// ============================================================================

/// Tip selection; one field, so picking a percentage clears a custom amount
/// and vice versa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TipChoice {
    #[default]
    None,
    Percent(Decimal),
    Amount(Decimal),
}

impl TipChoice {
    /// Tip amount for the given subtotal
    pub fn amount_for(&self, subtotal: Decimal) -> Result<Decimal, MoneyError> {
        self.validate()?;
        match *self {
            Self::None => Ok(Decimal::ZERO),
            Self::Percent(percent) => calculate_tip(subtotal, percent),
            Self::Amount(amount) => Ok(round_money(amount)),
        }
    }

    /// Non-negative and at most [`MAX_TIP_PERCENT`] / [`MAX_TIP_AMOUNT`]
    fn validate(&self) -> Result<(), MoneyError> {
        let (value, max, field) = match *self {
            Self::None => return Ok(()),
            Self::Percent(p) => (p, MAX_TIP_PERCENT, "tip_percent"),
            Self::Amount(a) => (a, MAX_TIP_AMOUNT, "tip_amount"),
        };
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::InvalidAmount { field, value });
        }
        require_at_most(value, max, field)
    }
}

/// Settlement path picked at the end of the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPath {
    /// Settle at the counter; staff record the payment later
    PayLater,
    /// Simulated in-chat card payment
    PayNow,
}

/// Payment fields an order starts with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettlement {
    pub payment_method: Option<PaymentMethod>,
    pub payment_type: PaymentType,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
}

impl PaymentPath {
    pub fn settlement(&self) -> PaymentSettlement {
        match self {
            Self::PayLater => PaymentSettlement {
                payment_method: None,
                payment_type: PaymentType::DirectCash,
                payment_status: PaymentStatus::Unpaid,
                transaction_id: None,
            },
            Self::PayNow => PaymentSettlement {
                payment_method: Some(PaymentMethod::Card),
                payment_type: PaymentType::ChatbotPayment,
                payment_status: PaymentStatus::Paid,
                transaction_id: Some(generate_transaction_id()),
            },
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("action '{action}' is not allowed at step '{from}'")]
    IllegalTransition { from: ChatStep, action: ActionKind },

    #[error("cart is empty, cannot enter '{target}'")]
    EmptyCart { target: ChatStep },

    #[error("invalid flow table: {0}")]
    InvalidTable(String),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Cart(#[from] CartError),
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::IllegalTransition { from, action } => {
                AppError::with_message(ErrorCode::IllegalTransition, err.to_string())
                    .with_detail("step", from.as_str())
                    .with_detail("action", action.as_str())
            }
            FlowError::EmptyCart { .. } => {
                AppError::with_message(ErrorCode::OrderEmpty, err.to_string())
            }
            FlowError::InvalidTable(msg) => {
                AppError::with_message(ErrorCode::InvalidFlowTable, msg)
            }
            FlowError::Money(e) => e.into(),
            FlowError::Cart(e) => e.into(),
        }
    }
}

// ============================================================================
// Transition table
// ============================================================================

/// The default chat transitions
const STANDARD_EDGES: &[(ChatStep, ActionKind, ChatStep)] = {
    use ActionKind as A;
    use ChatStep as S;
    &[
        (S::Welcome, A::Start, S::Menu),
        (S::Welcome, A::BrowseMenu, S::Menu),
        (S::Menu, A::AddItem, S::Menu),
        (S::Menu, A::RemoveItem, S::Menu),
        (S::Menu, A::AdjustQuantity, S::Menu),
        (S::Menu, A::ViewCart, S::CartReview),
        (S::Menu, A::ProceedToTip, S::Tip),
        (S::CartReview, A::AddItem, S::CartReview),
        (S::CartReview, A::RemoveItem, S::CartReview),
        (S::CartReview, A::AdjustQuantity, S::CartReview),
        (S::CartReview, A::BrowseMenu, S::Menu),
        (S::CartReview, A::ProceedToTip, S::Tip),
        (S::Tip, A::SelectTip, S::PaymentChoice),
        (S::Tip, A::SkipTip, S::PaymentChoice),
        (S::Tip, A::ViewCart, S::CartReview),
        (S::PaymentChoice, A::SelectTip, S::PaymentChoice),
        (S::PaymentChoice, A::ViewCart, S::CartReview),
        (S::PaymentChoice, A::ChoosePayment, S::Done),
        (S::Done, A::Restart, S::Welcome),
    ]
};

static STANDARD_TABLE: LazyLock<Arc<FlowTable>> = LazyLock::new(|| {
    Arc::new(
        FlowTable::new(STANDARD_EDGES.iter().copied())
            .expect("built-in chat transitions form a valid table"),
    )
});

/// Validated `(step, action) → step` map
#[derive(Debug, Clone)]
pub struct FlowTable {
    edges: HashMap<(ChatStep, ActionKind), ChatStep>,
}

impl FlowTable {
    /// Build and validate a table.
    ///
    /// Rejects duplicate keys, steps unreachable from `welcome`, steps
    /// without an outgoing edge, and a missing `done --restart--> welcome`.
    pub fn new(
        edges: impl IntoIterator<Item = (ChatStep, ActionKind, ChatStep)>,
    ) -> Result<Self, FlowError> {
        let mut map = HashMap::new();
        for (from, action, to) in edges {
            if map.insert((from, action), to).is_some() {
                return Err(FlowError::InvalidTable(format!(
                    "duplicate edge {from} --{action}-->"
                )));
            }
        }

        if map.get(&(ChatStep::Done, ActionKind::Restart)) != Some(&ChatStep::Welcome) {
            return Err(FlowError::InvalidTable(
                "missing done --restart--> welcome".to_string(),
            ));
        }

        let mut reached = HashSet::from([ChatStep::Welcome]);
        let mut queue = VecDeque::from([ChatStep::Welcome]);
        while let Some(step) = queue.pop_front() {
            for (&(from, _), &to) in &map {
                if from == step && reached.insert(to) {
                    queue.push_back(to);
                }
            }
        }

        for step in ChatStep::ALL {
            if !reached.contains(&step) {
                return Err(FlowError::InvalidTable(format!(
                    "step '{step}' is unreachable from welcome"
                )));
            }
            if !map.keys().any(|(from, _)| *from == step) {
                return Err(FlowError::InvalidTable(format!(
                    "step '{step}' has no outgoing transition"
                )));
            }
        }

        Ok(Self { edges: map })
    }

    /// The built-in chat transitions
    pub fn standard() -> Arc<FlowTable> {
        STANDARD_TABLE.clone()
    }

    /// Target step for `action` at `from`
    pub fn next(&self, from: ChatStep, action: ActionKind) -> Result<ChatStep, FlowError> {
        self.edges
            .get(&(from, action))
            .copied()
            .ok_or(FlowError::IllegalTransition { from, action })
    }

    /// Actions with an edge out of `step`, in declaration order of [`ActionKind`]
    pub fn actions_from(&self, step: ChatStep) -> Vec<ActionKind> {
        let mut actions: Vec<_> = self
            .edges
            .keys()
            .filter(|(from, _)| *from == step)
            .map(|(_, action)| *action)
            .collect();
        actions.sort();
        actions
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Everything needed to persist an order, computed without side effects
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    pub items: Vec<OrderItem>,
    pub tip: TipChoice,
    pub totals: OrderTotals,
    pub settlement: PaymentSettlement,
}

impl Checkout {
    /// Build the insert payload; the stored total is `subtotal + tip`
    pub fn into_draft(self, receipt_id: String, table_number: i32, now: i64) -> OrderDraft {
        OrderDraft {
            receipt_id,
            table_number,
            items: self.items,
            subtotal: self.totals.subtotal,
            tip_amount: self.totals.tip_amount,
            total: self.totals.pre_tax_total,
            status: OrderStatus::Pending,
            payment_method: self.settlement.payment_method,
            payment_status: self.settlement.payment_status,
            payment_type: Some(self.settlement.payment_type),
            transaction_id: self.settlement.transaction_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-session flow state: current step, cart and tip choice
#[derive(Debug, Clone)]
pub struct FlowController {
    table: Arc<FlowTable>,
    step: ChatStep,
    cart: Cart,
    tip: TipChoice,
}

impl Default for FlowController {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowController {
    pub fn new() -> Self {
        Self::with_table(FlowTable::standard())
    }

    pub fn with_table(table: Arc<FlowTable>) -> Self {
        Self {
            table,
            step: ChatStep::Welcome,
            cart: Cart::new(),
            tip: TipChoice::None,
        }
    }

    pub fn step(&self) -> ChatStep {
        self.step
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn tip(&self) -> TipChoice {
        self.tip
    }

    pub fn affordances(&self) -> &'static [Affordance] {
        self.step.affordances()
    }

    /// Target step for `action`, applying the non-empty-cart guard
    pub fn peek(&self, action: ActionKind) -> Result<ChatStep, FlowError> {
        let target = self.table.next(self.step, action)?;
        if target.requires_items() && self.cart.is_empty() {
            return Err(FlowError::EmptyCart { target });
        }
        Ok(target)
    }

    /// Actions that would currently succeed
    pub fn available_actions(&self) -> Vec<ActionKind> {
        self.table
            .actions_from(self.step)
            .into_iter()
            .filter(|a| self.peek(*a).is_ok())
            .collect()
    }

    fn advance(&mut self, action: ActionKind) -> Result<ChatStep, FlowError> {
        let target = self.peek(action)?;
        self.step = target;
        Ok(target)
    }

    pub fn start(&mut self) -> Result<ChatStep, FlowError> {
        self.advance(ActionKind::Start)
    }

    pub fn browse_menu(&mut self) -> Result<ChatStep, FlowError> {
        self.advance(ActionKind::BrowseMenu)
    }

    pub fn view_cart(&mut self) -> Result<ChatStep, FlowError> {
        self.advance(ActionKind::ViewCart)
    }

    pub fn add_item(&mut self, item: &MenuItem) -> Result<ChatStep, FlowError> {
        let target = self.peek(ActionKind::AddItem)?;
        self.cart.add(item)?;
        self.step = target;
        Ok(target)
    }

    pub fn remove_item(&mut self, menu_item_id: i64) -> Result<ChatStep, FlowError> {
        let target = self.peek(ActionKind::RemoveItem)?;
        self.cart.remove(menu_item_id);
        self.step = target;
        Ok(target)
    }

    pub fn adjust_quantity(&mut self, menu_item_id: i64, delta: i32) -> Result<ChatStep, FlowError> {
        let target = self.peek(ActionKind::AdjustQuantity)?;
        self.cart.adjust_quantity(menu_item_id, delta)?;
        self.step = target;
        Ok(target)
    }

    pub fn proceed_to_tip(&mut self) -> Result<ChatStep, FlowError> {
        self.advance(ActionKind::ProceedToTip)
    }

    pub fn select_tip(&mut self, choice: TipChoice) -> Result<ChatStep, FlowError> {
        choice.validate()?;
        let target = self.peek(ActionKind::SelectTip)?;
        self.tip = choice;
        self.step = target;
        Ok(target)
    }

    pub fn skip_tip(&mut self) -> Result<ChatStep, FlowError> {
        let target = self.peek(ActionKind::SkipTip)?;
        self.tip = TipChoice::None;
        self.step = target;
        Ok(target)
    }

    /// Money breakdown for the current cart and tip
    pub fn totals(&self) -> Result<OrderTotals, MoneyError> {
        let subtotal = self.cart.total_price()?;
        totals_with_tip_amount(subtotal, self.tip.amount_for(subtotal)?)
    }

    /// Compute the order payload for `path` without changing state.
    ///
    /// Call [`complete_checkout`](Self::complete_checkout) once the order
    /// is persisted; on failure the session simply stays where it is.
    pub fn prepare_checkout(&self, path: PaymentPath) -> Result<Checkout, FlowError> {
        self.peek(ActionKind::ChoosePayment)?;
        Ok(Checkout {
            items: self.cart.lines().to_vec(),
            tip: self.tip,
            totals: self.totals()?,
            settlement: path.settlement(),
        })
    }

    pub fn complete_checkout(&mut self) -> Result<ChatStep, FlowError> {
        self.advance(ActionKind::ChoosePayment)
    }

    /// Back to welcome with an empty cart and no tip
    pub fn restart(&mut self) -> Result<ChatStep, FlowError> {
        let target = self.advance(ActionKind::Restart)?;
        self.cart.clear();
        self.tip = TipChoice::None;
        Ok(target)
    }
}
