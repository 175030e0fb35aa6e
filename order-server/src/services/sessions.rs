//! 顾客聊天会话
//!
//! 每个设备一个会话，保存流程状态、购物车和聊天记录。会话只存在内存中，
//! 结账之前不会写入存储；空闲超过 TTL 由后台任务回收。
//!
//! # 锁
//!
//! 每个会话由一把 `parking_lot::Mutex` 串行化，锁永远不跨 `.await` 持有。
//! 提交订单时先在锁内计算结账数据并置 `submitting`，释放锁后写入存储，
//! 再重新加锁完成状态迁移。`submitting` 期间其他流程动作一律拒绝。

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{MenuItem, Order, OrderItem};
use shared::order::{
    ActionKind, Affordance, ChatAction, ChatMessage, ChatStep, FlowController, OrderTotals,
    PaymentPath, Sender, TIP_PRESETS, TipChoice, Transcript, totals_with_tip_amount,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::assistant::{AssistantPrompt, ChatAssistant};
use super::orders::OrderService;
use crate::db::Store;
use crate::message::LiveCollection;
use crate::utils::validation::{MAX_MESSAGE_LEN, validate_required_text};
use crate::utils::{AppError, AppResult, ErrorCode};

/// 助手不可用时的兜底回复
pub const FALLBACK_REPLY: &str =
    "I'm here to help with your order. Use the buttons below to keep going.";

/// 回收任务最长检查间隔
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// 传给助手的历史消息条数
const CONTEXT_MESSAGES: usize = 6;

/// 一个顾客会话
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    table_number: i32,
    flow: FlowController,
    transcript: Transcript,
    last_order: Option<Order>,
    submitting: bool,
    last_active: Instant,
}

impl ChatSession {
    fn new(id: Uuid, table_number: i32) -> Self {
        let mut session = Self {
            id,
            table_number,
            flow: FlowController::new(),
            transcript: Transcript::new(),
            last_order: None,
            submitting: false,
            last_active: Instant::now(),
        };
        session.prompt();
        session
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// 为当前步骤追加一条机器人提示
    fn prompt(&mut self) {
        let step = self.flow.step();
        let text = match step {
            ChatStep::Welcome => format!(
                "Welcome to table {}! Tap start whenever you're ready to order.",
                self.table_number
            ),
            ChatStep::Menu => "Here's our menu. Tap an item to add it to your cart.".to_string(),
            ChatStep::CartReview => {
                let cart = self.flow.cart();
                match (cart.item_count(), cart.total_price()) {
                    (0, _) => {
                        "Your cart is empty. Head back to the menu to add something.".to_string()
                    }
                    (n, Ok(total)) => {
                        format!("You have {n} item(s) for {total:.2}. Adjust quantities or continue.")
                    }
                    (n, Err(_)) => format!("You have {n} item(s). Adjust quantities or continue."),
                }
            }
            ChatStep::Tip => {
                let presets: Vec<String> = TIP_PRESETS.iter().map(|p| format!("{p}%")).collect();
                format!(
                    "Would you like to add a tip? Pick {}, enter an amount, or skip.",
                    presets.join(", ")
                )
            }
            ChatStep::PaymentChoice => match self.flow.totals() {
                Ok(totals) => format!(
                    "Your total is {:.2} including tax. Pay now, or pay later at the counter?",
                    totals.total
                ),
                Err(_) => "Pay now, or pay later at the counter?".to_string(),
            },
            ChatStep::Done => match &self.last_order {
                Some(order) => format!(
                    "Thank you! Your order {} has been sent to the kitchen.",
                    order.receipt_id
                ),
                None => "Thank you!".to_string(),
            },
        };
        let affordance = step.affordances().first().copied();
        self.transcript.push(Sender::Bot, text, affordance);
    }

    fn apply_local(&mut self, action: ChatAction, item: Option<&MenuItem>) -> AppResult<()> {
        if self.submitting {
            return Err(order_in_flight());
        }
        let before = self.flow.step();
        match action {
            ChatAction::Start => {
                self.flow.start()?;
            }
            ChatAction::BrowseMenu => {
                self.flow.browse_menu()?;
            }
            ChatAction::ViewCart => {
                self.flow.view_cart()?;
            }
            ChatAction::AddItem { .. } => {
                let item = item.ok_or_else(|| AppError::internal("menu item not resolved"))?;
                self.flow.add_item(item)?;
                let qty = self.flow.cart().get(item.id).map_or(0, |l| l.quantity);
                self.transcript
                    .push(Sender::Bot, format!("Added {} (x{qty}).", item.name), None);
            }
            ChatAction::RemoveItem { menu_item_id } => {
                self.flow.remove_item(menu_item_id)?;
            }
            ChatAction::AdjustQuantity { menu_item_id, delta } => {
                self.flow.adjust_quantity(menu_item_id, delta)?;
            }
            ChatAction::ProceedToTip => {
                self.flow.proceed_to_tip()?;
            }
            ChatAction::SelectTip { tip } => {
                self.flow.select_tip(tip)?;
            }
            ChatAction::SkipTip => {
                self.flow.skip_tip()?;
            }
            ChatAction::Restart => {
                self.flow.restart()?;
                self.last_order = None;
            }
            ChatAction::ChoosePayment { .. } => {
                return Err(AppError::internal("payment is handled by the session service"));
            }
        }
        if self.flow.step() != before {
            self.prompt();
        }
        Ok(())
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            table_number: self.table_number,
            step: self.flow.step(),
            affordances: self.flow.affordances().to_vec(),
            available_actions: self.flow.available_actions(),
            cart: self.flow.cart().lines().to_vec(),
            item_count: self.flow.cart().item_count(),
            tip: self.flow.tip(),
            totals: self.flow.totals().ok(),
            messages: self.transcript.messages().to_vec(),
            receipt: self.last_order.as_ref().map(ReceiptView::from_order),
        }
    }
}

/// 会话快照 (API 返回)
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub table_number: i32,
    pub step: ChatStep,
    pub affordances: Vec<Affordance>,
    pub available_actions: Vec<ActionKind>,
    pub cart: Vec<OrderItem>,
    pub item_count: u32,
    pub tip: TipChoice,
    pub totals: Option<OrderTotals>,
    pub messages: Vec<ChatMessage>,
    pub receipt: Option<ReceiptView>,
}

/// 小票：订单本身加上含税合计
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptView {
    pub order: Order,
    pub tax_amount: Decimal,
    pub total_with_tax: Decimal,
}

impl ReceiptView {
    pub fn from_order(order: &Order) -> Self {
        let (tax_amount, total_with_tax) =
            match totals_with_tip_amount(order.subtotal, order.tip_amount) {
                Ok(t) => (t.tax_amount, t.total),
                Err(_) => (Decimal::ZERO, order.total),
            };
        Self {
            order: order.clone(),
            tax_amount,
            total_with_tax,
        }
    }
}

fn order_in_flight() -> AppError {
    AppError::with_message(ErrorCode::InvalidRequest, "Order is already being submitted")
}

fn session_not_found(id: Uuid) -> AppError {
    AppError::with_message(ErrorCode::SessionNotFound, format!("Session {id} not found"))
}

/// 会话注册表
pub struct SessionService {
    sessions: DashMap<Uuid, Arc<Mutex<ChatSession>>>,
    ttl: Duration,
    store: Arc<dyn Store>,
    orders: OrderService,
    assistant: Option<Arc<dyn ChatAssistant>>,
    menu: Arc<LiveCollection<MenuItem>>,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("sessions", &self.sessions.len())
            .field("ttl", &self.ttl)
            .field("assistant", &self.assistant.is_some())
            .finish()
    }
}

impl SessionService {
    pub fn new(
        store: Arc<dyn Store>,
        orders: OrderService,
        assistant: Option<Arc<dyn ChatAssistant>>,
        menu: Arc<LiveCollection<MenuItem>>,
        ttl: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            store,
            orders,
            assistant,
            menu,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn session(&self, id: Uuid) -> AppResult<Arc<Mutex<ChatSession>>> {
        self.sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| session_not_found(id))
    }

    /// 扫码进入：桌台必须存在
    pub async fn create(&self, table_number: i32) -> AppResult<SessionView> {
        if table_number <= 0 {
            return Err(AppError::validation("table_number must be positive")
                .with_detail("field", "table_number"));
        }
        if self.store.find_table_by_number(table_number).await?.is_none() {
            return Err(AppError::with_message(
                ErrorCode::TableNotFound,
                format!("Table {table_number} does not exist"),
            ));
        }

        let id = Uuid::new_v4();
        let session = ChatSession::new(id, table_number);
        let view = session.view();
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        tracing::info!(session_id = %id, table = table_number, "Chat session started");
        Ok(view)
    }

    pub fn get(&self, id: Uuid) -> AppResult<SessionView> {
        let session = self.session(id)?;
        let view = session.lock().view();
        Ok(view)
    }

    /// 放弃会话，购物车直接丢弃
    pub fn delete(&self, id: Uuid) -> AppResult<()> {
        self.sessions
            .remove(&id)
            .map(|_| tracing::debug!(session_id = %id, "Chat session abandoned"))
            .ok_or_else(|| session_not_found(id))
    }

    /// 执行一个流程动作
    pub async fn apply(&self, id: Uuid, action: ChatAction) -> AppResult<SessionView> {
        let session = self.session(id)?;

        match action {
            ChatAction::ChoosePayment { path } => self.checkout(&session, path).await,
            ChatAction::AddItem { menu_item_id } => {
                let item = self.available_item(menu_item_id).await?;
                let mut guard = session.lock();
                guard.touch();
                guard.apply_local(action, Some(&item))?;
                Ok(guard.view())
            }
            other => {
                let mut guard = session.lock();
                guard.touch();
                guard.apply_local(other, None)?;
                Ok(guard.view())
            }
        }
    }

    async fn available_item(&self, id: i64) -> AppResult<MenuItem> {
        let item = self.store.find_menu_item(id).await?.ok_or_else(|| {
            AppError::with_message(ErrorCode::MenuItemNotFound, format!("Menu item {id} not found"))
        })?;
        if !item.available {
            return Err(AppError::with_message(
                ErrorCode::MenuItemUnavailable,
                format!("{} is not available right now", item.name),
            ));
        }
        Ok(item)
    }

    async fn checkout(&self, session: &Mutex<ChatSession>, path: PaymentPath) -> AppResult<SessionView> {
        let (checkout, table_number, session_id) = {
            let mut guard = session.lock();
            guard.touch();
            if guard.submitting {
                return Err(order_in_flight());
            }
            let checkout = guard.flow.prepare_checkout(path)?;
            guard.submitting = true;
            (checkout, guard.table_number, guard.id)
        };

        let result = self.orders.submit(checkout, table_number).await;

        let mut guard = session.lock();
        guard.submitting = false;
        match result {
            Ok(order) => {
                guard.last_order = Some(order);
                guard.flow.complete_checkout()?;
                guard.prompt();
                Ok(guard.view())
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Checkout failed");
                guard.transcript.push(
                    Sender::Bot,
                    "Sorry, we couldn't place your order. Please try again.",
                    Some(Affordance::PaymentChoices),
                );
                Err(e)
            }
        }
    }

    /// 自由文本：交给 AI 助手，失败用固定文案回复
    pub async fn post_message(&self, id: Uuid, text: &str) -> AppResult<SessionView> {
        validate_required_text(text, "text", MAX_MESSAGE_LEN)?;
        let session = self.session(id)?;

        let (step, context) = {
            let mut guard = session.lock();
            guard.touch();
            let context = guard.transcript.recent_context(CONTEXT_MESSAGES);
            guard.transcript.push(Sender::Customer, text.trim(), None);
            (guard.flow.step(), context)
        };

        let reply = match &self.assistant {
            Some(assistant) => {
                let prompt = AssistantPrompt {
                    utterance: text.trim().to_string(),
                    step: Some(step),
                    context,
                    menu_names: self
                        .menu
                        .snapshot()
                        .iter()
                        .filter(|i| i.available)
                        .map(|i| i.name.clone())
                        .collect(),
                };
                assistant.reply(&prompt).await
            }
            None => None,
        };

        let mut guard = session.lock();
        match reply {
            Some(text) => guard.transcript.push(Sender::Assistant, text, None),
            None => guard.transcript.push(Sender::Bot, FALLBACK_REPLY, None),
        };
        Ok(guard.view())
    }

    /// 回收空闲会话，提交中的会话保留
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions.retain(|_, session| {
            let guard = session.lock();
            guard.submitting || guard.last_active.elapsed() < ttl
        });
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.sessions.len(), "Idle chat sessions evicted");
        }
        evicted
    }

    /// 回收循环，直到 `shutdown` 被取消
    pub async fn run_eviction(self: Arc<Self>, shutdown: CancellationToken) {
        let period = (self.ttl / 4).clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Session eviction task stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.evict_idle();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, OrderFilter, RepoResult};
    use crate::message::ChangeFeed;
    use crate::services::notify::LogNotifier;
    use async_trait::async_trait;
    use shared::models::{
        MenuItemCreate, MenuItemUpdate, OrderDraft, OrderStatus, PaymentStatus, RestaurantTable,
    };
    use shared::order::MAX_LINE_QUANTITY;
    use tokio::sync::Notify;

    struct EchoAssistant;

    #[async_trait]
    impl ChatAssistant for EchoAssistant {
        async fn reply(&self, prompt: &AssistantPrompt) -> Option<String> {
            Some(format!("echo: {} ({})", prompt.utterance, prompt.menu_names.join("/")))
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    /// 订单写入前等待放行的存储
    struct GatedStore {
        inner: Arc<MemoryStore>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Store for GatedStore {
        async fn list_menu_items(&self) -> RepoResult<Vec<MenuItem>> {
            self.inner.list_menu_items().await
        }
        async fn find_menu_item(&self, id: i64) -> RepoResult<Option<MenuItem>> {
            self.inner.find_menu_item(id).await
        }
        async fn insert_menu_item(&self, data: MenuItemCreate) -> RepoResult<MenuItem> {
            self.inner.insert_menu_item(data).await
        }
        async fn update_menu_item(&self, id: i64, data: MenuItemUpdate) -> RepoResult<MenuItem> {
            self.inner.update_menu_item(id, data).await
        }
        async fn delete_menu_item(&self, id: i64) -> RepoResult<bool> {
            self.inner.delete_menu_item(id).await
        }
        async fn list_tables(&self) -> RepoResult<Vec<RestaurantTable>> {
            self.inner.list_tables().await
        }
        async fn find_table(&self, id: i64) -> RepoResult<Option<RestaurantTable>> {
            self.inner.find_table(id).await
        }
        async fn find_table_by_number(&self, table_number: i32) -> RepoResult<Option<RestaurantTable>> {
            self.inner.find_table_by_number(table_number).await
        }
        async fn insert_table(&self, table_number: i32) -> RepoResult<RestaurantTable> {
            self.inner.insert_table(table_number).await
        }
        async fn update_table(&self, table: &RestaurantTable) -> RepoResult<RestaurantTable> {
            self.inner.update_table(table).await
        }
        async fn delete_table(&self, id: i64) -> RepoResult<bool> {
            self.inner.delete_table(id).await
        }
        async fn list_orders(&self, filter: OrderFilter) -> RepoResult<Vec<Order>> {
            self.inner.list_orders(filter).await
        }
        async fn find_order(&self, id: i64) -> RepoResult<Option<Order>> {
            self.inner.find_order(id).await
        }
        async fn find_order_by_receipt(&self, receipt_id: &str) -> RepoResult<Option<Order>> {
            self.inner.find_order_by_receipt(receipt_id).await
        }
        async fn insert_order(&self, draft: OrderDraft) -> RepoResult<Order> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.insert_order(draft).await
        }
        async fn update_order(&self, order: &Order) -> RepoResult<Order> {
            self.inner.update_order(order).await
        }
        async fn ping(&self) -> RepoResult<()> {
            self.inner.ping().await
        }
    }

    /// 记录收到的上下文
    #[derive(Default)]
    struct RecordingAssistant {
        contexts: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl ChatAssistant for RecordingAssistant {
        async fn reply(&self, prompt: &AssistantPrompt) -> Option<String> {
            self.contexts.lock().push(prompt.context.clone());
            Some("Happy to help.".to_string())
        }
    }

    /// 桌台 4 加一道 Mojito，返回菜品 id
    async fn seed(store: &MemoryStore) -> i64 {
        store.insert_table(4).await.unwrap();
        store
            .insert_menu_item(MenuItemCreate {
                name: "Mojito".into(),
                price: dec("9.50"),
                category: "Drinks".into(),
                available: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn service_over(
        store: Arc<dyn Store>,
        assistant: Option<Arc<dyn ChatAssistant>>,
        ttl: Duration,
    ) -> SessionService {
        let fetch_store = store.clone();
        let menu = Arc::new(LiveCollection::new("menu", move || {
            let store = fetch_store.clone();
            Box::pin(async move { store.list_menu_items().await })
        }));
        menu.refresh().await.unwrap();

        let orders = OrderService::new(store.clone(), Arc::new(LogNotifier));
        SessionService::new(store, orders, assistant, menu, ttl)
    }

    async fn setup(
        assistant: Option<Arc<dyn ChatAssistant>>,
        ttl: Duration,
    ) -> (Arc<MemoryStore>, SessionService, i64) {
        let store = Arc::new(MemoryStore::new(ChangeFeed::new()));
        let mojito = seed(&store).await;
        let service = service_over(store.clone(), assistant, ttl).await;
        (store, service, mojito)
    }

    async fn at_payment_choice(service: &SessionService, mojito: i64) -> Uuid {
        let id = service.create(4).await.unwrap().id;
        service.apply(id, ChatAction::Start).await.unwrap();
        service.apply(id, ChatAction::AddItem { menu_item_id: mojito }).await.unwrap();
        service.apply(id, ChatAction::ProceedToTip).await.unwrap();
        service.apply(id, ChatAction::SkipTip).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_full_pay_later_flow() {
        let (store, service, mojito) = setup(None, Duration::from_secs(60)).await;
        let view = service.create(4).await.unwrap();
        assert_eq!(view.step, ChatStep::Welcome);
        assert_eq!(view.messages.len(), 1);

        let id = view.id;
        service.apply(id, ChatAction::Start).await.unwrap();
        service.apply(id, ChatAction::AddItem { menu_item_id: mojito }).await.unwrap();
        let view = service.apply(id, ChatAction::AddItem { menu_item_id: mojito }).await.unwrap();
        assert_eq!(view.cart.len(), 1);
        assert_eq!(view.cart[0].quantity, 2);

        service.apply(id, ChatAction::ProceedToTip).await.unwrap();
        service.apply(id, ChatAction::SkipTip).await.unwrap();
        let view = service
            .apply(id, ChatAction::ChoosePayment { path: PaymentPath::PayLater })
            .await
            .unwrap();

        assert_eq!(view.step, ChatStep::Done);
        let receipt = view.receipt.unwrap();
        assert_eq!(receipt.order.total, dec("19.00"));
        assert_eq!(receipt.total_with_tax, dec("19.57"));
        assert_eq!(receipt.order.status, OrderStatus::Pending);
        assert_eq!(receipt.order.payment_status, PaymentStatus::Unpaid);

        let stored = store.find_order_by_receipt(&receipt.order.receipt_id).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_restart_after_done_clears_cart() {
        let (_, service, mojito) = setup(None, Duration::from_secs(60)).await;
        let id = service.create(4).await.unwrap().id;
        service.apply(id, ChatAction::Start).await.unwrap();
        service.apply(id, ChatAction::AddItem { menu_item_id: mojito }).await.unwrap();
        service.apply(id, ChatAction::ProceedToTip).await.unwrap();
        service
            .apply(id, ChatAction::SelectTip { tip: TipChoice::Percent(dec("20")) })
            .await
            .unwrap();
        service
            .apply(id, ChatAction::ChoosePayment { path: PaymentPath::PayNow })
            .await
            .unwrap();

        let view = service.apply(id, ChatAction::Restart).await.unwrap();
        assert_eq!(view.step, ChatStep::Welcome);
        assert!(view.cart.is_empty());
        assert_eq!(view.tip, TipChoice::None);
        assert!(view.receipt.is_none());
    }

    #[tokio::test]
    async fn test_illegal_action_and_empty_cart() {
        let (_, service, _) = setup(None, Duration::from_secs(60)).await;
        let id = service.create(4).await.unwrap().id;

        let err = service.apply(id, ChatAction::SkipTip).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::IllegalTransition);

        service.apply(id, ChatAction::Start).await.unwrap();
        let err = service.apply(id, ChatAction::ProceedToTip).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderEmpty);
    }

    #[tokio::test]
    async fn test_unavailable_item_rejected() {
        let (store, service, mojito) = setup(None, Duration::from_secs(60)).await;
        store
            .update_menu_item(
                mojito,
                shared::models::MenuItemUpdate {
                    available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let id = service.create(4).await.unwrap().id;
        service.apply(id, ChatAction::Start).await.unwrap();

        let err = service
            .apply(id, ChatAction::AddItem { menu_item_id: mojito })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MenuItemUnavailable);
        let err = service
            .apply(id, ChatAction::AddItem { menu_item_id: 999 })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MenuItemNotFound);
    }

    #[tokio::test]
    async fn test_unknown_table_and_session() {
        let (_, service, _) = setup(None, Duration::from_secs(60)).await;
        assert_eq!(service.create(9).await.unwrap_err().code, ErrorCode::TableNotFound);
        assert_eq!(service.create(0).await.unwrap_err().code, ErrorCode::ValidationFailed);
        assert_eq!(
            service.get(Uuid::new_v4()).unwrap_err().code,
            ErrorCode::SessionNotFound
        );

        let id = service.create(4).await.unwrap().id;
        service.delete(id).unwrap();
        assert!(service.get(id).is_err());
    }

    #[tokio::test]
    async fn test_messages_use_assistant_or_fallback() {
        let (_, service, _) = setup(Some(Arc::new(EchoAssistant)), Duration::from_secs(60)).await;
        let id = service.create(4).await.unwrap().id;
        let view = service.post_message(id, " any specials? ").await.unwrap();
        let last = view.messages.last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.text, "echo: any specials? (Mojito)");

        let (_, plain, _) = setup(None, Duration::from_secs(60)).await;
        let id = plain.create(4).await.unwrap().id;
        let view = plain.post_message(id, "hello").await.unwrap();
        assert_eq!(view.messages.last().unwrap().text, FALLBACK_REPLY);
        assert!(plain.post_message(id, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let (_, service, _) = setup(None, Duration::from_millis(30)).await;
        service.create(4).await.unwrap();
        assert_eq!(service.evict_idle(), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let fresh = service.create(4).await.unwrap().id;
        assert_eq!(service.evict_idle(), 1);
        assert!(service.get(fresh).is_ok());
    }

    #[tokio::test]
    async fn test_actions_rejected_while_order_is_saving() {
        let inner = Arc::new(MemoryStore::new(ChangeFeed::new()));
        let mojito = seed(&inner).await;
        let gated = Arc::new(GatedStore {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        });
        let service = Arc::new(service_over(gated.clone(), None, Duration::from_secs(60)).await);
        let id = at_payment_choice(&service, mojito).await;

        let submit = tokio::spawn({
            let service = Arc::clone(&service);
            async move {
                service
                    .apply(id, ChatAction::ChoosePayment { path: PaymentPath::PayLater })
                    .await
            }
        });
        gated.entered.notified().await;

        for action in [
            ChatAction::ViewCart,
            ChatAction::RemoveItem { menu_item_id: mojito },
            ChatAction::AddItem { menu_item_id: mojito },
            ChatAction::ChoosePayment { path: PaymentPath::PayNow },
        ] {
            let err = service.apply(id, action).await.unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidRequest);
        }
        let view = service.get(id).unwrap();
        assert_eq!(view.step, ChatStep::PaymentChoice);
        assert_eq!(view.cart.len(), 1);
        assert_eq!(service.evict_idle(), 0);

        gated.release.notify_one();
        let view = submit.await.unwrap().unwrap();
        assert_eq!(view.step, ChatStep::Done);
        assert_eq!(view.receipt.unwrap().order.items.len(), 1);

        // back to normal once the order is saved
        let view = service.apply(id, ChatAction::Restart).await.unwrap();
        assert_eq!(view.step, ChatStep::Welcome);
    }

    #[tokio::test]
    async fn test_oversized_tip_keeps_session_usable() {
        let (_, service, mojito) = setup(None, Duration::from_secs(60)).await;
        let id = service.create(4).await.unwrap().id;
        service.apply(id, ChatAction::Start).await.unwrap();
        service.apply(id, ChatAction::AddItem { menu_item_id: mojito }).await.unwrap();
        service.apply(id, ChatAction::ProceedToTip).await.unwrap();

        let tip = TipChoice::Percent(Decimal::from_scientific("1e28").unwrap());
        let err = service.apply(id, ChatAction::SelectTip { tip }).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAmount);

        let view = service.get(id).unwrap();
        assert_eq!(view.step, ChatStep::Tip);
        assert_eq!(view.tip, TipChoice::None);
        assert_eq!(view.totals.unwrap().total, dec("9.79"));
    }

    #[tokio::test]
    async fn test_quantity_limit_reported_as_out_of_range() {
        let (_, service, mojito) = setup(None, Duration::from_secs(60)).await;
        let id = service.create(4).await.unwrap().id;
        service.apply(id, ChatAction::Start).await.unwrap();
        service.apply(id, ChatAction::AddItem { menu_item_id: mojito }).await.unwrap();

        let adjust = ChatAction::AdjustQuantity {
            menu_item_id: mojito,
            delta: i32::MAX,
        };
        let err = service.apply(id, adjust).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);

        let top_up = ChatAction::AdjustQuantity {
            menu_item_id: mojito,
            delta: MAX_LINE_QUANTITY as i32 - 1,
        };
        service.apply(id, top_up).await.unwrap();
        let err = service
            .apply(id, ChatAction::AddItem { menu_item_id: mojito })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
        assert_eq!(service.get(id).unwrap().item_count, MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn test_assistant_sees_recent_messages() {
        let assistant = Arc::new(RecordingAssistant::default());
        let (_, service, _) = setup(
            Some(assistant.clone() as Arc<dyn ChatAssistant>),
            Duration::from_secs(60),
        )
        .await;
        let id = service.create(4).await.unwrap().id;

        service.post_message(id, "hi").await.unwrap();
        service.post_message(id, "what's good?").await.unwrap();

        let contexts = assistant.contexts.lock();
        let first = contexts[0].as_deref().unwrap();
        assert!(first.starts_with("Waiter: Welcome to table 4!"));
        assert!(!first.contains("Guest:"));

        let second = contexts[1].as_deref().unwrap();
        assert!(second.contains("Guest: hi\nWaiter: Happy to help."));
        assert!(!second.contains("what's good?"));
    }
}
