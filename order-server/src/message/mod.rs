//! 实时变更模块
//!
//! - [`ChangeFeed`] - 存储写入后的广播通道，按表和事件掩码订阅
//! - [`LiveCollection`] - 订阅并整体重新拉取的本地缓存

pub mod feed;
pub mod live;

pub use feed::{ChangeCallback, ChangeFeed, ResourceVersions, Subscription};
pub use live::LiveCollection;
pub use shared::message::{ChangeEvent, ChangeKind, EventMask, StoreTable};
