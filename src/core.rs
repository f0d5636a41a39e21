// 네트워크 로직과 분리된 채팅 팬아웃 상태 관리 모듈입니다.

pub mod bus;
pub mod filter;
pub mod identity;
pub mod presence;
pub mod room;

pub use bus::{BroadcastBus, BusEvent, Subscription, Topic};
pub use filter::{accept, ModerationCache, ModerationSnapshot};
pub use identity::{HandshakeContext, Identity, SessionResolver};
pub use presence::{PresenceSnapshot, PresenceTracker};
pub use room::{ConnId, Room, RoomKind, RoomRegistry, RoomSnapshot};
