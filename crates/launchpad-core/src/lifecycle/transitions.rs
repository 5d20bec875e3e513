//! 遷移表 - (現在の状態, イベント) → (次の状態, アクション)
//!
//! 表は不変。ここに無い組み合わせはすべて IllegalTransition です。

use crate::domain::{GameEvent, GameStatus};

/// 遷移に伴う副作用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    /// 状態の書き込みだけ
    None,
    /// 必須項目とメディアを検証してから書き込む
    ValidateSubmission,
    /// publish_time を書き込み、予約公開タスクを同じトランザクションで登録
    SchedulePublish,
    /// publish_time = now を書き込み、予約ユーザー通知タスクを同じトランザクションで登録
    PublishNow,
    /// 未実行の予約公開タスクを同じトランザクションで削除
    CancelScheduledPublish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: GameStatus,
    pub event: GameEvent,
    pub to: GameStatus,
    pub action: TransitionAction,
}

const fn rule(
    from: GameStatus,
    event: GameEvent,
    to: GameStatus,
    action: TransitionAction,
) -> Transition {
    Transition {
        from,
        event,
        to,
        action,
    }
}

use GameEvent as E;
use GameStatus as S;
use TransitionAction as A;

pub const TRANSITIONS: &[Transition] = &[
    rule(S::Init, E::SubmitForReview, S::InReview, A::ValidateSubmission),
    rule(S::InReview, E::Approve, S::Approved, A::None),
    rule(S::InReview, E::Reject, S::Init, A::None),
    rule(S::Approved, E::PreRegister, S::PreRegister, A::SchedulePublish),
    rule(S::Approved, E::PublishNow, S::Published, A::PublishNow),
    rule(S::Approved, E::UpdateInfo, S::Init, A::None),
    rule(S::PreRegister, E::AutoPublish, S::Published, A::PublishNow),
    rule(S::PreRegister, E::CancelPreRegister, S::Approved, A::CancelScheduledPublish),
    rule(S::PreRegister, E::UpdateInfo, S::Init, A::None),
    rule(S::Published, E::UnpublishNow, S::Unpublished, A::None),
    rule(S::Published, E::UpdateVersion, S::Init, A::None),
];

pub fn lookup(from: GameStatus, event: GameEvent) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.event == event)
}

/// `from` で受け付けるイベント
pub fn allowed_events(from: GameStatus) -> Vec<GameEvent> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == from)
        .map(|t| t.event)
        .collect()
}
