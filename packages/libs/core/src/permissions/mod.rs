//! 권한 정책 저장 및 평가
//!
//! # 개요
//!
//! role → action → resource → 소유권 조건 → 필드 범위로 이루어진 grant를
//! 평가하여 허용/거부를 결정하고, 허용 시 응답 또는 저장할 payload를
//! 필드 단위로 걸러냅니다.
//!
//! # 모듈 구조
//!
//! - `policy`: 정책 문서 및 닫힌 열거형 정의
//! - `context`: 요청자/식별자
//! - `store`: 정책 저장소
//! - `evaluator`: 권한 평가기
//! - `filter`: 필드 필터

mod context;
mod evaluator;
mod filter;
mod policy;
mod store;

pub use context::{Identifier, Requester};
pub use evaluator::{AccessDecision, AccessEvaluator};
pub use filter::{FieldFilter, FieldPolicy};
pub use policy::{
    Action, ActionRules, Comparator, ConditionDecl, GrantRecord, PolicyDocument, Resource, Role,
    RuleDecl, PRIMARY_KEY,
};
pub use store::{Condition, Grant, PolicyStore};
