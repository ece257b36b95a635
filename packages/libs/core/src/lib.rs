//! knl-core: Kennel 접근 제어 핵심 라이브러리
//!
//! users, dogs, messages, favourites 리소스에 대한 role/소유권 기반
//! 접근 제어(ABAC)를 제공합니다.
//!
//! # 모듈 구조
//!
//! - `permissions`: 정책 저장소, 권한 평가기, 필드 필터
//! - `gate`: 라우트 핸들러용 조회/평가/필터/저장 파이프라인
//! - `error`: 공통 에러 타입

pub mod error;
pub mod gate;
pub mod permissions;

pub use error::{Error, Result};
