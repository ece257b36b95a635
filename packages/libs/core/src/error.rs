//! 공통 에러 타입
//!
//! 정책 선언(설정) 오류만 에러로 표현합니다. 권한 거부는 에러가 아니라
//! `AccessDecision::granted == false`로 전달됩니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Kennel 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Policy Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("unknown role: {name}")]
    UnknownRole { name: String },

    #[error("unknown action: {name}")]
    UnknownAction { name: String },

    #[error("unknown resource: {name}")]
    UnknownResource { name: String },

    #[error("unknown comparator: {name}")]
    UnknownComparator { name: String },

    #[error("malformed condition on {resource}/{action}: {message}")]
    MalformedCondition {
        resource: String,
        action: String,
        message: String,
    },

    #[error("malformed field list on {resource}/{action}: {message}")]
    MalformedFields {
        resource: String,
        action: String,
        message: String,
    },

    #[error("policy parse error: {message}")]
    PolicyParse { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // IO/Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 정책 설정 오류 여부
    ///
    /// 설정 오류는 보안과 직결되므로 시작 시점에 치명적으로 처리해야 합니다.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::UnknownRole { .. }
                | Error::UnknownAction { .. }
                | Error::UnknownResource { .. }
                | Error::UnknownComparator { .. }
                | Error::MalformedCondition { .. }
                | Error::MalformedFields { .. }
                | Error::PolicyParse { .. }
                | Error::Yaml(_)
        )
    }

    /// HTTP 상태 코드로 변환
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Json(_) => 400,

            // 500 Internal Server Error
            _ => 500,
        }
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownRole { .. } => "UNKNOWN_ROLE",
            Error::UnknownAction { .. } => "UNKNOWN_ACTION",
            Error::UnknownResource { .. } => "UNKNOWN_RESOURCE",
            Error::UnknownComparator { .. } => "UNKNOWN_COMPARATOR",
            Error::MalformedCondition { .. } => "MALFORMED_CONDITION",
            Error::MalformedFields { .. } => "MALFORMED_FIELDS",
            Error::PolicyParse { .. } => "POLICY_PARSE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}
