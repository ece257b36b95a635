//! 평가 컨텍스트
//!
//! 인증 계층이 만들어 주는 요청자(requester) 정보와 식별자 타입을 정의합니다.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// 리소스/요청자 식별자
///
/// 저장소 row의 `ID`는 숫자로, 경로 파라미터는 문자열로 들어오므로
/// 정규화된 문자열 형태로 비교합니다. `21`과 `"21"`은 같은 식별자입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// JSON 값에서 식별자 추출 (숫자 또는 비어 있지 않은 문자열)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }
            _ => None,
        }
    }

    /// 정규화된 문자열
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON 값으로 변환 (숫자로 표현 가능하면 숫자)
    pub fn to_value(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(self.0.clone()),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Identifier::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("identifier must be a number or a non-empty string"))
    }
}

/// 요청자
///
/// 인증 계층이 확정한 신원입니다. role은 문자열 그대로 받으며, 정책에 없는
/// role은 매칭되는 grant가 없으므로 항상 거부됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    /// 사용자 ID
    #[serde(alias = "ID")]
    pub id: Identifier,

    /// Role 이름
    pub role: String,
}

impl Requester {
    /// 새 요청자 생성
    pub fn new(id: impl Into<Identifier>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}
