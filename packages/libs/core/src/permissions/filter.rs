//! 필드 필터
//!
//! grant의 필드 정책에 따라 객체를 허용된 필드로 투영합니다.
//! 응답(read)과 저장 직전의 payload(write) 양쪽에 같은 필터를 사용합니다.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};

use super::policy::{DENY_MARKER, PRIMARY_KEY, WILDCARD};

/// grant 하나의 필드 정책
///
/// 와일드카드 + 거부 목록 또는 명시적 허용 목록 중 정확히 하나입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPolicy {
    /// `["*", "!password", ...]`: 거부된 필드를 제외한 전부
    All { denied: BTreeSet<String> },

    /// `["title", "paragraph"]`: 목록의 필드와 `ID`만
    Only { allowed: BTreeSet<String> },
}

impl FieldPolicy {
    /// 모든 필드 허용
    pub fn all() -> Self {
        FieldPolicy::All {
            denied: BTreeSet::new(),
        }
    }

    /// 선언된 필드 목록 파싱
    ///
    /// 빈 목록은 `["*"]`와 같습니다. 오류 메시지는 호출자가 resource/action을
    /// 붙여 `Error::MalformedFields`로 감쌉니다.
    pub fn parse(fields: &[String]) -> Result<Self, String> {
        if fields.is_empty() {
            return Ok(Self::all());
        }

        let mut wildcard = false;
        let mut denied = BTreeSet::new();
        let mut allowed = BTreeSet::new();

        for field in fields {
            let field = field.trim();
            if field == WILDCARD {
                if wildcard {
                    return Err("wildcard listed more than once".to_string());
                }
                wildcard = true;
            } else if let Some(name) = field.strip_prefix(DENY_MARKER) {
                let name = name.trim();
                if name.is_empty() || name == WILDCARD {
                    return Err(format!("invalid denial '{}'", field));
                }
                if name == PRIMARY_KEY {
                    return Err(format!("the identifier '{}' cannot be denied", PRIMARY_KEY));
                }
                if !denied.insert(name.to_string()) {
                    return Err(format!("field '{}' denied more than once", name));
                }
            } else {
                if field.is_empty() {
                    return Err("empty field name".to_string());
                }
                if !allowed.insert(field.to_string()) {
                    return Err(format!("field '{}' listed more than once", field));
                }
            }
        }

        match (wildcard, allowed.is_empty()) {
            (true, true) => Ok(FieldPolicy::All { denied }),
            (false, _) if !denied.is_empty() => {
                Err("denials require the '*' wildcard".to_string())
            }
            (false, _) => Ok(FieldPolicy::Only { allowed }),
            (true, false) => Err("explicit fields cannot be combined with '*'".to_string()),
        }
    }

    /// 필드 허용 여부
    pub fn permits(&self, field: &str) -> bool {
        match self {
            FieldPolicy::All { denied } => !denied.contains(field),
            FieldPolicy::Only { allowed } => field == PRIMARY_KEY || allowed.contains(field),
        }
    }

    /// 선언 형태의 필드 목록 (`["*", "!password"]`)
    pub fn to_declaration(&self) -> Vec<String> {
        match self {
            FieldPolicy::All { denied } => std::iter::once(WILDCARD.to_string())
                .chain(denied.iter().map(|name| format!("{}{}", DENY_MARKER, name)))
                .collect(),
            FieldPolicy::Only { allowed } => allowed.iter().cloned().collect(),
        }
    }
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for FieldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_declaration().join(", "))
    }
}

/// 필드 필터
///
/// 허용된 grant의 필드 정책을 빌려 쓰는 순수 함수입니다.
/// 입력을 변경하지 않고 항상 새 값을 반환합니다.
#[derive(Debug, Clone, Copy)]
pub struct FieldFilter<'a> {
    policy: &'a FieldPolicy,
}

impl<'a> FieldFilter<'a> {
    /// 필드 정책으로 필터 생성
    pub fn new(policy: &'a FieldPolicy) -> Self {
        Self { policy }
    }

    /// 필터가 사용하는 필드 정책
    pub fn policy(&self) -> &'a FieldPolicy {
        self.policy
    }

    /// 객체 필터링 (원래 키 순서 유지)
    pub fn apply_map(&self, object: &Map<String, Value>) -> Map<String, Value> {
        object
            .iter()
            .filter(|(key, _)| self.policy.permits(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// 임의 JSON 값 필터링
    ///
    /// * object → 허용된 필드만 남긴 object
    /// * array → 각 원소를 필터링한 array
    /// * 그 외 → 빈 object
    pub fn apply(&self, value: &Value) -> Value {
        match value {
            Value::Object(object) => Value::Object(self.apply_map(object)),
            Value::Array(items) => Value::Array(items.iter().map(|item| self.apply(item)).collect()),
            _ => Value::Object(Map::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_field_modes() {
        assert_eq!(FieldPolicy::parse(&[]).unwrap(), FieldPolicy::all());
        assert_eq!(FieldPolicy::parse(&fields(&["*"])).unwrap(), FieldPolicy::all());

        let policy = FieldPolicy::parse(&fields(&["*", "!password", "!passwordSalt"])).unwrap();
        assert!(matches!(&policy, FieldPolicy::All { denied } if denied.len() == 2));

        let policy = FieldPolicy::parse(&fields(&["title", "paragraph"])).unwrap();
        assert!(matches!(&policy, FieldPolicy::Only { allowed } if allowed.len() == 2));
    }

    #[test]
    fn test_parse_rejects_mixed_modes() {
        assert!(FieldPolicy::parse(&fields(&["*", "title"])).is_err());
        assert!(FieldPolicy::parse(&fields(&["title", "!password"])).is_err());
        assert!(FieldPolicy::parse(&fields(&["!password"])).is_err());
        assert!(FieldPolicy::parse(&fields(&["*", "*"])).is_err());
        assert!(FieldPolicy::parse(&fields(&["title", "title"])).is_err());
        assert!(FieldPolicy::parse(&fields(&["*", "!ID"])).is_err());
        assert!(FieldPolicy::parse(&fields(&["*", "!"])).is_err());
        assert!(FieldPolicy::parse(&fields(&[""])).is_err());
    }

    #[test]
    fn test_allow_list_keeps_identifier() {
        let policy = FieldPolicy::parse(&fields(&["title", "paragraph"])).unwrap();
        let filter = FieldFilter::new(&policy);

        let filtered = filter.apply(&json!({
            "ID": 1, "title": "t", "paragraph": "p", "secret": "s"
        }));
        assert_eq!(filtered, json!({"ID": 1, "title": "t", "paragraph": "p"}));
    }

    #[test]
    fn test_allow_list_keeps_source_key_order() {
        let policy = FieldPolicy::parse(&fields(&["title", "paragraph"])).unwrap();
        let filter = FieldFilter::new(&policy);

        let filtered = filter.apply(&json!({"paragraph": "p", "ID": 1, "title": "t"}));
        let keys: Vec<&String> = filtered.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["paragraph", "ID", "title"]);
    }

    #[test]
    fn test_deny_list() {
        let policy = FieldPolicy::parse(&fields(&["*", "!password"])).unwrap();
        let filter = FieldFilter::new(&policy);

        let filtered = filter.apply(&json!({"ID": 1, "username": "x", "password": "h"}));
        assert_eq!(filtered, json!({"ID": 1, "username": "x"}));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let policies = [
            FieldPolicy::all(),
            FieldPolicy::parse(&fields(&["*", "!password", "!passwordSalt"])).unwrap(),
            FieldPolicy::parse(&fields(&["email", "about"])).unwrap(),
        ];
        let objects = [
            json!({}),
            json!({"ID": 3, "email": "a@b.c", "password": "h", "passwordSalt": "s", "role": "user"}),
            json!({"about": "hi", "extra": [1, 2, 3]}),
            json!([{"ID": 1, "email": "x"}, {"password": "y"}]),
        ];

        for policy in &policies {
            let filter = FieldFilter::new(policy);
            for object in &objects {
                let once = filter.apply(object);
                assert_eq!(filter.apply(&once), once);
            }
        }
    }

    #[test]
    fn test_filter_does_not_mutate_input() {
        let policy = FieldPolicy::parse(&fields(&["email"])).unwrap();
        let filter = FieldFilter::new(&policy);

        let input = json!({"email": "x@y.com", "role": "admin"});
        let before = input.clone();
        let _ = filter.apply(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn test_unknown_shapes_yield_empty_results() {
        let policy = FieldPolicy::all();
        let filter = FieldFilter::new(&policy);

        assert_eq!(filter.apply(&json!(null)), json!({}));
        assert_eq!(filter.apply(&json!("text")), json!({}));
        assert_eq!(filter.apply(&json!([])), json!([]));
        assert_eq!(filter.apply(&json!({})), json!({}));
    }

    #[test]
    fn test_declaration_round_trip() {
        let declared = fields(&["*", "!password", "!passwordSalt"]);
        let policy = FieldPolicy::parse(&declared).unwrap();
        assert_eq!(policy.to_declaration(), declared);
        assert_eq!(policy.to_string(), "*, !password, !passwordSalt");
    }
}
