//! 권한 정책 정의
//!
//! `policies/*.yaml`의 구조와 정책을 구성하는 닫힌 열거형(role, action,
//! resource, comparator)을 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 모든 리소스 객체의 기본 식별자 필드
pub const PRIMARY_KEY: &str = "ID";

/// 필드 목록 와일드카드
pub const WILDCARD: &str = "*";

/// 필드 거부 표시 (`!password`)
pub const DENY_MARKER: char = '!';

/// 조건에서 소유자를 가리키는 참조. 항상 `data.ID`로 해석됩니다.
pub const OWNER_REF: &str = "$.owner";

/// 조건에서 요청자를 가리키는 인자 이름
pub const REQUESTER_ARG: &str = "requester";

/// 전체 권한 정책 문서
///
/// 리소스 → action → 규칙 목록 구조입니다. 리소스와 action은 파일에
/// 선언된 순서를 유지합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// 리소스별 권한 정책
    #[serde(default)]
    pub resources: IndexMap<String, IndexMap<String, ActionRules>>,
}

impl PolicyDocument {
    /// YAML 문자열에서 파싱
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// 선언 순서를 유지한 채 grant 레코드 목록으로 펼치기
    pub fn into_records(self) -> Vec<GrantRecord> {
        let mut records = Vec::new();
        for (resource, actions) in self.resources {
            for (action, rules) in actions {
                for rule in rules.rules {
                    records.push(GrantRecord {
                        role: rule.role,
                        action: action.clone(),
                        resource: resource.clone(),
                        condition: rule.condition,
                        fields: rule.fields.unwrap_or_default(),
                    });
                }
            }
        }
        records
    }
}

/// 권한 규칙 (하나의 role + 조건 + 필드 범위)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDecl {
    /// 허용되는 role
    pub role: String,

    /// 소유권 조건
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionDecl>,

    /// 필드 목록 (None = `["*"]`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

/// 조건 선언: `{ fn: EQUALS, args: { requester: "$.owner" } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionDecl {
    /// 비교 함수 이름
    #[serde(rename = "fn")]
    pub function: String,

    /// 비교 인자
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl ConditionDecl {
    /// 표준 소유권 조건 생성
    pub fn owner(function: impl Into<String>) -> Self {
        let mut args = BTreeMap::new();
        args.insert(REQUESTER_ARG.to_string(), OWNER_REF.to_string());
        Self {
            function: function.into(),
            args,
        }
    }
}

/// Action별 규칙 목록 (ordered array)
#[derive(Debug, Clone, Serialize)]
pub struct ActionRules {
    pub rules: Vec<RuleDecl>,
}

/// ActionRules의 custom deserializer (단일 object shorthand 허용)
impl<'de> Deserialize<'de> for ActionRules {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct ActionRulesVisitor;

        impl<'de> Visitor<'de> for ActionRulesVisitor {
            type Value = ActionRules;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of grant rules or a single grant rule object")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut rules = Vec::new();
                while let Some(rule) = seq.next_element::<RuleDecl>()? {
                    rules.push(rule);
                }
                Ok(ActionRules { rules })
            }

            fn visit_map<M>(self, map: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: de::MapAccess<'de>,
            {
                let rule = RuleDecl::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(ActionRules { rules: vec![rule] })
            }
        }

        deserializer.deserialize_any(ActionRulesVisitor)
    }
}

/// 등록 전의 grant 레코드
///
/// 모든 이름은 문자열 그대로이며, `PolicyStore::register`에서 검증됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub role: String,
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionDecl>,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl GrantRecord {
    /// 무조건, 전체 필드 grant 레코드 생성
    pub fn new(
        role: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            action: action.into(),
            resource: resource.into(),
            condition: None,
            fields: Vec::new(),
        }
    }

    /// 소유권 조건 설정 (`EQUALS`, `NOT_EQUALS`)
    pub fn when_owner(mut self, function: impl Into<String>) -> Self {
        self.condition = Some(ConditionDecl::owner(function));
        self
    }

    /// 필드 목록 설정
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Role
///
/// 계층이 없으며 role별 grant는 서로 독립적입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    User,
    Staff,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Staff, Role::Admin];

    /// 문자열에서 파싱
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "staff" => Some(Role::Staff),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

/// CRUD 작업 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Read,
    Add,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Read, Action::Add, Action::Update, Action::Delete];

    /// 문자열에서 파싱
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Action::Read),
            "add" => Some(Action::Add),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Add => "add",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// 보호 대상 리소스
///
/// 단수형은 단일 인스턴스, 복수형은 전체 인스턴스 범위입니다.
/// `users`를 가진 role이 `user`를 가지지 않을 수 있고 그 반대도 가능합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    User,
    Users,
    Dog,
    Messages,
    Favourites,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::User,
        Resource::Users,
        Resource::Dog,
        Resource::Messages,
        Resource::Favourites,
    ];

    /// 문자열에서 파싱
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Resource::User),
            "users" => Some(Resource::Users),
            "dog" => Some(Resource::Dog),
            "messages" => Some(Resource::Messages),
            "favourites" => Some(Resource::Favourites),
            _ => None,
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::User => "user",
            Resource::Users => "users",
            Resource::Dog => "dog",
            Resource::Messages => "messages",
            Resource::Favourites => "favourites",
        }
    }

    /// 저장소 테이블 이름
    pub fn table(&self) -> &'static str {
        match self {
            Resource::User | Resource::Users => "users",
            Resource::Dog => "dogs",
            Resource::Messages => "messages",
            Resource::Favourites => "favourites",
        }
    }

    /// 소유자 컬럼
    ///
    /// 있으면 row의 `ID`가 아니라 이 컬럼의 값이 소유자입니다.
    /// 즐겨찾기 row는 `{ID, userID, dogID}`이고 소유자는 `userID`입니다.
    pub fn owner_field(&self) -> Option<&'static str> {
        match self {
            Resource::Favourites => Some("userID"),
            _ => None,
        }
    }

    /// self-link 생성용 라우트 prefix
    pub fn route_prefix(&self) -> String {
        format!("/api/v1/{}", self.table())
    }
}

/// 조건 비교 함수
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Equals,
    NotEquals,
}

impl Comparator {
    /// 문자열에서 파싱
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "EQUALS" => Some(Comparator::Equals),
            "NOT_EQUALS" => Some(Comparator::NotEquals),
            _ => None,
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Equals => "EQUALS",
            Comparator::NotEquals => "NOT_EQUALS",
        }
    }

    /// 두 값 비교
    pub fn compare<T: PartialEq + ?Sized>(&self, requester: &T, owner: &T) -> bool {
        match self {
            Comparator::Equals => requester == owner,
            Comparator::NotEquals => requester != owner,
        }
    }
}

macro_rules! impl_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

impl_display!(Role, Action, Resource, Comparator);
