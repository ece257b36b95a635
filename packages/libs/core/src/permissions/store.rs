//! 정책 저장소
//!
//! 시작 시 한 번 채워지고 이후에는 읽기 전용인 grant 테이블입니다.
//! 전역 상태가 없으므로 배포/테스트마다 독립된 저장소를 만들 수 있습니다.

use std::collections::BTreeMap;
use std::path::Path;

use super::filter::FieldPolicy;
use super::policy::{
    Action, Comparator, ConditionDecl, GrantRecord, PolicyDocument, Resource, Role, OWNER_REF,
    REQUESTER_ARG,
};
use crate::error::{Error, Result};

/// 기본 내장 정책
const BUILTIN_POLICY: &str = include_str!("../../policies/kennel.yaml");

/// 소유권 조건
///
/// `requester`(요청자 ID)와 `owner`(`data.ID`)를 비교합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub comparator: Comparator,
}

impl Condition {
    fn from_decl(decl: &ConditionDecl, record: &GrantRecord) -> Result<Self> {
        let comparator =
            Comparator::from_str(&decl.function).ok_or_else(|| Error::UnknownComparator {
                name: decl.function.clone(),
            })?;

        let malformed = |message: String| Error::MalformedCondition {
            resource: record.resource.clone(),
            action: record.action.clone(),
            message,
        };

        if decl.args.len() != 1 {
            return Err(malformed(format!(
                "expected exactly one argument, got {}",
                decl.args.len()
            )));
        }
        match decl.args.get(REQUESTER_ARG) {
            Some(reference) if reference == OWNER_REF => Ok(Self { comparator }),
            Some(reference) => Err(malformed(format!(
                "unsupported reference '{}', expected '{}'",
                reference, OWNER_REF
            ))),
            None => Err(malformed(format!("missing '{}' argument", REQUESTER_ARG))),
        }
    }
}

/// 검증된 grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub role: Role,
    pub action: Action,
    pub resource: Resource,
    pub condition: Option<Condition>,
    pub fields: FieldPolicy,
}

impl Grant {
    /// 레코드 검증 및 변환
    pub fn from_record(record: &GrantRecord) -> Result<Self> {
        let role = Role::from_str(&record.role).ok_or_else(|| Error::UnknownRole {
            name: record.role.clone(),
        })?;
        let action = Action::from_str(&record.action).ok_or_else(|| Error::UnknownAction {
            name: record.action.clone(),
        })?;
        let resource = Resource::from_str(&record.resource).ok_or_else(|| Error::UnknownResource {
            name: record.resource.clone(),
        })?;
        let condition = record
            .condition
            .as_ref()
            .map(|decl| Condition::from_decl(decl, record))
            .transpose()?;
        let fields = FieldPolicy::parse(&record.fields).map_err(|message| Error::MalformedFields {
            resource: record.resource.clone(),
            action: record.action.clone(),
            message,
        })?;

        Ok(Self {
            role,
            action,
            resource,
            condition,
            fields,
        })
    }

    /// 무조건 grant 여부
    pub fn is_unconditional(&self) -> bool {
        self.condition.is_none()
    }
}

/// 정책 저장소
///
/// (role, action, resource)별 grant 목록을 등록 순서대로 보관합니다.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    grants: BTreeMap<(Role, Action, Resource), Vec<Grant>>,
}

impl PolicyStore {
    /// 빈 저장소 생성
    pub fn empty() -> Self {
        Self::default()
    }

    /// grant 레코드 목록으로 저장소 생성
    ///
    /// 첫 번째 잘못된 레코드에서 중단합니다.
    pub fn new<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = GrantRecord>,
    {
        let mut store = Self::empty();
        for record in records {
            store.register(record)?;
        }
        tracing::info!(grants = store.len(), "policy store built");
        Ok(store)
    }

    /// 정책 문서(YAML)로 저장소 생성
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::new(PolicyDocument::from_yaml(yaml)?.into_records())
    }

    /// 정책 파일로 저장소 생성
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading policy file");
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// 내장 정책으로 저장소 생성
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_POLICY)
    }

    /// grant 등록
    ///
    /// role/action/resource/comparator 이름이 닫힌 열거형 밖이면
    /// 설정 오류를 반환합니다.
    pub fn register(&mut self, record: GrantRecord) -> Result<()> {
        let grant = Grant::from_record(&record)?;
        self.grants
            .entry((grant.role, grant.action, grant.resource))
            .or_default()
            .push(grant);
        Ok(())
    }

    /// (role, action, resource)에 해당하는 grant 조회
    ///
    /// 등록된 grant가 없으면 빈 slice를 반환하며, 이는 암묵적 거부입니다.
    pub fn lookup(&self, role: Role, action: Action, resource: Resource) -> &[Grant] {
        self.grants
            .get(&(role, action, resource))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 모든 grant (role, action, resource 순)
    pub fn grants(&self) -> impl Iterator<Item = &Grant> {
        self.grants.values().flatten()
    }

    /// 등록된 grant 수
    pub fn len(&self) -> usize {
        self.grants.values().map(Vec::len).sum()
    }

    /// 비어 있는지 확인
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
