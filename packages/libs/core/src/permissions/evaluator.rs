//! 권한 평가기
//!
//! 요청자/작업/리소스/대상 데이터에 대해 정책을 평가하고,
//! 허용 시 해당 grant의 필드 필터를 돌려줍니다.

use serde_json::Value;

use super::context::{Identifier, Requester};
use super::filter::FieldFilter;
use super::policy::{Action, Resource, Role, PRIMARY_KEY};
use super::store::{Condition, Grant, PolicyStore};

/// 권한 평가 결과
///
/// 거부는 에러가 아니라 `granted == false`입니다. 어떤 grant/필드 때문에
/// 거부되었는지는 담지 않습니다.
#[derive(Debug, Clone, Copy)]
pub struct AccessDecision<'a> {
    granted: bool,
    filter: Option<FieldFilter<'a>>,
}

impl<'a> AccessDecision<'a> {
    /// 허용 결과 생성
    pub fn grant(filter: FieldFilter<'a>) -> Self {
        Self {
            granted: true,
            filter: Some(filter),
        }
    }

    /// 거부 결과 생성
    pub fn deny() -> Self {
        Self {
            granted: false,
            filter: None,
        }
    }

    /// 허용 여부
    pub fn granted(&self) -> bool {
        self.granted
    }

    /// 필드 필터 (허용된 경우에만 존재)
    pub fn filter(&self) -> Option<FieldFilter<'a>> {
        self.filter
    }

    /// 허용된 경우 값을 필터링
    pub fn apply(&self, value: &Value) -> Option<Value> {
        self.filter.map(|filter| filter.apply(value))
    }
}

/// 권한 평가기
///
/// 읽기 전용 정책 저장소를 빌려 쓰며 상태가 없습니다.
#[derive(Debug, Clone, Copy)]
pub struct AccessEvaluator<'a> {
    store: &'a PolicyStore,
}

impl<'a> AccessEvaluator<'a> {
    /// 새 평가기 생성
    pub fn new(store: &'a PolicyStore) -> Self {
        Self { store }
    }

    /// 접근 평가 (First Satisfied Grant Wins)
    ///
    /// # Arguments
    /// * `requester` - 인증된 요청자
    /// * `action` - 작업 타입
    /// * `resource` - 리소스 이름
    /// * `data` - 대상 인스턴스 (소유권 조건 평가용)
    pub fn evaluate(
        &self,
        requester: &Requester,
        action: Action,
        resource: Resource,
        data: Option<&Value>,
    ) -> AccessDecision<'a> {
        let Some(role) = Role::from_str(&requester.role) else {
            tracing::debug!(
                role = %requester.role,
                %action,
                %resource,
                granted = false,
                "unknown requester role"
            );
            return AccessDecision::deny();
        };

        let grants = self.store.lookup(role, action, resource);
        for (index, grant) in grants.iter().enumerate() {
            if !condition_holds(grant, requester, data) {
                tracing::trace!(%role, %action, %resource, index, "grant condition not satisfied");
                continue;
            }

            tracing::debug!(%role, %action, %resource, index, granted = true, "access evaluated");
            return AccessDecision::grant(FieldFilter::new(&grant.fields));
        }

        tracing::debug!(
            %role,
            %action,
            %resource,
            candidates = grants.len(),
            granted = false,
            "access evaluated"
        );
        AccessDecision::deny()
    }

    /// 요청자의 role에 해당 (action, resource) grant가 하나라도 있는지
    ///
    /// 조건은 평가하지 않습니다. 전체 조회에서 소유한 row만 돌려줄지
    /// 판단할 때 사용합니다.
    pub fn has_grants(&self, requester: &Requester, action: Action, resource: Resource) -> bool {
        Role::from_str(&requester.role)
            .map(|role| !self.store.lookup(role, action, resource).is_empty())
            .unwrap_or(false)
    }
}

/// grant 조건 평가
///
/// 조건이 있는데 `data`나 `data.ID`가 없으면 충족되지 않은 것으로 봅니다.
fn condition_holds(grant: &Grant, requester: &Requester, data: Option<&Value>) -> bool {
    let Some(Condition { comparator }) = grant.condition else {
        return true;
    };

    match resolve_owner(data) {
        Some(owner) => comparator.compare(&requester.id, &owner),
        None => false,
    }
}

/// 소유자 해석: 항상 `data.ID`
fn resolve_owner(data: Option<&Value>) -> Option<Identifier> {
    data?.get(PRIMARY_KEY).and_then(Identifier::from_value)
}
