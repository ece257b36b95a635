//! 핸들러 게이트
//!
//! 라우트 핸들러가 따르는 "조회 → 평가 → 필터 → 저장" 순서를 한 곳에
//! 구현합니다. HTTP 프레임워크와 무관하게 상태 코드와 JSON 본문만
//! 돌려주므로, 서버는 `Reply`를 그대로 응답으로 옮기면 됩니다.
//!
//! 모든 거부는 동일하게 403, 본문 없음입니다.
//!
//! 소유권 조건은 항상 평가 대상의 `ID`를 소유자로 봅니다. 소유자 컬럼이
//! 있는 리소스(`Resource::owner_field`)는 row 대신 `{ID: row[owner_field]}`를
//! 평가 대상으로 넘깁니다.

mod memory;

pub use memory::MemoryRecords;

use serde_json::{json, Map, Value};

use crate::permissions::{AccessEvaluator, Action, Identifier, Requester, Resource, PRIMARY_KEY};

/// 저장소 협력자
///
/// 테이블 이름은 `Resource::table()`을 사용합니다.
pub trait RecordStore {
    /// 기본 키로 row 조회
    fn get(&self, table: &str, id: &Identifier) -> Option<Map<String, Value>>;

    /// 테이블 전체 조회
    fn list(&self, table: &str) -> Vec<Map<String, Value>>;

    /// row 추가 후 새 ID 반환
    fn insert(&mut self, table: &str, record: Map<String, Value>) -> Identifier;

    /// 기존 row에 변경 필드 병합. row가 없으면 false
    fn update(&mut self, table: &str, id: &Identifier, changes: Map<String, Value>) -> bool;

    /// row 삭제. row가 없으면 false
    fn remove(&mut self, table: &str, id: &Identifier) -> bool;
}

/// 핸들러 응답
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// HTTP 상태 코드
    pub status: u16,

    /// JSON 본문 (없으면 빈 응답)
    pub body: Option<Value>,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: 201,
            body: Some(body),
        }
    }

    pub fn bad_request() -> Self {
        Self::empty(400)
    }

    pub fn unauthorized() -> Self {
        Self::empty(401)
    }

    /// 거부 응답. 어떤 grant나 필드 때문인지 노출하지 않습니다.
    pub fn forbidden() -> Self {
        Self::empty(403)
    }

    pub fn not_found() -> Self {
        Self::empty(404)
    }

    fn empty(status: u16) -> Self {
        Self { status, body: None }
    }
}

/// 리소스 게이트
#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
    evaluator: AccessEvaluator<'a>,
}

impl<'a> Gate<'a> {
    /// 평가기로 게이트 생성
    pub fn new(evaluator: AccessEvaluator<'a>) -> Self {
        Self { evaluator }
    }

    /// 단일 인스턴스 조회
    pub fn read_one<S>(
        &self,
        store: &S,
        requester: Option<&Requester>,
        resource: Resource,
        id: &Identifier,
    ) -> Reply
    where
        S: RecordStore + ?Sized,
    {
        let Some(requester) = requester else {
            return Reply::unauthorized();
        };
        let Some(row) = store.get(resource.table(), id) else {
            return Reply::not_found();
        };

        let subject = ownership_subject(resource, &row);
        let decision = self
            .evaluator
            .evaluate(requester, Action::Read, resource, Some(&subject));
        match decision.filter() {
            Some(filter) => Reply::ok(Value::Object(filter.apply_map(&row))),
            None => Reply::forbidden(),
        }
    }

    /// 전체 인스턴스 조회
    ///
    /// 조건 없는 grant가 있으면 모든 row를, 조건부 grant만 있으면 조건을
    /// 만족하는 row만 돌려줍니다. 해당 role에 grant가 없으면 403입니다.
    pub fn read_all<S>(&self, store: &S, requester: Option<&Requester>, resource: Resource) -> Reply
    where
        S: RecordStore + ?Sized,
    {
        let Some(requester) = requester else {
            return Reply::unauthorized();
        };
        if !self.evaluator.has_grants(requester, Action::Read, resource) {
            return Reply::forbidden();
        }

        let rows = store.list(resource.table());
        let decision = self.evaluator.evaluate(requester, Action::Read, resource, None);
        let visible: Vec<Value> = match decision.filter() {
            Some(filter) => rows
                .iter()
                .map(|row| Value::Object(filter.apply_map(row)))
                .collect(),
            None => rows
                .iter()
                .filter_map(|row| {
                    let subject = ownership_subject(resource, row);
                    self.evaluator
                        .evaluate(requester, Action::Read, resource, Some(&subject))
                        .filter()
                        .map(|filter| Value::Object(filter.apply_map(row)))
                })
                .collect(),
        };
        Reply::ok(Value::Array(visible))
    }

    /// 인스턴스 생성
    ///
    /// `scope`는 소유권 조건을 평가할 대상입니다
    /// (예: 사용자의 즐겨찾기 추가 시 `{"ID": userId}`). 소유자 컬럼이 있는
    /// 리소스는 `scope.ID`가 필수이며, 저장되는 소유자 컬럼은 body와 무관하게
    /// `scope.ID`로 채워집니다.
    pub fn add<S>(
        &self,
        store: &mut S,
        requester: Option<&Requester>,
        resource: Resource,
        scope: Option<&Value>,
        body: &Value,
    ) -> Reply
    where
        S: RecordStore + ?Sized,
    {
        let Some(requester) = requester else {
            return Reply::unauthorized();
        };
        if !body.is_object() {
            return Reply::bad_request();
        }
        let owner = match resource.owner_field() {
            Some(field) => {
                let id = scope
                    .and_then(|s| s.get(PRIMARY_KEY))
                    .and_then(Identifier::from_value);
                match id {
                    Some(id) => Some((field, id)),
                    None => return Reply::bad_request(),
                }
            }
            None => None,
        };

        let decision = self.evaluator.evaluate(requester, Action::Add, resource, scope);
        let Some(Value::Object(mut record)) = decision.apply(body) else {
            return Reply::forbidden();
        };

        // 새 ID는 저장소가 발급
        record.remove(PRIMARY_KEY);
        if let Some((field, id)) = owner {
            record.insert(field.to_string(), id.to_value());
        }
        let id = store.insert(resource.table(), record);
        tracing::info!(%resource, %id, requester = %requester.id, "record created");

        Reply::created(json!({
            PRIMARY_KEY: id.to_value(),
            "created": true,
            "link": self_link(resource, &id),
        }))
    }

    /// 인스턴스 수정
    ///
    /// 허용된 필드만 남긴 뒤 경로의 ID를 덮어써서 저장합니다.
    pub fn update<S>(
        &self,
        store: &mut S,
        requester: Option<&Requester>,
        resource: Resource,
        id: &Identifier,
        body: &Value,
    ) -> Reply
    where
        S: RecordStore + ?Sized,
    {
        let Some(requester) = requester else {
            return Reply::unauthorized();
        };
        if !body.is_object() {
            return Reply::bad_request();
        }
        let Some(row) = store.get(resource.table(), id) else {
            return Reply::not_found();
        };

        let subject = ownership_subject(resource, &row);
        let decision = self
            .evaluator
            .evaluate(requester, Action::Update, resource, Some(&subject));
        let Some(Value::Object(mut changes)) = decision.apply(body) else {
            return Reply::forbidden();
        };

        // 소유자는 수정으로 바뀌지 않음
        if let Some(field) = resource.owner_field() {
            changes.remove(field);
        }
        changes.insert(PRIMARY_KEY.to_string(), id.to_value());
        if !store.update(resource.table(), id, changes) {
            return Reply::not_found();
        }
        tracing::info!(%resource, %id, requester = %requester.id, "record updated");

        Reply::ok(json!({
            PRIMARY_KEY: id.to_value(),
            "updated": true,
            "link": self_link(resource, id),
        }))
    }

    /// 인스턴스 삭제
    pub fn delete<S>(
        &self,
        store: &mut S,
        requester: Option<&Requester>,
        resource: Resource,
        id: &Identifier,
    ) -> Reply
    where
        S: RecordStore + ?Sized,
    {
        let Some(requester) = requester else {
            return Reply::unauthorized();
        };
        let Some(row) = store.get(resource.table(), id) else {
            return Reply::not_found();
        };

        let subject = ownership_subject(resource, &row);
        let decision = self
            .evaluator
            .evaluate(requester, Action::Delete, resource, Some(&subject));
        if !decision.granted() {
            return Reply::forbidden();
        }

        if !store.remove(resource.table(), id) {
            return Reply::not_found();
        }
        tracing::info!(%resource, %id, requester = %requester.id, "record deleted");

        Reply::ok(json!({ PRIMARY_KEY: id.to_value(), "deleted": true }))
    }
}

/// 소유권 조건의 평가 대상
///
/// 소유자 컬럼이 비어 있으면 `ID` 없는 대상이 되어 조건부 grant는 충족되지
/// 않습니다.
fn ownership_subject(resource: Resource, row: &Map<String, Value>) -> Value {
    let Some(field) = resource.owner_field() else {
        return Value::Object(row.clone());
    };
    let mut subject = Map::new();
    if let Some(owner) = row.get(field) {
        subject.insert(PRIMARY_KEY.to_string(), owner.clone());
    }
    Value::Object(subject)
}

/// 리소스 self-link
pub fn self_link(resource: Resource, id: &Identifier) -> String {
    format!("{}/{}", resource.route_prefix(), id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{GrantRecord, PolicyStore};

    fn store() -> PolicyStore {
        PolicyStore::new(vec![
            GrantRecord::new("user", "read", "dog").with_fields(["name"]),
            GrantRecord::new("user", "add", "dog").with_fields(["name", "breed"]),
            GrantRecord::new("staff", "read", "dog"),
        ])
        .unwrap()
    }

    fn records() -> MemoryRecords {
        MemoryRecords::new()
            .with_row("dogs", json!({"ID": 1, "name": "Rex", "breed": "Collie", "chip": "A1"}))
            .with_row("dogs", json!({"ID": 2, "name": "Bo", "breed": "Pug", "chip": "B2"}))
    }

    #[test]
    fn test_missing_requester_is_unauthorized() {
        let policy = store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let records = records();

        let reply = gate.read_one(&records, None, Resource::Dog, &Identifier::from(1));
        assert_eq!(reply, Reply::unauthorized());
    }

    #[test]
    fn test_read_one_filters_row() {
        let policy = store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let records = records();
        let user = Requester::new(5, "user");

        let reply = gate.read_one(&records, Some(&user), Resource::Dog, &Identifier::from(1));
        assert_eq!(reply, Reply::ok(json!({"ID": 1, "name": "Rex"})));

        let reply = gate.read_one(&records, Some(&user), Resource::Dog, &Identifier::from(9));
        assert_eq!(reply, Reply::not_found());
    }

    #[test]
    fn test_read_all_requires_plural_grant() {
        let policy = store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let records = records();

        let staff = Requester::new(3, "staff");
        let reply = gate.read_all(&records, Some(&staff), Resource::Users);
        assert_eq!(reply, Reply::forbidden());
        assert_eq!(reply.body, None);
    }

    #[test]
    fn test_add_strips_fields_and_client_id() {
        let policy = store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let mut records = records();
        let user = Requester::new(5, "user");

        let reply = gate.add(
            &mut records,
            Some(&user),
            Resource::Dog,
            None,
            &json!({"ID": 1, "name": "Fido", "breed": "Lab", "chip": "Z9"}),
        );
        assert_eq!(
            reply,
            Reply::created(json!({"ID": 3, "created": true, "link": "/api/v1/dogs/3"}))
        );
        assert_eq!(
            records.get("dogs", &Identifier::from(3)),
            json!({"ID": 3, "name": "Fido", "breed": "Lab"}).as_object().cloned()
        );
        // 기존 row는 그대로
        assert_eq!(
            records.get("dogs", &Identifier::from(1)).unwrap()["name"],
            json!("Rex")
        );
    }

    #[test]
    fn test_non_object_body_is_bad_request() {
        let policy = store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let mut records = records();
        let user = Requester::new(5, "user");

        let reply = gate.add(&mut records, Some(&user), Resource::Dog, None, &json!(["Fido"]));
        assert_eq!(reply, Reply::bad_request());
    }

    fn favourites_store() -> PolicyStore {
        PolicyStore::new(vec![
            GrantRecord::new("user", "read", "favourites").when_owner("EQUALS"),
            GrantRecord::new("user", "add", "favourites").when_owner("EQUALS"),
            GrantRecord::new("user", "update", "favourites").when_owner("EQUALS"),
            GrantRecord::new("user", "delete", "favourites").when_owner("EQUALS"),
        ])
        .unwrap()
    }

    fn favourites() -> MemoryRecords {
        MemoryRecords::new()
            .with_row("favourites", json!({"ID": 1, "userID": 2, "dogID": 7}))
            .with_row("favourites", json!({"ID": 2, "userID": 5, "dogID": 3}))
    }

    #[test]
    fn test_owner_column_decides_ownership() {
        let policy = favourites_store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let mut records = favourites();
        let owner = Requester::new(5, "user");
        // 즐겨찾기 row ID와 같은 사용자 ID
        let stranger = Requester::new(2, "user");
        let id = Identifier::from(2);

        let reply = gate.read_one(&records, Some(&stranger), Resource::Favourites, &id);
        assert_eq!(reply, Reply::forbidden());
        let reply = gate.read_one(&records, Some(&owner), Resource::Favourites, &id);
        assert_eq!(reply, Reply::ok(json!({"ID": 2, "userID": 5, "dogID": 3})));

        let reply = gate.delete(&mut records, Some(&stranger), Resource::Favourites, &id);
        assert_eq!(reply, Reply::forbidden());
        assert!(records.get("favourites", &id).is_some());

        let reply = gate.delete(&mut records, Some(&owner), Resource::Favourites, &id);
        assert_eq!(reply, Reply::ok(json!({"ID": 2, "deleted": true})));
        assert!(records.get("favourites", &id).is_none());
    }

    #[test]
    fn test_add_takes_owner_from_scope() {
        let policy = favourites_store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let mut records = favourites();
        let user = Requester::new(21, "user");

        let reply = gate.add(
            &mut records,
            Some(&user),
            Resource::Favourites,
            Some(&json!({"ID": 21})),
            &json!({"userID": 1, "dogID": 3}),
        );
        assert_eq!(reply.status, 201);
        assert_eq!(
            records.get("favourites", &Identifier::from(3)),
            json!({"ID": 3, "userID": 21, "dogID": 3}).as_object().cloned()
        );

        // 다른 사용자의 scope는 거부
        let reply = gate.add(
            &mut records,
            Some(&user),
            Resource::Favourites,
            Some(&json!({"ID": 1})),
            &json!({"userID": 1, "dogID": 3}),
        );
        assert_eq!(reply, Reply::forbidden());

        let reply = gate.add(
            &mut records,
            Some(&user),
            Resource::Favourites,
            None,
            &json!({"userID": 21, "dogID": 3}),
        );
        assert_eq!(reply, Reply::bad_request());
        assert_eq!(records.list("favourites").len(), 3);
    }

    #[test]
    fn test_update_keeps_owner() {
        let policy = favourites_store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let mut records = favourites();
        let owner = Requester::new(5, "user");
        let id = Identifier::from(2);

        let reply = gate.update(
            &mut records,
            Some(&owner),
            Resource::Favourites,
            &id,
            &json!({"userID": 1, "dogID": 9}),
        );
        assert_eq!(reply.status, 200);
        assert_eq!(
            records.get("favourites", &id),
            json!({"ID": 2, "userID": 5, "dogID": 9}).as_object().cloned()
        );
    }

    #[test]
    fn test_read_all_returns_owned_rows_for_conditional_grant() {
        let policy = favourites_store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let records = favourites();

        let reply = gate.read_all(&records, Some(&Requester::new(5, "user")), Resource::Favourites);
        assert_eq!(reply, Reply::ok(json!([{"ID": 2, "userID": 5, "dogID": 3}])));

        let reply = gate.read_all(&records, Some(&Requester::new(8, "user")), Resource::Favourites);
        assert_eq!(reply, Reply::ok(json!([])));

        let reply = gate.read_all(&records, Some(&Requester::new(5, "staff")), Resource::Favourites);
        assert_eq!(reply, Reply::forbidden());
    }

    #[test]
    fn test_denied_delete_leaves_row() {
        let policy = store();
        let gate = Gate::new(AccessEvaluator::new(&policy));
        let mut records = records();
        let user = Requester::new(5, "user");

        let reply = gate.delete(&mut records, Some(&user), Resource::Dog, &Identifier::from(2));
        assert_eq!(reply, Reply::forbidden());
        assert!(records.get("dogs", &Identifier::from(2)).is_some());
    }
}
