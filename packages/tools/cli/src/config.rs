//! CLI 설정

use std::env;
use std::path::PathBuf;

use knl_core::permissions::PolicyStore;

/// CLI 설정
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// 정책 파일 경로 (None = 내장 정책)
    pub policy_file: Option<PathBuf>,

    /// 로그 필터
    pub log_filter: Option<String>,
}

impl CliConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Self {
        Self {
            policy_file: env::var("KNL_POLICY_FILE")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),

            log_filter: env::var("KNL_LOG").ok(),
        }
    }

    /// `--policy` 인자로 덮어쓰기
    pub fn with_policy_override(mut self, policy: Option<PathBuf>) -> Self {
        if policy.is_some() {
            self.policy_file = policy;
        }
        self
    }

    /// 정책 저장소 로드
    pub fn load_policy(&self) -> anyhow::Result<PolicyStore> {
        let store = match &self.policy_file {
            Some(path) => PolicyStore::from_yaml_file(path).map_err(|e| {
                anyhow::anyhow!("Failed to load policy from {}: {}", path.display(), e)
            })?,
            None => PolicyStore::builtin()?,
        };
        Ok(store)
    }

    /// 정책 출처 표시용 이름
    pub fn policy_source(&self) -> String {
        match &self.policy_file {
            Some(path) => path.display().to_string(),
            None => "<built-in>".to_string(),
        }
    }
}
