use parking_lot::Mutex;

use super::{non_empty, SecretError, SecretStore};

/// プロセス内だけで保持するシークレットストア（テスト・一時実行用）
///
/// `fail_writes` を立てるとキーチェーン障害を再現できる。
#[derive(Default)]
pub struct MemorySecretStore {
    value: Mutex<Option<String>>,
    fail_writes: Mutex<bool>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: &str) -> Self {
        Self {
            value: Mutex::new(Some(value.to_string())),
            fail_writes: Mutex::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self) -> Option<String> {
        self.value.lock().clone().and_then(non_empty)
    }

    fn set(&self, value: &str) -> Result<(), SecretError> {
        if *self.fail_writes.lock() {
            return Err(SecretError::Write("simulated keychain failure".to_string()));
        }
        *self.value.lock() = Some(value.to_string());
        Ok(())
    }

    fn delete(&self) -> Result<(), SecretError> {
        if *self.fail_writes.lock() {
            return Err(SecretError::Delete("simulated keychain failure".to_string()));
        }
        *self.value.lock() = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
