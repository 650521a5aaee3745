use keyring::Entry;

use super::{non_empty, SecretError, SecretStore, SECRET_ACCOUNT, SECRET_SERVICE};

/// OS のキーチェーン（macOS Keychain / Windows Credential Manager / Linux Secret Service）
///
/// Linux では keyutils をキャッシュとして使い、Secret Service 側に永続化する。
pub struct KeyringSecretStore {
    service: String,
    account: String,
}

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self::with_identity(SECRET_SERVICE, SECRET_ACCOUNT)
    }

    pub fn with_identity(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, SecretError> {
        Entry::new(&self.service, &self.account)
            .map_err(|e| SecretError::Backend(format!("Failed to create entry: {e}")))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self) -> Option<String> {
        let entry = match self.entry() {
            Ok(entry) => entry,
            Err(e) => {
                log::error!("キーチェーンからの API キー取得に失敗: {e}");
                return None;
            }
        };

        match entry.get_password() {
            Ok(value) => non_empty(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                log::error!("キーチェーンからの API キー取得に失敗: {e}");
                None
            }
        }
    }

    fn set(&self, value: &str) -> Result<(), SecretError> {
        self.entry()?
            .set_password(value)
            .map_err(|e| SecretError::Write(e.to_string()))?;
        log::info!("API キーをキーチェーンに保存しました");
        Ok(())
    }

    fn delete(&self) -> Result<(), SecretError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                log::info!("API キーをキーチェーンから削除しました");
                Ok(())
            }
            Err(e) => Err(SecretError::Delete(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // OS のキーチェーンに実際に書き込むので明示したときだけ走らせる
    #[test]
    #[ignore]
    fn test_value_survives_a_fresh_store() {
        let service = format!("{SECRET_SERVICE}.test.{}", std::process::id());
        let writer = KeyringSecretStore::with_identity(&service, SECRET_ACCOUNT);
        writer.set("persisted-key:fx").unwrap();

        let reader = KeyringSecretStore::with_identity(&service, SECRET_ACCOUNT);
        assert_eq!(reader.get().as_deref(), Some("persisted-key:fx"));

        reader.delete().unwrap();
        assert!(KeyringSecretStore::with_identity(&service, SECRET_ACCOUNT)
            .get()
            .is_none());
    }
}
