use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// オーバーレイ画面の種類（各種類につき最大1インスタンス）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Main,
    Settings,
    History,
    About,
}

impl SurfaceKind {
    pub const ALL: [SurfaceKind; 4] = [Self::Main, Self::Settings, Self::History, Self::About];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Settings => "settings",
            Self::History => "history",
            Self::About => "about",
        }
    }
}

/// 画面レジストリ
///
/// 種類ごとのインスタンスを保持し、必要になった時点で生成する。
pub struct SurfaceRegistry<S> {
    surfaces: HashMap<SurfaceKind, S>,
}

impl<S> SurfaceRegistry<S> {
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
        }
    }

    pub fn get(&self, kind: SurfaceKind) -> Option<&S> {
        self.surfaces.get(&kind)
    }

    pub fn get_mut(&mut self, kind: SurfaceKind) -> Option<&mut S> {
        self.surfaces.get_mut(&kind)
    }

    /// 既存インスタンスを返すか、なければ `create` で生成して登録する
    pub fn get_or_create<E>(
        &mut self,
        kind: SurfaceKind,
        create: impl FnOnce(SurfaceKind) -> Result<S, E>,
    ) -> Result<&mut S, E> {
        match self.surfaces.entry(kind) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(create(kind)?)),
        }
    }

    /// インスタンスを破棄する。登録されていれば取り出して返す
    pub fn destroy(&mut self, kind: SurfaceKind) -> Option<S> {
        self.surfaces.remove(&kind)
    }

    pub fn contains(&self, kind: SurfaceKind) -> bool {
        self.surfaces.contains_key(&kind)
    }

    /// 生存中の画面種別（固定順）
    pub fn live(&self) -> Vec<SurfaceKind> {
        SurfaceKind::ALL
            .into_iter()
            .filter(|k| self.surfaces.contains_key(k))
            .collect()
    }
}

impl<S> Default for SurfaceRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_creates_once() {
        let mut registry: SurfaceRegistry<u32> = SurfaceRegistry::new();
        let mut created = 0;

        for _ in 0..3 {
            let value = registry
                .get_or_create::<()>(SurfaceKind::Main, |_| {
                    created += 1;
                    Ok(7)
                })
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(created, 1);
        assert_eq!(registry.live(), vec![SurfaceKind::Main]);
    }

    #[test]
    fn test_failed_creation_registers_nothing() {
        let mut registry: SurfaceRegistry<u32> = SurfaceRegistry::new();
        let result = registry.get_or_create(SurfaceKind::About, |_| Err("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(!registry.contains(SurfaceKind::About));
    }

    #[test]
    fn test_destroy_then_recreate() {
        let mut registry: SurfaceRegistry<String> = SurfaceRegistry::new();
        registry
            .get_or_create::<()>(SurfaceKind::History, |k| Ok(k.as_str().to_string()))
            .unwrap();
        assert_eq!(registry.destroy(SurfaceKind::History).as_deref(), Some("history"));
        assert!(registry.destroy(SurfaceKind::History).is_none());

        registry
            .get_or_create::<()>(SurfaceKind::History, |_| Ok("again".to_string()))
            .unwrap();
        assert_eq!(registry.get(SurfaceKind::History).map(String::as_str), Some("again"));
    }
}
