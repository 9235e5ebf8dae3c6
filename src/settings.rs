use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::PreloadExtensions;
use crate::error::{Result, StoreError};
use crate::storage::LockPolicy;

/// 预加载扩展名列表；`["*"]` 表示全部
pub const PRELOAD_SETTING: &str = "index.store.preload";
/// 锁策略：native | simple | none
pub const FS_LOCK_SETTING: &str = "index.store.fs.fs_lock";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingValue {
    Str(String),
    List(Vec<String>),
}

/// 扁平 key→value 配置；TOML 的嵌套表按点号展开。
///
/// ```toml
/// [index.store]
/// preload = ["dvd", "tim"]
/// fs.fs_lock = "simple"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl RawScalar {
    fn into_string(self) -> String {
        match self {
            RawScalar::Str(s) => s,
            RawScalar::Int(i) => i.to_string(),
            RawScalar::Float(f) => f.to_string(),
            RawScalar::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Scalar(RawScalar),
    List(Vec<RawScalar>),
    Table(BTreeMap<String, RawValue>),
}

fn flatten(
    prefix: &str,
    raw: BTreeMap<String, RawValue>,
    out: &mut BTreeMap<String, SettingValue>,
) {
    for (k, v) in raw {
        let key = if prefix.is_empty() {
            k
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            RawValue::Scalar(s) => {
                out.insert(key, SettingValue::Str(s.into_string()));
            }
            RawValue::List(items) => {
                let items = items.into_iter().map(RawScalar::into_string).collect();
                out.insert(key, SettingValue::List(items));
            }
            RawValue::Table(t) => flatten(&key, t, out),
        }
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawValue> =
            toml::from_str(s).map_err(|e| StoreError::InvalidSetting {
                key: "<toml>".to_string(),
                reason: e.to_string(),
            })?;
        let mut values = BTreeMap::new();
        flatten("", raw, &mut values);
        Ok(Self { values })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let settings = Self::from_toml_str(&text)?;
        tracing::debug!("loaded {} settings from {:?}", settings.len(), path);
        Ok(settings)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            SettingValue::Str(s) => Some(s.as_str()),
            SettingValue::List(_) => None,
        }
    }

    /// 列表值；字符串值按逗号切分。缺省为空。
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            None => Vec::new(),
            Some(SettingValue::List(v)) => v.clone(),
            Some(SettingValue::Str(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn preload_extensions(&self) -> PreloadExtensions {
        PreloadExtensions::new(self.get_list(PRELOAD_SETTING))
    }

    pub fn lock_policy(&self) -> Result<LockPolicy> {
        match self.get_str(FS_LOCK_SETTING) {
            None => Ok(LockPolicy::default()),
            Some(s) => s.parse(),
        }
    }

    /// 后者覆盖前者
    pub fn merged(mut self, other: Settings) -> Settings {
        self.values.extend(other.values);
        self
    }
}

#[derive(Default)]
pub struct SettingsBuilder {
    values: BTreeMap<String, SettingValue>,
}

impl SettingsBuilder {
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), SettingValue::Str(value.into()));
        self
    }

    pub fn put_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.values.insert(key.into(), SettingValue::List(values));
        self
    }

    pub fn build(self) -> Settings {
        Settings {
            values: self.values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty_preload_and_native_lock() {
        let s = Settings::default();
        assert!(s.preload_extensions().is_empty());
        assert_eq!(s.lock_policy().unwrap(), LockPolicy::Native);
    }

    #[test]
    fn nested_tables_flatten_to_dotted_keys() {
        let s = Settings::from_toml_str(
            r#"
            [index.store]
            preload = ["dvd", "tim"]
            fs.fs_lock = "simple"
            "#,
        )
        .unwrap();
        assert_eq!(
            s.get(PRELOAD_SETTING),
            Some(&SettingValue::List(vec!["dvd".into(), "tim".into()]))
        );
        assert_eq!(s.lock_policy().unwrap(), LockPolicy::Simple);
        let exts = s.preload_extensions();
        assert!(exts.contains("dvd") && exts.contains("tim"));
    }

    #[test]
    fn quoted_dotted_key_and_comma_string() {
        let s = Settings::from_toml_str(r#""index.store.preload" = "nvd, dvd,,""#).unwrap();
        assert_eq!(s.get_list(PRELOAD_SETTING), vec!["nvd", "dvd"]);
    }

    #[test]
    fn scalars_are_stringified() {
        let s = Settings::from_toml_str("a = 3\nb = true\nc = [1, \"x\"]").unwrap();
        assert_eq!(s.get_str("a"), Some("3"));
        assert_eq!(s.get_str("b"), Some("true"));
        assert_eq!(s.get_list("c"), vec!["1", "x"]);
        assert_eq!(s.get_str("c"), None);
    }

    #[test]
    fn bad_lock_and_bad_toml_are_invalid_setting() {
        let s = Settings::builder().put(FS_LOCK_SETTING, "posix").build();
        assert!(matches!(s.lock_policy(), Err(StoreError::InvalidSetting { .. })));
        assert!(matches!(
            Settings::from_toml_str("= nope"),
            Err(StoreError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn builder_and_merge() {
        let base = Settings::builder()
            .put_list(PRELOAD_SETTING, ["dvd"])
            .put(FS_LOCK_SETTING, "none")
            .build();
        let over = Settings::builder().put_list(PRELOAD_SETTING, ["*"]).build();
        let s = base.merged(over);
        assert!(s.preload_extensions().contains_wildcard());
        assert_eq!(s.lock_policy().unwrap(), LockPolicy::None);
        assert_eq!(s.len(), 2);
    }
}
