//! 配置文件读写
//!
//! 每个文件作为整体文档加载 / 保存；文件不存在时创建空文档。
//! 读-改-写由 ConfigStore 内部的互斥锁串行化，写入先落临时文件再 rename。

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::{AppError, StoreError};
use crate::store::definitions::{Entry, Inputs, ResearchConfigs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

/// 可存取的配置文档
pub trait Document: Serialize + DeserializeOwned + Default {
    fn file_name() -> &'static str;
    fn format() -> Format;
}

impl<E: Entry> Document for Vec<E> {
    fn file_name() -> &'static str {
        E::FILE
    }

    fn format() -> Format {
        Format::Yaml
    }
}

impl Document for Inputs {
    fn file_name() -> &'static str {
        "inputs.json"
    }

    fn format() -> Format {
        Format::Json
    }
}

impl Document for ResearchConfigs {
    fn file_name() -> &'static str {
        "smart_research.yaml"
    }

    fn format() -> Format {
        Format::Yaml
    }
}

/// 配置目录下全部文档的存取入口
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of<D: Document>(&self) -> PathBuf {
        self.dir.join(D::file_name())
    }

    /// 确保所有配置文件存在（启动时调用）
    pub fn ensure_files(&self) -> Result<(), StoreError> {
        self.load::<Vec<crate::store::AgentEntry>>()?;
        self.load::<Vec<crate::store::TaskEntry>>()?;
        self.load::<Vec<crate::store::CrewEntry>>()?;
        self.load::<Inputs>()?;
        self.load::<ResearchConfigs>()?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 加载整个文档；文件缺失时在写锁内写入空文档并返回默认值
    pub fn load<D: Document>(&self) -> Result<D, StoreError> {
        let path = self.path_of::<D>();
        if !path.exists() {
            let _guard = self.lock();
            return self.load_locked(&path);
        }
        self.read(&path)
    }

    /// 调用方须持有写锁
    fn load_locked<D: Document>(&self, path: &Path) -> Result<D, StoreError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, creating an empty one");
            let empty = D::default();
            self.write(path, &empty)?;
            return Ok(empty);
        }
        self.read(path)
    }

    fn read<D: Document>(&self, path: &Path) -> Result<D, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if text.trim().is_empty() {
            return Ok(D::default());
        }
        match D::format() {
            Format::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(&text).map_err(|e| StoreError::Yaml {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                if value.is_null() {
                    return Ok(D::default());
                }
                serde_yaml::from_value(value).map_err(|e| StoreError::Yaml {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
            Format::Json => serde_json::from_str(&text).map_err(|e| StoreError::Json {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// 在锁内完成 加载 → 修改 → 保存；闭包返回错误时不写盘
    pub fn update<D, R, F>(&self, f: F) -> Result<R, AppError>
    where
        D: Document,
        F: FnOnce(&mut D) -> Result<R, AppError>,
    {
        let _guard = self.lock();
        let path = self.path_of::<D>();
        let mut doc = self.load_locked::<D>(&path)?;
        let out = f(&mut doc)?;
        self.write(&path, &doc)?;
        Ok(out)
    }

    fn write<D: Document>(&self, path: &Path, doc: &D) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let text = match D::format() {
            Format::Yaml => serde_yaml::to_string(doc).map_err(|e| StoreError::Yaml {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            Format::Json => serde_json::to_string_pretty(doc).map_err(|e| StoreError::Json {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
        };
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, text).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        tracing::debug!(path = %path.display(), "config saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AgentDef, AgentEntry};

    fn agent(name: &str) -> AgentDef {
        AgentDef {
            name: name.to_string(),
            role: "r".into(),
            goal: "g".into(),
            backstory: "b".into(),
            delegate: false,
            tools: vec![],
        }
    }

    #[test]
    fn test_missing_files_are_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config"));
        store.ensure_files().unwrap();
        for f in ["agents.yaml", "tasks.yaml", "crews.yaml", "inputs.json", "smart_research.yaml"] {
            assert!(store.dir().join(f).exists(), "{} should exist", f);
        }
        let agents: Vec<AgentEntry> = store.load().unwrap();
        assert!(agents.is_empty());
        let research: ResearchConfigs = store.load().unwrap();
        assert!(research.configs.is_empty());
    }

    #[test]
    fn test_update_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store
            .update::<Vec<AgentEntry>, _, _>(|agents| {
                agents.push(AgentEntry::wrap(agent("a")));
                Ok(())
            })
            .unwrap();
        let agents: Vec<AgentEntry> = store.load().unwrap();
        assert_eq!(agents[0].inner.name, "a");
    }

    #[test]
    fn test_failed_update_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let res = store.update::<Inputs, (), _>(|inputs| {
            inputs.insert("k".into(), "v".into());
            Err(AppError::InvalidRequest("nope".into()))
        });
        assert!(res.is_err());
        let inputs: Inputs = store.load().unwrap();
        assert!(inputs.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("crews.yaml"), "- Crew: [unclosed").unwrap();
        let store = ConfigStore::new(dir.path());
        let res = store.load::<Vec<crate::store::CrewEntry>>();
        assert!(matches!(res, Err(StoreError::Yaml { .. })));
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(ConfigStore::new(dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .update::<Inputs, _, _>(|inputs| {
                            inputs.insert(format!("k{}", i), i.to_string());
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let inputs: Inputs = store.load().unwrap();
        assert_eq!(inputs.len(), 8);
    }

    #[test]
    fn test_first_load_does_not_clobber_concurrent_update() {
        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let store = std::sync::Arc::new(ConfigStore::new(dir.path()));
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = store.clone();
                    std::thread::spawn(move || {
                        if i % 2 == 0 {
                            store.load::<Inputs>().unwrap();
                        } else {
                            store
                                .update::<Inputs, _, _>(|inputs| {
                                    inputs.insert(format!("k{}", i), i.to_string());
                                    Ok(())
                                })
                                .unwrap();
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            let inputs: Inputs = store.load().unwrap();
            assert_eq!(inputs.len(), 4);
        }
    }
}
