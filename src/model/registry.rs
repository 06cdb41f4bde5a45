// 该文件是 SafeAR （安视） 项目的一部分。
// src/model/registry.rs - 模型注册表
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrlWithScheme, model::RecordedSegmenter};

#[derive(Error, Debug)]
pub enum RegistryError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件格式错误: {0}")]
  YamlError(#[from] serde_yaml::Error),
  #[error("模型条目 '{name}' 无效: {reason}")]
  InvalidEntry { name: String, reason: String },
  #[error("模型编号 {index} 超出范围, 共有 {available} 个模型")]
  IndexOutOfRange { index: usize, available: usize },
  #[error("模型路径无效: {0}")]
  UrlError(#[from] url::ParseError),
}

#[derive(Deserialize)]
struct RegistryFile {
  models: serde_yaml::Mapping,
}

#[derive(Deserialize)]
struct ModelEntry {
  model_path: String,
}

/// 模型注册表
///
/// 配置文件中 `models` 的书写顺序即模型编号，编号 0 为默认模型。
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
  base_dir: PathBuf,
  entries: Vec<(String, String)>,
}

impl ModelRegistry {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
    let path = path.as_ref();
    info!("加载模型注册表: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Self::from_yaml_str(&text, base_dir)
  }

  pub fn from_yaml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, RegistryError> {
    let file: RegistryFile = serde_yaml::from_str(text)?;

    let mut entries = Vec::with_capacity(file.models.len());
    for (key, value) in file.models {
      let name = key
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RegistryError::InvalidEntry {
          name: format!("{:?}", key),
          reason: "模型名称必须为字符串".to_string(),
        })?;
      let entry: ModelEntry =
        serde_yaml::from_value(value).map_err(|e| RegistryError::InvalidEntry {
          name: name.clone(),
          reason: e.to_string(),
        })?;
      debug!("注册模型 {}: {} -> {}", entries.len(), name, entry.model_path);
      entries.push((name, entry.model_path));
    }

    Ok(Self {
      base_dir: base_dir.into(),
      entries,
    })
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn list_models(&self) -> Vec<&str> {
    self.entries.iter().map(|(name, _)| name.as_str()).collect()
  }

  pub fn model_name(&self, index: usize) -> Result<&str, RegistryError> {
    self
      .entries
      .get(index)
      .map(|(name, _)| name.as_str())
      .ok_or(RegistryError::IndexOutOfRange {
        index,
        available: self.entries.len(),
      })
  }

  /// 模型地址；没有 URL 方案的路径视为检测记录文件，相对路径以配置文件所在目录为基准
  pub fn model_url(&self, index: usize) -> Result<Url, RegistryError> {
    let (_, model_path) = self.entries.get(index).ok_or(RegistryError::IndexOutOfRange {
      index,
      available: self.entries.len(),
    })?;

    match Url::parse(model_path) {
      Ok(url) => Ok(url),
      Err(url::ParseError::RelativeUrlWithoutBase) => {
        let path = self.base_dir.join(model_path);
        let path = std::path::absolute(&path).unwrap_or(path);
        Ok(Url::parse(&format!(
          "{}://{}",
          RecordedSegmenter::SCHEME,
          path.display()
        ))?)
      }
      Err(e) => Err(e.into()),
    }
  }
}
