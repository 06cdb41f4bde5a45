// 该文件是 SafeAR （安视） 项目的一部分。
// src/input/directory.rs - 目录帧序列输入
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

use std::collections::VecDeque;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, url_file_path};

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "b64", "txt"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐个读取目录中的帧文件
pub struct DirectoryInput {
  files: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    let directory = PathBuf::from(url_file_path(url));
    let mut files = std::fs::read_dir(&directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| {
        path.is_file()
          && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
      })
      .collect::<Vec<_>>();
    files.sort();

    info!("目录 {} 中共有 {} 个帧文件", directory.display(), files.len());
    Ok(DirectoryInput {
      files: files.into(),
    })
  }
}

impl Iterator for DirectoryInput {
  type Item = Vec<u8>;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.files.pop_front() {
      match std::fs::read(&path) {
        Ok(bytes) => {
          debug!("读取帧文件: {}", path.display());
          return Some(bytes);
        }
        Err(e) => error!("读取帧文件 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yields_frame_files_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.png"), b"second").unwrap();
    std::fs::write(dir.path().join("a.JPG"), b"first").unwrap();
    std::fs::write(dir.path().join("c.b64"), b"third").unwrap();
    std::fs::write(dir.path().join("notes.md"), b"skip").unwrap();

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let frames: Vec<_> = DirectoryInput::from_url(&url).unwrap().collect();
    assert_eq!(frames, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
  }
}
