// 该文件是 SafeAR （安视） 项目的一部分。
// src/input/base64_file.rs - Base64 文本文件输入
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, codec::pad_base64, url_file_path};

#[derive(Error, Debug)]
pub enum Base64FileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 读取保存 Base64 图像文本的文件，并补齐填充
pub struct Base64FileInput {
  text: Option<String>,
}

impl FromUrlWithScheme for Base64FileInput {
  const SCHEME: &'static str = "base64";
}

impl FromUrl for Base64FileInput {
  type Error = Base64FileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Base64FileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = url_file_path(url);
    let text = std::fs::read_to_string(&path)?;
    info!("读取 Base64 文件: {} ({} 字符)", path, text.len());

    Ok(Base64FileInput {
      text: Some(pad_base64(text.trim())),
    })
  }
}

impl Iterator for Base64FileInput {
  type Item = Vec<u8>;

  fn next(&mut self) -> Option<Self::Item> {
    self.text.take().map(String::into_bytes)
  }
}
