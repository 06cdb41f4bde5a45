// 该文件是 SafeAR （安视） 项目的一部分。
// src/output/raw_bytes.rs - 原始像素字节输出
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

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, service::ServiceOutput, url_file_path};

#[derive(Error, Debug)]
pub enum RawBytesOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 写出混淆后帧的原始字节（`?base64` 时写 Base64 文本）；仅检测模式写 JSON 记录
pub struct RawBytesOutput {
  path: String,
  base64: bool,
}

impl FromUrlWithScheme for RawBytesOutput {
  const SCHEME: &'static str = "raw";
}

impl FromUrl for RawBytesOutput {
  type Error = RawBytesOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(RawBytesOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(RawBytesOutput {
      path: url_file_path(uri),
      base64: uri.query_pairs().any(|(k, _)| k == "base64"),
    })
  }
}

impl Render<ServiceOutput> for RawBytesOutput {
  type Error = RawBytesOutputError;

  fn render_result(&self, result: &ServiceOutput) -> Result<(), Self::Error> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let bytes = match result {
      ServiceOutput::Obfuscated(processed) => {
        let raw = processed.to_bytes();
        if self.base64 {
          STANDARD.encode(&raw).into_bytes()
        } else {
          raw
        }
      }
      ServiceOutput::Detected { report, .. } => serde_json::to_vec_pretty(report)?,
    };

    std::fs::write(&self.path, &bytes)?;
    info!("写出 {} 字节到文件: {}", bytes.len(), self.path);
    Ok(())
  }
}
