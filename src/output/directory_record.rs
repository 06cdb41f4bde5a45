// 该文件是 SafeAR （安视） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, draw::to_rgb_image},
  service::{DetectedObject, DetectedObjectReport, ServiceOutput},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期分目录保存每帧图像与检测记录
///
/// 默认只保存有检测结果的帧，`?always` 时保存全部帧。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url_file_path(uri)),
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, std::io::Error> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

/// 混淆模式下只记录检测框，不记录掩码
fn summary_report(result: &ServiceOutput) -> DetectedObjectReport {
  match result {
    ServiceOutput::Detected { report, .. } => report.clone(),
    ServiceOutput::Obfuscated(processed) => DetectedObjectReport {
      width: processed.frame.width(),
      height: processed.frame.height(),
      objects: processed
        .detections
        .iter()
        .map(|item| DetectedObject {
          class_id: item.class_id,
          score: item.score,
          bbox: item.bbox,
          mask: None,
        })
        .collect(),
    },
  }
}

impl Render<ServiceOutput> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, result: &ServiceOutput) -> Result<(), Self::Error> {
    if !self.always && result.detection_count() == 0 {
      return Ok(());
    }

    let path = self.frame_path()?;
    to_rgb_image(result).save(&path)?;
    std::fs::write(
      path.with_extension("json"),
      serde_json::to_vec_pretty(&summary_report(result))?,
    )?;
    debug!("记录帧: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::RgbNhwcFrame, model::DetectResult, service::ProcessedFrame};

  fn empty_result() -> ServiceOutput {
    ServiceOutput::Obfuscated(ProcessedFrame {
      frame: RgbNhwcFrame::with_shape(2, 2),
      detections: DetectResult::default(),
    })
  }

  fn count_files(dir: &std::path::Path) -> usize {
    let mut count = 0;
    for entry in std::fs::read_dir(dir).unwrap().flatten() {
      let path = entry.path();
      if path.is_dir() {
        count += count_files(&path);
      } else {
        count += 1;
      }
    }
    count
  }

  #[test]
  fn skips_frames_without_detections() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&empty_result()).unwrap();
    assert_eq!(count_files(dir.path()), 0);
  }

  #[test]
  fn always_records_image_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?always", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&empty_result()).unwrap();
    output.render_result(&empty_result()).unwrap();
    assert_eq!(count_files(dir.path()), 4);
  }
}
