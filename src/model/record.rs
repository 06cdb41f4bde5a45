// 该文件是 SafeAR （安视） 项目的一部分。
// src/model/record.rs - 检测记录回放模型
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Mask, RgbNhwcFrame},
  model::{DetectedObjectReport, Model, RawSegmentation},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum RecordSegmenterError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录文件格式错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("第 {0} 个掩码的行长度不一致")]
  RaggedMask(usize),
}

/// 回放预先记录的检测结果
///
/// 记录文件与仅检测模式输出的 JSON 格式相同，对每一帧返回同一组检测。
/// 缺省掩码时使用检测框对应的矩形区域。
#[derive(Debug, Clone)]
pub struct RecordedSegmenter {
  record: DetectedObjectReport,
  masks: Vec<Option<Mask>>,
}

impl FromUrlWithScheme for RecordedSegmenter {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordedSegmenter {
  type Error = RecordSegmenterError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordSegmenterError::SchemeMismatch(format!(
        "期望方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let path = url_file_path(url);
    info!("加载检测记录文件: {}", path);
    let text = std::fs::read_to_string(&path)?;
    Self::from_json(&text)
  }
}

impl RecordedSegmenter {
  pub fn from_json(text: &str) -> Result<Self, RecordSegmenterError> {
    let record: DetectedObjectReport = serde_json::from_str(text)?;
    Self::from_report(record)
  }

  pub fn from_report(record: DetectedObjectReport) -> Result<Self, RecordSegmenterError> {
    let masks = record
      .objects
      .iter()
      .enumerate()
      .map(|(index, object)| match &object.mask {
        None => Ok(None),
        Some(rows) => {
          let height = rows.len();
          let width = rows.first().map(Vec::len).unwrap_or(0);
          if rows.iter().any(|row| row.len() != width) {
            return Err(RecordSegmenterError::RaggedMask(index));
          }
          let data = rows.iter().flatten().map(|v| *v != 0).collect();
          Mask::from_raw(height, width, data)
            .map(Some)
            .map_err(|_| RecordSegmenterError::RaggedMask(index))
        }
      })
      .collect::<Result<Vec<_>, _>>()?;

    debug!("检测记录包含 {} 个物体", record.objects.len());
    Ok(Self { record, masks })
  }
}

impl Model for RecordedSegmenter {
  type Input = RgbNhwcFrame;
  type Output = RawSegmentation;
  type Error = RecordSegmenterError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let mut output = RawSegmentation::default();

    for (object, mask) in self.record.objects.iter().zip(&self.masks) {
      let [x_min, y_min, x_max, y_max] = object.bbox;
      output.boxes.push(vec![
        x_min as f32,
        y_min as f32,
        x_max as f32,
        y_max as f32,
        object.score,
        object.class_id as f32,
      ]);

      let mask = match mask {
        Some(mask) => mask.clone(),
        None => Mask::from_fn(input.height(), input.width(), |x, y| {
          (x_min as usize..x_max as usize).contains(&x) && (y_min as usize..y_max as usize).contains(&y)
        }),
      };
      output.masks.push(mask);
    }

    Ok(output)
  }
}
