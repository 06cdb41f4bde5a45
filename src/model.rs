// 该文件是 SafeAR （安视） 项目的一部分。
// src/model.rs - 分割模型接口与检测结果
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Mask, RgbNhwcFrame},
};

/// 外部分割模型
///
/// 输出的 `boxes` 每条记录至少六个字段，`[x_min, y_min, x_max, y_max, score, class_id, ..]`，
/// `masks` 与 `boxes` 一一对应。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

pub const BOX_CLASS_FIELD: usize = 5;
pub const BOX_SCORE_FIELD: usize = 4;
pub const BOX_MIN_FIELDS: usize = 6;

/// 模型原始输出
#[derive(Debug, Clone, Default)]
pub struct RawSegmentation {
  pub boxes: Vec<Vec<f32>>,
  pub masks: Vec<Mask>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [u32; 4], // [x_min, y_min, x_max, y_max)，右下角不含
  pub mask: Mask,
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

/// 仅检测模式下的输出记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
  pub class_id: u32,
  #[serde(default)]
  pub score: f32,
  pub bbox: [u32; 4],
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mask: Option<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedObjectReport {
  #[serde(default)]
  pub width: usize,
  #[serde(default)]
  pub height: usize,
  pub objects: Vec<DetectedObject>,
}

impl DetectedObjectReport {
  pub fn from_result(frame: &RgbNhwcFrame, result: &DetectResult) -> Self {
    let objects = result
      .iter()
      .map(|item| DetectedObject {
        class_id: item.class_id,
        score: item.score,
        bbox: item.bbox,
        mask: Some(
          (0..item.mask.height())
            .map(|y| {
              (0..item.mask.width())
                .map(|x| item.mask.get(x, y) as u8)
                .collect()
            })
            .collect(),
        ),
      })
      .collect();

    Self {
      width: frame.width(),
      height: frame.height(),
      objects,
    }
  }
}

#[derive(Error, Debug)]
pub enum DetectionError {
  #[error("模型推理失败: {0}")]
  Backend(Box<dyn std::error::Error + Send + Sync + 'static>),
  #[error("第 {index} 个检测框格式错误: {reason}")]
  MalformedBox { index: usize, reason: String },
  #[error("检测框数量 {boxes} 与掩码数量 {masks} 不一致")]
  CountMismatch { boxes: usize, masks: usize },
}

fn normalize_box(index: usize, record: &[f32]) -> Result<(u32, f32, [u32; 4]), DetectionError> {
  if record.len() < BOX_MIN_FIELDS {
    return Err(DetectionError::MalformedBox {
      index,
      reason: format!("至少需要 {} 个字段, 实际 {} 个", BOX_MIN_FIELDS, record.len()),
    });
  }

  if record[..BOX_MIN_FIELDS].iter().any(|v| !v.is_finite()) {
    return Err(DetectionError::MalformedBox {
      index,
      reason: "包含非有限数值".to_string(),
    });
  }

  let class_field = record[BOX_CLASS_FIELD];
  if class_field < 0.0 {
    return Err(DetectionError::MalformedBox {
      index,
      reason: format!("类别编号为负: {}", class_field),
    });
  }

  let bbox = [
    record[0].floor().max(0.0) as u32,
    record[1].floor().max(0.0) as u32,
    record[2].ceil().max(0.0) as u32,
    record[3].ceil().max(0.0) as u32,
  ];

  Ok((class_field as u32, record[BOX_SCORE_FIELD], bbox))
}

/// 调用外部模型并把输出规整为检测列表
///
/// 不做过滤、NMS 或类别筛选，顺序与模型输出一致。
pub fn detect<M, E>(model: &M, frame: &RgbNhwcFrame) -> Result<DetectResult, DetectionError>
where
  M: Model<Input = RgbNhwcFrame, Output = RawSegmentation, Error = E> + ?Sized,
  E: std::error::Error + Send + Sync + 'static,
{
  debug!("执行模型推理: {}x{}", frame.width(), frame.height());
  let RawSegmentation { boxes, masks } = model.infer(frame).map_err(|e| {
    error!("模型推理失败: {}", e);
    DetectionError::Backend(Box::new(e))
  })?;

  if boxes.is_empty() || masks.is_empty() {
    debug!("模型未检测到任何物体");
    return Ok(DetectResult::default());
  }

  if boxes.len() != masks.len() {
    return Err(DetectionError::CountMismatch {
      boxes: boxes.len(),
      masks: masks.len(),
    });
  }

  let items = boxes
    .iter()
    .zip(masks)
    .enumerate()
    .map(|(index, (record, mask))| {
      let (class_id, score, bbox) = normalize_box(index, record)?;
      Ok(Detection {
        class_id,
        score,
        bbox,
        mask,
      })
    })
    .collect::<Result<Vec<_>, DetectionError>>()?;

  debug!("检测到 {} 个物体", items.len());
  Ok(DetectResult {
    items: items.into_boxed_slice(),
  })
}

mod record;
pub use self::record::{RecordSegmenterError, RecordedSegmenter};

mod registry;
pub use self::registry::{ModelRegistry, RegistryError};

#[derive(Error, Debug)]
pub enum SegmenterError {
  #[error("回放模型错误: {0}")]
  Record(#[from] RecordSegmenterError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的模型后端
#[derive(Debug)]
pub enum SegmenterWrapper {
  Recorded(RecordedSegmenter),
}

impl FromUrl for SegmenterWrapper {
  type Error = SegmenterError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      RecordedSegmenter::SCHEME => Ok(SegmenterWrapper::Recorded(RecordedSegmenter::from_url(url)?)),
      other => Err(SegmenterError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Model for SegmenterWrapper {
  type Input = RgbNhwcFrame;
  type Output = RawSegmentation;
  type Error = SegmenterError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      SegmenterWrapper::Recorded(model) => model.infer(input).map_err(SegmenterError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct FixedModel(RawSegmentation);

  #[derive(Error, Debug)]
  #[error("后端不可用")]
  struct Unavailable;

  impl Model for FixedModel {
    type Input = RgbNhwcFrame;
    type Output = RawSegmentation;
    type Error = Unavailable;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Ok(self.0.clone())
    }
  }

  struct BrokenModel;

  impl Model for BrokenModel {
    type Input = RgbNhwcFrame;
    type Output = RawSegmentation;
    type Error = Unavailable;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Err(Unavailable)
    }
  }

  fn frame() -> RgbNhwcFrame {
    RgbNhwcFrame::with_shape(4, 4)
  }

  #[test]
  fn empty_output_is_not_an_error() {
    let model = FixedModel(RawSegmentation::default());
    let result = detect(&model, &frame()).unwrap();
    assert!(result.is_empty());
  }

  #[test]
  fn boxes_without_masks_mean_nothing_found() {
    let model = FixedModel(RawSegmentation {
      boxes: vec![vec![0.0, 0.0, 2.0, 2.0, 0.9, 1.0]],
      masks: vec![],
    });
    assert!(detect(&model, &frame()).unwrap().is_empty());
  }

  #[test]
  fn class_id_comes_from_sixth_field() {
    let model = FixedModel(RawSegmentation {
      boxes: vec![
        vec![0.2, 0.0, 1.5, 2.0, 0.9, 3.0],
        vec![1.0, 1.0, 4.0, 4.0, 0.5, 0.0, 42.0],
      ],
      masks: vec![Mask::empty(4, 4), Mask::empty(4, 4)],
    });
    let result = detect(&model, &frame()).unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result.items[0].class_id, 3);
    assert_eq!(result.items[0].bbox, [0, 0, 2, 2]);
    assert_eq!(result.items[1].class_id, 0);
    assert_eq!(result.items[1].bbox, [1, 1, 4, 4]);
  }

  #[test]
  fn mask_geometry_is_passed_through() {
    let model = FixedModel(RawSegmentation {
      boxes: vec![vec![0.0, 0.0, 3.0, 3.0, 0.9, 1.0]],
      masks: vec![Mask::empty(3, 3)],
    });
    let result = detect(&model, &frame()).unwrap();
    assert_eq!(result.items[0].mask.width(), 3);
  }

  #[test]
  fn short_box_record_is_rejected() {
    let model = FixedModel(RawSegmentation {
      boxes: vec![vec![0.0, 0.0, 2.0, 2.0, 0.9]],
      masks: vec![Mask::empty(4, 4)],
    });
    assert!(matches!(
      detect(&model, &frame()),
      Err(DetectionError::MalformedBox { index: 0, .. })
    ));
  }

  #[test]
  fn count_mismatch_is_rejected() {
    let model = FixedModel(RawSegmentation {
      boxes: vec![vec![0.0, 0.0, 2.0, 2.0, 0.9, 1.0]; 2],
      masks: vec![Mask::empty(4, 4)],
    });
    assert!(matches!(
      detect(&model, &frame()),
      Err(DetectionError::CountMismatch { boxes: 2, masks: 1 })
    ));
  }

  #[test]
  fn backend_failure_propagates() {
    assert!(matches!(
      detect(&BrokenModel, &frame()),
      Err(DetectionError::Backend(_))
    ));
  }
}
