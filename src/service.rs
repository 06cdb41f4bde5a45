// 该文件是 SafeAR （安视） 项目的一部分。
// src/service.rs - 帧处理服务
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

use std::panic::{AssertUnwindSafe, catch_unwind};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  codec::{DecodeError, FrameCodec},
  config::{ConfigurationError, ServiceConfig},
  frame::RgbNhwcFrame,
  model::{DetectResult, DetectionError, Model, ModelRegistry, RawSegmentation, detect},
  obfuscate::{ObfuscationEngine, ShapeMismatchError},
  policy::PolicySpec,
};

pub use crate::model::{DetectedObject, DetectedObjectReport};

#[derive(Error, Debug)]
pub enum ServiceError {
  #[error("配置错误: {0}")]
  Configuration(#[from] ConfigurationError),
  #[error("解码错误: {0}")]
  Decode(#[from] DecodeError),
  #[error("检测错误: {0}")]
  Detection(#[from] DetectionError),
  #[error("{0}")]
  ShapeMismatch(#[from] ShapeMismatchError),
  #[error("处理失败: {0}")]
  Processing(String),
}

/// 服务的两种工作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingMode {
  #[default]
  Obfuscate,
  DetectOnly,
}

/// 混淆模式的结果
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
  pub frame: RgbNhwcFrame,
  pub detections: DetectResult,
}

impl ProcessedFrame {
  /// 行优先、8 位通道的原始字节，长度为 W×H×C
  pub fn to_bytes(&self) -> Vec<u8> {
    FrameCodec::encode(&self.frame)
  }
}

#[derive(Debug, Clone)]
pub enum ServiceOutput {
  Obfuscated(ProcessedFrame),
  Detected {
    frame: RgbNhwcFrame,
    report: DetectedObjectReport,
  },
}

impl ServiceOutput {
  pub fn frame(&self) -> &RgbNhwcFrame {
    match self {
      ServiceOutput::Obfuscated(processed) => &processed.frame,
      ServiceOutput::Detected { frame, .. } => frame,
    }
  }

  pub fn detection_count(&self) -> usize {
    match self {
      ServiceOutput::Obfuscated(processed) => processed.detections.len(),
      ServiceOutput::Detected { report, .. } => report.objects.len(),
    }
  }
}

fn guard<T>(stage: &str, f: impl FnOnce() -> Result<T, ServiceError>) -> Result<T, ServiceError> {
  match catch_unwind(AssertUnwindSafe(f)) {
    Ok(result) => result,
    Err(payload) => {
      let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知错误".to_string());
      error!("{}阶段发生异常: {}", stage, message);
      Err(ServiceError::Processing(message))
    }
  }
}

pub struct FrameService;

impl FrameService {
  /// 单一入口：配置、解码、检测、混淆，返回原始像素字节
  pub fn process(
    registry: &ModelRegistry,
    encoded_frame: &[u8],
    model_number: usize,
    policy_spec: &PolicySpec,
  ) -> Result<Vec<u8>, ServiceError> {
    guard("处理", || {
      let config = ServiceConfig::configure(registry, model_number, policy_spec)?;
      info!("使用模型 {} 处理帧", config.model_name());
      Ok(Self::obfuscate(&config, encoded_frame)?.to_bytes())
    })
  }

  /// 混淆模式
  pub fn obfuscate<M, E>(
    config: &ServiceConfig<M>,
    encoded_frame: &[u8],
  ) -> Result<ProcessedFrame, ServiceError>
  where
    M: Model<Input = RgbNhwcFrame, Output = RawSegmentation, Error = E>,
    E: std::error::Error + Send + Sync + 'static,
  {
    guard("混淆", || {
      let frame = FrameCodec::decode(encoded_frame)?;
      debug!("解码完成: {}x{}", frame.width(), frame.height());

      let detections = detect(config.model(), &frame)?;
      if detections.is_empty() {
        info!("未检测到物体，返回原始帧");
        return Ok(ProcessedFrame { frame, detections });
      }

      info!("检测到 {} 个物体，开始混淆", detections.len());
      let frame = ObfuscationEngine::obfuscate(&frame, &detections.items, config.policy())?;
      Ok(ProcessedFrame { frame, detections })
    })
  }

  /// 仅检测模式：不修改像素，返回检测记录
  pub fn detect_only<M, E>(
    config: &ServiceConfig<M>,
    encoded_frame: &[u8],
  ) -> Result<(RgbNhwcFrame, DetectedObjectReport), ServiceError>
  where
    M: Model<Input = RgbNhwcFrame, Output = RawSegmentation, Error = E>,
    E: std::error::Error + Send + Sync + 'static,
  {
    guard("检测", || {
      let frame = FrameCodec::decode(encoded_frame)?;
      let detections = detect(config.model(), &frame)?;
      info!("检测到 {} 个物体", detections.len());
      let report = DetectedObjectReport::from_result(&frame, &detections);
      Ok((frame, report))
    })
  }
}

/// 绑定配置与工作模式的处理流水线
#[derive(Debug)]
pub struct FramePipeline<M> {
  config: ServiceConfig<M>,
  mode: OperatingMode,
}

impl<M> FramePipeline<M> {
  pub fn new(config: ServiceConfig<M>, mode: OperatingMode) -> Self {
    Self { config, mode }
  }

  pub fn mode(&self) -> OperatingMode {
    self.mode
  }
}

impl<M, E> Model for FramePipeline<M>
where
  M: Model<Input = RgbNhwcFrame, Output = RawSegmentation, Error = E>,
  E: std::error::Error + Send + Sync + 'static,
{
  type Input = Vec<u8>;
  type Output = ServiceOutput;
  type Error = ServiceError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self.mode {
      OperatingMode::Obfuscate => FrameService::obfuscate(&self.config, input).map(ServiceOutput::Obfuscated),
      OperatingMode::DetectOnly => FrameService::detect_only(&self.config, input)
        .map(|(frame, report)| ServiceOutput::Detected { frame, report }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::Mask,
    policy::{EffectSpec, ObfuscationPolicy},
  };
  use std::sync::Arc;

  #[derive(Error, Debug)]
  #[error("后端不可用")]
  struct Unavailable;

  struct StaticSegmenter(RawSegmentation);

  impl Model for StaticSegmenter {
    type Input = RgbNhwcFrame;
    type Output = RawSegmentation;
    type Error = Unavailable;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Ok(self.0.clone())
    }
  }

  struct PanickingSegmenter;

  impl Model for PanickingSegmenter {
    type Input = RgbNhwcFrame;
    type Output = RawSegmentation;
    type Error = Unavailable;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      panic!("推理崩溃")
    }
  }

  fn input_png() -> Vec<u8> {
    let frame = RgbNhwcFrame::from_raw(2, 2, (1..=12).collect()).unwrap();
    FrameCodec::encode_png(&frame).unwrap()
  }

  fn config<M>(model: M, policy: ObfuscationPolicy) -> ServiceConfig<M> {
    ServiceConfig::new("test", Arc::new(model), policy)
  }

  fn one_box(class_id: f32) -> RawSegmentation {
    RawSegmentation {
      boxes: vec![vec![0.0, 0.0, 1.0, 1.0, 0.9, class_id]],
      masks: vec![Mask::from_fn(2, 2, |x, y| x == 0 && y == 0)],
    }
  }

  #[test]
  fn no_detections_returns_decoded_frame() {
    let config = config(StaticSegmenter(RawSegmentation::default()), ObfuscationPolicy::default());
    let processed = FrameService::obfuscate(&config, &input_png()).unwrap();
    assert!(processed.detections.is_empty());
    assert_eq!(processed.to_bytes(), (1..=12).collect::<Vec<u8>>());
  }

  #[test]
  fn obfuscate_applies_policy() {
    let policy = ObfuscationPolicy::default().with(3, EffectSpec::SolidFill { color: [0, 0, 0] });
    let config = config(StaticSegmenter(one_box(3.0)), policy);
    let processed = FrameService::obfuscate(&config, &input_png()).unwrap();
    assert_eq!(processed.frame.pixel(0, 0), [0, 0, 0]);
    assert_eq!(processed.frame.pixel(1, 0), [4, 5, 6]);
  }

  #[test]
  fn detect_only_keeps_pixels() {
    let policy = ObfuscationPolicy::default().with(3, EffectSpec::SolidFill { color: [0, 0, 0] });
    let config = config(StaticSegmenter(one_box(3.0)), policy);
    let (frame, report) = FrameService::detect_only(&config, &input_png()).unwrap();
    assert_eq!(frame.pixel(0, 0), [1, 2, 3]);
    assert_eq!(report.objects.len(), 1);
    assert_eq!(report.objects[0].class_id, 3);
    assert_eq!(report.objects[0].bbox, [0, 0, 1, 1]);
    assert_eq!(report.objects[0].mask, Some(vec![vec![1, 0], vec![0, 0]]));
  }

  #[test]
  fn undecodable_input_is_decode_error() {
    let config = config(StaticSegmenter(RawSegmentation::default()), ObfuscationPolicy::default());
    assert!(matches!(
      FrameService::obfuscate(&config, b"not an image"),
      Err(ServiceError::Decode(_))
    ));
  }

  #[test]
  fn malformed_model_output_is_detection_error() {
    let config = config(StaticSegmenter(one_box(-1.0)), ObfuscationPolicy::default());
    assert!(matches!(
      FrameService::obfuscate(&config, &input_png()),
      Err(ServiceError::Detection(DetectionError::MalformedBox { index: 0, .. }))
    ));
  }

  #[test]
  fn panic_becomes_processing_error() {
    let config = config(PanickingSegmenter, ObfuscationPolicy::default());
    match FrameService::obfuscate(&config, &input_png()) {
      Err(ServiceError::Processing(message)) => assert!(message.contains("推理崩溃")),
      other => panic!("意外结果: {:?}", other.map(|p| p.detections.len())),
    }
  }

  #[test]
  fn pipeline_follows_mode() {
    let policy = ObfuscationPolicy::default().with(3, EffectSpec::SolidFill { color: [0, 0, 0] });
    let input = input_png();

    let pipeline = FramePipeline::new(config(StaticSegmenter(one_box(3.0)), policy.clone()), OperatingMode::Obfuscate);
    let output = pipeline.infer(&input).unwrap();
    assert!(matches!(output, ServiceOutput::Obfuscated(_)));
    assert_eq!(output.frame().pixel(0, 0), [0, 0, 0]);

    let pipeline = FramePipeline::new(config(StaticSegmenter(one_box(3.0)), policy), OperatingMode::DetectOnly);
    assert_eq!(pipeline.mode(), OperatingMode::DetectOnly);
    let output = pipeline.infer(&input).unwrap();
    assert!(matches!(output, ServiceOutput::Detected { .. }));
    assert_eq!(output.frame().pixel(0, 0), [1, 2, 3]);
    assert_eq!(output.detection_count(), 1);
  }
}
