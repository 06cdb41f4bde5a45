// 该文件是 SafeAR （安视） 项目的一部分。
// src/obfuscate.rs - 混淆引擎
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
use tracing::debug;

use crate::{
  frame::{Mask, RgbNhwcFrame},
  model::Detection,
  policy::{EffectSpec, ObfuscationPolicy},
};

mod blur;
mod pixelate;

#[derive(Error, Debug, PartialEq, Eq)]
#[error(
  "掩码尺寸不匹配: 第 {index} 个检测的掩码为 {mask_width}x{mask_height}, 帧为 {frame_width}x{frame_height}"
)]
pub struct ShapeMismatchError {
  pub index: usize,
  pub mask_width: usize,
  pub mask_height: usize,
  pub frame_width: usize,
  pub frame_height: usize,
}

/// 裁剪到帧内的处理区域，右下角不含
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
  pub x0: usize,
  pub y0: usize,
  pub x1: usize,
  pub y1: usize,
}

impl Region {
  pub fn from_bbox(bbox: [u32; 4], width: usize, height: usize) -> Option<Self> {
    let x0 = (bbox[0] as usize).min(width);
    let y0 = (bbox[1] as usize).min(height);
    let x1 = (bbox[2] as usize).min(width);
    let y1 = (bbox[3] as usize).min(height);
    if x0 >= x1 || y0 >= y1 {
      return None;
    }
    Some(Self { x0, y0, x1, y1 })
  }

  pub fn expand(&self, margin: usize, width: usize, height: usize) -> Self {
    Self {
      x0: self.x0.saturating_sub(margin),
      y0: self.y0.saturating_sub(margin),
      x1: (self.x1 + margin).min(width),
      y1: (self.y1 + margin).min(height),
    }
  }

  pub fn width(&self) -> usize {
    self.x1 - self.x0
  }

  pub fn height(&self) -> usize {
    self.y1 - self.y0
  }
}

fn solid_fill(output: &mut RgbNhwcFrame, mask: &Mask, region: Region, color: [u8; 3]) {
  for y in region.y0..region.y1 {
    for x in region.x0..region.x1 {
      if mask.get(x, y) {
        output.put_pixel(x, y, color);
      }
    }
  }
}

pub struct ObfuscationEngine;

impl ObfuscationEngine {
  /// 对检测到的掩码区域应用策略指定的效果
  ///
  /// 每个检测的效果都从输入帧计算，按检测顺序写入输出，掩码重叠处以后写者为准。
  /// 掩码之外的像素与输入逐字节相同。
  pub fn obfuscate(
    frame: &RgbNhwcFrame,
    detections: &[Detection],
    policy: &ObfuscationPolicy,
  ) -> Result<RgbNhwcFrame, ShapeMismatchError> {
    let (width, height) = (frame.width(), frame.height());

    // 先整体校验，失败时不产生任何输出
    for (index, detection) in detections.iter().enumerate() {
      let mask = &detection.mask;
      if mask.width() != width || mask.height() != height {
        return Err(ShapeMismatchError {
          index,
          mask_width: mask.width(),
          mask_height: mask.height(),
          frame_width: width,
          frame_height: height,
        });
      }
    }

    let mut output = frame.clone();

    for (index, detection) in detections.iter().enumerate() {
      let effect = policy.resolve(detection.class_id);
      debug!(
        "第 {} 个检测 (类别 {}): {:?}",
        index, detection.class_id, effect
      );

      let Some(region) = Region::from_bbox(detection.bbox, width, height) else {
        debug!("第 {} 个检测的检测框为空，跳过", index);
        continue;
      };

      match effect {
        EffectSpec::PassThrough => {}
        EffectSpec::SolidFill { color } => solid_fill(&mut output, &detection.mask, region, color),
        EffectSpec::Pixelate { block_size } => {
          pixelate::pixelate(frame, &mut output, &detection.mask, region, block_size)
        }
        EffectSpec::GaussianBlur { sigma } => {
          blur::gaussian_blur(frame, &mut output, &detection.mask, region, sigma)
        }
      }
    }

    Ok(output)
  }
}
