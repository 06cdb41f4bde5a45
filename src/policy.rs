// 该文件是 SafeAR （安视） 项目的一部分。
// src/policy.rs - 混淆策略
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

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigurationError;

/// 高斯模糊标准差上限，卷积核长度随标准差线性增长
pub const MAX_SIGMA: u32 = 256;
/// 像素化方块边长上限
pub const MAX_BLOCK_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectSpec {
  Pixelate { block_size: u32 },
  GaussianBlur { sigma: u32 },
  SolidFill { color: [u8; 3] },
  PassThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
  Pixelate,
  GaussianBlur,
  SolidFill,
  PassThrough,
}

impl FromStr for EffectKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pixelate" | "pixelation" | "pixelization" | "mosaic" => Ok(EffectKind::Pixelate),
      "blur" | "blurring" | "gaussian_blur" => Ok(EffectKind::GaussianBlur),
      "mask" | "masking" | "fill" | "solid_fill" => Ok(EffectKind::SolidFill),
      "none" | "passthrough" | "pass_through" => Ok(EffectKind::PassThrough),
      other => Err(other.to_string()),
    }
  }
}

/// 调用方提交的策略描述
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
  /// 类别编号 -> 混淆类型名称
  #[serde(default)]
  pub policies: BTreeMap<u32, String>,
  /// 像素化方块边长
  #[serde(default)]
  pub square: u32,
  /// 高斯模糊标准差
  #[serde(default)]
  pub sigma: u32,
  /// 纯色填充颜色
  #[serde(default)]
  pub fill_color: [u8; 3],
}

impl PolicySpec {
  /// 由两个等长列表构造：类别编号列表与混淆类型列表
  pub fn from_lists(class_ids: &[u32], effect_names: &[String]) -> Result<Self, ConfigurationError> {
    if class_ids.len() != effect_names.len() {
      return Err(ConfigurationError::MalformedPolicy(format!(
        "类别编号数量 {} 与混淆类型数量 {} 不一致",
        class_ids.len(),
        effect_names.len()
      )));
    }

    Ok(Self {
      policies: class_ids.iter().copied().zip(effect_names.iter().cloned()).collect(),
      ..Default::default()
    })
  }

  pub fn with_square(mut self, square: u32) -> Self {
    self.square = square;
    self
  }

  pub fn with_sigma(mut self, sigma: u32) -> Self {
    self.sigma = sigma;
    self
  }

  pub fn with_fill_color(mut self, color: [u8; 3]) -> Self {
    self.fill_color = color;
    self
  }
}

/// 每个请求解析一次、此后只读的策略
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObfuscationPolicy {
  effects: HashMap<u32, EffectSpec>,
}

impl ObfuscationPolicy {
  pub fn from_spec(spec: &PolicySpec) -> Result<Self, ConfigurationError> {
    if spec.sigma > MAX_SIGMA {
      return Err(ConfigurationError::MalformedPolicy(format!(
        "高斯模糊标准差 {} 超过上限 {}",
        spec.sigma, MAX_SIGMA
      )));
    }
    if spec.square > MAX_BLOCK_SIZE {
      return Err(ConfigurationError::MalformedPolicy(format!(
        "像素化方块边长 {} 超过上限 {}",
        spec.square, MAX_BLOCK_SIZE
      )));
    }

    let mut effects = HashMap::with_capacity(spec.policies.len());
    for (&class_id, name) in &spec.policies {
      let kind = name
        .parse::<EffectKind>()
        .map_err(|name| ConfigurationError::UnknownEffect { class_id, name })?;
      let effect = match kind {
        EffectKind::Pixelate => EffectSpec::Pixelate {
          block_size: spec.square,
        },
        EffectKind::GaussianBlur => EffectSpec::GaussianBlur { sigma: spec.sigma },
        EffectKind::SolidFill => EffectSpec::SolidFill {
          color: spec.fill_color,
        },
        EffectKind::PassThrough => EffectSpec::PassThrough,
      };
      debug!("类别 {} 使用混淆效果 {:?}", class_id, effect);
      effects.insert(class_id, effect);
    }

    Ok(Self { effects })
  }

  pub fn with(mut self, class_id: u32, effect: EffectSpec) -> Self {
    self.effects.insert(class_id, effect);
    self
  }

  /// 未配置的类别不做处理
  pub fn resolve(&self, class_id: u32) -> EffectSpec {
    self
      .effects
      .get(&class_id)
      .copied()
      .unwrap_or(EffectSpec::PassThrough)
  }

  pub fn len(&self) -> usize {
    self.effects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.effects.is_empty()
  }
}
