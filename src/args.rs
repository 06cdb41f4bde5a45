// 该文件是 SafeAR （安视） 项目的一部分。
// src/args.rs - 命令行公共参数
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

use clap::Args;

use crate::{
  config::{ConfigurationError, ServiceConfig},
  model::{ModelRegistry, SegmenterWrapper},
  policy::PolicySpec,
  service::{FramePipeline, OperatingMode},
};

/// 模型与混淆策略参数
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 模型注册表配置文件
  #[arg(long, default_value = "config.yml", value_name = "FILE")]
  pub config: PathBuf,

  /// 模型编号，0 为默认模型
  #[arg(long, default_value = "0", value_name = "NUMBER")]
  pub model_number: usize,

  /// 需要混淆的类别编号列表
  #[arg(long, num_args = 1.., value_name = "CLASS_ID")]
  pub class_id_list: Vec<u32>,

  /// 与类别编号一一对应的混淆类型列表
  /// 支持: blurring, pixelation, masking, none
  #[arg(long, num_args = 1.., value_name = "TYPE")]
  pub obfuscation_type_list: Vec<String>,

  /// 像素化方块边长
  #[arg(long, default_value = "0", value_name = "PIXELS")]
  pub square: u32,

  /// 高斯模糊标准差
  #[arg(long, default_value = "0", value_name = "SIGMA")]
  pub sigma: u32,

  /// 纯色填充颜色，格式 R,G,B
  #[arg(long, value_delimiter = ',', default_values_t = [0u8, 0, 0], value_name = "RGB")]
  pub fill_color: Vec<u8>,

  /// 仅检测，不混淆
  #[arg(long)]
  pub detect_only: bool,
}

impl PipelineArgs {
  pub fn policy_spec(&self) -> Result<PolicySpec, ConfigurationError> {
    let color = match self.fill_color.as_slice() {
      [r, g, b] => [*r, *g, *b],
      other => {
        return Err(ConfigurationError::MalformedPolicy(format!(
          "填充颜色需要 3 个分量, 实际 {} 个",
          other.len()
        )));
      }
    };

    Ok(
      PolicySpec::from_lists(&self.class_id_list, &self.obfuscation_type_list)?
        .with_square(self.square)
        .with_sigma(self.sigma)
        .with_fill_color(color),
    )
  }

  pub fn mode(&self) -> OperatingMode {
    if self.detect_only {
      OperatingMode::DetectOnly
    } else {
      OperatingMode::Obfuscate
    }
  }

  pub fn build_pipeline(&self) -> anyhow::Result<FramePipeline<SegmenterWrapper>> {
    let registry = ModelRegistry::load(&self.config)?;
    let config = ServiceConfig::configure(&registry, self.model_number, &self.policy_spec()?)?;
    Ok(FramePipeline::new(config, self.mode()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser)]
  struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,
  }

  #[test]
  fn parses_original_style_flags() {
    let cli = Cli::parse_from([
      "safear",
      "--model-number",
      "1",
      "--class-id-list",
      "0",
      "2",
      "--obfuscation-type-list",
      "blurring",
      "pixelation",
      "--square",
      "8",
      "--sigma",
      "4",
    ]);
    let spec = cli.pipeline.policy_spec().unwrap();
    assert_eq!(cli.pipeline.model_number, 1);
    assert_eq!(spec.policies.len(), 2);
    assert_eq!(spec.square, 8);
    assert_eq!(spec.sigma, 4);
    assert_eq!(spec.fill_color, [0, 0, 0]);
    assert_eq!(cli.pipeline.mode(), OperatingMode::Obfuscate);
  }

  #[test]
  fn parses_fill_color() {
    let cli = Cli::parse_from(["safear", "--fill-color", "255,128,0", "--detect-only"]);
    assert_eq!(cli.pipeline.policy_spec().unwrap().fill_color, [255, 128, 0]);
    assert_eq!(cli.pipeline.mode(), OperatingMode::DetectOnly);
  }
}
