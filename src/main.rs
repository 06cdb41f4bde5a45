// 该文件是 SafeAR （安视） 项目的一部分。
// src/main.rs - 项目主程序
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use safear::{
  FromUrl,
  args::PipelineArgs,
  input::InputWrapper,
  model::ModelRegistry,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// SafeAR 单帧混淆
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub pipeline: PipelineArgs,
  /// 输入来源
  #[arg(long, value_name = "SOURCE", required_unless_present = "list_models")]
  pub input: Option<Url>,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", required_unless_present = "list_models")]
  pub output: Option<Url>,
  /// 列出注册表中的模型后退出
  #[arg(long)]
  pub list_models: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  if args.list_models {
    let registry = ModelRegistry::load(&args.pipeline.config)?;
    for (index, name) in registry.list_models().into_iter().enumerate() {
      println!("{}: {}", index, name);
    }
    return Ok(());
  }

  let (Some(input), Some(output)) = (args.input, args.output) else {
    anyhow::bail!("需要同时指定 --input 与 --output");
  };

  info!("模型注册表: {}", args.pipeline.config.display());
  info!("模型编号: {}", args.pipeline.model_number);
  info!("输入来源: {}", input);
  info!("输出路径: {}", output);

  let input = InputWrapper::from_url(&input)?;
  let pipeline = args.pipeline.build_pipeline()?;
  let output = OutputWrapper::from_url(&output)?;

  OneShotTask.run_task(input, pipeline, output)?;

  Ok(())
}
