// 该文件是 SafeAR （安视） 项目的一部分。
// src/bin/server.rs - HTTP 混淆服务
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

use anyhow::Result;
use clap::Parser;

use safear::{
  config::ModelPool,
  model::ModelRegistry,
  server::{ServerState, serve},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// SafeAR HTTP 服务参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型注册表配置文件
  #[arg(long, default_value = "config.yml", value_name = "FILE")]
  pub config: PathBuf,
  /// 监听地址
  #[arg(long, default_value = "0.0.0.0:8080", value_name = "ADDR")]
  pub bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型注册表: {}", args.config.display());
  let registry = ModelRegistry::load(&args.config)?;
  let models = ModelPool::load(&registry)?;
  info!("已加载模型: {:?}", models.list_models());

  serve(&args.bind, ServerState::new(models)).await?;

  Ok(())
}
