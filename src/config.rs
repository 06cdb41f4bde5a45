// 该文件是 SafeAR （安视） 项目的一部分。
// src/config.rs - 服务配置
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

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl,
  model::{ModelRegistry, RegistryError, SegmenterError, SegmenterWrapper},
  policy::{ObfuscationPolicy, PolicySpec},
};

#[derive(Error, Debug)]
pub enum ConfigurationError {
  #[error("模型注册表错误: {0}")]
  Registry(#[from] RegistryError),
  #[error("模型加载错误: {0}")]
  Model(#[from] SegmenterError),
  #[error("类别 {class_id} 的混淆类型 '{name}' 不受支持")]
  UnknownEffect { class_id: u32, name: String },
  #[error("策略格式错误: {0}")]
  MalformedPolicy(String),
}

/// 单次请求使用的不可变配置
///
/// 模型实例通过 `Arc` 只读共享；切换模型即构造新的配置，不影响正在使用旧配置的请求。
#[derive(Debug)]
pub struct ServiceConfig<M> {
  model_name: String,
  model: Arc<M>,
  policy: ObfuscationPolicy,
}

impl<M> Clone for ServiceConfig<M> {
  fn clone(&self) -> Self {
    Self {
      model_name: self.model_name.clone(),
      model: Arc::clone(&self.model),
      policy: self.policy.clone(),
    }
  }
}

impl<M> ServiceConfig<M> {
  pub fn new(model_name: impl Into<String>, model: Arc<M>, policy: ObfuscationPolicy) -> Self {
    Self {
      model_name: model_name.into(),
      model,
      policy,
    }
  }

  pub fn model_name(&self) -> &str {
    &self.model_name
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn policy(&self) -> &ObfuscationPolicy {
    &self.policy
  }
}

impl ServiceConfig<SegmenterWrapper> {
  /// 按编号从注册表加载模型，并解析策略
  pub fn configure(
    registry: &ModelRegistry,
    model_number: usize,
    policy_spec: &PolicySpec,
  ) -> Result<Self, ConfigurationError> {
    let policy = ObfuscationPolicy::from_spec(policy_spec)?;
    let model_name = registry.model_name(model_number)?.to_string();
    let url = registry.model_url(model_number)?;
    info!("加载模型 {}: {}", model_name, url);
    let model = SegmenterWrapper::from_url(&url)?;

    Ok(Self::new(model_name, Arc::new(model), policy))
  }
}

/// 预加载的全部模型，供多个请求只读共享
#[derive(Debug, Clone)]
pub struct ModelPool {
  models: Vec<(String, Arc<SegmenterWrapper>)>,
}

impl ModelPool {
  pub fn load(registry: &ModelRegistry) -> Result<Self, ConfigurationError> {
    let mut models = Vec::with_capacity(registry.len());
    for index in 0..registry.len() {
      let name = registry.model_name(index)?.to_string();
      let url = registry.model_url(index)?;
      info!("预加载模型 {}: {}", name, url);
      models.push((name, Arc::new(SegmenterWrapper::from_url(&url)?)));
    }
    Ok(Self { models })
  }

  pub fn list_models(&self) -> Vec<&str> {
    self.models.iter().map(|(name, _)| name.as_str()).collect()
  }

  pub fn configure(
    &self,
    model_number: usize,
    policy_spec: &PolicySpec,
  ) -> Result<ServiceConfig<SegmenterWrapper>, ConfigurationError> {
    let policy = ObfuscationPolicy::from_spec(policy_spec)?;
    let (name, model) = self
      .models
      .get(model_number)
      .ok_or(RegistryError::IndexOutOfRange {
        index: model_number,
        available: self.models.len(),
      })?;
    Ok(ServiceConfig::new(name.clone(), Arc::clone(model), policy))
  }
}
