// 该文件是 SafeAR （安视） 项目的一部分。
// src/server.rs - HTTP 服务
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

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use crate::{
  config::{ConfigurationError, ModelPool},
  policy::PolicySpec,
  service::{FrameService, ServiceError},
};

/// 请求体上限，容纳 Base64 编码后的高分辨率无损帧
pub const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

/// 处理请求共享的状态，模型在启动时全部预加载
#[derive(Clone)]
pub struct ServerState {
  pub models: Arc<ModelPool>,
}

impl ServerState {
  pub fn new(models: ModelPool) -> Self {
    Self {
      models: Arc::new(models),
    }
  }
}

#[derive(Deserialize, Debug)]
pub struct ObfuscateRequest {
  /// Base64 编码的图像
  pub img: String,
  #[serde(default)]
  pub model_number: usize,
  #[serde(default)]
  pub class_id_list: Vec<u32>,
  #[serde(default)]
  pub obfuscation_type_list: Vec<String>,
  #[serde(default)]
  pub square: u32,
  #[serde(default)]
  pub sigma: u32,
  #[serde(default)]
  pub fill_color: Option<[u8; 3]>,
}

impl ObfuscateRequest {
  fn policy_spec(&self) -> Result<PolicySpec, ConfigurationError> {
    let spec = PolicySpec::from_lists(&self.class_id_list, &self.obfuscation_type_list)?
      .with_square(self.square)
      .with_sigma(self.sigma);
    Ok(match self.fill_color {
      Some(color) => spec.with_fill_color(color),
      None => spec,
    })
  }
}

#[derive(Serialize, Debug)]
pub struct ObfuscateResponse {
  /// Base64 编码的原始像素字节
  pub img: String,
  pub width: usize,
  pub height: usize,
}

fn status_of(err: &ServiceError) -> StatusCode {
  match err {
    ServiceError::Configuration(_) | ServiceError::Decode(_) | ServiceError::ShapeMismatch(_) => {
      StatusCode::BAD_REQUEST
    }
    ServiceError::Detection(_) | ServiceError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

fn error_response(status: StatusCode, message: String) -> Response {
  (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for ServiceError {
  fn into_response(self) -> Response {
    let status = status_of(&self);
    error!("请求处理失败({}): {}", status, self);
    error_response(status, self.to_string())
  }
}

/// 在阻塞线程池中执行帧处理
async fn run_blocking<T, F>(f: F) -> Response
where
  T: IntoResponse + Send + 'static,
  F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
{
  match tokio::task::spawn_blocking(f).await {
    Ok(Ok(value)) => value.into_response(),
    Ok(Err(err)) => err.into_response(),
    Err(err) => {
      error!("处理线程异常退出: {}", err);
      error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
  }
}

pub async fn obfuscate(State(state): State<ServerState>, Json(req): Json<ObfuscateRequest>) -> Response {
  info!("收到混淆请求, 图像数据长度: {}", req.img.len());
  run_blocking(move || {
    let config = state.models.configure(req.model_number, &req.policy_spec()?)?;
    debug!("使用模型 {}", config.model_name());
    let processed = FrameService::obfuscate(&config, req.img.as_bytes())?;
    let bytes = processed.to_bytes();
    info!("返回 {} 字节的处理结果", bytes.len());
    Ok(Json(ObfuscateResponse {
      img: STANDARD.encode(&bytes),
      width: processed.frame.width(),
      height: processed.frame.height(),
    }))
  })
  .await
}

pub async fn detect(State(state): State<ServerState>, Json(req): Json<ObfuscateRequest>) -> Response {
  info!("收到检测请求, 图像数据长度: {}", req.img.len());
  run_blocking(move || {
    let config = state.models.configure(req.model_number, &PolicySpec::default())?;
    let (_, report) = FrameService::detect_only(&config, req.img.as_bytes())?;
    Ok(Json(report))
  })
  .await
}

pub async fn status(State(state): State<ServerState>) -> impl IntoResponse {
  Json(json!({
    "status": "SafeAR 混淆服务运行中",
    "models": state.models.list_models(),
  }))
}

pub async fn health() -> impl IntoResponse {
  Json(json!({ "status": "healthy" }))
}

pub fn router(state: ServerState) -> Router {
  Router::new()
    .route(
      "/obfuscate",
      post(obfuscate).layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES)),
    )
    .route(
      "/detect",
      post(detect).layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES)),
    )
    .route("/status", get(status))
    .route("/health", get(health))
    .with_state(state)
}

pub async fn serve(bind: &str, state: ServerState) -> std::io::Result<()> {
  let listener = tokio::net::TcpListener::bind(bind).await?;
  info!("HTTP 服务监听: {}", listener.local_addr()?);
  axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{codec::DecodeError, model::{DetectionError, ModelRegistry}};
  use tokio::io::{AsyncReadExt, AsyncWriteExt};

  /// 以空模型池启动服务，返回已连接的客户端
  async fn spawn_server() -> tokio::net::TcpStream {
    let pool = ModelPool::load(&ModelRegistry::default()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let _ = axum::serve(listener, router(ServerState::new(pool))).await;
    });
    tokio::net::TcpStream::connect(addr).await.unwrap()
  }

  async fn post_json(path: &str, body: &str) -> String {
    let mut stream = spawn_server().await;
    let request = format!(
      "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
      path,
      body.len(),
      body
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
  }

  #[tokio::test]
  async fn large_frames_pass_body_limit() {
    // 超过 axum 默认的 2 MB；空模型池使请求在配置阶段以 400 结束
    let body = format!(r#"{{"img":"{}"}}"#, "A".repeat(3 * 1024 * 1024));
    for path in ["/obfuscate", "/detect"] {
      let response = post_json(path, &body).await;
      assert!(response.starts_with("HTTP/1.1 400"), "{}: {}", path, response.lines().next().unwrap_or(""));
    }
  }

  #[tokio::test]
  async fn health_responds() {
    let mut stream = spawn_server().await;
    stream
      .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
      .await
      .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("healthy"));
  }

  #[test]
  fn request_defaults() {
    let req: ObfuscateRequest = serde_json::from_str(r#"{"img":"AAAA"}"#).unwrap();
    assert_eq!(req.model_number, 0);
    assert!(req.class_id_list.is_empty());
    let spec = req.policy_spec().unwrap();
    assert!(spec.policies.is_empty());
    assert_eq!(spec.fill_color, [0, 0, 0]);
  }

  #[test]
  fn request_builds_policy() {
    let req: ObfuscateRequest = serde_json::from_str(
      r#"{"img":"","class_id_list":[0,1],"obfuscation_type_list":["masking","blurring"],"sigma":3,"fill_color":[9,9,9]}"#,
    )
    .unwrap();
    let spec = req.policy_spec().unwrap();
    assert_eq!(spec.policies.get(&0).map(String::as_str), Some("masking"));
    assert_eq!(spec.sigma, 3);
    assert_eq!(spec.fill_color, [9, 9, 9]);
  }

  #[test]
  fn mismatched_lists_are_rejected() {
    let req: ObfuscateRequest =
      serde_json::from_str(r#"{"img":"","class_id_list":[0,1],"obfuscation_type_list":["masking"]}"#).unwrap();
    assert!(matches!(req.policy_spec(), Err(ConfigurationError::MalformedPolicy(_))));
  }

  #[test]
  fn error_status_mapping() {
    assert_eq!(status_of(&ServiceError::Decode(DecodeError::Empty)), StatusCode::BAD_REQUEST);
    assert_eq!(
      status_of(&ServiceError::Configuration(ConfigurationError::MalformedPolicy("x".into()))),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      status_of(&ServiceError::Detection(DetectionError::CountMismatch { boxes: 1, masks: 0 })),
      StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
      status_of(&ServiceError::Processing("panic".into())),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
