// 该文件是 SafeAR （安视） 项目的一部分。
// src/codec.rs - 帧编解码
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

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use thiserror::Error;
use tracing::debug;

use crate::frame::{AsNhwcFrame, FrameSizeError, RgbNhwcFrame};

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("输入数据为空")]
  Empty,
  #[error("Base64 解码错误: {0}")]
  Base64(#[from] base64::DecodeError),
  #[error("图像解码错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("原始帧数据错误: {0}")]
  RawSize(#[from] FrameSizeError),
}

#[derive(Error, Debug)]
#[error("图像编码错误: {0}")]
pub struct EncodeError(#[from] image::ImageError);

/// 补齐 Base64 文本的 `=` 填充
pub fn pad_base64(text: &str) -> String {
  let mut padded = text.to_string();
  let missing = (4 - padded.len() % 4) % 4;
  padded.extend(std::iter::repeat_n('=', missing));
  padded
}

fn is_base64_text(input: &[u8]) -> bool {
  input
    .iter()
    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b',' | b';' | b':') || b.is_ascii_whitespace())
}

pub struct FrameCodec;

impl FrameCodec {
  /// 解码传输字节：可以是编码后的图像字节，也可以是其 Base64 文本
  pub fn decode(input: &[u8]) -> Result<RgbNhwcFrame, DecodeError> {
    if input.iter().all(u8::is_ascii_whitespace) {
      return Err(DecodeError::Empty);
    }

    match image::load_from_memory(input) {
      Ok(image) => {
        debug!("按图像字节解码，长度: {}", input.len());
        Ok(RgbNhwcFrame::from(image.to_rgb8()))
      }
      Err(e) if is_base64_text(input) => {
        debug!("图像字节解码失败（{}），尝试按 Base64 文本解码", e);
        // 上一步已确认全部为 ASCII
        let text = String::from_utf8_lossy(input);
        Self::decode_base64(&text)
      }
      Err(e) => Err(DecodeError::Image(e)),
    }
  }

  pub fn decode_base64(text: &str) -> Result<RgbNhwcFrame, DecodeError> {
    // 兼容 data URL 前缀，例如 `data:image/png;base64,`
    let payload = match text.find("base64,") {
      Some(pos) => &text[pos + "base64,".len()..],
      None => text,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
      return Err(DecodeError::Empty);
    }

    let bytes = STANDARD.decode(pad_base64(&compact))?;
    debug!("Base64 解码后字节长度: {}", bytes.len());
    if bytes.is_empty() {
      return Err(DecodeError::Empty);
    }

    let image = image::load_from_memory(&bytes)?;
    Ok(RgbNhwcFrame::from(image.to_rgb8()))
  }

  /// 从内部原始布局（行优先，8 位通道）重建帧
  pub fn decode_raw(height: usize, width: usize, bytes: &[u8]) -> Result<RgbNhwcFrame, DecodeError> {
    Ok(RgbNhwcFrame::from_raw(height, width, bytes.to_vec())?)
  }

  /// 输出长度恒为 W×H×C
  pub fn encode(frame: &RgbNhwcFrame) -> Vec<u8> {
    frame.as_nhwc().to_vec()
  }

  pub fn encode_png(frame: &RgbNhwcFrame) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer).write_image(
      frame.as_nhwc(),
      frame.width() as u32,
      frame.height() as u32,
      ExtendedColorType::Rgb8,
    )?;
    Ok(buffer)
  }
}
