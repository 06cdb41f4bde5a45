// 该文件是 SafeAR （安视） 项目的一部分。
// src/frame.rs - NHWC 帧与掩码定义
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

use image::RgbImage;
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
pub struct FrameSizeError {
  pub expected: usize,
  pub actual: usize,
}

/// 行优先、每通道 8 位的 RGB 帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbNhwcFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbNhwcFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0u8; RGB_CHANNELS * width * height].into_boxed_slice();
    Self {
      width,
      height,
      data,
    }
  }

  pub fn from_raw(height: usize, width: usize, data: Vec<u8>) -> Result<Self, FrameSizeError> {
    let expected = RGB_CHANNELS * width * height;
    if data.len() != expected {
      return Err(FrameSizeError {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  #[inline]
  fn offset(&self, x: usize, y: usize) -> usize {
    (y * self.width + x) * RGB_CHANNELS
  }

  pub fn pixel(&self, x: usize, y: usize) -> [u8; RGB_CHANNELS] {
    let idx = self.offset(x, y);
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  pub fn put_pixel(&mut self, x: usize, y: usize, value: [u8; RGB_CHANNELS]) {
    let idx = self.offset(x, y);
    self.data[idx..idx + RGB_CHANNELS].copy_from_slice(&value);
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    // 尺寸与数据长度由构造保证一致
    RgbImage::from_raw(self.width as u32, self.height as u32, self.data.to_vec())
      .unwrap_or_else(|| RgbImage::new(self.width as u32, self.height as u32))
  }
}

impl From<RgbImage> for RgbNhwcFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width: width as usize,
      height: height as usize,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl AsNhwcFrame for RgbNhwcFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

/// 单个实例的像素掩码，尺寸为 H×W
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
  width: usize,
  height: usize,
  data: Box<[bool]>,
}

impl Mask {
  pub fn empty(height: usize, width: usize) -> Self {
    Self {
      width,
      height,
      data: vec![false; width * height].into_boxed_slice(),
    }
  }

  pub fn from_fn(height: usize, width: usize, f: impl Fn(usize, usize) -> bool) -> Self {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
      for x in 0..width {
        data.push(f(x, y));
      }
    }
    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }

  pub fn from_raw(height: usize, width: usize, data: Vec<bool>) -> Result<Self, FrameSizeError> {
    if data.len() != width * height {
      return Err(FrameSizeError {
        expected: width * height,
        actual: data.len(),
      });
    }
    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  #[inline]
  pub fn get(&self, x: usize, y: usize) -> bool {
    self.data[y * self.width + x]
  }

  pub fn count(&self) -> usize {
    self.data.iter().filter(|v| **v).count()
  }
}
