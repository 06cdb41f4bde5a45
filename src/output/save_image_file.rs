// 该文件是 SafeAR （安视） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::Path;

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, draw::to_rgb_image},
  service::ServiceOutput,
  url_file_path,
};

pub struct SaveImageFileOutput {
  path: String,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: url_file_path(uri),
    })
  }
}

impl SaveImageFileOutput {
  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    warn!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<ServiceOutput> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, result: &ServiceOutput) -> Result<(), Self::Error> {
    self.save_image(to_rgb_image(result))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::RgbNhwcFrame,
    model::DetectResult,
    service::{DetectedObject, DetectedObjectReport, ProcessedFrame},
  };

  fn frame() -> RgbNhwcFrame {
    RgbNhwcFrame::from_raw(4, 4, vec![200; 4 * 4 * 3]).unwrap()
  }

  #[test]
  fn saves_processed_frame_as_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let result = ServiceOutput::Obfuscated(ProcessedFrame {
      frame: frame(),
      detections: DetectResult::default(),
    });

    SaveImageFileOutput::from_url(&url).unwrap().render_result(&result).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (4, 4));
    assert_eq!(saved.get_pixel(1, 1).0, [200, 200, 200]);
  }

  #[test]
  fn detect_only_frame_carries_box_outline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("detected.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let result = ServiceOutput::Detected {
      frame: frame(),
      report: DetectedObjectReport {
        width: 4,
        height: 4,
        objects: vec![DetectedObject {
          class_id: 0,
          score: 1.0,
          bbox: [0, 0, 4, 4],
          mask: None,
        }],
      },
    };

    SaveImageFileOutput::from_url(&url).unwrap().render_result(&result).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_ne!(saved.get_pixel(0, 0).0, [200, 200, 200]);
  }

  #[test]
  fn rejects_other_scheme() {
    let url = Url::parse("raw:///tmp/out.raw").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
