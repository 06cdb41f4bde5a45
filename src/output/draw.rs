// 该文件是 SafeAR （安视） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::service::{DetectedObjectReport, ServiceOutput};

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: u32 = 2;

/// 在图像上绘制检测框，bbox 为像素坐标 [x_min, y_min, x_max, y_max)
pub fn draw_report(image: &mut RgbImage, report: &DetectedObjectReport) {
  let (w, h) = image.dimensions();

  for object in &report.objects {
    let [x_min, y_min, x_max, y_max] = object.bbox;
    let (x_min, y_min) = (x_min.min(w), y_min.min(h));
    let (x_max, y_max) = (x_max.min(w), y_max.min(h));
    if x_min >= x_max || y_min >= y_max {
      continue;
    }

    // 边框加粗，向内收缩
    for t in 0..BOX_THICKNESS {
      let width = (x_max - x_min).saturating_sub(2 * t);
      let height = (y_max - y_min).saturating_sub(2 * t);
      if width == 0 || height == 0 {
        break;
      }
      let rect = Rect::at((x_min + t) as i32, (y_min + t) as i32).of_size(width, height);
      draw_hollow_rect_mut(image, rect, Rgb(BOX_COLOR));
    }
  }
}

/// 转为可保存的图像；仅检测模式下叠加检测框
pub fn to_rgb_image(result: &ServiceOutput) -> RgbImage {
  let mut image = result.frame().to_rgb_image();
  if let ServiceOutput::Detected { report, .. } = result {
    draw_report(&mut image, report);
  }
  image
}
