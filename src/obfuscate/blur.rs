// 该文件是 SafeAR （安视） 项目的一部分。
// src/obfuscate/blur.rs - 高斯模糊
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
use imageproc::filter::gaussian_blur_f32;

use crate::{
  frame::{Mask, RgbNhwcFrame},
  obfuscate::Region,
};

/// 邻域半径取 3σ，大于高斯核的支撑范围
fn sampling_margin(sigma: u32) -> usize {
  (3.0 * sigma as f32).ceil() as usize
}

/// 在检测框外扩后的窗口上模糊，邻域像素取自整帧，只写回掩码内的像素
pub(super) fn gaussian_blur(
  input: &RgbNhwcFrame,
  output: &mut RgbNhwcFrame,
  mask: &Mask,
  region: Region,
  sigma: u32,
) {
  if sigma == 0 {
    return;
  }

  let window = region.expand(sampling_margin(sigma), input.width(), input.height());
  let patch = RgbImage::from_fn(window.width() as u32, window.height() as u32, |x, y| {
    Rgb(input.pixel(window.x0 + x as usize, window.y0 + y as usize))
  });
  let blurred = gaussian_blur_f32(&patch, sigma as f32);

  for y in region.y0..region.y1 {
    for x in region.x0..region.x1 {
      if mask.get(x, y) {
        let Rgb(value) = *blurred.get_pixel((x - window.x0) as u32, (y - window.y0) as u32);
        output.put_pixel(x, y, value);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn checkerboard(size: usize) -> RgbNhwcFrame {
    let mut frame = RgbNhwcFrame::with_shape(size, size);
    for y in 0..size {
      for x in 0..size {
        let v = if (x + y) % 2 == 0 { 0 } else { 255 };
        frame.put_pixel(x, y, [v, v, v]);
      }
    }
    frame
  }

  fn run(frame: &RgbNhwcFrame, mask: &Mask, region: Region, sigma: u32) -> RgbNhwcFrame {
    let mut output = frame.clone();
    gaussian_blur(frame, &mut output, mask, region, sigma);
    output
  }

  #[test]
  fn sigma_zero_is_noop() {
    let frame = checkerboard(8);
    let mask = Mask::from_fn(8, 8, |_, _| true);
    let region = Region::from_bbox([0, 0, 8, 8], 8, 8).unwrap();
    assert_eq!(run(&frame, &mask, region, 0), frame);
  }

  #[test]
  fn blur_smooths_masked_pixels_only() {
    let frame = checkerboard(16);
    let mask = Mask::from_fn(16, 16, |x, y| (4..12).contains(&x) && (4..12).contains(&y));
    let region = Region::from_bbox([4, 4, 12, 12], 16, 16).unwrap();
    let output = run(&frame, &mask, region, 2);

    for y in 0..16 {
      for x in 0..16 {
        if mask.get(x, y) {
          let [v, _, _] = output.pixel(x, y);
          assert!((64..=192).contains(&v), "pixel ({}, {}) = {}", x, y, v);
        } else {
          assert_eq!(output.pixel(x, y), frame.pixel(x, y));
        }
      }
    }
  }

  #[test]
  fn neighbours_come_from_whole_frame() {
    // 检测框内全黑，框外全白：若只用框内像素，模糊后仍为黑
    let mut frame = RgbNhwcFrame::with_shape(12, 12);
    for y in 0..12 {
      for x in 0..12 {
        let inside = (4..8).contains(&x) && (4..8).contains(&y);
        frame.put_pixel(x, y, if inside { [0; 3] } else { [255; 3] });
      }
    }
    let mask = Mask::from_fn(12, 12, |x, y| (4..8).contains(&x) && (4..8).contains(&y));
    let region = Region::from_bbox([4, 4, 8, 8], 12, 12).unwrap();
    let output = run(&frame, &mask, region, 2);

    assert!(output.pixel(4, 4)[0] > 0);
  }

  #[test]
  fn window_expands_within_frame() {
    let region = Region::from_bbox([1, 1, 3, 3], 10, 10).unwrap();
    let window = region.expand(sampling_margin(1), 10, 10);
    assert_eq!(
      window,
      Region {
        x0: 0,
        y0: 0,
        x1: 6,
        y1: 6
      }
    );
  }
}
