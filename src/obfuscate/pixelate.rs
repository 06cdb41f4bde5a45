// 该文件是 SafeAR （安视） 项目的一部分。
// src/obfuscate/pixelate.rs - 像素化
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

use crate::{
  frame::{Mask, RGB_CHANNELS, RgbNhwcFrame},
  obfuscate::Region,
};

/// 方块以帧原点对齐，每块取块内掩码像素的均值
pub(super) fn pixelate(
  input: &RgbNhwcFrame,
  output: &mut RgbNhwcFrame,
  mask: &Mask,
  region: Region,
  block_size: u32,
) {
  if block_size <= 1 {
    return;
  }
  let block = block_size as usize;

  let mut tile_y = region.y0 / block * block;
  while tile_y < region.y1 {
    let ys = tile_y.max(region.y0)..(tile_y + block).min(region.y1);

    let mut tile_x = region.x0 / block * block;
    while tile_x < region.x1 {
      let xs = tile_x.max(region.x0)..(tile_x + block).min(region.x1);

      let mut sum = [0u64; RGB_CHANNELS];
      let mut count = 0u64;
      for y in ys.clone() {
        for x in xs.clone() {
          if mask.get(x, y) {
            let pixel = input.pixel(x, y);
            for c in 0..RGB_CHANNELS {
              sum[c] += pixel[c] as u64;
            }
            count += 1;
          }
        }
      }

      if count > 0 {
        // 四舍五入
        let mean = sum.map(|s| ((s + count / 2) / count).min(u8::MAX as u64) as u8);
        for y in ys.clone() {
          for x in xs.clone() {
            if mask.get(x, y) {
              output.put_pixel(x, y, mean);
            }
          }
        }
      }

      tile_x += block;
    }
    tile_y += block;
  }
}
