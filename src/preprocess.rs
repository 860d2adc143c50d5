// 该文件是 Qianli（千里眼）项目的一部分。
// src/preprocess.rs - letterbox 预处理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Qianli Contributors

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::frame::PixelFrame;
use crate::pool::PixelBufferPool;

/// letterbox 填充区域的灰度值（逐通道）
pub const LETTERBOX_FILL: u8 = 114;

const RGB_CHANNELS: usize = 3;

/// letterbox 变换参数。每次预处理新建，之后不可变；
/// 后处理用它把模型空间坐标映射回原图像素坐标。
///
/// 不变量: `scale > 0`，`pad_w < input_width`，`pad_h < input_height`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
  /// 模型输入宽度
  pub input_width: u32,
  /// 模型输入高度
  pub input_height: u32,
  /// 等比缩放系数
  pub scale: f32,
  /// 左侧 letterbox 填充像素数
  pub pad_w: u32,
  /// 顶部 letterbox 填充像素数
  pub pad_h: u32,
}

impl PreprocessParams {
  /// 原图坐标 → 模型输入坐标
  pub fn to_model(&self, x: f32, y: f32) -> (f32, f32) {
    (x * self.scale + self.pad_w as f32, y * self.scale + self.pad_h as f32)
  }

  /// 模型输入坐标 → 原图坐标（letterbox 逆变换）
  pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
    (
      (x - self.pad_w as f32) / self.scale,
      (y - self.pad_h as f32) / self.scale,
    )
  }
}

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("输入图像尺寸无效: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("目标尺寸无效: {0}x{1}")]
  InvalidTarget(u32, u32),
  #[error("无法获取 {0}x{1} 的像素缓冲区")]
  BufferUnavailable(u32, u32),
}

/// 将任意尺寸的 RGB 图像等比缩放并居中填充到固定的模型输入尺寸。
///
/// 缩放系数取 `min(target_w / w, target_h / h)`，保持宽高比；
/// 剩余空间以 [`LETTERBOX_FILL`] 填充，左右、上下对称（向下取整，
/// 多出的一个像素落在右/下边缘）。整个画布都会被覆写，
/// 因此缓冲池复用的缓冲区无需清零。
///
/// 返回写入完毕的缓冲区和用于坐标逆变换的 [`PreprocessParams`]。
pub fn letterbox(
  image: &RgbImage,
  target_w: u32,
  target_h: u32,
  pool: &PixelBufferPool,
) -> Result<(PixelFrame, PreprocessParams), PreprocessError> {
  let (width, height) = image.dimensions();
  if width == 0 || height == 0 {
    return Err(PreprocessError::EmptyImage(width, height));
  }
  if target_w == 0 || target_h == 0 {
    return Err(PreprocessError::InvalidTarget(target_w, target_h));
  }

  let scale = (target_w as f32 / width as f32).min(target_h as f32 / height as f32);
  let scaled_w = ((width as f32 * scale).round() as u32).clamp(1, target_w);
  let scaled_h = ((height as f32 * scale).round() as u32).clamp(1, target_h);
  let pad_w = (target_w - scaled_w) / 2;
  let pad_h = (target_h - scaled_h) / 2;

  debug!(
    "letterbox: {}x{} -> {}x{}，缩放 {:.4}，填充 ({}, {})",
    width, height, target_w, target_h, scale, pad_w, pad_h
  );

  let resized;
  let scaled: &RgbImage = if scaled_w == width && scaled_h == height {
    // 恒等路径，不经过重采样
    image
  } else {
    resized = image::imageops::resize(
      image,
      scaled_w,
      scaled_h,
      image::imageops::FilterType::Triangle,
    );
    &resized
  };

  let mut frame = pool
    .acquire(target_w, target_h)
    .ok_or(PreprocessError::BufferUnavailable(target_w, target_h))?;

  let canvas = frame.as_mut();
  canvas.fill(LETTERBOX_FILL);

  let src = scaled.as_raw();
  let src_stride = scaled_w as usize * RGB_CHANNELS;
  let dst_stride = target_w as usize * RGB_CHANNELS;

  for row in 0..scaled_h as usize {
    let src_offset = row * src_stride;
    let dst_offset = (row + pad_h as usize) * dst_stride + pad_w as usize * RGB_CHANNELS;
    canvas[dst_offset..dst_offset + src_stride]
      .copy_from_slice(&src[src_offset..src_offset + src_stride]);
  }

  let params = PreprocessParams {
    input_width: target_w,
    input_height: target_h,
    scale,
    pad_w,
    pad_h,
  };

  Ok((frame, params))
}
