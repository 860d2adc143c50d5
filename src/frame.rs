// 该文件是 Qianli（千里眼）项目的一部分。
// src/frame.rs - NHWC 像素帧定义
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

const RGB_CHANNELS: usize = 3;

/// 推理运行时消费 NHWC 字节张量的接口
pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

/// 固定尺寸的 RGB NHWC 像素帧，作为模型输入缓冲区。
/// 由缓冲池分配和回收；持有期间为调用方独占。
#[derive(Debug)]
pub struct PixelFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl PixelFrame {
  /// 按指定尺寸分配像素帧；尺寸为零或大小溢出时返回 None
  pub fn with_shape(width: u32, height: u32) -> Option<Self> {
    if width == 0 || height == 0 {
      return None;
    }

    let size = (width as usize)
      .checked_mul(height as usize)?
      .checked_mul(RGB_CHANNELS)?;
    let data = vec![0u8; size].into_boxed_slice();

    Some(Self {
      width,
      height,
      data,
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 帧的尺寸键，用于缓冲池按尺寸归类
  pub fn shape(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

impl AsMut<[u8]> for PixelFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsNhwcFrame for PixelFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn with_shape_allocates_nhwc_layout() {
    let frame = PixelFrame::with_shape(640, 480).unwrap();
    assert_eq!(frame.width(), 640);
    assert_eq!(frame.height(), 480);
    assert_eq!(frame.channels(), RGB_CHANNELS);
    assert_eq!(frame.len(), 640 * 480 * RGB_CHANNELS);
    assert_eq!(frame.shape(), (640, 480));
  }

  #[test]
  fn with_shape_rejects_zero_dimensions() {
    assert!(PixelFrame::with_shape(0, 480).is_none());
    assert!(PixelFrame::with_shape(640, 0).is_none());
    assert!(PixelFrame::with_shape(0, 0).is_none());
  }

  #[test]
  fn frame_is_writable_and_readable() {
    let mut frame = PixelFrame::with_shape(4, 2).unwrap();
    frame.as_mut().fill(114);
    assert!(frame.as_nhwc().iter().all(|&v| v == 114));
  }
}
