// 该文件是 Qianli（千里眼）项目的一部分。
// src/pool.rs - 按尺寸归类的像素缓冲池
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

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::frame::PixelFrame;

/// 每个尺寸默认保留的空闲缓冲区数量上限
pub const DEFAULT_MAX_IDLE: usize = 3;

/// 按 (宽, 高) 归类复用像素帧的缓冲池，摊薄逐帧分配开销。
///
/// 内部以互斥锁保护空闲列表，可在多个检测器实例之间共享；
/// 借出的缓冲区在归还前由调用方独占。注意：acquire 返回的
/// 缓冲区内容不保证清零，预处理会完整覆盖整个画布。
#[derive(Debug)]
pub struct PixelBufferPool {
  max_idle: usize,
  idle: Mutex<HashMap<(u32, u32), Vec<PixelFrame>>>,
}

impl PixelBufferPool {
  pub fn new() -> Self {
    Self::with_max_idle(DEFAULT_MAX_IDLE)
  }

  /// 指定每个尺寸的空闲缓冲区上限
  pub fn with_max_idle(max_idle: usize) -> Self {
    Self {
      max_idle,
      idle: Mutex::new(HashMap::new()),
    }
  }

  fn lock_idle(&self) -> MutexGuard<'_, HashMap<(u32, u32), Vec<PixelFrame>>> {
    // 池内不变量不依赖临界区内的完整性，毒化锁仍可继续使用
    self.idle.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// 取出一个指定尺寸的缓冲区；池中没有空闲的则新分配。
  /// 返回的缓冲区尺寸与请求严格一致；尺寸非法或分配失败时返回 None。
  pub fn acquire(&self, width: u32, height: u32) -> Option<PixelFrame> {
    if let Some(frame) = self.lock_idle().get_mut(&(width, height)).and_then(|v| v.pop()) {
      debug!("复用 {}x{} 缓冲区", width, height);
      return Some(frame);
    }

    debug!("分配新的 {}x{} 缓冲区", width, height);
    PixelFrame::with_shape(width, height)
  }

  /// 归还借出的缓冲区。该尺寸的空闲列表已满时直接丢弃，
  /// 避免池无限增长。
  pub fn release(&self, frame: PixelFrame) {
    let key = frame.shape();
    let mut idle = self.lock_idle();
    let slots = idle.entry(key).or_default();

    if slots.len() < self.max_idle {
      slots.push(frame);
    } else {
      debug!("{}x{} 空闲缓冲区已达上限 {}，丢弃归还的缓冲区", key.0, key.1, self.max_idle);
    }
  }

  /// 释放全部空闲缓冲区；用于检测器销毁或模型重载
  pub fn clear(&self) {
    let mut idle = self.lock_idle();
    let total: usize = idle.values().map(Vec::len).sum();
    debug!("清空缓冲池，释放 {} 个空闲缓冲区", total);
    idle.clear();
  }

  /// 指定尺寸当前空闲的缓冲区数量
  pub fn idle_count(&self, width: u32, height: u32) -> usize {
    self.lock_idle().get(&(width, height)).map_or(0, Vec::len)
  }
}

impl Default for PixelBufferPool {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::AsNhwcFrame;

  #[test]
  fn acquire_allocates_exact_size() {
    let pool = PixelBufferPool::new();
    let frame = pool.acquire(640, 480).unwrap();
    assert_eq!(frame.shape(), (640, 480));
  }

  #[test]
  fn acquire_rejects_zero_size() {
    let pool = PixelBufferPool::new();
    assert!(pool.acquire(0, 480).is_none());
    assert!(pool.acquire(640, 0).is_none());
  }

  #[test]
  fn released_buffer_is_reused_by_identity() {
    let pool = PixelBufferPool::new();
    let frame = pool.acquire(640, 480).unwrap();
    let ptr = frame.as_nhwc().as_ptr();

    pool.release(frame);
    assert_eq!(pool.idle_count(640, 480), 1);

    let reused = pool.acquire(640, 480).unwrap();
    assert_eq!(reused.as_nhwc().as_ptr(), ptr);
    assert_eq!(pool.idle_count(640, 480), 0);
  }

  #[test]
  fn mismatched_size_is_never_returned() {
    let pool = PixelBufferPool::new();
    let frame = pool.acquire(640, 480).unwrap();
    pool.release(frame);

    let other = pool.acquire(320, 240).unwrap();
    assert_eq!(other.shape(), (320, 240));
    // 640x480 的空闲缓冲区仍在池中
    assert_eq!(pool.idle_count(640, 480), 1);
  }

  #[test]
  fn idle_list_is_capacity_bounded() {
    let pool = PixelBufferPool::with_max_idle(2);
    let frames: Vec<_> = (0..4).map(|_| pool.acquire(64, 64).unwrap()).collect();

    for frame in frames {
      pool.release(frame);
    }
    assert_eq!(pool.idle_count(64, 64), 2);
  }

  #[test]
  fn clear_drops_all_sizes() {
    let pool = PixelBufferPool::new();
    let a = pool.acquire(64, 64).unwrap();
    let b = pool.acquire(128, 128).unwrap();
    pool.release(a);
    pool.release(b);

    pool.clear();
    assert_eq!(pool.idle_count(64, 64), 0);
    assert_eq!(pool.idle_count(128, 128), 0);
  }

  #[test]
  fn pool_is_shared_across_threads() {
    use std::sync::Arc;

    let pool = Arc::new(PixelBufferPool::new());
    let handles: Vec<_> = (0..4)
      .map(|_| {
        let pool = Arc::clone(&pool);
        std::thread::spawn(move || {
          for _ in 0..100 {
            let frame = pool.acquire(320, 320).unwrap();
            pool.release(frame);
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }
    assert!(pool.idle_count(320, 320) <= DEFAULT_MAX_IDLE);
  }
}
