// 该文件是 Qianli（千里眼）项目的一部分。
// src/detector.rs - 检测器门面与生命周期管理
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

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::pool::{DEFAULT_MAX_IDLE, PixelBufferPool};
use crate::postprocess::{Detection, PostprocessError, postprocess};
use crate::preprocess::{PreprocessError, letterbox};
use crate::runtime::{CoreMask, InferenceRuntime, ModelVersion};

type BoxedRuntimeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 检测器创建参数
#[derive(Debug, Clone)]
pub struct DetectorConfig {
  /// 模型文件路径
  pub model_path: PathBuf,
  /// 类别数量，必须与模型一致
  pub num_classes: usize,
  /// 模型版本
  pub model_version: ModelVersion,
  /// 计算单元偏好
  pub core_mask: CoreMask,
  /// 缓冲池每个尺寸的空闲上限
  pub max_idle_buffers: usize,
}

impl DetectorConfig {
  pub fn new(model_path: impl Into<PathBuf>, num_classes: usize) -> Self {
    Self {
      model_path: model_path.into(),
      num_classes,
      model_version: ModelVersion::YoloV8,
      core_mask: CoreMask::All,
      max_idle_buffers: DEFAULT_MAX_IDLE,
    }
  }

  pub fn model_version(mut self, version: ModelVersion) -> Self {
    self.model_version = version;
    self
  }

  pub fn core_mask(mut self, mask: CoreMask) -> Self {
    self.core_mask = mask;
    self
  }

  pub fn max_idle_buffers(mut self, max_idle: usize) -> Self {
    self.max_idle_buffers = max_idle;
    self
  }
}

/// 检测过程中的内部错误分类。
///
/// 公开 API 遵循防御式约定（失败返回 None 或空列表），
/// `try_*` 变体保留具体错误种类供调用方和测试区分原因。
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("模型路径无效: {0}")]
  InvalidModelPath(PathBuf),
  #[error("类别数量无效: {0}")]
  InvalidClassCount(usize),
  #[error("模型加载失败: {0}")]
  LoadFailed(#[source] BoxedRuntimeError),
  #[error("检测器已销毁")]
  Destroyed,
  #[error("阈值超出 [0, 1] 范围: nms={nms_thresh}, box={box_thresh}")]
  InvalidThreshold { nms_thresh: f32, box_thresh: f32 },
  #[error("预处理失败: {0}")]
  Preprocess(PreprocessError),
  #[error("推理失败: {0}")]
  Inference(#[source] BoxedRuntimeError),
  #[error("后处理失败: {0}")]
  Postprocess(PostprocessError),
}

impl From<PreprocessError> for DetectError {
  fn from(err: PreprocessError) -> Self {
    DetectError::Preprocess(err)
  }
}

impl From<PostprocessError> for DetectError {
  fn from(err: PostprocessError) -> Self {
    DetectError::Postprocess(err)
  }
}

/// 目标检测器门面：预处理 → 推理 → 后处理。
///
/// 生命周期为 Created（create 成功）→ Destroyed（destroy 后，终态）。
/// 单个实例不保证并发 detect 调用安全，多线程调用方应逐实例
/// 串行化或每线程一个实例；跨实例共享的缓冲池内部已做互斥。
#[derive(Debug)]
pub struct Detector<R: InferenceRuntime> {
  runtime: Option<R>,
  num_classes: usize,
  pool: Arc<PixelBufferPool>,
}

impl<R: InferenceRuntime> Detector<R> {
  /// 创建检测器，内部新建专属缓冲池。
  /// 路径无效、模型加载失败等任何错误都返回 None，不向外抛出
  pub fn create(config: &DetectorConfig) -> Option<Self> {
    let pool = Arc::new(PixelBufferPool::with_max_idle(config.max_idle_buffers));
    Self::create_with_pool(config, pool)
  }

  /// 创建检测器并共享外部缓冲池（跨实例复用缓冲区时使用）
  pub fn create_with_pool(config: &DetectorConfig, pool: Arc<PixelBufferPool>) -> Option<Self> {
    match Self::try_create(config, pool) {
      Ok(detector) => Some(detector),
      Err(e) => {
        error!("创建检测器失败: {}", e);
        None
      }
    }
  }

  /// 与 create 相同，但保留错误种类
  pub fn try_create(
    config: &DetectorConfig,
    pool: Arc<PixelBufferPool>,
  ) -> Result<Self, DetectError> {
    if config.model_path.as_os_str().is_empty() {
      return Err(DetectError::InvalidModelPath(config.model_path.clone()));
    }
    if config.num_classes == 0 {
      return Err(DetectError::InvalidClassCount(config.num_classes));
    }

    info!("加载模型: {}", config.model_path.display());
    let mut runtime = R::load(&config.model_path, config.model_version, config.num_classes)
      .map_err(|e| DetectError::LoadFailed(Box::new(e)))?;
    info!(
      "模型加载完成，输入尺寸 {}x{}",
      runtime.input_width(),
      runtime.input_height()
    );

    // 计算单元偏好设置失败不致命，回退到运行时默认值
    if let Err(e) = runtime.set_compute_affinity(config.core_mask) {
      warn!("设置计算单元偏好 {:?} 失败，使用默认值: {}", config.core_mask, e);
    }

    Ok(Self {
      runtime: Some(runtime),
      num_classes: config.num_classes,
      pool,
    })
  }

  /// 从已构建的运行时组装检测器，用于注入替代后端或测试桩
  pub fn with_runtime(runtime: R, num_classes: usize, pool: Arc<PixelBufferPool>) -> Self {
    Self {
      runtime: Some(runtime),
      num_classes,
      pool,
    }
  }

  /// 调整已加载模型的计算单元偏好。
  /// 返回 0 表示成功，-1 表示失败（包括已销毁的检测器）
  pub fn set_core_mask(&mut self, mask: CoreMask) -> i32 {
    let Some(runtime) = self.runtime.as_mut() else {
      warn!("在已销毁的检测器上调用 set_core_mask");
      return -1;
    };

    match runtime.set_compute_affinity(mask) {
      Ok(()) => 0,
      Err(e) => {
        warn!("设置计算单元偏好 {:?} 失败: {}", mask, e);
        -1
      }
    }
  }

  /// 对一帧图像执行检测。任何内部错误（已销毁、阈值越界、
  /// 预处理/推理/后处理失败）都返回空列表，不向外传播
  pub fn detect(&self, image: &RgbImage, nms_thresh: f32, box_thresh: f32) -> Vec<Detection> {
    match self.try_detect(image, nms_thresh, box_thresh) {
      Ok(detections) => detections,
      Err(e) => {
        error!("检测失败: {}", e);
        Vec::new()
      }
    }
  }

  /// 与 detect 相同，但保留错误种类
  pub fn try_detect(
    &self,
    image: &RgbImage,
    nms_thresh: f32,
    box_thresh: f32,
  ) -> Result<Vec<Detection>, DetectError> {
    let runtime = self.runtime.as_ref().ok_or(DetectError::Destroyed)?;

    if !(0.0..=1.0).contains(&nms_thresh) || !(0.0..=1.0).contains(&box_thresh) {
      return Err(DetectError::InvalidThreshold {
        nms_thresh,
        box_thresh,
      });
    }

    let (frame, params) = letterbox(
      image,
      runtime.input_width(),
      runtime.input_height(),
      &self.pool,
    )?;

    debug!("执行推理");
    let infer_result = runtime.infer(&frame);
    // 无论推理成败都归还缓冲区
    self.pool.release(frame);
    let raw = infer_result.map_err(|e| DetectError::Inference(Box::new(e)))?;

    let detections = postprocess(
      &raw,
      self.num_classes,
      &params,
      image.width(),
      image.height(),
      box_thresh,
      nms_thresh,
    )?;

    Ok(detections)
  }

  /// 销毁检测器：释放模型并清空缓冲池。幂等，可重复调用
  pub fn destroy(&mut self) {
    if self.runtime.take().is_some() {
      info!("销毁检测器");
      self.pool.clear();
    }
  }

  pub fn is_destroyed(&self) -> bool {
    self.runtime.is_none()
  }

  /// 检测器使用的缓冲池，可与其他实例共享
  pub fn pool(&self) -> &Arc<PixelBufferPool> {
    &self.pool
  }
}

impl<R: InferenceRuntime> Drop for Detector<R> {
  fn drop(&mut self) {
    self.destroy();
  }
}
