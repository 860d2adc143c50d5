// 该文件是 Qianli（千里眼）项目的一部分。
// src/runtime.rs - 推理运行时边界
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

use std::path::Path;

use crate::frame::PixelFrame;
use crate::postprocess::RawDetections;

/// 推理运行时偏好的计算单元组合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreMask {
  /// 仅使用 CPU
  CpuOnly,
  /// CPU 与集成 GPU
  CpuAndGpu,
  /// 全部可用计算单元
  All,
  /// CPU 与神经网络加速器
  CpuAndNeuralEngine,
}

impl CoreMask {
  /// 语言边界使用的整数编码
  pub fn as_i32(self) -> i32 {
    match self {
      CoreMask::CpuOnly => 0,
      CoreMask::CpuAndGpu => 1,
      CoreMask::All => 2,
      CoreMask::CpuAndNeuralEngine => 3,
    }
  }

  pub fn from_i32(value: i32) -> Option<Self> {
    match value {
      0 => Some(CoreMask::CpuOnly),
      1 => Some(CoreMask::CpuAndGpu),
      2 => Some(CoreMask::All),
      3 => Some(CoreMask::CpuAndNeuralEngine),
      _ => None,
    }
  }
}

/// 模型版本。影响运行时如何解读原始检测输出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVersion {
  YoloV5,
  YoloV8,
  YoloV11,
}

impl ModelVersion {
  pub fn as_i32(self) -> i32 {
    match self {
      ModelVersion::YoloV5 => 0,
      ModelVersion::YoloV8 => 1,
      ModelVersion::YoloV11 => 2,
    }
  }

  pub fn from_i32(value: i32) -> Option<Self> {
    match value {
      0 => Some(ModelVersion::YoloV5),
      1 => Some(ModelVersion::YoloV8),
      2 => Some(ModelVersion::YoloV11),
      _ => None,
    }
  }
}

/// 外部推理运行时的能力接口。
///
/// 运行时加载模型后暴露固定的输入尺寸，接收写好的 NHWC 像素帧，
/// 返回模型输入空间的原始候选框与逐类别分数。CoreML、ONNX
/// 或测试桩都可以实现此接口接入检测器门面。
///
/// `infer` 为同步调用，在调用线程上执行完毕；接口本身不保证
/// 可重入，单个运行时实例的并发调用由上层约定。
pub trait InferenceRuntime: Sized {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 从磁盘加载模型。路径无效或模型不可用时返回错误
  fn load(
    model_path: &Path,
    version: ModelVersion,
    num_classes: usize,
  ) -> Result<Self, Self::Error>;

  /// 调整计算单元偏好。失败不影响已加载的模型，
  /// 运行时回退到默认偏好
  fn set_compute_affinity(&mut self, mask: CoreMask) -> Result<(), Self::Error>;

  /// 模型输入宽度
  fn input_width(&self) -> u32;

  /// 模型输入高度
  fn input_height(&self) -> u32;

  /// 对一帧已预处理的输入执行推理
  fn infer(&self, input: &PixelFrame) -> Result<RawDetections, Self::Error>;
}
