// 该文件是 Qianli（千里眼）项目的一部分。
// src/postprocess.rs - 检测输出后处理（坐标逆变换 + NMS）
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

use thiserror::Error;
use tracing::debug;

use crate::preprocess::PreprocessParams;

/// 推理运行时返回的原始输出。
///
/// `boxes` 为模型输入空间的 `[x1, y1, x2, y2]` 角点坐标；
/// `scores` 为逐候选、逐类别的置信度，长度必须等于
/// `boxes.len() * num_classes`。若模型输出 objectness，
/// 运行时负责在此之前把它折叠进各类别分数。
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
  pub boxes: Vec<[f32; 4]>,
  pub scores: Vec<f32>,
}

/// 单个检测结果，角点坐标位于原图像素空间
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  /// 置信度，0.0 - 1.0
  pub confidence: f32,
  /// 类别索引
  pub class_id: u32,
}

#[derive(Error, Debug)]
pub enum PostprocessError {
  #[error("类别数量无效: {0}")]
  InvalidClassCount(usize),
  #[error("输出形状不匹配: {boxes} 个候选框、{scores} 个分数、{num_classes} 个类别")]
  ShapeMismatch {
    boxes: usize,
    scores: usize,
    num_classes: usize,
  },
}

/// 将原始模型输出转换为原图坐标系下经过 NMS 去重的检测列表。
///
/// 流程：逐候选取类别分数最大值作为置信度，丢弃低于 `box_thresh`
/// 的候选，按 [`PreprocessParams`] 做 letterbox 逆变换并把角点
/// 钳制到 `[0, orig_w] x [0, orig_h]`，最后按类别做贪心 NMS。
///
/// 输出顺序：类别索引升序，同类内按 NMS 保留顺序（置信度降序）。
/// 阈值的取值范围由门面层校验，此处不再检查。
pub fn postprocess(
  raw: &RawDetections,
  num_classes: usize,
  params: &PreprocessParams,
  orig_w: u32,
  orig_h: u32,
  box_thresh: f32,
  nms_thresh: f32,
) -> Result<Vec<Detection>, PostprocessError> {
  if num_classes == 0 {
    return Err(PostprocessError::InvalidClassCount(num_classes));
  }
  if raw.scores.len() != raw.boxes.len() * num_classes {
    return Err(PostprocessError::ShapeMismatch {
      boxes: raw.boxes.len(),
      scores: raw.scores.len(),
      num_classes,
    });
  }

  let mut candidates = Vec::new();

  for (i, bbox) in raw.boxes.iter().enumerate() {
    let class_scores = &raw.scores[i * num_classes..(i + 1) * num_classes];

    let mut confidence = f32::MIN;
    let mut class_id = 0u32;
    for (c, &score) in class_scores.iter().enumerate() {
      if score > confidence {
        confidence = score;
        class_id = c as u32;
      }
    }

    if confidence < box_thresh {
      continue;
    }

    let (x1, y1) = params.to_original(bbox[0], bbox[1]);
    let (x2, y2) = params.to_original(bbox[2], bbox[3]);

    candidates.push(Detection {
      x1: x1.clamp(0.0, orig_w as f32),
      y1: y1.clamp(0.0, orig_h as f32),
      x2: x2.clamp(0.0, orig_w as f32),
      y2: y2.clamp(0.0, orig_h as f32),
      confidence,
      class_id,
    });
  }

  debug!(
    "后处理: {} 个候选，阈值过滤后剩余 {}",
    raw.boxes.len(),
    candidates.len()
  );

  let kept = nms(candidates, nms_thresh);
  debug!("NMS 后保留 {} 个检测结果", kept.len());

  Ok(kept)
}

/// 按类别分组的贪心非极大值抑制。
///
/// 同类候选按置信度降序处理：保留当前最高者，抑制与其 IoU
/// 超过 `nms_thresh` 的剩余同类候选。对自身输出再次运行是幂等的。
pub fn nms(mut candidates: Vec<Detection>, nms_thresh: f32) -> Vec<Detection> {
  candidates.sort_by(|a, b| {
    a.class_id
      .cmp(&b.class_id)
      .then(b.confidence.total_cmp(&a.confidence))
  });

  let mut kept = Vec::new();
  while !candidates.is_empty() {
    let best = candidates.remove(0);
    candidates.retain(|det| det.class_id != best.class_id || iou(&best, det) <= nms_thresh);
    kept.push(best);
  }

  kept
}

/// 两个角点形式边界框的交并比；并集为零时返回 0
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  let x1 = a.x1.max(b.x1);
  let y1 = a.y1.max(b.y1);
  let x2 = a.x2.min(b.x2);
  let y2 = a.y2.min(b.y2);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
  let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}
