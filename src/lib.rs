// 该文件是 Qianli（千里眼）项目的一部分。
// src/lib.rs - 库主文件
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

//! 目标检测推理的前后处理核心：letterbox 预处理、像素缓冲池、
//! NMS 后处理，以及对接外部推理运行时的检测器门面。
//! 推理运行时本身（CoreML、ONNX 等）通过 [`runtime::InferenceRuntime`]
//! 特征接入，本库不包含任何网络结构或推理实现。

pub mod detector;
pub mod frame;
pub mod pool;
pub mod postprocess;
pub mod preprocess;
pub mod runtime;
