// 该文件是 Qianli（千里眼）项目的一部分。
// src/bin/preview_letterbox.rs - letterbox 预处理预览工具
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

use anyhow::{Context, Result};
use clap::Parser;
use image::{ImageReader, RgbImage};
use tracing::info;

use qianli::frame::AsNhwcFrame;
use qianli::pool::PixelBufferPool;
use qianli::preprocess::letterbox;

/// letterbox 预处理预览：读取图片，缩放填充到模型输入尺寸后保存，
/// 并打印坐标逆变换所需的参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图片路径
  #[arg(long, value_name = "FILE")]
  pub input: String,

  /// 输出图片路径
  #[arg(long, value_name = "FILE")]
  pub output: String,

  /// 模型输入宽度
  #[arg(long, default_value = "640", value_name = "PIXELS")]
  pub width: u32,

  /// 模型输入高度
  #[arg(long, default_value = "640", value_name = "PIXELS")]
  pub height: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入图片: {}", args.input);
  let image: RgbImage = ImageReader::open(&args.input)
    .with_context(|| format!("无法打开图片: {}", args.input))?
    .decode()
    .with_context(|| format!("无法解码图片: {}", args.input))?
    .into();
  info!("原图尺寸: {}x{}", image.width(), image.height());

  let pool = PixelBufferPool::new();

  let now = std::time::Instant::now();
  let (frame, params) = letterbox(&image, args.width, args.height, &pool)?;
  info!("预处理完成，耗时: {:.2?}", now.elapsed());

  info!(
    "变换参数: 目标 {}x{}，缩放 {:.4}，填充 ({}, {})",
    params.input_width, params.input_height, params.scale, params.pad_w, params.pad_h
  );

  let canvas = RgbImage::from_raw(args.width, args.height, frame.as_nhwc().to_vec())
    .context("无法构建输出画布")?;
  canvas
    .save(&args.output)
    .with_context(|| format!("无法保存图片: {}", args.output))?;
  info!("已保存: {}", args.output);

  pool.release(frame);

  Ok(())
}
