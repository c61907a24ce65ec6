//! 影像预处理

use std::io::Cursor;

use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use xspand_core::{Result, XspandError};

/// 单通道输入张量，行优先，形状 `[1, height, width, 1]`，取值 [0,1]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 1]
    }
}

/// 解码影像字节，转灰度后缩放到目标分辨率并归一化
pub fn preprocess_image(bytes: &[u8], width: u32, height: u32) -> Result<ImageTensor> {
    if width == 0 || height == 0 {
        return Err(XspandError::Classification(
            "target resolution must be non-zero".to_string(),
        ));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| XspandError::Classification(format!("failed to read image format: {}", e)))?;

    let img = reader
        .decode()
        .map_err(|e| XspandError::Classification(format!("failed to decode image: {}", e)))?;

    let gray = img.to_luma8();
    let resized = image::imageops::resize(&gray, width, height, FilterType::Nearest);

    let data = resized
        .pixels()
        .map(|pixel| f32::from(pixel.0[0]) / 255.0)
        .collect();

    Ok(ImageTensor { width, height, data })
}
