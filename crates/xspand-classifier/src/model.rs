//! 推理后端

use xspand_core::Result;

use crate::preprocess::ImageTensor;

/// 预训练分类模型：输入预处理后的张量，输出每个类别的置信度
///
/// 模型加载后只读，可在多个请求间共享。
pub trait ScoringModel: Send + Sync {
    /// 模型输出的类别数
    fn class_count(&self) -> usize;

    /// 前向推理
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;
    use std::sync::Mutex;

    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;
    use tracing::info;
    use xspand_core::{Result, XspandError};

    use super::ScoringModel;
    use crate::preprocess::ImageTensor;

    fn ort_error(e: ort::Error) -> XspandError {
        XspandError::Classification(e.to_string())
    }

    /// 基于 ONNX Runtime 的模型
    pub struct OnnxModel {
        session: Mutex<Session>,
        input_name: String,
        class_count: usize,
    }

    impl OnnxModel {
        /// 从磁盘加载模型
        pub fn load(path: impl AsRef<Path>, input_name: &str, class_count: usize) -> Result<Self> {
            let path = path.as_ref();
            if !path.exists() {
                return Err(XspandError::Config(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }

            info!("Loading ONNX model from {}", path.display());
            let session = Session::builder()
                .map_err(ort_error)?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(ort_error)?
                .commit_from_file(path)
                .map_err(ort_error)?;

            info!("Loaded ONNX model with {} classes", class_count);
            Ok(Self {
                session: Mutex::new(session),
                input_name: input_name.to_string(),
                class_count,
            })
        }
    }

    impl ScoringModel for OnnxModel {
        fn class_count(&self) -> usize {
            self.class_count
        }

        fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
            let tensor = Tensor::from_array((input.shape(), input.data.clone())).map_err(ort_error)?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| XspandError::Classification("model session lock poisoned".to_string()))?;
            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => tensor])
                .map_err(ort_error)?;

            let (_shape, scores) = outputs[0].try_extract_tensor::<f32>().map_err(ort_error)?;
            Ok(scores.to_vec())
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;
