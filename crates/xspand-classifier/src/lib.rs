//! # Xspand影像分类模块
//!
//! 封装预训练的胸片分类模型：
//! - 影像获取：从 URL 或本地路径读取原始字节
//! - 预处理：灰度化、缩放到固定分辨率、归一化到 [0,1]
//! - 推理：`ScoringModel` 输出每个类别的置信度
//! - 标签策略：阈值多标签，无标签过阈值时回退到置信度最高的单标签
//!
//! 分类失败不会向调用方抛错，而是返回带失败阶段的 `ClassificationOutcome::Failed`。

pub mod classifier;
pub mod labels;
pub mod model;
pub mod preprocess;

pub use classifier::{
    Classification, ClassificationOutcome, ClassifierAdapter, ClassifierSettings, ClassifierStage,
    ImageSource,
};
pub use labels::{class_labels, select_labels, CHEST_XRAY_LABELS};
pub use model::ScoringModel;
#[cfg(feature = "onnx")]
pub use model::OnnxModel;
pub use preprocess::{preprocess_image, ImageTensor};
