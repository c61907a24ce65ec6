//! 分类适配器
//!
//! 单次分类按 Idle → Fetching → Preprocessing → Scoring → Done 线性推进，
//! 不重试、不可取消。任一阶段失败都会以 `ClassificationOutcome::Failed` 返回。
//!
//! 来自请求的影像引用只接受 `http(s)` URL（`ImageSource::remote`），
//! 本地路径仅供进程内可信调用使用。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use xspand_core::{Result, XspandError};

use crate::labels::{class_labels, select_labels};
use crate::model::ScoringModel;
use crate::preprocess::preprocess_image;

/// 分类流程所处阶段
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStage {
    Idle,
    Fetching,
    Preprocessing,
    Scoring,
    Done,
}

/// 影像来源
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Url(String),
    Path(PathBuf),
}

impl ImageSource {
    /// 解析外部传入的影像引用，只接受 `http`/`https` URL
    pub fn remote(reference: &str) -> Result<Self> {
        let url = reqwest::Url::parse(reference.trim())
            .map_err(|_| XspandError::Validation(format!("image_url must be an http(s) URL, got {:?}", reference)))?;

        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(ImageSource::Url(url.to_string())),
            scheme => Err(XspandError::Validation(format!(
                "image_url must be an http(s) URL, got scheme {:?}",
                scheme
            ))),
        }
    }
}

/// 分类参数
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub image_width: u32,
    pub image_height: u32,
    pub confidence_threshold: f32,
    pub fetch_timeout: Duration,
    /// 单张影像的最大字节数
    pub max_image_bytes: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            image_width: 128,
            image_height: 128,
            confidence_threshold: 0.5,
            fetch_timeout: Duration::from_secs(30),
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}

/// 一次成功的分类结果
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Classification {
    /// 选中的标签，按类别顺序
    pub labels: Vec<String>,
    /// 与 `labels` 一一对应的置信度
    pub confidences: Vec<f32>,
    /// 模型输出的全部类别置信度
    pub scores: Vec<f32>,
}

impl Classification {
    pub fn labels_joined(&self) -> String {
        self.labels.join(", ")
    }

    pub fn confidences_joined(&self) -> String {
        self.confidences
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 分类结果：区分"得到标签"与"无法分类"
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    Labeled(Classification),
    Failed { stage: ClassifierStage, reason: String },
}

impl ClassificationOutcome {
    /// 未加载模型时的结果
    pub fn unavailable() -> Self {
        ClassificationOutcome::Failed {
            stage: ClassifierStage::Idle,
            reason: "classifier unavailable".to_string(),
        }
    }

    pub fn classification(&self) -> Option<&Classification> {
        match self {
            ClassificationOutcome::Labeled(classification) => Some(classification),
            ClassificationOutcome::Failed { .. } => None,
        }
    }

    pub fn is_labeled(&self) -> bool {
        matches!(self, ClassificationOutcome::Labeled(_))
    }
}

/// 包装预训练模型的分类适配器
pub struct ClassifierAdapter {
    model: Arc<dyn ScoringModel>,
    labels: Vec<String>,
    settings: ClassifierSettings,
    http: reqwest::Client,
}

impl ClassifierAdapter {
    pub fn new(model: Arc<dyn ScoringModel>, settings: ClassifierSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()
            .map_err(|e| XspandError::Config(format!("failed to build HTTP client: {}", e)))?;
        let labels = class_labels(model.class_count());

        info!(
            "Classifier ready: {} classes, {}x{} input, threshold {}",
            labels.len(),
            settings.image_width,
            settings.image_height,
            settings.confidence_threshold
        );

        Ok(Self {
            model,
            labels,
            settings,
            http,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// 对一张影像分类，失败时返回带阶段信息的结果而不是错误
    pub async fn classify(&self, source: &ImageSource) -> ClassificationOutcome {
        match self.run_pipeline(source).await {
            Ok(classification) => {
                debug!("Classification done: {}", classification.labels_joined());
                ClassificationOutcome::Labeled(classification)
            }
            Err((stage, reason)) => {
                warn!("Classification failed during {:?}: {}", stage, reason);
                ClassificationOutcome::Failed { stage, reason }
            }
        }
    }

    async fn run_pipeline(
        &self,
        source: &ImageSource,
    ) -> std::result::Result<Classification, (ClassifierStage, String)> {
        debug!("Fetching image {:?}", source);
        let bytes = self
            .fetch(source)
            .await
            .map_err(|e| (ClassifierStage::Fetching, e.to_string()))?;

        debug!("Preprocessing {} bytes", bytes.len());
        let (width, height) = (self.settings.image_width, self.settings.image_height);
        let tensor = tokio::task::spawn_blocking(move || preprocess_image(&bytes, width, height))
            .await
            .map_err(|e| (ClassifierStage::Preprocessing, e.to_string()))?
            .map_err(|e| (ClassifierStage::Preprocessing, e.to_string()))?;

        debug!("Scoring {}x{} tensor", tensor.width, tensor.height);
        let model = self.model.clone();
        let scores = tokio::task::spawn_blocking(move || model.predict(&tensor))
            .await
            .map_err(|e| (ClassifierStage::Scoring, e.to_string()))?
            .map_err(|e| (ClassifierStage::Scoring, e.to_string()))?;

        let classification = self
            .label(scores)
            .map_err(|e| (ClassifierStage::Scoring, e.to_string()))?;
        debug!("Stage {:?} reached", ClassifierStage::Done);
        Ok(classification)
    }

    /// 把模型输出转成标签集合
    fn label(&self, scores: Vec<f32>) -> Result<Classification> {
        if scores.len() != self.labels.len() || scores.is_empty() {
            return Err(XspandError::Classification(format!(
                "model returned {} scores for {} classes",
                scores.len(),
                self.labels.len()
            )));
        }

        let (labels, confidences) = select_labels(&scores, &self.labels, self.settings.confidence_threshold)
            .into_iter()
            .unzip();

        Ok(Classification {
            labels,
            confidences,
            scores,
        })
    }

    async fn fetch(&self, source: &ImageSource) -> Result<Vec<u8>> {
        let limit = self.settings.max_image_bytes;
        match source {
            ImageSource::Url(url) => {
                let mut response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| XspandError::ExternalService(format!("failed to download image: {}", e)))?;

                if !response.status().is_success() {
                    return Err(XspandError::ExternalService(format!(
                        "failed to download image from {}: {}",
                        url,
                        response.status()
                    )));
                }

                if let Some(length) = response.content_length() {
                    if length > limit {
                        return Err(too_large(limit));
                    }
                }

                let mut bytes = Vec::new();
                while let Some(chunk) = response
                    .chunk()
                    .await
                    .map_err(|e| XspandError::ExternalService(format!("failed to read image body: {}", e)))?
                {
                    if (bytes.len() + chunk.len()) as u64 > limit {
                        return Err(too_large(limit));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                Ok(bytes)
            }
            ImageSource::Path(path) => {
                let metadata = tokio::fs::metadata(path).await?;
                if !metadata.is_file() {
                    return Err(XspandError::Validation(format!("{} is not a file", path.display())));
                }
                if metadata.len() > limit {
                    return Err(too_large(limit));
                }
                Ok(tokio::fs::read(path).await?)
            }
        }
    }
}

fn too_large(limit: u64) -> XspandError {
    XspandError::Validation(format!("image exceeds the {} byte limit", limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::ImageTensor;
    use image::{ImageBuffer, ImageOutputFormat, Luma};
    use std::io::Cursor;

    /// 返回固定置信度的模型
    struct FixedModel {
        scores: Vec<f32>,
    }

    impl ScoringModel for FixedModel {
        fn class_count(&self) -> usize {
            self.scores.len()
        }

        fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
            assert_eq!(input.shape(), [1, 128, 128, 1]);
            Ok(self.scores.clone())
        }
    }

    /// 输出维度与声明不符的模型
    struct TruncatedModel;

    impl ScoringModel for TruncatedModel {
        fn class_count(&self) -> usize {
            13
        }

        fn predict(&self, _input: &ImageTensor) -> Result<Vec<f32>> {
            Ok(vec![0.9; 5])
        }
    }

    fn write_test_png(name: &str) -> PathBuf {
        let bytes = png_bytes();
        let path = std::env::temp_dir().join(format!("xspand-{}-{}.png", name, std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn adapter(model: Arc<dyn ScoringModel>) -> ClassifierAdapter {
        ClassifierAdapter::new(model, ClassifierSettings::default()).unwrap()
    }

    /// 本地 HTTP 服务，对任何请求都返回 `body`
    async fn serve_bytes(body: Vec<u8>, with_length: bool) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let header = if with_length {
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        )
                    } else {
                        "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_string()
                    };
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}/scan.png", addr)
    }

    fn png_bytes() -> Vec<u8> {
        let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(64, 64, Luma([128]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_remote_source_accepts_only_http_urls() {
        assert_eq!(
            ImageSource::remote("https://example.com/a.png").unwrap(),
            ImageSource::Url("https://example.com/a.png".to_string())
        );
        for reference in ["/etc/hostname", "a.png", "file:///etc/passwd", "ftp://example.com/a.png", ""] {
            assert!(
                matches!(ImageSource::remote(reference), Err(XspandError::Validation(_))),
                "{} should be rejected",
                reference
            );
        }
    }

    #[tokio::test]
    async fn test_classify_downloaded_image() {
        let mut scores = vec![0.1; 13];
        scores[11] = 0.8;
        let classifier = adapter(Arc::new(FixedModel { scores }));
        let url = serve_bytes(png_bytes(), true).await;

        let outcome = classifier.classify(&ImageSource::remote(&url).unwrap()).await;
        assert_eq!(outcome.classification().unwrap().labels, vec!["Pneumonia"]);
    }

    #[tokio::test]
    async fn test_oversized_download_fails_while_fetching() {
        let settings = ClassifierSettings {
            max_image_bytes: 1024,
            ..Default::default()
        };
        let classifier = ClassifierAdapter::new(Arc::new(FixedModel { scores: vec![0.9; 13] }), settings).unwrap();

        // 带 Content-Length 与不带（读到连接关闭为止）两种响应
        for with_length in [true, false] {
            let url = serve_bytes(vec![0u8; 64 * 1024], with_length).await;
            let outcome = classifier.classify(&ImageSource::remote(&url).unwrap()).await;
            match outcome {
                ClassificationOutcome::Failed { stage, reason } => {
                    assert_eq!(stage, ClassifierStage::Fetching);
                    assert!(reason.contains("1024 byte limit"), "{}", reason);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_classify_multi_label() {
        let mut scores = vec![0.1; 13];
        scores[4] = 0.7; // Effusion
        scores[11] = 0.8; // Pneumonia
        let classifier = adapter(Arc::new(FixedModel { scores }));
        let path = write_test_png("multi");

        let outcome = classifier.classify(&ImageSource::Path(path)).await;
        let classification = outcome.classification().unwrap();

        assert_eq!(classification.scores.len(), 13);
        assert_eq!(classification.labels, vec!["Effusion", "Pneumonia"]);
        assert_eq!(classification.labels_joined(), "Effusion, Pneumonia");
        assert_eq!(classification.confidences_joined(), "0.7, 0.8");
    }

    #[tokio::test]
    async fn test_classify_falls_back_to_single_label() {
        let mut scores = vec![0.05; 13];
        scores[1] = 0.3; // Cardiomegaly
        let classifier = adapter(Arc::new(FixedModel { scores }));
        let path = write_test_png("fallback");

        let outcome = classifier.classify(&ImageSource::Path(path)).await;
        let classification = outcome.classification().unwrap();

        assert_eq!(classification.labels, vec!["Cardiomegaly"]);
        assert_eq!(classification.confidences, vec![0.3]);
    }

    #[tokio::test]
    async fn test_missing_file_fails_while_fetching() {
        let classifier = adapter(Arc::new(FixedModel { scores: vec![0.9; 13] }));
        let outcome = classifier
            .classify(&ImageSource::Path(PathBuf::from("/definitely/not/here.png")))
            .await;

        assert!(matches!(
            outcome,
            ClassificationOutcome::Failed { stage: ClassifierStage::Fetching, .. }
        ));
    }

    #[tokio::test]
    async fn test_undecodable_file_fails_while_preprocessing() {
        let path = std::env::temp_dir().join(format!("xspand-garbage-{}.png", std::process::id()));
        std::fs::write(&path, b"not an image").unwrap();
        let classifier = adapter(Arc::new(FixedModel { scores: vec![0.9; 13] }));

        let outcome = classifier.classify(&ImageSource::Path(path)).await;
        assert!(matches!(
            outcome,
            ClassificationOutcome::Failed { stage: ClassifierStage::Preprocessing, .. }
        ));
    }

    #[tokio::test]
    async fn test_wrong_score_count_fails_while_scoring() {
        let classifier = adapter(Arc::new(TruncatedModel));
        let path = write_test_png("truncated");

        let outcome = classifier.classify(&ImageSource::Path(path)).await;
        assert!(matches!(
            outcome,
            ClassificationOutcome::Failed { stage: ClassifierStage::Scoring, .. }
        ));
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let value = serde_json::to_value(ClassificationOutcome::unavailable()).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["stage"], "idle");
    }
}
