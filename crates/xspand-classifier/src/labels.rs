//! 类别标签与标签选择策略

/// ChestX-ray14 去掉 Hernia 后的 13 个病种标签，顺序与模型输出一致
pub const CHEST_XRAY_LABELS: [&str; 13] = [
    "Atelectasis",
    "Cardiomegaly",
    "Consolidation",
    "Edema",
    "Effusion",
    "Emphysema",
    "Fibrosis",
    "Infiltration",
    "Mass",
    "Nodule",
    "Pleural_Thickening",
    "Pneumonia",
    "Pneumothorax",
];

/// 按模型输出维度给出类别标签，非 13 类模型使用 `Class_{i}`
pub fn class_labels(class_count: usize) -> Vec<String> {
    if class_count == CHEST_XRAY_LABELS.len() {
        CHEST_XRAY_LABELS.iter().map(|label| label.to_string()).collect()
    } else {
        (0..class_count).map(|i| format!("Class_{}", i)).collect()
    }
}

/// 选出置信度不低于阈值的全部类别；一个都没有时回退到置信度最高的类别
///
/// 返回按类别顺序排列的 `(标签, 置信度)`；`scores` 为空时返回空列表。
pub fn select_labels(scores: &[f32], labels: &[String], threshold: f32) -> Vec<(String, f32)> {
    let mut selected: Vec<(String, f32)> = scores
        .iter()
        .zip(labels)
        .filter(|(score, _)| **score >= threshold)
        .map(|(score, label)| (label.clone(), *score))
        .collect();

    if selected.is_empty() {
        let best = scores
            .iter()
            .zip(labels)
            .max_by(|(a, _), (b, _)| a.total_cmp(b));
        if let Some((score, label)) = best {
            selected.push((label.clone(), *score));
        }
    }

    selected
}
