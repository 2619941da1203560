use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorOut {
    pub python_exe: String,
    pub python_version: String,
    pub ok: bool,
    /// Component name to version (onnxruntime, tesseract, opencv, ...).
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReq {
    pub request_id: String,
    pub image_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsReq {
    pub request_id: String,
    pub image_path: PathBuf,
    pub min_fields: usize,
    pub roster: Vec<String>,
}

/// Raw class scores in model output order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualOut {
    #[serde(default)]
    pub scores: Vec<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsOut {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub institution_text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateOut {
    #[serde(default)]
    pub matched: bool,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
