//! # 优化请求/响应记录
//!
//! 定义提交接口使用的请求与响应数据结构。结构文件以 base64 编码传输；
//! 响应总是成功或错误两种形态之一，均携带请求标识。
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `engine/runner.rs` 使用
//! - 使用 `models/result.rs` 的 `ResultRecord`

use crate::models::result::ResultRecord;
use serde::{Deserialize, Serialize};

/// 支持的 xTB 半经验方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XtbMethod {
    Gfn1Xtb,
    Gfn2Xtb,
}

impl XtbMethod {
    /// 引擎输入文件中使用的方法名
    pub fn as_str(&self) -> &'static str {
        match self {
            XtbMethod::Gfn1Xtb => "GFN1-xTB",
            XtbMethod::Gfn2Xtb => "GFN2-xTB",
        }
    }
}

impl std::fmt::Display for XtbMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for XtbMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GFN1-xTB" => Ok(XtbMethod::Gfn1Xtb),
            "GFN2-xTB" => Ok(XtbMethod::Gfn2Xtb),
            other => Err(format!("invalid method: {}", other)),
        }
    }
}

/// 几何优化请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    /// 请求标识，为空时由接收方生成
    #[serde(default)]
    pub request_id: String,

    /// base64 编码的 CIF 内容
    pub structure_file: String,

    /// 方法名："GFN1-xTB" 或 "GFN2-xTB"
    pub method: String,

    /// 力收敛阈值（正数）
    pub fmax: f64,

    /// 可选：原始文件名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
}

impl OptimizationRequest {
    /// 请求标识为空时生成一个 uuid v4
    pub fn ensure_request_id(&mut self) {
        if self.request_id.is_empty() {
            self.request_id = uuid::Uuid::new_v4().to_string();
        }
    }
}

/// 响应状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// 几何优化响应
///
/// 对已通过校验的提交，流水线保证总是返回本结构（成功或错误形态），
/// 不向调用方抛出未处理的故障。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResponse {
    pub status: ResponseStatus,

    pub request_id: String,

    /// 解析后的计算结果（成功时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_data: Option<ResultRecord>,

    /// base64 编码的优化后 CIF 内容（成功时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_cif: Option<String>,

    /// 错误消息（失败时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl OptimizationResponse {
    /// 构造成功响应
    pub fn success(request_id: impl Into<String>, data: ResultRecord, cif_base64: String) -> Self {
        OptimizationResponse {
            status: ResponseStatus::Success,
            request_id: request_id.into(),
            parsed_data: Some(data),
            optimized_cif: Some(cif_base64),
            error_message: None,
        }
    }

    /// 构造错误响应
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        OptimizationResponse {
            status: ResponseStatus::Error,
            request_id: request_id.into(),
            parsed_data: None,
            optimized_cif: None,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}
