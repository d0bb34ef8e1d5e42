//! Generic success/failure envelope for API responses.
//!
//! # Design
//! `ApiResult<T>` carries `code`, `message`, `data` and `success`. Fields are
//! private so a value can only be created through the factory functions,
//! which pin `code` and `success` from `ResultCode`. Setters exist for
//! adjusting a value after it was created. The serde shape is
//! `{"code", "message", "data", "success"}` with `data: null` when absent.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of status codes used by the envelope factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    Error,
    ValidateFailed,
    Unauthorized,
    Forbidden,
}

impl ResultCode {
    pub const ALL: [ResultCode; 5] = [
        ResultCode::Success,
        ResultCode::Error,
        ResultCode::ValidateFailed,
        ResultCode::Unauthorized,
        ResultCode::Forbidden,
    ];

    pub fn code(&self) -> i32 {
        match self {
            ResultCode::Success => 200,
            ResultCode::Error => 500,
            ResultCode::ValidateFailed => 404,
            ResultCode::Unauthorized => 401,
            ResultCode::Forbidden => 403,
        }
    }

    /// Default human-readable message.
    pub fn message(&self) -> &'static str {
        match self {
            ResultCode::Success => "操作成功",
            ResultCode::Error => "操作失败",
            ResultCode::ValidateFailed => "参数检验失败",
            ResultCode::Unauthorized => "暂未登录或token已经过期",
            ResultCode::Forbidden => "没有相关权限",
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    code: i32,
    message: String,
    data: Option<T>,
    success: bool,
}

impl<T> ApiResult<T> {
    fn new(code: i32, message: String, data: Option<T>, success: bool) -> Self {
        Self {
            code,
            message,
            data,
            success,
        }
    }

    pub fn success() -> Self {
        let code = ResultCode::Success;
        Self::new(code.code(), code.message().to_string(), None, true)
    }

    pub fn success_with_message(message: impl Into<String>) -> Self {
        Self::new(ResultCode::Success.code(), message.into(), None, true)
    }

    pub fn success_with_data(data: T) -> Self {
        let code = ResultCode::Success;
        Self::new(code.code(), code.message().to_string(), Some(data), true)
    }

    pub fn success_with(message: impl Into<String>, data: T) -> Self {
        Self::new(ResultCode::Success.code(), message.into(), Some(data), true)
    }

    pub fn error() -> Self {
        Self::failed(ResultCode::Error)
    }

    pub fn error_with_message(message: impl Into<String>) -> Self {
        Self::new(ResultCode::Error.code(), message.into(), None, false)
    }

    /// Failure with an arbitrary code, e.g. `error_with_code(418, "teapot")`.
    pub fn error_with_code(code: i32, message: impl Into<String>) -> Self {
        Self::new(code, message.into(), None, false)
    }

    /// Failure carrying `code` and its default message.
    pub fn failed(code: ResultCode) -> Self {
        Self::new(code.code(), code.message().to_string(), None, false)
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn set_code(&mut self, code: i32) {
        self.code = code;
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn set_data(&mut self, data: Option<T>) {
        self.data = data;
    }

    pub fn set_success(&mut self, success: bool) {
        self.success = success;
    }
}

impl<T: fmt::Debug> fmt::Display for ApiResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Result{{code={}, message='{}', data=", self.code, self.message)?;
        match &self.data {
            Some(data) => write!(f, "{data:?}")?,
            None => f.write_str("null")?,
        }
        write!(f, ", success={}}}", self.success)
    }
}
